use stp_core::{Decision, DecisionSettings, EntityRecord, Intent, Settings};
use thiserror::Error;

use crate::policy::{default_policies, Policy, PolicyContext};
use crate::rules::IntentClassifier;
use crate::validator::FieldValidator;

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),
    #[error("No policy registered for intent '{0}'")]
    NoPolicy(Intent),
    #[error("Failed to parse intent rules: {0}")]
    Rules(#[from] toml::de::Error),
}

/// Classifies a record's intent and applies the matching policy.
///
/// Holds no mutable state: the same record always yields the same decision.
pub struct DecisionEngine {
    classifier: IntentClassifier,
    validator: FieldValidator,
    settings: DecisionSettings,
    currency: String,
    policies: Vec<Box<dyn Policy>>,
}

impl DecisionEngine {
    pub fn new(settings: &Settings) -> Self {
        Self::with_classifier(settings, IntentClassifier::default())
    }

    pub fn with_classifier(settings: &Settings, classifier: IntentClassifier) -> Self {
        Self {
            classifier,
            validator: FieldValidator::new(&settings.locale, &settings.validation),
            settings: settings.decision.clone(),
            currency: settings.locale.currency.clone(),
            policies: default_policies(),
        }
    }

    pub fn validator(&self) -> &FieldValidator {
        &self.validator
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Never fails: internal faults become a rejected decision carrying a
    /// single system-error reason.
    pub fn decide(&self, record: &EntityRecord) -> Decision {
        match self.try_decide(record) {
            Ok(decision) => {
                tracing::info!(
                    intent = %decision.intent,
                    category = %decision.category,
                    confidence = decision.confidence,
                    "decision made"
                );
                decision
            }
            Err(e) => {
                tracing::error!(error = %e, "decision failed");
                Decision::system_error(e)
            }
        }
    }

    pub fn try_decide(&self, record: &EntityRecord) -> Result<Decision, DecisionError> {
        let intent = self.classifier.classify(record);
        let policy = self
            .policies
            .iter()
            .find(|p| p.intent() == intent)
            .ok_or(DecisionError::NoPolicy(intent))?;
        let ctx = PolicyContext {
            record,
            validator: &self.validator,
            settings: &self.settings,
            currency: &self.currency,
        };
        policy.evaluate(&ctx)
    }
}
