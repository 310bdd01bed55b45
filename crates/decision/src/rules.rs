use serde::{Deserialize, Serialize};
use stp_core::{EntityRecord, Intent};

use crate::engine::DecisionError;

/// Keyword rule mapping the analysed document type / intent text to an [`Intent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRule {
    pub name: String,
    pub intent: Intent,
    pub priority: i32,
    /// Any one of these must occur in the text.
    pub keywords: Vec<String>,
    /// If non-empty, at least one of these must also occur.
    #[serde(default)]
    pub requires: Vec<String>,
    /// None of these may occur.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl IntentRule {
    pub fn matches(&self, text: &str) -> bool {
        let has = |words: &[String]| words.iter().any(|w| text.contains(w.to_lowercase().as_str()));
        has(&self.keywords)
            && (self.requires.is_empty() || has(&self.requires))
            && !has(&self.exclude)
    }
}

#[derive(Deserialize)]
struct RuleFile {
    rule: Vec<IntentRule>,
}

/// Priority-ordered intent rules; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl IntentClassifier {
    pub fn new(mut rules: Vec<IntentRule>) -> Self {
        // Highest priority first; stable so equal priorities keep file order.
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules }
    }

    /// Parse `[[rule]]` tables.
    pub fn from_toml(toml_content: &str) -> Result<Self, DecisionError> {
        let file: RuleFile = toml::from_str(toml_content)?;
        Ok(Self::new(file.rule))
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn find_matching_rule(&self, text: &str) -> Option<&IntentRule> {
        let text = text.to_lowercase();
        self.rules.iter().find(|r| r.matches(&text))
    }

    pub fn classify_text(&self, text: &str) -> Intent {
        self.find_matching_rule(text)
            .map(|r| r.intent)
            .unwrap_or(Intent::Unknown)
    }

    /// Classify over `"{document_type} {intent}"` of the record's analysis.
    pub fn classify(&self, record: &EntityRecord) -> Intent {
        let text = format!("{} {}", record.document_type_label(), record.intent_label());
        let intent = self.classify_text(&text);
        tracing::debug!(text = %text.trim(), %intent, "intent classified");
        intent
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

const LIMIT_WORDS: &[&str] = &["limit", "arttırım", "artırım", "increase"];

pub fn default_rules() -> Vec<IntentRule> {
    vec![
        IntentRule {
            name: "transfer".into(),
            intent: Intent::Transfer,
            priority: 40,
            keywords: words(&["eft", "transfer", "aktarım", "havale", "para", "ödeme", "payment"]),
            requires: vec![],
            exclude: vec![],
        },
        IntentRule {
            name: "loan".into(),
            intent: Intent::LoanApplication,
            priority: 30,
            keywords: words(&["kredi", "loan", "başvuru", "application"]),
            requires: vec![],
            exclude: words(&["limit"]),
        },
        IntentRule {
            name: "credit-limit".into(),
            intent: Intent::CreditLimitIncrease,
            priority: 20,
            keywords: words(LIMIT_WORDS),
            requires: words(&["kredi", "loan", "credit"]),
            exclude: vec![],
        },
        IntentRule {
            name: "transfer-limit".into(),
            intent: Intent::TransferLimitIncrease,
            priority: 10,
            keywords: words(LIMIT_WORDS),
            requires: vec![],
            exclude: vec![],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(doc_type: &str, intent: &str) -> EntityRecord {
        serde_json::from_value(serde_json::json!({
            "documentAnalysis": {"documentType": doc_type, "intent": intent}
        }))
        .unwrap()
    }

    #[test]
    fn default_rules_are_priority_ordered() {
        let c = IntentClassifier::default();
        let names: Vec<&str> = c.rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["transfer", "loan", "credit-limit", "transfer-limit"]);
    }

    #[test]
    fn classifies_transfer_keywords() {
        let c = IntentClassifier::default();
        assert_eq!(c.classify(&record("eft_form", "")), Intent::Transfer);
        assert_eq!(c.classify_text("HAVALE talimatı"), Intent::Transfer);
        assert_eq!(c.classify_text("fatura ödemesi"), Intent::Transfer);
    }

    #[test]
    fn transfer_keywords_take_precedence() {
        let c = IntentClassifier::default();
        assert_eq!(c.classify_text("kredi ödeme planı"), Intent::Transfer);
        assert_eq!(c.classify_text("transfer limit increase"), Intent::Transfer);
    }

    #[test]
    fn loan_requires_no_limit_word() {
        let c = IntentClassifier::default();
        assert_eq!(c.classify(&record("loan_application", "")), Intent::LoanApplication);
        assert_eq!(c.classify_text("Kredi Başvurusu"), Intent::LoanApplication);
        assert_eq!(c.classify_text("kredi kartı limit artırımı"), Intent::CreditLimitIncrease);
    }

    #[test]
    fn english_credit_terms_route_to_credit_limit() {
        let c = IntentClassifier::default();
        assert_eq!(c.classify_text("credit limit increase"), Intent::CreditLimitIncrease);
        assert_eq!(c.classify(&record("other", "loan limit increase")), Intent::CreditLimitIncrease);
        assert_eq!(c.find_matching_rule("Kredi limit").map(|r| r.name.as_str()), Some("credit-limit"));
    }

    #[test]
    fn limit_without_loan_term_is_transfer_limit() {
        let c = IntentClassifier::default();
        assert_eq!(c.classify_text("günlük limit arttırım"), Intent::TransferLimitIncrease);
        assert_eq!(c.classify(&record("other", "limit increase")), Intent::TransferLimitIncrease);
    }

    #[test]
    fn nothing_matched_is_unknown() {
        let c = IntentClassifier::default();
        assert_eq!(c.classify(&record("complaint", "şikayet")), Intent::Unknown);
        assert_eq!(c.classify(&EntityRecord::default()), Intent::Unknown);
    }

    #[test]
    fn loads_rules_from_toml() {
        let c = IntentClassifier::from_toml(
            r#"
            [[rule]]
            name = "low"
            intent = "transfer"
            priority = 1
            keywords = ["wire"]

            [[rule]]
            name = "high"
            intent = "loan_application"
            priority = 9
            keywords = ["mortgage", "wire"]
            exclude = ["refinance"]
            "#,
        )
        .unwrap();
        assert_eq!(c.rules()[0].name, "high");
        assert_eq!(c.classify_text("Mortgage wire"), Intent::LoanApplication);
        assert_eq!(c.classify_text("refinance wire"), Intent::Transfer);
        assert_eq!(c.classify_text("cheque"), Intent::Unknown);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(IntentClassifier::from_toml("[[rule]]\nname = 3").is_err());
    }
}
