use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the automated decision. The engine only ever produces these two
/// states; manual review happens outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionCategory {
    Approved,
    Rejected,
}

impl fmt::Display for DecisionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionCategory::Approved => write!(f, "APPROVED"),
            DecisionCategory::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl std::str::FromStr for DecisionCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(DecisionCategory::Approved),
            "REJECTED" => Ok(DecisionCategory::Rejected),
            other => Err(format!("Unknown decision category: '{other}'")),
        }
    }
}

/// What the customer is asking for, as inferred from the document analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Transfer,
    LoanApplication,
    CreditLimitIncrease,
    TransferLimitIncrease,
    Unknown,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Transfer => write!(f, "transfer"),
            Intent::LoanApplication => write!(f, "loan_application"),
            Intent::CreditLimitIncrease => write!(f, "credit_limit_increase"),
            Intent::TransferLimitIncrease => write!(f, "transfer_limit_increase"),
            Intent::Unknown => write!(f, "unknown"),
        }
    }
}

/// Field-level check results for one entity record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub national_id_valid: bool,
    pub sender_iban_valid: bool,
    pub receiver_iban_valid: bool,
    /// Both sender and receiver IBANs valid.
    pub iban_valid: bool,
    pub amount_valid: bool,
    /// Share of passed checks among {national ID, IBANs, amount}, 0–100.
    pub validation_score: f64,
}

impl ValidationResult {
    pub fn from_checks(
        national_id_valid: bool,
        sender_iban_valid: bool,
        receiver_iban_valid: bool,
        amount_valid: bool,
    ) -> Self {
        let iban_valid = sender_iban_valid && receiver_iban_valid;
        let passed = [national_id_valid, iban_valid, amount_valid]
            .iter()
            .filter(|&&ok| ok)
            .count();
        Self {
            national_id_valid,
            sender_iban_valid,
            receiver_iban_valid,
            iban_valid,
            amount_valid,
            validation_score: score_for(passed),
        }
    }

    /// Attached to decisions whose policy never ran field validation.
    pub fn placeholder() -> Self {
        Self::from_checks(false, false, false, false)
    }

    pub fn passed_checks(&self) -> usize {
        [self.national_id_valid, self.iban_valid, self.amount_valid]
            .iter()
            .filter(|&&ok| ok)
            .count()
    }
}

/// Percentage rounded to two decimals, so scores read 33.33 / 66.67.
fn score_for(passed: usize) -> f64 {
    let raw = passed as f64 / 3.0 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Terminal artifact of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub category: DecisionCategory,
    /// Certainty of the decision, 0–100.
    pub confidence: f64,
    /// Outcome first, justification after.
    pub reasons: Vec<String>,
    pub validation: ValidationResult,
    pub intent: Intent,
}

impl Decision {
    pub fn new(
        category: DecisionCategory,
        confidence: f64,
        reasons: Vec<String>,
        validation: ValidationResult,
        intent: Intent,
    ) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 100.0),
            reasons,
            validation,
            intent,
        }
    }

    pub fn system_error(detail: impl fmt::Display) -> Self {
        Self::new(
            DecisionCategory::Rejected,
            0.0,
            vec![format!("System error: {detail}")],
            ValidationResult::placeholder(),
            Intent::Unknown,
        )
    }

    pub fn is_approved(&self) -> bool {
        self.category == DecisionCategory::Approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn score_takes_only_four_values() {
        let mut seen = Vec::new();
        for bits in 0u8..16 {
            let r = ValidationResult::from_checks(
                bits & 1 != 0,
                bits & 2 != 0,
                bits & 4 != 0,
                bits & 8 != 0,
            );
            assert!(
                [0.0, 33.33, 66.67, 100.0].contains(&r.validation_score),
                "unexpected score {}",
                r.validation_score
            );
            seen.push(r.validation_score);
        }
        for expected in [0.0, 33.33, 66.67, 100.0] {
            assert!(seen.contains(&expected));
        }
    }

    #[test]
    fn iban_valid_requires_both_accounts() {
        let r = ValidationResult::from_checks(true, true, false, true);
        assert!(!r.iban_valid);
        assert_eq!(r.passed_checks(), 2);
        assert_eq!(r.validation_score, 66.67);

        let r = ValidationResult::from_checks(false, true, true, false);
        assert!(r.iban_valid);
        assert_eq!(r.validation_score, 33.33);
    }

    #[test]
    fn placeholder_is_zero() {
        let p = ValidationResult::placeholder();
        assert_eq!(p.validation_score, 0.0);
        assert_eq!(p.passed_checks(), 0);
    }

    #[test]
    fn category_roundtrip() {
        for c in [DecisionCategory::Approved, DecisionCategory::Rejected] {
            assert_eq!(DecisionCategory::from_str(&c.to_string()).unwrap(), c);
        }
        assert!(DecisionCategory::from_str("MANUAL_REVIEW").is_err());
    }

    #[test]
    fn confidence_is_clamped() {
        let d = Decision::new(
            DecisionCategory::Approved,
            140.0,
            vec![],
            ValidationResult::placeholder(),
            Intent::Transfer,
        );
        assert_eq!(d.confidence, 100.0);
    }

    #[test]
    fn system_error_is_a_rejection() {
        let d = Decision::system_error("overflow");
        assert!(!d.is_approved());
        assert_eq!(d.confidence, 0.0);
        assert_eq!(d.reasons, vec!["System error: overflow".to_string()]);
    }

    #[test]
    fn serializes_with_screaming_category() {
        let d = Decision::system_error("x");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["category"], "REJECTED");
        assert_eq!(json["validation"]["validationScore"], 0.0);
        assert_eq!(json["intent"], "unknown");
    }
}
