//! Per-intent decision policies.
//!
//! Each policy is a flat sequence of guards; the first guard that settles the
//! outcome returns. Reasons lead with the outcome and follow with the detail.

use stp_core::{
    Decision, DecisionCategory, DecisionSettings, EntityRecord, Intent, Money, ValidationResult,
};

use crate::engine::DecisionError;
use crate::validator::FieldValidator;

/// Everything a policy may consult for one record.
pub struct PolicyContext<'a> {
    pub record: &'a EntityRecord,
    pub validator: &'a FieldValidator,
    pub settings: &'a DecisionSettings,
    /// Label printed after amounts in reasons, e.g. "TL".
    pub currency: &'a str,
}

impl PolicyContext<'_> {
    fn amount(&self, money: Money) -> String {
        format!("{} {}", money.grouped(), self.currency)
    }

    /// All three transfer fields present. Whether the amount is usable is
    /// left to the validation score.
    fn has_transfer_fields(&self) -> bool {
        self.record.sender_iban().is_some()
            && self.record.receiver_iban().is_some()
            && self.record.transaction_amount().is_some()
    }
}

pub trait Policy: Send + Sync {
    fn intent(&self) -> Intent;
    fn evaluate(&self, ctx: &PolicyContext<'_>) -> Result<Decision, DecisionError>;
}

fn approved(confidence: f64, reasons: Vec<String>, intent: Intent) -> Decision {
    Decision::new(
        DecisionCategory::Approved,
        confidence,
        reasons,
        ValidationResult::placeholder(),
        intent,
    )
}

fn rejected(confidence: f64, reasons: Vec<String>, intent: Intent) -> Decision {
    Decision::new(
        DecisionCategory::Rejected,
        confidence,
        reasons,
        ValidationResult::placeholder(),
        intent,
    )
}

fn check_reasons(v: &ValidationResult, passed: bool) -> Vec<String> {
    let checks = [
        (v.national_id_valid, "National ID verified", "National ID could not be verified"),
        (v.iban_valid, "IBANs verified", "IBAN could not be verified"),
        (v.amount_valid, "Transaction amount valid", "Transaction amount invalid"),
    ];
    checks
        .iter()
        .filter(|(ok, _, _)| *ok == passed)
        .map(|&(_, pass, fail)| if passed { pass.to_string() } else { fail.to_string() })
        .collect()
}

// ── Transfer ──────────────────────────────────────────────────────────────────

pub struct TransferPolicy;

impl Policy for TransferPolicy {
    fn intent(&self) -> Intent {
        Intent::Transfer
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> Result<Decision, DecisionError> {
        if !ctx.has_transfer_fields() {
            return Ok(rejected(
                0.0,
                vec![
                    "Missing transfer information".into(),
                    "IBAN or amount missing".into(),
                ],
                Intent::Transfer,
            ));
        }

        let validation = ctx.validator.validate(ctx.record);
        let score = validation.validation_score;
        let mut decision = if score >= ctx.settings.transfer_min_score {
            let mut reasons = vec![
                "Transfer approved".to_string(),
                format!("Validation score: {score:.1}%"),
            ];
            reasons.extend(check_reasons(&validation, true));
            approved(score, reasons, Intent::Transfer)
        } else {
            let mut reasons = vec![
                "Transfer rejected".to_string(),
                format!("Validation score insufficient: {score:.1}%"),
            ];
            reasons.extend(check_reasons(&validation, false));
            rejected(score, reasons, Intent::Transfer)
        };
        decision.validation = validation;
        Ok(decision)
    }
}

// ── Loan application ──────────────────────────────────────────────────────────

pub struct LoanPolicy;

impl Policy for LoanPolicy {
    fn intent(&self) -> Intent {
        Intent::LoanApplication
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> Result<Decision, DecisionError> {
        const HEADLINE_OK: &str = "Loan application approved";
        const HEADLINE_NO: &str = "Loan application rejected";
        let intent = Intent::LoanApplication;
        let s = ctx.settings;

        let amount = ctx.record.loan_amount().filter(|m| m.is_positive());
        let (Some(_), Some(amount)) = (ctx.record.customer_name(), amount) else {
            return Ok(rejected(
                10.0,
                vec![HEADLINE_NO.into(), "Missing customer or loan information".into()],
                intent,
            ));
        };

        if amount > s.loan_ceiling {
            return Ok(rejected(
                20.0,
                vec![
                    HEADLINE_NO.into(),
                    format!("Loan amount exceeds limit ({})", ctx.amount(s.loan_ceiling)),
                ],
                intent,
            ));
        }

        if let Some(income) = ctx.record.monthly_income().filter(|m| m.is_positive()) {
            let max_loan = income
                .checked_mul(s.income_multiplier)
                .ok_or(DecisionError::Overflow("maximum loan"))?;
            return Ok(if amount <= max_loan {
                approved(
                    85.0,
                    vec![
                        HEADLINE_OK.into(),
                        format!("Loan amount: {}", ctx.amount(amount)),
                        format!("Monthly income: {}", ctx.amount(income)),
                        "Income to loan ratio acceptable".into(),
                    ],
                    intent,
                )
            } else {
                rejected(
                    30.0,
                    vec![
                        HEADLINE_NO.into(),
                        "Requested amount too high for income".into(),
                        format!("Maximum loan: {}", ctx.amount(max_loan)),
                    ],
                    intent,
                )
            });
        }

        Ok(if amount <= s.unverified_loan_ceiling {
            approved(
                70.0,
                vec![
                    HEADLINE_OK.into(),
                    "Low-amount loan application".into(),
                    format!("Loan amount: {}", ctx.amount(amount)),
                ],
                intent,
            )
        } else {
            rejected(
                40.0,
                vec![
                    HEADLINE_NO.into(),
                    "Income unknown and amount too high".into(),
                    format!(
                        "Limit without income proof: {}",
                        ctx.amount(s.unverified_loan_ceiling)
                    ),
                ],
                intent,
            )
        })
    }
}

// ── Limit increases ───────────────────────────────────────────────────────────

pub struct CreditLimitPolicy;

impl Policy for CreditLimitPolicy {
    fn intent(&self) -> Intent {
        Intent::CreditLimitIncrease
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> Result<Decision, DecisionError> {
        const HEADLINE_NO: &str = "Credit limit increase rejected";
        let intent = Intent::CreditLimitIncrease;
        let s = ctx.settings;

        if ctx.record.customer_name().is_none() {
            return Ok(rejected(
                15.0,
                vec![HEADLINE_NO.into(), "Missing customer information".into()],
                intent,
            ));
        }

        let requested = ctx
            .record
            .loan_amount()
            .or(ctx.record.transaction_amount())
            .filter(|m| m.is_positive());
        let Some(requested) = requested else {
            return Ok(rejected(
                25.0,
                vec![HEADLINE_NO.into(), "Requested limit amount missing".into()],
                intent,
            ));
        };
        if requested > s.credit_limit_ceiling {
            return Ok(rejected(
                25.0,
                vec![
                    HEADLINE_NO.into(),
                    format!(
                        "Requested amount too high (max {})",
                        ctx.amount(s.credit_limit_ceiling)
                    ),
                ],
                intent,
            ));
        }

        let income_ok = ctx
            .record
            .monthly_income()
            .is_some_and(|income| income >= s.credit_limit_min_income);
        Ok(if income_ok {
            approved(
                80.0,
                vec![
                    "Credit limit increase approved".into(),
                    format!("Requested limit: {}", ctx.amount(requested)),
                    "Income sufficient".into(),
                ],
                intent,
            )
        } else {
            rejected(
                35.0,
                vec![
                    HEADLINE_NO.into(),
                    format!(
                        "Insufficient income (min {})",
                        ctx.amount(s.credit_limit_min_income)
                    ),
                ],
                intent,
            )
        })
    }
}

pub struct TransferLimitPolicy;

impl Policy for TransferLimitPolicy {
    fn intent(&self) -> Intent {
        Intent::TransferLimitIncrease
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> Result<Decision, DecisionError> {
        let intent = Intent::TransferLimitIncrease;
        let s = ctx.settings;

        if ctx.record.customer_name().is_none() {
            return Ok(rejected(
                20.0,
                vec![
                    "Transfer limit increase rejected".into(),
                    "Missing customer information".into(),
                ],
                intent,
            ));
        }

        let requested = ctx
            .record
            .transaction_amount()
            .filter(|m| m.is_positive())
            .unwrap_or(s.transfer_limit_default);
        Ok(if requested <= s.transfer_limit_ceiling {
            approved(
                75.0,
                vec![
                    "Transfer limit increase approved".into(),
                    format!("New transfer limit: {}", ctx.amount(requested)),
                    "Standard limit increase".into(),
                ],
                intent,
            )
        } else {
            rejected(
                30.0,
                vec![
                    "Transfer limit increase rejected".into(),
                    format!(
                        "Requested limit too high (max {})",
                        ctx.amount(s.transfer_limit_ceiling)
                    ),
                ],
                intent,
            )
        })
    }
}

// ── Unrecognized ──────────────────────────────────────────────────────────────

/// Falls back to the transfer checks when the record carries transfer fields.
pub struct UnknownPolicy;

impl Policy for UnknownPolicy {
    fn intent(&self) -> Intent {
        Intent::Unknown
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> Result<Decision, DecisionError> {
        let intent = Intent::Unknown;
        if !ctx.has_transfer_fields() {
            let label = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
            return Ok(rejected(
                0.0,
                vec![
                    "Unrecognized document type".into(),
                    format!("Detected type: {}", label(ctx.record.document_type_label())),
                    format!("Intent: {}", label(ctx.record.intent_label())),
                    "Supported: transfer, loan application, limit increase".into(),
                ],
                intent,
            ));
        }

        let validation = ctx.validator.validate(ctx.record);
        let score = validation.validation_score;
        let mut decision = if score >= ctx.settings.transfer_min_score {
            approved(
                score,
                vec![
                    "Banking transaction approved".into(),
                    "Transfer details detected".into(),
                ],
                intent,
            )
        } else {
            rejected(
                score,
                vec![
                    "Banking transaction rejected".into(),
                    format!("Validation score insufficient: {score:.1}%"),
                ],
                intent,
            )
        };
        decision.validation = validation;
        Ok(decision)
    }
}

/// One policy per intent, in [`Intent`] declaration order.
pub fn default_policies() -> Vec<Box<dyn Policy>> {
    vec![
        Box::new(TransferPolicy),
        Box::new(LoanPolicy),
        Box::new(CreditLimitPolicy),
        Box::new(TransferLimitPolicy),
        Box::new(UnknownPolicy),
    ]
}
