//! Structured fields produced by the external extraction service.
//!
//! Every field is optional. A missing value is a normal outcome of extraction
//! and is reported as an invalid check downstream, never as an error here.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::money::Money;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    #[serde(default)]
    pub customer: Option<Customer>,
    #[serde(default, alias = "sender_account")]
    pub sender_account: Option<Account>,
    #[serde(default, alias = "receiver_account")]
    pub receiver_account: Option<Account>,
    #[serde(default)]
    pub transaction: Option<Transaction>,
    #[serde(default)]
    pub loan: Option<Loan>,
    #[serde(default, alias = "document_analysis")]
    pub document_analysis: Option<DocumentAnalysis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "tckn", alias = "national_id", deserialize_with = "text_or_number")]
    pub national_id: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, alias = "birth_date")]
    pub birth_date: Option<String>,
    #[serde(default, alias = "monthly_income")]
    pub monthly_income: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default, alias = "account_number", deserialize_with = "text_or_number")]
    pub account_number: Option<String>,
    #[serde(default, alias = "bank_name")]
    pub bank_name: Option<String>,
    #[serde(default, alias = "account_holder")]
    pub account_holder: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default, rename = "type", alias = "transaction_type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, alias = "transaction_date")]
    pub date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    #[serde(default, alias = "loan_amount")]
    pub amount: Option<Money>,
    /// Term in months.
    #[serde(default, alias = "loan_term")]
    pub term: Option<u32>,
    #[serde(default, alias = "loan_purpose")]
    pub purpose: Option<String>,
    #[serde(default, alias = "interest_rate")]
    pub interest_rate: Option<Decimal>,
    #[serde(default, alias = "monthly_installment")]
    pub installment: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    #[serde(default, alias = "document_type")]
    pub document_type: Option<DocumentType>,
    /// Extraction confidence, 0–100.
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl DocumentAnalysis {
    /// Zero when the extractor reported none.
    pub fn confidence(&self) -> f64 {
        self.confidence.unwrap_or(0.0)
    }

    pub fn priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    EftForm,
    LoanApplication,
    AccountOpening,
    Complaint,
    #[serde(other)]
    Other,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::EftForm => "eft_form",
            DocumentType::LoanApplication => "loan_application",
            DocumentType::AccountOpening => "account_opening",
            DocumentType::Complaint => "complaint",
            DocumentType::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    High,
    Urgent,
    #[default]
    #[serde(other)]
    Normal,
}

impl EntityRecord {
    pub fn customer_name(&self) -> Option<&str> {
        self.customer.as_ref().and_then(|c| present(&c.name))
    }

    pub fn national_id(&self) -> Option<&str> {
        self.customer.as_ref().and_then(|c| present(&c.national_id))
    }

    pub fn monthly_income(&self) -> Option<Money> {
        self.customer.as_ref().and_then(|c| c.monthly_income)
    }

    pub fn sender_iban(&self) -> Option<&str> {
        self.sender_account.as_ref().and_then(|a| present(&a.iban))
    }

    pub fn receiver_iban(&self) -> Option<&str> {
        self.receiver_account.as_ref().and_then(|a| present(&a.iban))
    }

    pub fn transaction_amount(&self) -> Option<Money> {
        self.transaction.as_ref().and_then(|t| t.amount)
    }

    pub fn loan_amount(&self) -> Option<Money> {
        self.loan.as_ref().and_then(|l| l.amount)
    }

    /// Snake-case document type label, or an empty string when not classified.
    pub fn document_type_label(&self) -> &'static str {
        self.document_analysis
            .as_ref()
            .and_then(|a| a.document_type)
            .map(DocumentType::as_str)
            .unwrap_or("")
    }

    pub fn intent_label(&self) -> &str {
        self.document_analysis
            .as_ref()
            .and_then(|a| a.intent.as_deref())
            .unwrap_or("")
    }
}

impl Customer {
    pub fn birth_date(&self) -> Option<NaiveDate> {
        self.birth_date.as_deref().and_then(parse_date)
    }
}

impl Transaction {
    pub fn date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date)
    }
}

/// Accepts ISO dates and the day-first dotted form used on domestic forms.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Identifiers sometimes arrive as bare JSON numbers.
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Integer(n) => n.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_all_absent() {
        let r: EntityRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(r, EntityRecord::default());
        assert!(r.customer_name().is_none());
        assert!(r.sender_iban().is_none());
        assert_eq!(r.document_type_label(), "");
        assert_eq!(r.intent_label(), "");
    }

    #[test]
    fn camel_case_contract() {
        let json = r#"{
            "customer": {"name": "Ayşe Yılmaz", "nationalId": "10000000146", "monthlyIncome": 5000},
            "senderAccount": {"iban": "TR33 0006 1005 1978 6457 8413 26"},
            "receiverAccount": {"iban": null},
            "transaction": {"type": "eft", "amount": 1000.5, "currency": "TL"},
            "loan": {"amount": 200000, "term": 36},
            "documentAnalysis": {"documentType": "eft_form", "confidence": 92, "intent": "para transferi", "priority": "HIGH"}
        }"#;
        let r: EntityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.customer_name(), Some("Ayşe Yılmaz"));
        assert_eq!(r.national_id(), Some("10000000146"));
        assert_eq!(r.monthly_income(), Some(Money::from_units(5000)));
        assert!(r.sender_iban().is_some());
        assert!(r.receiver_iban().is_none());
        assert_eq!(r.loan_amount(), Some(Money::from_units(200_000)));
        assert_eq!(r.document_type_label(), "eft_form");
        assert_eq!(r.intent_label(), "para transferi");
        let analysis = r.document_analysis.unwrap();
        assert_eq!(analysis.priority(), Priority::High);
        assert_eq!(analysis.confidence(), 92.0);
    }

    #[test]
    fn snake_case_aliases_from_extraction_service() {
        let json = r#"{
            "customer": {"name": "Mehmet", "tckn": 12345678950, "monthly_income": 20000},
            "sender_account": {"iban": "TR330006100519786457841326"},
            "receiver_account": {"iban": "TR190006200012345678901234"},
            "transaction": {"transaction_type": "eft", "amount": 750},
            "loan": {"loan_amount": 90000, "monthly_installment": 3100},
            "document_analysis": {"document_type": "loan_application", "intent": "kredi"}
        }"#;
        let r: EntityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.national_id(), Some("12345678950"));
        assert_eq!(r.monthly_income(), Some(Money::from_units(20_000)));
        assert_eq!(r.receiver_iban(), Some("TR190006200012345678901234"));
        assert_eq!(r.transaction.as_ref().unwrap().kind.as_deref(), Some("eft"));
        assert_eq!(r.loan_amount(), Some(Money::from_units(90_000)));
        assert_eq!(r.document_type_label(), "loan_application");
    }

    #[test]
    fn blank_strings_count_as_absent() {
        let json = r#"{"customer": {"name": "   "}, "senderAccount": {"iban": ""}}"#;
        let r: EntityRecord = serde_json::from_str(json).unwrap();
        assert!(r.customer_name().is_none());
        assert!(r.sender_iban().is_none());
    }

    #[test]
    fn unknown_document_type_and_priority_fall_back() {
        let json = r#"{"documentAnalysis": {"documentType": "insurance_claim", "priority": "CRITICAL"}}"#;
        let r: EntityRecord = serde_json::from_str(json).unwrap();
        let analysis = r.document_analysis.unwrap();
        assert_eq!(analysis.document_type, Some(DocumentType::Other));
        assert_eq!(analysis.priority(), Priority::Normal);
    }

    #[test]
    fn null_analysis_fields_take_defaults() {
        let json = r#"{"documentAnalysis": {"documentType": null, "confidence": null, "intent": null, "priority": null}}"#;
        let r: EntityRecord = serde_json::from_str(json).unwrap();
        let analysis = r.document_analysis.as_ref().unwrap();
        assert_eq!(analysis.confidence(), 0.0);
        assert_eq!(analysis.priority(), Priority::Normal);
        assert_eq!(r.document_type_label(), "");
    }

    #[test]
    fn priority_variants_round_trip_by_name() {
        for (name, p) in [("LOW", Priority::Low), ("NORMAL", Priority::Normal), ("URGENT", Priority::Urgent)] {
            let parsed: Priority = serde_json::from_value(serde_json::json!(name)).unwrap();
            assert_eq!(parsed, p);
        }
    }

    #[test]
    fn dates_parse_in_both_layouts() {
        assert_eq!(parse_date("2024-03-15"), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(parse_date("15.03.2024"), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(parse_date("not a date"), None);
        let c = Customer { birth_date: Some("01.02.1990".into()), ..Default::default() };
        assert_eq!(c.birth_date(), NaiveDate::from_ymd_opt(1990, 2, 1));
    }
}
