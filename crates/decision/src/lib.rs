pub mod engine;
pub mod policy;
pub mod rules;
pub mod validator;

pub use engine::{DecisionEngine, DecisionError};
pub use policy::{Policy, PolicyContext};
pub use rules::{IntentClassifier, IntentRule};
pub use validator::{iban_remainder, national_id_checksum, FieldValidator};
