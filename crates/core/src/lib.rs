pub mod config;
pub mod decision;
pub mod document;
pub mod entity;
pub mod money;

pub use config::{
    ConfigError, DecisionSettings, LocaleSettings, LoggingSettings, PreprocessSettings,
    RecognitionSettings, SegmentationMode, Settings, ValidationSettings,
};
pub use decision::{Decision, DecisionCategory, Intent, ValidationResult};
pub use document::{DocumentError, DocumentFormat};
pub use entity::{
    Account, Customer, DocumentAnalysis, DocumentType, EntityRecord, Loan, Priority, Transaction,
};
pub use money::Money;
