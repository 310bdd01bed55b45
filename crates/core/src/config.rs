//! Runtime settings, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! documented pipeline behaviour. Sections map one-to-one onto the components
//! that consume them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::money::Money;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid setting `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub locale: LocaleSettings,
    pub preprocess: PreprocessSettings,
    pub recognition: RecognitionSettings,
    pub validation: ValidationSettings,
    pub decision: DecisionSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.preprocess;
        if p.min_dpi == 0 || p.min_dpi > p.max_dpi {
            return Err(ConfigError::Invalid {
                field: "preprocess.min_dpi",
                message: format!("must be in 1..=max_dpi ({}), got {}", p.max_dpi, p.min_dpi),
            });
        }
        if p.target_dpi == 0 || p.default_dpi == 0 {
            return Err(ConfigError::Invalid {
                field: "preprocess.target_dpi",
                message: "target and default DPI must be positive".to_string(),
            });
        }
        if p.contrast <= 0.0 || p.sharpness <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "preprocess.contrast",
                message: "enhancement factors must be positive".to_string(),
            });
        }
        if self.recognition.modes.is_empty() {
            return Err(ConfigError::Invalid {
                field: "recognition.modes",
                message: "at least one segmentation mode is required".to_string(),
            });
        }
        let cc = &self.locale.home_country;
        if cc.len() != 2 || !cc.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::Invalid {
                field: "locale.home_country",
                message: format!("expected a two-letter uppercase country code, got '{cc}'"),
            });
        }
        if !(15..=34).contains(&self.locale.iban_length) {
            return Err(ConfigError::Invalid {
                field: "locale.iban_length",
                message: format!("IBAN length must be within 15..=34, got {}", self.locale.iban_length),
            });
        }
        if !(0.0..=100.0).contains(&self.decision.transfer_min_score) {
            return Err(ConfigError::Invalid {
                field: "decision.transfer_min_score",
                message: format!("must be within 0..=100, got {}", self.decision.transfer_min_score),
            });
        }
        Ok(())
    }
}

/// Home-country conventions shared by the normalizer, validator and engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleSettings {
    pub home_country: String,
    /// Domestic IBAN length, country code included.
    pub iban_length: usize,
    /// Canonical currency token used in normalized text and decision reasons.
    pub currency: String,
    /// Spellings rewritten to `currency` during normalization.
    pub currency_synonyms: Vec<String>,
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self {
            home_country: "TR".to_string(),
            iban_length: 26,
            currency: "TL".to_string(),
            currency_synonyms: vec!["TRY".to_string(), "YTL".to_string(), "₺".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    pub target_dpi: u32,
    pub min_dpi: u32,
    pub max_dpi: u32,
    /// Assumed when the image carries no resolution metadata.
    pub default_dpi: u32,
    pub contrast: f32,
    pub sharpness: f32,
    /// 1 gives a 3×3 window.
    pub median_radius: u32,
    /// Upper bound on either side after resampling, in pixels.
    pub max_dimension: u32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            target_dpi: 300,
            min_dpi: 150,
            max_dpi: 600,
            default_dpi: 72,
            contrast: 1.5,
            sharpness: 2.0,
            median_radius: 1,
            max_dimension: 6000,
        }
    }
}

/// Page layout assumption handed to the recognition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    UniformBlock,
    SingleWord,
    SingleLine,
    Auto,
}

impl SegmentationMode {
    /// Tesseract page segmentation mode number.
    pub fn psm(self) -> u8 {
        match self {
            SegmentationMode::UniformBlock => 6,
            SegmentationMode::SingleWord => 8,
            SegmentationMode::SingleLine => 13,
            SegmentationMode::Auto => 3,
        }
    }

    pub fn default_order() -> Vec<SegmentationMode> {
        vec![
            SegmentationMode::UniformBlock,
            SegmentationMode::SingleWord,
            SegmentationMode::SingleLine,
            SegmentationMode::Auto,
        ]
    }
}

impl fmt::Display for SegmentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentationMode::UniformBlock => write!(f, "uniform_block"),
            SegmentationMode::SingleWord => write!(f, "single_word"),
            SegmentationMode::SingleLine => write!(f, "single_line"),
            SegmentationMode::Auto => write!(f, "auto"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Tried in order; earlier modes win confidence ties.
    pub modes: Vec<SegmentationMode>,
    pub language: String,
    pub data_path: Option<String>,
    pub char_whitelist: Option<String>,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            modes: SegmentationMode::default_order(),
            language: "tur+eng".to_string(),
            data_path: None,
            char_whitelist: Some(
                "ABCÇDEFGĞHIİJKLMNOÖPQRSŞTUÜVWXYZabcçdefgğhıijklmnoöpqrsştuüvwxyz0123456789.,;:!?()-/\\ ₺$€"
                    .to_string(),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub min_iban_length: usize,
    /// Accept the listed test identifiers without checksum verification.
    /// Off unless explicitly enabled.
    pub permissive_test_mode: bool,
    pub test_national_ids: Vec<String>,
    pub test_iban_prefixes: Vec<String>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            min_iban_length: 15,
            permissive_test_mode: false,
            test_national_ids: [
                "12345678901",
                "12345678902",
                "98765432101",
                "11111111110",
                "22222222220",
                "33333333330",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            test_iban_prefixes: vec!["TR88".to_string()],
        }
    }
}

/// Policy thresholds. Amounts are in the home currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionSettings {
    pub transfer_min_score: f64,
    pub loan_ceiling: Money,
    /// Maximum loan as a multiple of monthly income.
    pub income_multiplier: Decimal,
    /// Approval ceiling when income is unknown.
    pub unverified_loan_ceiling: Money,
    pub credit_limit_ceiling: Money,
    pub credit_limit_min_income: Money,
    pub transfer_limit_default: Money,
    pub transfer_limit_ceiling: Money,
}

impl Default for DecisionSettings {
    fn default() -> Self {
        Self {
            transfer_min_score: 60.0,
            loan_ceiling: Money::from_units(5_000_000),
            income_multiplier: Decimal::from(60),
            unverified_loan_ceiling: Money::from_units(100_000),
            credit_limit_ceiling: Money::from_units(2_000_000),
            credit_limit_min_income: Money::from_units(15_000),
            transfer_limit_default: Money::from_units(50_000),
            transfer_limit_ceiling: Money::from_units(500_000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
