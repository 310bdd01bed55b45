use std::collections::HashMap;
use stp_core::SegmentationMode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available, build with `tesseract` feature")]
    NotAvailable,
}

/// Text and mean token confidence (0–100) from one recognition run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    pub text: String,
    pub confidence: f32,
}

/// Abstraction over an OCR backend.
/// Implementations accept PNG image bytes and a segmentation mode.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8], mode: SegmentationMode)
        -> Result<RecognizedText, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(
        &self,
        image_bytes: &[u8],
        mode: SegmentationMode,
    ) -> Result<RecognizedText, OcrError> {
        (**self).recognize(image_bytes, mode)
    }
}

/// Used when no engine is compiled in; every call fails.
pub struct UnavailableRecognizer;

impl OcrBackend for UnavailableRecognizer {
    fn recognize(&self, _: &[u8], _: SegmentationMode) -> Result<RecognizedText, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

enum Scripted {
    Text(RecognizedText),
    Fail(String),
}

/// Returns pre-set output per segmentation mode, so selection and pipeline
/// logic can be tested without Tesseract installed.
pub struct MockRecognizer {
    default: RecognizedText,
    per_mode: HashMap<SegmentationMode, Scripted>,
}

impl MockRecognizer {
    /// Same text for every mode.
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            default: RecognizedText { text: text.into(), confidence },
            per_mode: HashMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: SegmentationMode, text: impl Into<String>, confidence: f32) -> Self {
        self.per_mode.insert(
            mode,
            Scripted::Text(RecognizedText { text: text.into(), confidence }),
        );
        self
    }

    pub fn failing(mut self, mode: SegmentationMode, message: impl Into<String>) -> Self {
        self.per_mode.insert(mode, Scripted::Fail(message.into()));
        self
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8], mode: SegmentationMode) -> Result<RecognizedText, OcrError> {
        match self.per_mode.get(&mode) {
            Some(Scripted::Text(t)) => Ok(t.clone()),
            Some(Scripted::Fail(msg)) => Err(OcrError::Engine(msg.clone())),
            None => Ok(self.default.clone()),
        }
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError, RecognizedText};
    use leptess::{LepTess, Variable};
    use stp_core::{RecognitionSettings, SegmentationMode};

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
        whitelist: Option<String>,
        dpi: u32,
    }

    impl TesseractRecognizer {
        pub fn new(settings: &RecognitionSettings, dpi: u32) -> Self {
            Self {
                data_path: settings.data_path.clone(),
                lang: settings.language.clone(),
                whitelist: settings.char_whitelist.clone(),
                dpi,
            }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(
            &self,
            image_bytes: &[u8],
            mode: SegmentationMode,
        ) -> Result<RecognizedText, OcrError> {
            // LepTess is not Sync; one instance per call keeps pages parallel.
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_variable(Variable::TesseditPagesegMode, &mode.psm().to_string())
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            if let Some(whitelist) = &self.whitelist {
                lt.set_variable(Variable::TesseditCharWhitelist, whitelist)
                    .map_err(|e| OcrError::Engine(e.to_string()))?;
            }
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.set_source_resolution(self.dpi as i32);
            let text = lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))?;
            let confidence = lt.mean_text_conf().clamp(0, 100) as f32;
            Ok(RecognizedText { text, confidence })
        }
    }
}
