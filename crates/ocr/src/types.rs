use image::DynamicImage;
use serde::{Deserialize, Serialize};
use stp_core::SegmentationMode;

/// One decoded page, as it came out of the source document.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub image: DynamicImage,
    /// Horizontal resolution from the file metadata, if it carried any.
    pub dpi: Option<u32>,
    pub color: image::ColorType,
}

impl RawPage {
    pub fn new(image: DynamicImage, dpi: Option<u32>) -> Self {
        let color = image.color();
        Self { image, dpi, color }
    }
}

/// A page after enhancement: single-channel, resolution-normalized, binarized
/// unless a step had to be skipped.
#[derive(Debug, Clone)]
pub struct EnhancedPage {
    pub image: DynamicImage,
    pub dpi: u32,
}

/// Output of one segmentation mode over one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionAttempt {
    pub mode: SegmentationMode,
    pub text: String,
    /// Mean token confidence, 0–100.
    pub confidence: f32,
}

impl RecognitionAttempt {
    pub fn new(mode: SegmentationMode, text: impl Into<String>, confidence: f32) -> Self {
        Self { mode, text: text.into(), confidence: confidence.clamp(0.0, 100.0) }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Which attempt won on a page, kept for auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAudit {
    /// 1-based.
    pub page: usize,
    pub mode: Option<SegmentationMode>,
    pub confidence: f32,
    pub attempts: usize,
    pub failed: usize,
}

/// Document-level result of the text stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentText {
    /// SHA-256 of the original bytes, hex encoded.
    pub fingerprint: String,
    pub page_count: usize,
    pub raw_text: String,
    pub text: String,
    pub pages: Vec<PageAudit>,
    /// Mean of the selected attempts' confidences over pages that produced text.
    pub mean_confidence: f32,
}
