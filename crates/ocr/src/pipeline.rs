use sha2::{Digest, Sha256};
use std::path::Path;
use stp_core::{DocumentError, DocumentFormat, Settings};
use thiserror::Error;

use crate::normalize::TextNormalizer;
use crate::pages::{self, NoPdfSupport, PageError, PdfRasterizer};
use crate::preprocess::ImagePreprocessor;
use crate::recognizer::OcrBackend;
use crate::selector::RecognitionSelector;
use crate::types::DocumentText;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Unsupported(#[from] DocumentError),
    #[error("Could not read document pages: {0}")]
    Pages(#[from] PageError),
    #[error("Invalid normalization pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Orchestrates: fingerprint → decode pages → enhance → recognize → normalize.
pub struct DocumentPipeline<R: OcrBackend, P: PdfRasterizer = NoPdfSupport> {
    preprocessor: ImagePreprocessor,
    selector: RecognitionSelector<R>,
    normalizer: TextNormalizer,
    rasterizer: P,
}

impl<R: OcrBackend> DocumentPipeline<R, NoPdfSupport> {
    /// Images only; PDFs are reported as unavailable.
    pub fn new(settings: &Settings, backend: R) -> Result<Self, PipelineError> {
        Self::with_rasterizer(settings, backend, NoPdfSupport)
    }
}

impl<R: OcrBackend, P: PdfRasterizer> DocumentPipeline<R, P> {
    pub fn with_rasterizer(settings: &Settings, backend: R, rasterizer: P) -> Result<Self, PipelineError> {
        Ok(Self {
            preprocessor: ImagePreprocessor::new(settings.preprocess.clone()),
            selector: RecognitionSelector::new(backend, settings.recognition.modes.clone()),
            normalizer: TextNormalizer::new(&settings.locale)?,
            rasterizer,
        })
    }

    /// Process a file on disk; the declared type comes from its extension.
    pub async fn process_file(&self, path: &Path) -> Result<DocumentText, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_lowercase();
        let mime = DocumentFormat::from_extension(&ext)
            .map(DocumentFormat::mime)
            .unwrap_or("application/octet-stream");
        self.process_bytes(&bytes, mime)
    }

    /// Process raw bytes with their declared MIME type.
    pub fn process_bytes(&self, data: &[u8], mime: &str) -> Result<DocumentText, PipelineError> {
        let format = DocumentFormat::from_mime(mime)?;
        let fingerprint = fingerprint(data);
        let span = tracing::info_span!("document", fingerprint = %&fingerprint[..12], %format);
        let _enter = span.enter();

        let pages = pages::load_pages(
            data,
            format,
            &self.rasterizer,
            self.preprocessor.settings().target_dpi,
        )?;
        let (raw_text, audits) = self.selector.recognize_document(&pages, &self.preprocessor);
        let text = self.normalizer.normalize(&raw_text);

        let scored: Vec<f32> = audits
            .iter()
            .filter(|a| a.mode.is_some())
            .map(|a| a.confidence)
            .collect();
        let mean_confidence = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f32>() / scored.len() as f32
        };

        tracing::info!(
            pages = pages.len(),
            chars = text.chars().count(),
            mean_confidence,
            "text stage complete"
        );
        Ok(DocumentText {
            fingerprint,
            page_count: pages.len(),
            raw_text,
            text,
            pages: audits,
            mean_confidence,
        })
    }
}

/// Lowercase hex SHA-256 of the original bytes.
pub fn fingerprint(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::MockRecognizer;
    use crate::types::RawPage;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use std::io::Cursor;
    use stp_core::SegmentationMode;

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(12, 12, |x, _| Luma([if x % 4 == 0 { 10 } else { 240 }]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    struct TwoPagePdf;

    impl PdfRasterizer for TwoPagePdf {
        fn rasterize(&self, _data: &[u8], dpi: u32) -> Result<Vec<RawPage>, PageError> {
            let page = || {
                let img: GrayImage = ImageBuffer::from_fn(10, 10, |_, y| Luma([if y % 3 == 0 { 0 } else { 255 }]));
                RawPage::new(DynamicImage::ImageLuma8(img), Some(dpi))
            };
            Ok(vec![page(), page()])
        }
    }

    #[test]
    fn process_bytes_produces_normalized_text() {
        let pipeline = DocumentPipeline::new(
            &Settings::default(),
            MockRecognizer::new("HAVALE  talimatı\n\n1500 TRY", 82.0),
        )
        .unwrap();

        let result = pipeline.process_bytes(&tiny_png(), "image/png").unwrap();

        assert_eq!(result.fingerprint.len(), 64);
        assert_eq!(result.page_count, 1);
        assert_eq!(result.raw_text, "HAVALE  talimatı\n\n1500 TRY");
        assert_eq!(result.text, "HAVALE talimatı\n1.500 TL");
        assert_eq!(result.mean_confidence, 82.0);
        assert_eq!(result.pages[0].mode, Some(SegmentationMode::UniformBlock));
    }

    #[test]
    fn document_text_serializes_camel_case() {
        let pipeline = DocumentPipeline::new(&Settings::default(), MockRecognizer::new("EFT", 77.0)).unwrap();
        let result = pipeline.process_bytes(&tiny_png(), "image/png").unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["pageCount"], 1);
        assert_eq!(json["meanConfidence"], 77.0);
        assert_eq!(json["pages"][0]["mode"], "uniform_block");
    }

    #[test]
    fn fingerprint_is_stable() {
        let data = tiny_png();
        assert_eq!(fingerprint(&data), fingerprint(&data));
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn unsupported_mime_is_rejected_before_decoding() {
        let pipeline = DocumentPipeline::new(&Settings::default(), MockRecognizer::new("x", 90.0)).unwrap();
        let err = pipeline.process_bytes(&tiny_png(), "image/gif").unwrap_err();
        assert!(matches!(err, PipelineError::Unsupported(DocumentError::UnsupportedMime(_))));
    }

    #[test]
    fn undecodable_image_is_an_error() {
        let pipeline = DocumentPipeline::new(&Settings::default(), MockRecognizer::new("x", 90.0)).unwrap();
        let err = pipeline.process_bytes(b"\xFF\xD8garbage", "image/jpeg").unwrap_err();
        assert!(matches!(err, PipelineError::Pages(PageError::Decode(_))));
    }

    #[test]
    fn pdf_without_rasterizer_is_unavailable() {
        let pipeline = DocumentPipeline::new(&Settings::default(), MockRecognizer::new("x", 90.0)).unwrap();
        let err = pipeline.process_bytes(b"%PDF-1.7", "application/pdf").unwrap_err();
        assert!(matches!(err, PipelineError::Pages(PageError::PdfUnavailable)));
    }

    #[test]
    fn pdf_pages_are_marked() {
        let pipeline = DocumentPipeline::with_rasterizer(
            &Settings::default(),
            MockRecognizer::new("EFT", 70.0),
            TwoPagePdf,
        )
        .unwrap();
        let result = pipeline.process_bytes(b"%PDF-1.7", "application/pdf").unwrap();
        assert_eq!(result.page_count, 2);
        assert_eq!(result.text, "--- Page 1 ---\nEFT\n--- Page 2 ---\nEFT");
    }

    #[test]
    fn total_recognition_failure_yields_empty_text() {
        let backend = SegmentationMode::default_order()
            .into_iter()
            .fold(MockRecognizer::new("", 0.0), |b, m| b.failing(m, "engine down"));
        let pipeline = DocumentPipeline::new(&Settings::default(), backend).unwrap();
        let result = pipeline.process_bytes(&tiny_png(), "image/png").unwrap();
        assert_eq!(result.text, "");
        assert_eq!(result.mean_confidence, 0.0);
        assert_eq!(result.pages[0].failed, 4);
    }

    #[tokio::test]
    async fn process_file_uses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dekont.PNG");
        tokio::fs::write(&path, tiny_png()).await.unwrap();

        let pipeline = DocumentPipeline::new(&Settings::default(), MockRecognizer::new("dekont", 90.0)).unwrap();
        let result = pipeline.process_file(&path).await.unwrap();
        assert_eq!(result.text, "dekont");
    }

    #[tokio::test]
    async fn process_file_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let pipeline = DocumentPipeline::new(&Settings::default(), MockRecognizer::new("x", 90.0)).unwrap();
        let err = pipeline.process_file(&path).await.unwrap_err();
        assert!(matches!(err, PipelineError::Unsupported(_)));
    }
}
