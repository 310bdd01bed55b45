//! Multi-mode recognition and best-attempt selection.

use rayon::prelude::*;
use stp_core::SegmentationMode;

use crate::preprocess::{encode_as_png, ImagePreprocessor};
use crate::recognizer::OcrBackend;
use crate::types::{EnhancedPage, PageAudit, RawPage, RecognitionAttempt};

/// Winner among `attempts`: highest confidence among those with non-blank
/// text, earliest on ties. `None` when every attempt is blank.
pub fn select_best(attempts: &[RecognitionAttempt]) -> Option<&RecognitionAttempt> {
    attempts
        .iter()
        .filter(|a| a.has_text())
        .fold(None, |best: Option<&RecognitionAttempt>, a| match best {
            Some(b) if b.confidence >= a.confidence => Some(b),
            _ => Some(a),
        })
}

/// Result of recognizing one page.
#[derive(Debug, Clone)]
pub struct PageRecognition {
    pub attempt: RecognitionAttempt,
    pub audit: PageAudit,
}

pub struct RecognitionSelector<R: OcrBackend> {
    backend: R,
    modes: Vec<SegmentationMode>,
}

impl<R: OcrBackend> RecognitionSelector<R> {
    pub fn new(backend: R, modes: Vec<SegmentationMode>) -> Self {
        Self { backend, modes }
    }

    pub fn modes(&self) -> &[SegmentationMode] {
        &self.modes
    }

    /// Run every configured mode over `page` and keep the best attempt.
    /// Modes that fail are logged and left out of the selection.
    pub fn recognize_page(&self, page: &EnhancedPage, page_no: usize) -> PageRecognition {
        let first_mode = self.modes.first().copied().unwrap_or(SegmentationMode::UniformBlock);
        let bytes = match encode_as_png(&page.image) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(page = page_no, error = %e, "page could not be encoded for recognition");
                return PageRecognition {
                    attempt: RecognitionAttempt::new(first_mode, "", 0.0),
                    audit: PageAudit {
                        page: page_no,
                        mode: None,
                        confidence: 0.0,
                        attempts: 0,
                        failed: self.modes.len(),
                    },
                };
            }
        };

        let mut attempts = Vec::with_capacity(self.modes.len());
        let mut failed = 0;
        for &mode in &self.modes {
            match self.backend.recognize(&bytes, mode) {
                Ok(out) => {
                    tracing::debug!(page = page_no, %mode, confidence = out.confidence, "recognition attempt");
                    attempts.push(RecognitionAttempt::new(mode, out.text, out.confidence));
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(page = page_no, %mode, error = %e, "recognition mode failed");
                }
            }
        }

        let (attempt, selected) = match select_best(&attempts) {
            Some(best) => (best.clone(), true),
            None => {
                // Nothing usable: keep whatever the first mode produced.
                let fallback = attempts
                    .iter()
                    .find(|a| a.mode == first_mode)
                    .cloned()
                    .unwrap_or_else(|| RecognitionAttempt::new(first_mode, "", 0.0));
                (fallback, false)
            }
        };

        let audit = PageAudit {
            page: page_no,
            mode: selected.then_some(attempt.mode),
            confidence: if selected { attempt.confidence } else { 0.0 },
            attempts: attempts.len(),
            failed,
        };
        PageRecognition { attempt, audit }
    }

    /// Enhance and recognize every page in parallel; output keeps page order.
    /// Blank pages are dropped from the text. Multi-page documents get a
    /// `--- Page N ---` marker before each page's text.
    pub fn recognize_document(
        &self,
        pages: &[RawPage],
        preprocessor: &ImagePreprocessor,
    ) -> (String, Vec<PageAudit>) {
        let results: Vec<PageRecognition> = pages
            .par_iter()
            .enumerate()
            .map(|(i, raw)| {
                let enhanced = preprocessor.enhance(raw);
                self.recognize_page(&enhanced, i + 1)
            })
            .collect();

        let multi_page = pages.len() > 1;
        let mut parts = Vec::new();
        for r in &results {
            if !r.attempt.has_text() {
                continue;
            }
            if multi_page {
                parts.push(format!("--- Page {} ---", r.audit.page));
            }
            parts.push(r.attempt.text.clone());
        }

        tracing::info!(
            pages = pages.len(),
            with_text = results.iter().filter(|r| r.attempt.has_text()).count(),
            "document recognized"
        );
        (parts.join("\n\n"), results.into_iter().map(|r| r.audit).collect())
    }
}
