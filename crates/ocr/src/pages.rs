//! Turning document bytes into decoded pages.
//!
//! Images decode to a single page. PDFs go through a [`PdfRasterizer`]; the
//! PDFium-backed one is only compiled with the `pdfium` feature.

use stp_core::DocumentFormat;
use thiserror::Error;

use crate::types::RawPage;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("PDF rendering not available, build with `pdfium` feature")]
    PdfUnavailable,
    #[error("Failed to render PDF: {0}")]
    Pdf(String),
    #[error("Document has no pages")]
    Empty,
}

/// Renders every page of a PDF to a bitmap at the requested resolution.
pub trait PdfRasterizer: Send + Sync {
    fn rasterize(&self, data: &[u8], dpi: u32) -> Result<Vec<RawPage>, PageError>;
}

/// Stand-in used when no PDF engine is compiled in.
pub struct NoPdfSupport;

impl PdfRasterizer for NoPdfSupport {
    fn rasterize(&self, _data: &[u8], _dpi: u32) -> Result<Vec<RawPage>, PageError> {
        Err(PageError::PdfUnavailable)
    }
}

impl<T: PdfRasterizer + ?Sized> PdfRasterizer for Box<T> {
    fn rasterize(&self, data: &[u8], dpi: u32) -> Result<Vec<RawPage>, PageError> {
        (**self).rasterize(data, dpi)
    }
}

/// Decode `data` into pages in document order.
pub fn load_pages<P: PdfRasterizer + ?Sized>(
    data: &[u8],
    format: DocumentFormat,
    rasterizer: &P,
    render_dpi: u32,
) -> Result<Vec<RawPage>, PageError> {
    let pages = match format {
        DocumentFormat::Jpeg | DocumentFormat::Png => vec![decode_image(data)?],
        DocumentFormat::Pdf => rasterizer.rasterize(data, render_dpi)?,
    };
    if pages.is_empty() {
        return Err(PageError::Empty);
    }
    tracing::debug!(format = %format, pages = pages.len(), "document decoded");
    Ok(pages)
}

pub fn decode_image(data: &[u8]) -> Result<RawPage, PageError> {
    let image = image::load_from_memory(data)?;
    Ok(RawPage::new(image, embedded_dpi(data)))
}

/// Resolution stored in the file header, if any.
pub fn embedded_dpi(data: &[u8]) -> Option<u32> {
    if data.starts_with(PNG_SIGNATURE) {
        png_dpi(data)
    } else if data.starts_with(&[0xFF, 0xD8]) {
        jfif_dpi(data)
    } else {
        None
    }
}

// ── PNG ───────────────────────────────────────────────────────────────────────

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

fn png_dpi(data: &[u8]) -> Option<u32> {
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes(data[pos..pos + 4].try_into().ok()?) as usize;
        let kind = &data[pos + 4..pos + 8];
        let body = data.get(pos + 8..pos + 8 + len)?;
        match kind {
            b"pHYs" if len >= 9 => {
                let ppu_x = u32::from_be_bytes(body[0..4].try_into().ok()?);
                // Unit 1 is metres; 0 only gives an aspect ratio.
                return (body[8] == 1 && ppu_x > 0)
                    .then(|| (ppu_x as f64 * 0.0254).round() as u32);
            }
            b"IDAT" | b"IEND" => return None,
            _ => {}
        }
        pos += 12 + len;
    }
    None
}

// ── JPEG ──────────────────────────────────────────────────────────────────────

fn jfif_dpi(data: &[u8]) -> Option<u32> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        // Start of scan: no more header segments.
        if marker == 0xDA {
            return None;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let body = data.get(pos + 4..pos + 2 + len)?;
        if marker == 0xE0 && body.len() >= 12 && body.starts_with(b"JFIF\0") {
            let units = body[7];
            let x_density = u16::from_be_bytes([body[8], body[9]]) as f64;
            return match units {
                1 if x_density > 0.0 => Some(x_density as u32),
                2 if x_density > 0.0 => Some((x_density * 2.54).round() as u32),
                _ => None,
            };
        }
        pos += 2 + len;
    }
    None
}

// ── PDFium (optional) ─────────────────────────────────────────────────────────

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::{PageError, PdfRasterizer};
    use crate::types::RawPage;
    use pdfium_render::prelude::*;
    use std::path::PathBuf;

    /// Binds PDFium per document, so the rasterizer itself holds no library handle.
    pub struct PdfiumRasterizer {
        library_dir: Option<PathBuf>,
        max_dimension: u32,
    }

    impl PdfiumRasterizer {
        pub fn new(library_dir: Option<PathBuf>, max_dimension: u32) -> Self {
            Self { library_dir, max_dimension }
        }

        fn bind(&self) -> Result<Pdfium, PageError> {
            let bindings = match &self.library_dir {
                Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                    .or_else(|_| Pdfium::bind_to_system_library()),
                None => Pdfium::bind_to_system_library(),
            }
            .map_err(|e| PageError::Pdf(format!("could not load PDFium: {e}")))?;
            Ok(Pdfium::new(bindings))
        }
    }

    impl PdfRasterizer for PdfiumRasterizer {
        fn rasterize(&self, data: &[u8], dpi: u32) -> Result<Vec<RawPage>, PageError> {
            let pdfium = self.bind()?;
            let document = pdfium
                .load_pdf_from_byte_slice(data, None)
                .map_err(|e| PageError::Pdf(e.to_string()))?;

            let mut pages = Vec::with_capacity(document.pages().len() as usize);
            for (index, page) in document.pages().iter().enumerate() {
                // PDF user space is 72 points per inch.
                let mut scale = dpi as f32 / 72.0;
                let longest = page.width().value.max(page.height().value) * scale;
                if longest > self.max_dimension as f32 {
                    scale *= self.max_dimension as f32 / longest;
                }
                let width = (page.width().value * scale).round() as i32;
                let height = (page.height().value * scale).round() as i32;

                let config = PdfRenderConfig::new()
                    .set_target_width(width)
                    .set_target_height(height)
                    .render_form_data(true)
                    .render_annotations(true);
                let bitmap = page.render_with_config(&config).map_err(|e| {
                    PageError::Pdf(format!("page {}: {e}", index + 1))
                })?;
                let effective_dpi = (scale * 72.0).round() as u32;
                pages.push(RawPage::new(bitmap.as_image(), Some(effective_dpi)));
            }
            Ok(pages)
        }
    }
}
