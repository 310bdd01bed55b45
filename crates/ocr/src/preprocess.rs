use image::imageops::FilterType;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use std::io::Cursor;
use stp_core::PreprocessSettings;
use thiserror::Error;

use crate::types::{EnhancedPage, RawPage};

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Image has no pixels")]
    EmptyImage,
    #[error("Resampling to {width}x{height} is not possible")]
    Resize { width: u32, height: u32 },
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Prepares decoded pages for recognition.
///
/// Steps run in a fixed order: color normalization, resolution normalization,
/// grayscale, contrast, sharpness, 3×3 median, Otsu binarization. A step that
/// fails is logged and skipped; its input is handed to the next step unchanged.
pub struct ImagePreprocessor {
    settings: PreprocessSettings,
}

impl ImagePreprocessor {
    pub fn new(settings: PreprocessSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PreprocessSettings {
        &self.settings
    }

    pub fn enhance(&self, page: &RawPage) -> EnhancedPage {
        let source_dpi = page.dpi.unwrap_or(self.settings.default_dpi);

        let img = step("color", page.image.clone(), |img| {
            ensure_pixels(img)?;
            Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
        });

        let (img, dpi) = match self.normalize_resolution(&img, source_dpi) {
            Ok(resized) => resized,
            Err(e) => {
                tracing::warn!(step = "resolution", error = %e, "preprocessing step skipped");
                (img, source_dpi)
            }
        };

        let img = step("grayscale", img, |img| {
            ensure_pixels(img)?;
            Ok(DynamicImage::ImageLuma8(img.to_luma8()))
        });
        let img = step("contrast", img, |img| {
            ensure_pixels(img)?;
            Ok(DynamicImage::ImageLuma8(adjust_contrast(&img.to_luma8(), self.settings.contrast)))
        });
        let img = step("sharpness", img, |img| {
            ensure_pixels(img)?;
            Ok(DynamicImage::ImageLuma8(adjust_sharpness(&img.to_luma8(), self.settings.sharpness)))
        });
        let img = step("median", img, |img| {
            ensure_pixels(img)?;
            let r = self.settings.median_radius;
            Ok(DynamicImage::ImageLuma8(imageproc::filter::median_filter(&img.to_luma8(), r, r)))
        });
        let img = step("binarize", img, |img| {
            ensure_pixels(img)?;
            Ok(DynamicImage::ImageLuma8(binarize(&img.to_luma8())))
        });

        tracing::debug!(
            source_dpi,
            dpi,
            width = img.width(),
            height = img.height(),
            "page enhanced"
        );
        EnhancedPage { image: img, dpi }
    }

    /// Resample only when the source resolution falls outside the accepted
    /// window. Returns the image and the resolution it now represents.
    fn normalize_resolution(
        &self,
        img: &DynamicImage,
        source_dpi: u32,
    ) -> Result<(DynamicImage, u32), PreprocessError> {
        ensure_pixels(img)?;
        let s = &self.settings;
        if (s.min_dpi..=s.max_dpi).contains(&source_dpi) {
            return Ok((img.clone(), source_dpi));
        }

        let mut scale = s.target_dpi as f64 / source_dpi.max(1) as f64;
        let longest = img.width().max(img.height()) as f64 * scale;
        if longest > s.max_dimension as f64 {
            scale *= s.max_dimension as f64 / longest;
        }
        let width = (img.width() as f64 * scale).round() as u32;
        let height = (img.height() as f64 * scale).round() as u32;
        if width == 0 || height == 0 {
            return Err(PreprocessError::Resize { width, height });
        }

        let dpi = (source_dpi as f64 * scale).round() as u32;
        tracing::debug!(source_dpi, dpi, width, height, "resampling page");
        Ok((img.resize_exact(width, height, FilterType::Lanczos3), dpi))
    }
}

fn step<F>(name: &'static str, input: DynamicImage, f: F) -> DynamicImage
where
    F: FnOnce(&DynamicImage) -> Result<DynamicImage, PreprocessError>,
{
    match f(&input) {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!(step = name, error = %e, "preprocessing step skipped");
            input
        }
    }
}

fn ensure_pixels(img: &DynamicImage) -> Result<(), PreprocessError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(PreprocessError::EmptyImage);
    }
    Ok(())
}

/// Blend away from the mean intensity: `mean + factor * (p - mean)`.
fn adjust_contrast(gray: &GrayImage, factor: f32) -> GrayImage {
    let count = (gray.width() as u64 * gray.height() as u64).max(1);
    let total: u64 = gray.pixels().map(|p| p[0] as u64).sum();
    let mean = (total as f32 / count as f32).round();
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0] as f32;
        Luma([clamp_u8(mean + factor * (p - mean))])
    })
}

/// Blend away from a smoothed copy: `smooth + factor * (p - smooth)`.
/// The smoothing kernel is [1 1 1; 1 5 1; 1 1 1] / 13; border pixels keep
/// their own value as the smoothed reference.
fn adjust_sharpness(gray: &GrayImage, factor: f32) -> GrayImage {
    let (w, h) = gray.dimensions();
    ImageBuffer::from_fn(w, h, |x, y| {
        let p = gray.get_pixel(x, y)[0] as f32;
        let smooth = if x == 0 || y == 0 || x + 1 >= w || y + 1 >= h {
            p
        } else {
            let mut acc = 0.0;
            for dy in 0..3 {
                for dx in 0..3 {
                    let weight = if dx == 1 && dy == 1 { 5.0 } else { 1.0 };
                    acc += weight * gray.get_pixel(x + dx - 1, y + dy - 1)[0] as f32;
                }
            }
            acc / 13.0
        };
        Luma([clamp_u8(smooth + factor * (p - smooth))])
    })
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Otsu threshold; pixels above it go white, the rest black.
fn binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    threshold(gray, level, ThresholdType::Binary)
}

/// PNG bytes for handing a page to a recognition backend.
pub fn encode_as_png(img: &DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn preprocessor() -> ImagePreprocessor {
        ImagePreprocessor::new(PreprocessSettings::default())
    }

    fn solid_gray(width: u32, height: u32, value: u8) -> GrayImage {
        ImageBuffer::from_fn(width, height, |_, _| Luma([value]))
    }

    fn page(img: GrayImage, dpi: Option<u32>) -> RawPage {
        RawPage::new(DynamicImage::ImageLuma8(img), dpi)
    }

    /// Dark text-like stripes on a light background.
    fn stripes(width: u32, height: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, _| {
            if (x / 4) % 2 == 0 { Luma([40u8]) } else { Luma([210u8]) }
        })
    }

    #[test]
    fn otsu_splits_bimodal_histogram() {
        let img: GrayImage = ImageBuffer::from_fn(10, 10, |x, _| {
            if x < 5 { Luma([50u8]) } else { Luma([200u8]) }
        });
        let t = otsu_level(&img);
        assert!((50..200).contains(&t), "threshold {t}");
        let out = binarize(&img);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(9, 0)[0], 255);
    }

    #[test]
    fn contrast_spreads_values_around_mean() {
        let img: GrayImage = ImageBuffer::from_fn(2, 1, |x, _| {
            if x == 0 { Luma([100u8]) } else { Luma([140u8]) }
        });
        let out = adjust_contrast(&img, 1.5);
        assert_eq!(out.get_pixel(0, 0)[0], 90);
        assert_eq!(out.get_pixel(1, 0)[0], 150);
    }

    #[test]
    fn sharpness_keeps_flat_regions() {
        let img = solid_gray(6, 6, 128);
        let out = adjust_sharpness(&img, 2.0);
        assert!(out.pixels().all(|p| p[0] == 128));
    }

    #[test]
    fn sharpness_boosts_isolated_pixel() {
        let mut img = solid_gray(5, 5, 100);
        img.put_pixel(2, 2, Luma([200]));
        let out = adjust_sharpness(&img, 2.0);
        assert!(out.get_pixel(2, 2)[0] > 200);
    }

    #[test]
    fn low_resolution_is_upsampled_to_target() {
        let out = preprocessor().enhance(&page(stripes(10, 10), Some(100)));
        assert_eq!(out.dpi, 300);
        assert_eq!((out.image.width(), out.image.height()), (30, 30));
    }

    #[test]
    fn unknown_resolution_assumes_72_dpi() {
        let out = preprocessor().enhance(&page(stripes(72, 36), None));
        assert_eq!(out.dpi, 300);
        assert_eq!((out.image.width(), out.image.height()), (300, 150));
    }

    #[test]
    fn resolution_in_window_is_untouched() {
        let out = preprocessor().enhance(&page(stripes(20, 20), Some(300)));
        assert_eq!(out.dpi, 300);
        assert_eq!(out.image.width(), 20);

        let out = preprocessor().enhance(&page(stripes(20, 20), Some(150)));
        assert_eq!(out.dpi, 150);
        assert_eq!(out.image.width(), 20);
    }

    #[test]
    fn high_resolution_is_downsampled() {
        let out = preprocessor().enhance(&page(stripes(40, 40), Some(1200)));
        assert_eq!(out.dpi, 300);
        assert_eq!(out.image.width(), 10);
    }

    #[test]
    fn max_dimension_caps_upsampling() {
        let settings = PreprocessSettings { max_dimension: 50, ..Default::default() };
        let out = ImagePreprocessor::new(settings).enhance(&page(stripes(100, 20), Some(100)));
        assert_eq!(out.image.width(), 50);
        assert_eq!(out.image.height(), 10);
        assert_eq!(out.dpi, 50);
    }

    #[test]
    fn output_is_binary_grayscale() {
        let rgb: RgbImage = ImageBuffer::from_fn(24, 24, |x, y| {
            if (x + y) % 5 == 0 { Rgb([20, 30, 40]) } else { Rgb([230, 220, 210]) }
        });
        let raw = RawPage::new(DynamicImage::ImageRgb8(rgb), Some(300));
        let out = preprocessor().enhance(&raw);
        let gray = out.image.as_luma8().expect("single channel output");
        assert!(gray.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn empty_image_passes_through() {
        let out = preprocessor().enhance(&page(GrayImage::new(0, 0), None));
        assert_eq!(out.image.width(), 0);
        assert_eq!(out.dpi, 72);
    }

    #[test]
    fn encode_produces_png_header() {
        let bytes = encode_as_png(&DynamicImage::ImageLuma8(solid_gray(4, 4, 100))).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }
}
