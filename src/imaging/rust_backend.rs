//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image::load_from_memory` (format sniffed from bytes) |
//! | Crop | `image::DynamicImage::crop_imm` |
//! | Resample | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality 1–100) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (best compression, adaptive filter) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{EncodeParams, OutputFormat, RasterParams};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::LazyLock;

/// Input formats the pipeline accepts; each must have its decoder compiled in.
const INPUT_CANDIDATES: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

static SUPPORTED_MIMES: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    INPUT_CANDIDATES
        .iter()
        .filter(|fmt| fmt.reading_enabled())
        .map(|fmt| fmt.to_mime_type())
        .collect()
});

/// MIME types of the accepted input formats with working decoders.
///
/// Anything else is rejected at resolution time, before a preview exists.
pub fn supported_input_mimes() -> &'static [&'static str] {
    &SUPPORTED_MIMES
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, BackendError> {
    // JPEG has no alpha channel; drop it before encoding
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
    Ok(out.into_inner())
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut out = Cursor::new(Vec::new());
    let encoder =
        PngEncoder::new_with_quality(&mut out, CompressionType::Best, PngFilter::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("PNG encode failed: {}", e)))?;
    Ok(out.into_inner())
}

impl ImageBackend for RustBackend {
    type Raster = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        image::load_from_memory(bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn dimensions(&self, raster: &DynamicImage) -> Dimensions {
        Dimensions::new(raster.width(), raster.height())
    }

    fn composite(
        &self,
        source: &DynamicImage,
        params: &RasterParams,
    ) -> Result<DynamicImage, BackendError> {
        if params.width == 0 || params.height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "target size {}x{} is empty",
                params.width, params.height
            )));
        }

        let region = match &params.crop {
            Some(crop) => {
                if !crop.fits_within(self.dimensions(source)) {
                    return Err(BackendError::InvalidGeometry(format!(
                        "{}x{}+{}+{} outside {}x{}",
                        crop.width,
                        crop.height,
                        crop.x,
                        crop.y,
                        source.width(),
                        source.height()
                    )));
                }
                source.crop_imm(crop.x, crop.y, crop.width, crop.height)
            }
            None => source.clone(),
        };

        if region.width() == params.width && region.height() == params.height {
            return Ok(region);
        }
        Ok(region.resize_exact(params.width, params.height, FilterType::Lanczos3))
    }

    fn encode(
        &self,
        raster: &DynamicImage,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, BackendError> {
        match params.format {
            OutputFormat::Jpeg => encode_jpeg(raster, params.quality.to_percent()),
            OutputFormat::Png => encode_png(raster),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{CropGeometry, Quality};
    use crate::test_helpers::{noisy_image, png_bytes};

    #[test]
    fn supported_mimes_match_decodable_formats() {
        let mimes = supported_input_mimes();
        for expected in &["image/jpeg", "image/png", "image/gif", "image/webp"] {
            assert!(mimes.contains(expected), "expected {expected} in supported mimes");
        }
    }

    #[test]
    fn decode_synthetic_png() {
        let bytes = png_bytes(120, 80);
        let backend = RustBackend::new();
        let raster = backend.decode(&bytes).unwrap();
        assert_eq!(backend.dimensions(&raster), Dimensions::new(120, 80));
    }

    #[test]
    fn decode_garbage_errors() {
        let backend = RustBackend::new();
        let result = backend.decode(b"definitely not an image");
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn composite_crops_and_resizes_in_one_pass() {
        let backend = RustBackend::new();
        let source = noisy_image(400, 300);
        let out = backend
            .composite(
                &source,
                &RasterParams {
                    crop: Some(CropGeometry::new(100, 50, 200, 100)),
                    width: 100,
                    height: 50,
                },
            )
            .unwrap();
        assert_eq!((out.width(), out.height()), (100, 50));
    }

    #[test]
    fn composite_rejects_out_of_bounds_crop() {
        let backend = RustBackend::new();
        let source = noisy_image(100, 100);
        let result = backend.composite(
            &source,
            &RasterParams {
                crop: Some(CropGeometry::new(50, 50, 60, 10)),
                width: 60,
                height: 10,
            },
        );
        assert!(matches!(result, Err(BackendError::InvalidGeometry(_))));
    }

    #[test]
    fn composite_without_crop_keeps_size_when_unchanged() {
        let backend = RustBackend::new();
        let source = noisy_image(64, 48);
        let out = backend
            .composite(
                &source,
                &RasterParams {
                    crop: None,
                    width: 64,
                    height: 48,
                },
            )
            .unwrap();
        assert_eq!((out.width(), out.height()), (64, 48));
    }

    #[test]
    fn jpeg_size_shrinks_with_quality() {
        let backend = RustBackend::new();
        let raster = noisy_image(256, 256);
        let high = backend
            .encode(
                &raster,
                &EncodeParams {
                    format: OutputFormat::Jpeg,
                    quality: Quality::new(0.95),
                },
            )
            .unwrap();
        let low = backend
            .encode(
                &raster,
                &EncodeParams {
                    format: OutputFormat::Jpeg,
                    quality: Quality::new(0.2),
                },
            )
            .unwrap();
        assert!(low.len() < high.len());
        assert_eq!(image::guess_format(&low).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn png_encode_roundtrips_dimensions() {
        let backend = RustBackend::new();
        let raster = noisy_image(32, 16);
        let bytes = backend
            .encode(
                &raster,
                &EncodeParams {
                    format: OutputFormat::Png,
                    quality: Quality::new(0.1),
                },
            )
            .unwrap();
        let decoded = backend.decode(&bytes).unwrap();
        assert_eq!(backend.dimensions(&decoded), Dimensions::new(32, 16));
    }
}
