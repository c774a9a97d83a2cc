//! High-level image operations.
//!
//! These functions combine calculations with backend execution: they take a
//! source raster plus configuration, compute parameters, and call the backend.
//!
//! - [`rasterize`]: the compositor: crop + resize to the dimension limit.
//! - [`encode_to_budget`]: the size-constrained encoder: walk the quality
//!   ladder until the output fits the byte budget.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{fit_within, quality_ladder};
use super::params::{
    CropGeometry, EncodeParams, EncodingBudget, OutputFormat, Quality, RasterParams,
};
use thiserror::Error;
use tracing::debug;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors from the size-constrained encoder.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("unable to compress image to desired size ({smallest} bytes after {attempts} attempts, limit {max_bytes})")]
    TooLarge {
        max_bytes: usize,
        attempts: usize,
        smallest: usize,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// An encoded image ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One encode attempt, kept for reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeAttempt {
    pub format: OutputFormat,
    pub quality: Quality,
    pub bytes: usize,
}

/// Successful encode plus the attempts that led to it.
#[derive(Debug, Clone)]
pub struct EncodeOutcome {
    pub image: EncodedImage,
    pub attempts: Vec<EncodeAttempt>,
}

/// Plan a composite without executing it.
///
/// With a crop, the target is the crop size fitted under `max_dimension`;
/// without one, the source's natural size fitted the same way.
pub fn plan_raster(
    source: Dimensions,
    geometry: Option<&CropGeometry>,
    max_dimension: u32,
) -> Result<RasterParams> {
    let region = match geometry {
        Some(crop) => {
            crop.validate(source)?;
            (crop.width, crop.height)
        }
        None => source.as_tuple(),
    };
    let (width, height) = fit_within(region, max_dimension);

    Ok(RasterParams {
        crop: geometry.copied(),
        width,
        height,
    })
}

/// Render the selected region (or the whole image) at the target resolution.
pub fn rasterize<B: ImageBackend>(
    backend: &B,
    source: &B::Raster,
    geometry: Option<&CropGeometry>,
    max_dimension: u32,
) -> Result<B::Raster> {
    let params = plan_raster(backend.dimensions(source), geometry, max_dimension)?;
    debug!(
        width = params.width,
        height = params.height,
        cropped = params.crop.is_some(),
        "rasterizing"
    );
    backend.composite(source, &params)
}

/// Encode `raster` so it fits `budget.max_bytes`.
///
/// Lossy output walks the quality ladder from `initial_quality` down to
/// `min_quality`. Lossless output gets one attempt (quality has no effect on
/// it) and then falls back to the JPEG ladder.
pub fn encode_to_budget<B: ImageBackend>(
    backend: &B,
    raster: &B::Raster,
    format: OutputFormat,
    budget: &EncodingBudget,
) -> std::result::Result<EncodeOutcome, EncodeError> {
    let dims = backend.dimensions(raster);
    let mut attempts = Vec::new();

    let mut try_once = |format: OutputFormat, quality: Quality| -> Result<Option<EncodedImage>> {
        let bytes = backend.encode(raster, &EncodeParams { format, quality })?;
        debug!(
            format = format.mime(),
            quality = quality.value(),
            bytes = bytes.len(),
            max_bytes = budget.max_bytes,
            "encode attempt"
        );
        attempts.push(EncodeAttempt {
            format,
            quality,
            bytes: bytes.len(),
        });
        Ok((bytes.len() <= budget.max_bytes).then(|| EncodedImage {
            bytes,
            format,
            width: dims.width,
            height: dims.height,
        }))
    };

    let mut found = None;
    if format.is_lossless() {
        found = try_once(format, Quality::new(1.0))?;
    }
    if found.is_none() {
        for quality in quality_ladder(budget) {
            if let Some(image) = try_once(OutputFormat::Jpeg, quality)? {
                found = Some(image);
                break;
            }
        }
    }

    match found {
        Some(image) => Ok(EncodeOutcome { image, attempts }),
        None => Err(EncodeError::TooLarge {
            max_bytes: budget.max_bytes,
            attempts: attempts.len(),
            smallest: attempts.iter().map(|a| a.bytes).min().unwrap_or(0),
        }),
    }
}
