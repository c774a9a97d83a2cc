//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides crop, size and quality) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality in `[0, 1]`. Clamped on construction.
//! - [`AspectRatio`]: Fixed width:height ratio for a crop context (16:9 banners, 1:1 profiles).
//! - [`CropGeometry`]: Crop rectangle in source-pixel space.
//! - [`EncodingBudget`]: Byte budget and quality ladder for the size-constrained encoder.
//! - [`OutputFormat`]: Encoded output format (lossless PNG or lossy JPEG).
//! - [`RasterParams`]: Full specification for a composite: optional crop + target dimensions.
//! - [`EncodeParams`]: Full specification for one encode attempt: format + quality.

use serde::{Deserialize, Serialize};

use super::backend::{BackendError, Dimensions};

/// Quality setting for lossy image encoding, continuous in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quality(f32);

impl Quality {
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Map onto the 1–100 scale used by the JPEG encoder.
    pub fn to_percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.8)
    }
}

/// Fixed aspect ratio for a crop context, as `width:height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height.
    pub fn ratio(self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl From<[u32; 2]> for AspectRatio {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

/// Crop rectangle in source-image pixel coordinates.
///
/// `aspect` records the ratio the rectangle was constrained to, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropGeometry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub aspect: Option<AspectRatio>,
}

impl CropGeometry {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            aspect: None,
        }
    }

    pub fn with_aspect(mut self, aspect: Option<AspectRatio>) -> Self {
        self.aspect = aspect;
        self
    }

    /// True when the rectangle is non-empty and lies inside `source`.
    pub fn fits_within(&self, source: Dimensions) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= source.width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= source.height)
    }

    pub fn validate(&self, source: Dimensions) -> Result<(), BackendError> {
        if self.fits_within(source) {
            return Ok(());
        }
        Err(BackendError::InvalidGeometry(format!(
            "crop {}x{} at ({}, {}) exceeds source {}x{}",
            self.width, self.height, self.x, self.y, source.width, source.height
        )))
    }
}

/// Smallest quality step the encoder distinguishes; ladder qualities are
/// rounded to this resolution.
pub const MIN_QUALITY_STEP: f32 = 0.001;

/// Stopping policy for the size-constrained encoder.
///
/// The encoder walks the quality ladder `initial_quality, initial_quality -
/// quality_step, …` down to `min_quality` and keeps the first encode whose
/// size is `<= max_bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingBudget {
    /// Maximum encoded size in bytes (inclusive).
    pub max_bytes: usize,
    /// Longest side of the rasterized output, in pixels.
    pub max_dimension: u32,
    /// First quality tried.
    pub initial_quality: f32,
    /// Decrement between attempts.
    pub quality_step: f32,
    /// Lowest quality tried before giving up.
    pub min_quality: f32,
}

impl Default for EncodingBudget {
    fn default() -> Self {
        Self {
            max_bytes: 512_000,
            max_dimension: 1920,
            initial_quality: 0.8,
            quality_step: 0.1,
            min_quality: 0.1,
        }
    }
}

impl EncodingBudget {
    /// Check `0 < min_quality <= initial_quality <= 1` and
/// `quality_step >= MIN_QUALITY_STEP`.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_bytes == 0 {
            return Err("encoding.max_bytes must be positive".into());
        }
        if self.max_dimension == 0 {
            return Err("encoding.max_dimension must be positive".into());
        }
        if !(self.min_quality > 0.0
            && self.min_quality <= self.initial_quality
            && self.initial_quality <= 1.0)
        {
            return Err(format!(
                "encoding qualities must satisfy 0 < min_quality ({}) <= initial_quality ({}) <= 1",
                self.min_quality, self.initial_quality
            ));
        }
        if self.quality_step.is_nan() || self.quality_step < MIN_QUALITY_STEP {
            return Err(format!(
                "encoding.quality_step must be at least {MIN_QUALITY_STEP}, got {}",
                self.quality_step
            ));
        }
        Ok(())
    }
}

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    /// Lossless formats ignore the quality parameter.
    pub fn is_lossless(self) -> bool {
        matches!(self, OutputFormat::Png)
    }
}

/// Parameters for a composite: crop the source (optionally) and resample to
/// exactly `width × height`.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterParams {
    pub crop: Option<CropGeometry>,
    pub width: u32,
    pub height: u32,
}

/// Parameters for a single encode attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeParams {
    pub format: OutputFormat,
    pub quality: Quality,
}
