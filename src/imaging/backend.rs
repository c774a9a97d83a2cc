//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three pixel operations the pipeline
//! needs: decode, composite (crop + resample in one pass), and encode.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, built on the
//! `image` crate. Each backend picks its own raster representation through the
//! [`ImageBackend::Raster`] associated type, so a mock can stand in with plain
//! dimensions and no pixels.

use super::params::{EncodeParams, RasterParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Invalid crop geometry: {0}")]
    InvalidGeometry(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of an image or raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// Every backend must implement decode, composite and encode so the rest of
/// the codebase is backend-agnostic.
pub trait ImageBackend {
    /// Decoded, in-memory bitmap.
    type Raster;

    /// Decode encoded bytes (JPEG, PNG, GIF, WebP) into a raster.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Raster, BackendError>;

    /// Natural size of a raster.
    fn dimensions(&self, raster: &Self::Raster) -> Dimensions;

    /// Crop (optionally) and resample to exactly `params.width × params.height`.
    fn composite(
        &self,
        source: &Self::Raster,
        params: &RasterParams,
    ) -> Result<Self::Raster, BackendError>;

    /// Encode a raster once at the given format and quality.
    fn encode(&self, raster: &Self::Raster, params: &EncodeParams)
    -> Result<Vec<u8>, BackendError>;
}
