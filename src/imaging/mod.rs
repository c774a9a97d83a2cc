//! Image processing in pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` |
//! | **Composite** | `crop_imm` + `resize_exact` (Lanczos3) |
//! | **Encode** | `JpegEncoder` quality ladder, `PngEncoder` for lossless sources |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for geometry and quality-ladder math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`rasterize`] and [`encode_to_budget`], combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    attempt_count, clamp_selection, constrain_to_aspect, default_selection, display_to_source,
    fit_within, quality_ladder, scale_factors, selection_from_drag,
};
pub use operations::{
    EncodeAttempt, EncodeError, EncodeOutcome, EncodedImage, encode_to_budget, plan_raster,
    rasterize,
};
pub use params::{
    AspectRatio, CropGeometry, EncodeParams, EncodingBudget, MIN_QUALITY_STEP, OutputFormat,
    Quality, RasterParams,
};
pub use rust_backend::{RustBackend, supported_input_mimes};
