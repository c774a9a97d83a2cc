//! # unit-media
//!
//! The image pipeline behind a unit/committee management app: member photos,
//! program and journey galleries, homepage slides. Every image goes through
//! the same path, whether it was uploaded or picked from the predefined
//! avatars:
//!
//! ```text
//! 1. Resolve    upload / file / avatar URL  →  ResolvedSource (+ preview handle)
//! 2. Crop       displayed bitmap            →  CropGeometry in source pixels
//! 3. Rasterize  source + geometry           →  raster, longest side ≤ max_dimension
//! 4. Encode     raster                      →  bytes ≤ max_bytes (quality ladder)
//! 5. Curate     encoded image               →  GalleryWorkingSet (add / remove / re-crop)
//! 6. Submit     working set                 →  one multipart request (new, keep, delete)
//! ```
//!
//! Nothing is persisted until step 6, and step 6 is a single request: a failed
//! edit can lose unsaved work, never corrupt a stored gallery.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | Normalizes uploads, local files and remote avatars into one `ResolvedSource` |
//! | [`preview`] | Scoped preview handles, released on drop |
//! | [`cropper`] | Crop selection state machine; display → source coordinate conversion |
//! | [`imaging`] | Pixel work: geometry math, the backend trait, rasterize and size-constrained encode |
//! | [`gallery`] | Working set of existing/new images and submit-time reconciliation |
//! | [`session`] | Wires the stages together for one edit session; error classification |
//! | [`submission`] | Multipart form model and the reqwest-backed API client |
//! | [`capabilities`] | Notifier and busy-indicator traits injected into a session |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Typed Assets
//!
//! An [`gallery::ImageAsset`] is either `Existing` (server identity) or `New`
//! (encoded payload). There is no state with both or neither, so re-cropping
//! an existing image is an explicit conversion: the identity goes to the
//! deletion set and the asset becomes `New`.
//!
//! ## Bounded Quality Ladder
//!
//! The encoder's attempt count is fixed up front from
//! `(initial_quality - min_quality) / quality_step`, computed on integer step
//! indices. There is no open-ended retry loop and no float drift below the
//! minimum.
//!
//! ## Injected Capabilities
//!
//! Notifications, the busy flag and the API are trait objects handed to the
//! session. Tests swap in recording fakes; the CLI routes them to `tracing`.

pub mod capabilities;
pub mod config;
pub mod cropper;
pub mod gallery;
pub mod imaging;
pub mod output;
pub mod preview;
pub mod session;
pub mod source;
pub mod submission;

#[cfg(test)]
pub(crate) mod test_helpers;
