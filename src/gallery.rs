//! Gallery working set and submit-time reconciliation.
//!
//! A [`GalleryWorkingSet`] is the in-memory state of one entity's gallery
//! (program, journey, profile) while it is being edited. Assets are either
//! [`ImageAsset::Existing`] (persisted server-side, addressed by identity) or
//! [`ImageAsset::New`] (encoded locally, pending upload). Removing or
//! re-cropping an existing asset moves its identity into the deletion set.
//!
//! Nothing here talks to the network: [`GalleryWorkingSet::reconcile_for_submit`]
//! derives the `(new files, kept identities, deleted identities)` triple that
//! the submission layer turns into a multipart request.
//!
//! ## Ordering
//!
//! The server stores new and kept images as separate lists, so the display
//! order curated here is not guaranteed to survive a round trip. New files are
//! emitted in sequence order and kept identities likewise, but their
//! interleaving is lost.

use crate::imaging::EncodedImage;
use crate::preview::PreviewHandle;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GalleryError {
    #[error("gallery is full ({max} images maximum)")]
    Full { max: usize },
    #[error("{name} is already in the gallery")]
    Duplicate { name: String },
    #[error("no image at position {index} (gallery has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("gallery needs between {min} and {max} images, has {len}")]
    SizeOutOfRange { len: usize, min: usize, max: usize },
}

/// Bounds on the number of images in a gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryLimits {
    pub min_images: usize,
    pub max_images: usize,
}

impl Default for GalleryLimits {
    fn default() -> Self {
        Self {
            min_images: 1,
            max_images: 10,
        }
    }
}

/// A locally encoded image waiting for upload.
#[derive(Debug)]
pub struct NewImage {
    /// Original file name, as picked by the user.
    pub name: String,
    /// Size of the original source in bytes; with `name`, the duplicate key.
    pub source_len: usize,
    pub payload: EncodedImage,
    pub preview: PreviewHandle,
}

impl NewImage {
    /// File name sent with the upload: original stem, encoded extension.
    pub fn upload_name(&self) -> String {
        let stem = Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("image");
        format!("{stem}.{}", self.payload.format.extension())
    }

    fn same_file(&self, other: &NewImage) -> bool {
        self.name == other.name && self.source_len == other.source_len
    }
}

#[derive(Debug)]
pub enum ImageAsset {
    Existing {
        identity: String,
        preview_url: String,
    },
    New(NewImage),
}

impl ImageAsset {
    pub fn identity(&self) -> Option<&str> {
        match self {
            ImageAsset::Existing { identity, .. } => Some(identity),
            ImageAsset::New(_) => None,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, ImageAsset::New(_))
    }

    /// Where the image can be displayed from.
    pub fn preview_url(&self) -> String {
        match self {
            ImageAsset::Existing { preview_url, .. } => preview_url.clone(),
            ImageAsset::New(image) => image.preview.url(),
        }
    }

    /// Human-readable label: identity for existing, file name for new.
    pub fn label(&self) -> &str {
        match self {
            ImageAsset::Existing { identity, .. } => identity,
            ImageAsset::New(image) => &image.name,
        }
    }
}

/// One binary part of the submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// What the API needs to bring the server's gallery in line with the working set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub new_files: Vec<NewFile>,
    pub keep_identities: Vec<String>,
    pub delete_identities: Vec<String>,
}

impl Reconciliation {
    /// True when submitting would change nothing server-side.
    pub fn is_noop(&self) -> bool {
        self.new_files.is_empty() && self.delete_identities.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct GalleryWorkingSet {
    assets: Vec<ImageAsset>,
    deletion_set: Vec<String>,
    limits: GalleryLimits,
    revision: u64,
}

impl GalleryWorkingSet {
    pub fn new(limits: GalleryLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Working set for an entity that already has persisted images, given as
    /// `(identity, preview_url)` pairs in display order.
    pub fn from_existing<I>(existing: I, limits: GalleryLimits) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let assets = existing
            .into_iter()
            .map(|(identity, preview_url)| ImageAsset::Existing {
                identity,
                preview_url,
            })
            .collect();
        Self {
            assets,
            limits,
            ..Self::default()
        }
    }

    pub fn assets(&self) -> &[ImageAsset] {
        &self.assets
    }

    pub fn get(&self, index: usize) -> Option<&ImageAsset> {
        self.assets.get(index)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn deletion_set(&self) -> &[String] {
        &self.deletion_set
    }

    pub fn limits(&self) -> GalleryLimits {
        self.limits
    }

    /// Bumped on every mutation; lets callers detect stale indices.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether one more image fits under the cap.
    pub fn check_can_add(&self) -> Result<(), GalleryError> {
        if self.assets.len() >= self.limits.max_images {
            return Err(GalleryError::Full {
                max: self.limits.max_images,
            });
        }
        Ok(())
    }

    /// Append a new image. On rejection the set is unchanged and `image` is
    /// dropped, releasing its preview.
    pub fn add_new(&mut self, image: NewImage) -> Result<(), GalleryError> {
        self.check_can_add()?;
        let duplicate = self.assets.iter().any(|asset| match asset {
            ImageAsset::New(existing) => existing.same_file(&image),
            ImageAsset::Existing { .. } => false,
        });
        if duplicate {
            return Err(GalleryError::Duplicate { name: image.name });
        }

        debug!(name = %image.name, bytes = image.payload.len(), "gallery add");
        self.assets.push(ImageAsset::New(image));
        self.revision += 1;
        Ok(())
    }

    /// Remove the asset at `index`. Existing identities are scheduled for deletion.
    pub fn remove(&mut self, index: usize) -> Result<(), GalleryError> {
        self.check_index(index)?;
        let removed = self.assets.remove(index);
        debug!(index, asset = removed.label(), "gallery remove");
        if let ImageAsset::Existing { identity, .. } = removed {
            self.schedule_deletion(identity);
        }
        self.revision += 1;
        Ok(())
    }

    /// Swap the asset at `index` for a re-cropped version. An existing asset
    /// becomes new and its old identity is scheduled for deletion.
    pub fn replace_via_crop(&mut self, index: usize, image: NewImage) -> Result<(), GalleryError> {
        self.check_index(index)?;
        let previous = std::mem::replace(&mut self.assets[index], ImageAsset::New(image));
        debug!(index, replaced = previous.label(), "gallery replace");
        if let ImageAsset::Existing { identity, .. } = previous {
            self.schedule_deletion(identity);
        }
        self.revision += 1;
        Ok(())
    }

    /// Derive the submission triple. Pure: repeated calls without an
    /// intervening mutation return equal values.
    pub fn reconcile_for_submit(&self) -> Reconciliation {
        let mut reconciliation = Reconciliation {
            delete_identities: self.deletion_set.clone(),
            ..Reconciliation::default()
        };
        for asset in &self.assets {
            match asset {
                ImageAsset::Existing { identity, .. } => {
                    reconciliation.keep_identities.push(identity.clone())
                }
                ImageAsset::New(image) => reconciliation.new_files.push(NewFile {
                    name: image.upload_name(),
                    mime: image.payload.mime(),
                    bytes: image.payload.bytes.clone(),
                }),
            }
        }
        reconciliation
    }

    /// Size check run before submission is allowed.
    pub fn validate_for_submit(&self) -> Result<(), GalleryError> {
        let len = self.assets.len();
        let GalleryLimits {
            min_images,
            max_images,
        } = self.limits;
        if len < min_images || len > max_images {
            return Err(GalleryError::SizeOutOfRange {
                len,
                min: min_images,
                max: max_images,
            });
        }
        info!(
            images = len,
            deletions = self.deletion_set.len(),
            "gallery ready to submit"
        );
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), GalleryError> {
        if index >= self.assets.len() {
            return Err(GalleryError::IndexOutOfRange {
                index,
                len: self.assets.len(),
            });
        }
        Ok(())
    }

    fn schedule_deletion(&mut self, identity: String) {
        if !self.deletion_set.contains(&identity) {
            self.deletion_set.push(identity);
        }
    }
}
