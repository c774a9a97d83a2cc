//! Edit session orchestration.
//!
//! An [`EditSession`] owns one gallery working set and drives every image
//! through the pipeline:
//!
//! ```text
//! ImageInput ──resolve──▶ ResolvedSource ──decode──▶ PendingImage
//!                                                      │ cropper input
//!                                                      ▼
//!        GalleryWorkingSet ◀──add/replace── encode_to_budget ◀── rasterize
//!                 │
//!                 └──reconcile──▶ SubmissionForm ──▶ SubmissionApi
//! ```
//!
//! Every mutator takes `&mut self`, so there is never more than one change in
//! flight. A [`PendingImage`] is the open crop dialog: dropping it cancels,
//! releasing its preview without touching the working set. Errors are sent
//! to the notifier before being returned.

use crate::capabilities::{BusyGuard, Capabilities, NoticeKind};
use crate::config::{ConfigError, PipelineConfig};
use crate::cropper::{CropError, Cropper};
use crate::gallery::{GalleryError, GalleryWorkingSet, ImageAsset, NewImage, Reconciliation};
use crate::imaging::{
    BackendError, Dimensions, EncodeError, EncodeOutcome, ImageBackend, encode_to_budget,
    rasterize,
};
use crate::preview::PreviewStore;
use crate::source::{ImageInput, RemoteFetcher, ResolvedSource, SourceError, resolve};
use crate::submission::{SubmissionForm, SubmitError, SubmitOutcome, SubmitTarget};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Coarse error taxonomy shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input; nothing changed.
    Validation,
    /// Image could not be decoded or fetched; not added.
    Load,
    /// Encoder could not meet the byte budget; not added.
    TooLarge,
    /// Submission failed; working set kept for retry.
    Network,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("image failed to load: {0}")]
    Load(BackendError),
    #[error(transparent)]
    Crop(#[from] CropError),
    #[error("could not render image: {0}")]
    Raster(BackendError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("gallery changed since image {index} was opened for re-cropping")]
    Stale { index: usize },
    #[error("submission failed: {0}")]
    Submit(#[from] SubmitError),
}

impl SessionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SessionError::Source(SourceError::NotAnImage { .. }) => ErrorClass::Validation,
            SessionError::Source(_) | SessionError::Load(_) | SessionError::Crop(_) => {
                ErrorClass::Load
            }
            SessionError::Raster(BackendError::InvalidGeometry(_))
            | SessionError::Encode(EncodeError::Backend(BackendError::InvalidGeometry(_))) => {
                ErrorClass::Validation
            }
            SessionError::Raster(_) | SessionError::Encode(EncodeError::Backend(_)) => {
                ErrorClass::Load
            }
            SessionError::Encode(EncodeError::TooLarge { .. }) => ErrorClass::TooLarge,
            SessionError::Gallery(_) | SessionError::Config(_) | SessionError::Stale { .. } => {
                ErrorClass::Validation
            }
            SessionError::Submit(_) => ErrorClass::Network,
        }
    }
}

/// The stateless parts of the pipeline: pixel backend, settings, fetcher.
pub struct Pipeline<'a, B> {
    pub backend: &'a B,
    pub config: &'a PipelineConfig,
    pub fetcher: &'a dyn RemoteFetcher,
}

impl<B> Clone for Pipeline<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for Pipeline<'_, B> {}

impl<'a, B: ImageBackend> Pipeline<'a, B> {
    pub fn new(backend: &'a B, config: &'a PipelineConfig, fetcher: &'a dyn RemoteFetcher) -> Self {
        Self {
            backend,
            config,
            fetcher,
        }
    }

    /// Resolve and decode an input, ready for cropping.
    ///
    /// `context` names a crop context from `[crop.aspect_ratios]`; `None`
    /// crops freely.
    pub fn open(
        &self,
        input: ImageInput,
        context: Option<&str>,
        previews: &PreviewStore,
    ) -> Result<PendingImage<B::Raster>, SessionError> {
        let aspect = self.config.crop.aspect_for(context)?;
        let source = resolve(input, self.fetcher, previews)?;
        let raster = self
            .backend
            .decode(&source.bytes)
            .map_err(SessionError::Load)?;
        let natural = self.backend.dimensions(&raster);
        debug!(name = %source.name, width = natural.width, height = natural.height, "opened image");

        let cropper =
            Cropper::new(natural, aspect).with_seed_fraction(self.config.crop.default_fraction);
        Ok(PendingImage {
            source,
            raster,
            cropper,
            replaces: None,
        })
    }

    /// Confirm the crop, rasterize and encode to budget.
    pub fn render(&self, pending: &mut PendingImage<B::Raster>) -> Result<EncodeOutcome, SessionError> {
        let geometry = pending.cropper.confirm()?;
        let budget = &self.config.encoding;
        let raster = rasterize(
            self.backend,
            &pending.raster,
            geometry.as_ref(),
            budget.max_dimension,
        )
        .map_err(SessionError::Raster)?;
        let outcome = encode_to_budget(self.backend, &raster, pending.source.output_format(), budget)?;
        debug!(
            name = %pending.source.name,
            bytes = outcome.image.len(),
            attempts = outcome.attempts.len(),
            "encoded image"
        );
        Ok(outcome)
    }
}

/// Position and gallery revision a re-crop was opened against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    index: usize,
    revision: u64,
    /// Size of the file originally added, kept so the duplicate key
    /// survives re-cropping a new image from its payload.
    source_len: Option<usize>,
}

/// A decoded image waiting for its crop to be confirmed.
pub struct PendingImage<R> {
    pub source: ResolvedSource,
    raster: R,
    pub cropper: Cropper,
    replaces: Option<Slot>,
}

impl<R> PendingImage<R> {
    pub fn natural(&self) -> Dimensions {
        self.cropper.natural()
    }

    /// Gallery position this image will replace, if it is a re-crop.
    pub fn replaces(&self) -> Option<usize> {
        self.replaces.map(|slot| slot.index)
    }
}

impl<R> fmt::Debug for PendingImage<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingImage")
            .field("source", &self.source.name)
            .field("cropper", &self.cropper)
            .field("replaces", &self.replaces)
            .finish()
    }
}

/// One user's edit of one gallery.
pub struct EditSession<'a, B: ImageBackend> {
    pipeline: Pipeline<'a, B>,
    caps: Capabilities<'a>,
    previews: PreviewStore,
    gallery: GalleryWorkingSet,
}

impl<B: ImageBackend> fmt::Debug for EditSession<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSession")
            .field("gallery", &self.gallery)
            .field("previews", &self.previews)
            .finish()
    }
}

impl<'a, B: ImageBackend> EditSession<'a, B> {
    /// Session for a new entity with an empty gallery.
    pub fn new(pipeline: Pipeline<'a, B>, caps: Capabilities<'a>) -> Self {
        let gallery = GalleryWorkingSet::new(pipeline.config.gallery);
        Self {
            pipeline,
            caps,
            previews: PreviewStore::new(),
            gallery,
        }
    }

    /// Session for an entity whose gallery already holds `identities`.
    pub fn with_existing<I>(pipeline: Pipeline<'a, B>, caps: Capabilities<'a>, identities: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let api = &pipeline.config.api;
        let gallery = GalleryWorkingSet::from_existing(
            identities.into_iter().map(|id| {
                let url = api.identity_url(&id);
                (id, url)
            }),
            pipeline.config.gallery,
        );
        Self {
            pipeline,
            caps,
            previews: PreviewStore::new(),
            gallery,
        }
    }

    pub fn assets(&self) -> &[ImageAsset] {
        self.gallery.assets()
    }

    pub fn gallery(&self) -> &GalleryWorkingSet {
        &self.gallery
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    pub fn reconciliation(&self) -> Reconciliation {
        self.gallery.reconcile_for_submit()
    }

    fn report(&self, err: SessionError) -> SessionError {
        let kind = match err.class() {
            ErrorClass::Validation => NoticeKind::Warning,
            ErrorClass::Load | ErrorClass::TooLarge | ErrorClass::Network => NoticeKind::Error,
        };
        self.caps.notifier.notify(kind, &err.to_string());
        err
    }

    /// Open a new image for cropping. Fails early when the gallery is full.
    pub fn open(
        &self,
        input: ImageInput,
        context: Option<&str>,
    ) -> Result<PendingImage<B::Raster>, SessionError> {
        self.open_inner(input, context)
            .map_err(|err| self.report(err))
    }

    fn open_inner(
        &self,
        input: ImageInput,
        context: Option<&str>,
    ) -> Result<PendingImage<B::Raster>, SessionError> {
        self.gallery.check_can_add()?;
        let _busy = BusyGuard::raise(self.caps.busy);
        self.pipeline.open(input, context, &self.previews)
    }

    /// Open the asset at `index` for re-cropping.
    ///
    /// Existing assets are fetched from their identity URL; new ones are
    /// reopened from their encoded payload.
    pub fn open_recrop(
        &self,
        index: usize,
        context: Option<&str>,
    ) -> Result<PendingImage<B::Raster>, SessionError> {
        self.open_recrop_inner(index, context)
            .map_err(|err| self.report(err))
    }

    fn open_recrop_inner(
        &self,
        index: usize,
        context: Option<&str>,
    ) -> Result<PendingImage<B::Raster>, SessionError> {
        let (input, source_len) = match self.gallery.get(index) {
            Some(ImageAsset::Existing { identity, .. }) => (
                ImageInput::Remote {
                    url: self.pipeline.config.api.identity_url(identity),
                },
                None,
            ),
            Some(ImageAsset::New(image)) => (
                ImageInput::Upload {
                    name: image.name.clone(),
                    mime: image.payload.mime().to_string(),
                    bytes: image.payload.bytes.clone(),
                },
                Some(image.source_len),
            ),
            None => {
                return Err(GalleryError::IndexOutOfRange {
                    index,
                    len: self.gallery.len(),
                }
                .into());
            }
        };

        let _busy = BusyGuard::raise(self.caps.busy);
        let mut pending = self.pipeline.open(input, context, &self.previews)?;
        pending.replaces = Some(Slot {
            index,
            revision: self.gallery.revision(),
            source_len,
        });
        Ok(pending)
    }

    /// Encode a pending image and put it in the gallery, either appended or
    /// in place of the asset it was re-cropped from.
    ///
    /// On error the working set is unchanged.
    pub fn commit(&mut self, pending: PendingImage<B::Raster>) -> Result<(), SessionError> {
        let result = self.commit_inner(pending);
        result.map_err(|err| self.report(err))
    }

    fn commit_inner(&mut self, mut pending: PendingImage<B::Raster>) -> Result<(), SessionError> {
        match pending.replaces {
            Some(slot) if slot.revision != self.gallery.revision() => {
                return Err(SessionError::Stale { index: slot.index });
            }
            Some(_) => {}
            None => self.gallery.check_can_add()?,
        }

        let outcome = {
            let _busy = BusyGuard::raise(self.caps.busy);
            self.pipeline.render(&mut pending)?
        };

        let payload = outcome.image;
        let preview = self.previews.allocate(Arc::from(payload.bytes.as_slice()));
        let source_len = pending
            .replaces
            .and_then(|slot| slot.source_len)
            .unwrap_or_else(|| pending.source.len());
        let image = NewImage {
            name: pending.source.name.clone(),
            source_len,
            payload,
            preview,
        };
        let name = image.name.clone();

        match pending.replaces {
            Some(slot) => self.gallery.replace_via_crop(slot.index, image)?,
            None => self.gallery.add_new(image)?,
        }
        info!(%name, images = self.gallery.len(), "image committed");
        self.caps
            .notifier
            .notify(NoticeKind::Success, &format!("{name} added"));
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<(), SessionError> {
        let result = self.gallery.remove(index).map_err(SessionError::from);
        result.map_err(|err| self.report(err))
    }

    /// Validate and send the working set.
    ///
    /// Success ends the session. On failure the session comes back untouched
    /// inside [`SubmitFailure`] so the user can retry without redoing any
    /// crop or compression work.
    pub fn submit(
        self,
        target: SubmitTarget,
        fields: Vec<(String, String)>,
    ) -> Result<SubmitOutcome, SubmitFailure<'a, B>> {
        if let Err(err) = self.gallery.validate_for_submit() {
            let error = self.report(err.into());
            return Err(SubmitFailure {
                session: self,
                error,
            });
        }

        let form = SubmissionForm::new(target, fields, self.gallery.reconcile_for_submit());
        let caps = self.caps;
        let result = {
            let _busy = BusyGuard::raise(caps.busy);
            caps.api.submit(&form)
        };

        match result {
            Ok(outcome) => {
                let message = match outcome {
                    SubmitOutcome::Created => "created",
                    SubmitOutcome::Updated => "updated",
                };
                info!(?outcome, "gallery submitted");
                caps.notifier
                    .notify(NoticeKind::Success, &format!("Gallery {message}"));
                Ok(outcome)
            }
            Err(err) => {
                let error = self.report(err.into());
                Err(SubmitFailure {
                    session: self,
                    error,
                })
            }
        }
    }
}

/// A failed submission, carrying the session back for a retry.
pub struct SubmitFailure<'a, B: ImageBackend> {
    pub session: EditSession<'a, B>,
    pub error: SessionError,
}

impl<B: ImageBackend> fmt::Debug for SubmitFailure<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitFailure")
            .field("error", &self.error)
            .field("session", &self.session)
            .finish()
    }
}

impl<B: ImageBackend> fmt::Display for SubmitFailure<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl<B: ImageBackend> std::error::Error for SubmitFailure<'_, B> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
