//! Image source resolution.
//!
//! Normalizes the ways an image enters the pipeline (an upload with a
//! declared MIME type, a local file, a predefined avatar or persisted image
//! URL) into one [`ResolvedSource`]: bytes, MIME type, display name and
//! a [`PreviewHandle`]. Remote images are fetched and then handled exactly
//! like uploads, so avatars and uploads produce structurally identical
//! gallery assets.
//!
//! Non-image inputs are rejected before anything is allocated.

use crate::imaging::{OutputFormat, supported_input_mimes};
use crate::preview::{PreviewHandle, PreviewStore};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{name} is not an image ({mime})")]
    NotAnImage { name: String, mime: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
}

/// One way of supplying an image.
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// User-selected file with its declared MIME type.
    Upload {
        name: String,
        mime: String,
        bytes: Vec<u8>,
    },
    /// Local file; MIME type sniffed from content.
    File(PathBuf),
    /// Predefined avatar or persisted image, fetched over HTTP.
    Remote { url: String },
}

/// Raw response of a remote fetch.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Fetches remote image bytes (avatars, persisted gallery images).
pub trait RemoteFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedImage, SourceError>;
}

/// [`RemoteFetcher`] over a blocking `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("unit-media/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Fetch {
                url: String::new(),
                reason: format!("HTTP client error: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedImage, SourceError> {
        let fetch_err = |reason: String| SourceError::Fetch {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}")));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().map_err(|e| fetch_err(e.to_string()))?;
        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// A decodable image source plus its preview handle.
#[derive(Debug)]
pub struct ResolvedSource {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
    pub preview: PreviewHandle,
}

impl ResolvedSource {
    /// PNG and GIF sources keep a lossless output; everything else is JPEG.
    pub fn output_format(&self) -> OutputFormat {
        match self.mime.as_str() {
            "image/png" | "image/gif" => OutputFormat::Png,
            _ => OutputFormat::Jpeg,
        }
    }

    /// Size of the original input in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Lowercased MIME essence: `"Image/PNG; q=1"` → `"image/png"`.
///
/// Legacy JPEG aliases are folded into `image/jpeg`.
fn mime_essence(mime: &str) -> String {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => essence,
    }
}

/// Image types the pipeline can decode. Other `image/*` types (SVG, TIFF,
/// HEIC, ...) are rejected like any non-image.
fn is_image_mime(mime: &str) -> bool {
    supported_input_mimes().iter().any(|supported| *supported == mime)
}

fn sniffed_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}

/// Last path segment of a URL, without query or fragment.
fn name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|s| !s.is_empty())
        .filter(|s| !s.contains(':'))
        .unwrap_or("avatar")
        .to_string()
}

fn resolve_file(path: &Path) -> Result<(String, String, Vec<u8>), SourceError> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime = sniffed_mime(&bytes)
        .or_else(|| ImageFormat::from_path(path).ok().map(|f| f.to_mime_type()))
        .unwrap_or("application/octet-stream")
        .to_string();
    Ok((name, mime, bytes))
}

fn resolve_remote(
    url: &str,
    fetcher: &dyn RemoteFetcher,
) -> Result<(String, String, Vec<u8>), SourceError> {
    let fetched = fetcher.fetch(url)?;
    let declared = fetched.content_type.as_deref().map(mime_essence);
    let mime = match declared {
        Some(m) if is_image_mime(&m) => m,
        // Servers often label static images generically; trust the bytes
        Some(m) if m != "application/octet-stream" && m != "binary/octet-stream" => m,
        _ => sniffed_mime(&fetched.bytes)
            .unwrap_or("application/octet-stream")
            .to_string(),
    };
    Ok((name_from_url(url), mime, fetched.bytes))
}

/// Resolve an input into a [`ResolvedSource`], allocating its preview.
///
/// Returns [`SourceError::NotAnImage`] without allocating anything when the
/// input's MIME type is not a decodable image type.
pub fn resolve(
    input: ImageInput,
    fetcher: &dyn RemoteFetcher,
    previews: &PreviewStore,
) -> Result<ResolvedSource, SourceError> {
    let (name, mime, bytes) = match input {
        ImageInput::Upload { name, mime, bytes } => (name, mime_essence(&mime), bytes),
        ImageInput::File(path) => resolve_file(&path)?,
        ImageInput::Remote { url } => resolve_remote(&url, fetcher)?,
    };

    if !is_image_mime(&mime) {
        return Err(SourceError::NotAnImage { name, mime });
    }

    debug!(%name, %mime, bytes = bytes.len(), "resolved image source");
    let bytes: Arc<[u8]> = Arc::from(bytes);
    let preview = previews.allocate(Arc::clone(&bytes));
    Ok(ResolvedSource {
        name,
        mime,
        bytes,
        preview,
    })
}
