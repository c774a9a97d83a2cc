//! Shared test utilities for the unit-media test suite.
//!
//! Provides synthetic images and recording fakes for every collaborator the
//! pipeline talks to, so session tests can assert on notifications, busy
//! transitions and submitted forms without I/O.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Mutex;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::capabilities::{BusyIndicator, NoticeKind, Notifier};
use crate::source::{FetchedImage, RemoteFetcher, SourceError};
use crate::submission::{SubmissionApi, SubmissionForm, SubmitError, SubmitOutcome};

// =========================================================================
// Synthetic images
// =========================================================================

/// Deterministic high-entropy RGB image; compresses poorly, so JPEG size
/// tracks quality.
pub fn noisy_image(width: u32, height: u32) -> DynamicImage {
    let mut state: u32 = 0x9E37_79B9;
    let img = RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    });
    DynamicImage::ImageRgb8(img)
}

fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    noisy_image(width, height)
        .write_to(&mut buf, format)
        .unwrap();
    buf.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encoded(width, height, ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encoded(width, height, ImageFormat::Jpeg)
}

// =========================================================================
// Fakes
// =========================================================================

/// Fetcher serving canned responses; unknown URLs fail like a 404.
#[derive(Default)]
pub struct StaticFetcher {
    responses: HashMap<String, FetchedImage>,
}

impl StaticFetcher {
    pub fn with(mut self, url: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchedImage {
                bytes,
                content_type: content_type.map(str::to_string),
            },
        );
        self
    }
}

impl RemoteFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedImage, SourceError> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::Fetch {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeKind, String)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(NoticeKind, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<NoticeKind> {
        self.notices().into_iter().map(|(kind, _)| kind).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push((kind, message.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingBusy {
    transitions: Mutex<Vec<bool>>,
}

impl RecordingBusy {
    pub fn transitions(&self) -> Vec<bool> {
        self.transitions.lock().unwrap().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.transitions().last().copied().unwrap_or(false)
    }
}

impl BusyIndicator for RecordingBusy {
    fn set_busy(&self, busy: bool) {
        self.transitions.lock().unwrap().push(busy);
    }
}

/// Submission API that records forms and replays scripted outcomes.
///
/// Each scripted `None` is a network failure. Once the script runs out,
/// every call gets `fallback` (or a failure when there is none).
pub struct FakeApi {
    script: Mutex<VecDeque<Option<SubmitOutcome>>>,
    fallback: Option<SubmitOutcome>,
    submitted: Mutex<Vec<SubmissionForm>>,
}

impl FakeApi {
    pub fn accepting(outcome: SubmitOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(outcome),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_responses(responses: Vec<Option<SubmitOutcome>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            fallback: None,
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn submitted(&self) -> Vec<SubmissionForm> {
        self.submitted.lock().unwrap().clone()
    }
}

impl SubmissionApi for FakeApi {
    fn submit(&self, form: &SubmissionForm) -> Result<SubmitOutcome, SubmitError> {
        self.submitted.lock().unwrap().push(form.clone());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        next.ok_or_else(|| SubmitError::Network("connection reset".to_string()))
    }
}
