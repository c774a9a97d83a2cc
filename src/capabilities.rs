//! Capabilities injected into an edit session.
//!
//! The pipeline never reaches for global state: user notifications and the
//! busy indicator come in as trait objects, alongside the submission API.

use crate::submission::SubmissionApi;
use std::fmt;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
    Warning,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoticeKind::Success => "success",
            NoticeKind::Error => "error",
            NoticeKind::Info => "info",
            NoticeKind::Warning => "warning",
        };
        f.write_str(s)
    }
}

/// User-visible notification sink.
pub trait Notifier {
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// Global busy/idle flag driving a loading indicator.
pub trait BusyIndicator {
    fn set_busy(&self, busy: bool);
}

/// Raises the busy flag for as long as it lives.
#[must_use = "the busy flag is lowered as soon as the guard is dropped"]
pub struct BusyGuard<'a> {
    indicator: &'a dyn BusyIndicator,
}

impl<'a> BusyGuard<'a> {
    pub fn raise(indicator: &'a dyn BusyIndicator) -> Self {
        indicator.set_busy(true);
        Self { indicator }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.indicator.set_busy(false);
    }
}

/// Everything an [`EditSession`](crate::session::EditSession) needs from the outside.
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    pub notifier: &'a dyn Notifier,
    pub busy: &'a dyn BusyIndicator,
    pub api: &'a dyn SubmissionApi,
}

/// Notifier for the CLI: routes notices to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Error => error!("{message}"),
            NoticeKind::Warning => warn!("{message}"),
            NoticeKind::Success | NoticeKind::Info => info!("{message}"),
        }
    }
}

/// Busy indicator for the CLI; there is no spinner, only a debug event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBusy;

impl BusyIndicator for TracingBusy {
    fn set_busy(&self, busy: bool) {
        debug!(busy, "busy flag");
    }
}
