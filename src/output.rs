//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Compress
//!
//! ```text
//! photo.jpg → photo-out.jpg (1920x1440, 198.3 KB)
//!     001 jpeg q=0.80: 712.0 KB
//!     002 jpeg q=0.70: 598.1 KB
//!     003 jpeg q=0.60: 421.7 KB ✓
//! ```
//!
//! ## Submit
//!
//! ```text
//! Gallery
//! 001 uploads/a.jpg (existing)
//! 002 b.jpg (new, 2.0 KB)
//!
//! Upload
//!     b.jpg image/jpeg 2.0 KB
//! Keep
//!     uploads/a.jpg
//! Delete
//!     uploads/old.jpg
//!
//! Updated programs/42
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::gallery::{ImageAsset, Reconciliation};
use crate::imaging::{EncodeOutcome, OutputFormat};
use crate::submission::{SubmitOutcome, SubmitTarget};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Byte count in B / KB / MB (1 KB = 1024 B), one decimal above bytes.
fn human_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn format_name(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Jpeg => "jpeg",
        OutputFormat::Png => "png",
    }
}

// ============================================================================
// Compress
// ============================================================================

/// Format the result of compressing one image: a header with the output's
/// dimensions and size, then one line per encode attempt.
pub fn format_encode_outcome(input: &str, output: &str, outcome: &EncodeOutcome) -> Vec<String> {
    let image = &outcome.image;
    let mut lines = vec![format!(
        "{} \u{2192} {} ({}x{}, {})",
        input,
        output,
        image.width,
        image.height,
        human_bytes(image.len())
    )];

    let last = outcome.attempts.len().saturating_sub(1);
    for (i, attempt) in outcome.attempts.iter().enumerate() {
        let mark = if i == last { " \u{2713}" } else { "" };
        lines.push(format!(
            "{}{} {} q={:.2}: {}{}",
            indent(1),
            format_index(i + 1),
            format_name(attempt.format),
            attempt.quality.value(),
            human_bytes(attempt.bytes),
            mark
        ));
    }
    lines
}

pub fn print_encode_outcome(input: &str, output: &str, outcome: &EncodeOutcome) {
    for line in format_encode_outcome(input, output, outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Submit
// ============================================================================

/// Format the working set in display order.
pub fn format_gallery(assets: &[ImageAsset]) -> Vec<String> {
    let mut lines = vec!["Gallery".to_string()];
    for (i, asset) in assets.iter().enumerate() {
        let detail = match asset {
            ImageAsset::Existing { .. } => "existing".to_string(),
            ImageAsset::New(image) => format!("new, {}", human_bytes(image.payload.len())),
        };
        lines.push(format!("{} {} ({})", format_index(i + 1), asset.label(), detail));
    }
    lines
}

/// Format what a submission will send. Empty sections are omitted.
pub fn format_reconciliation(reconciliation: &Reconciliation) -> Vec<String> {
    let mut lines = Vec::new();

    if !reconciliation.new_files.is_empty() {
        lines.push("Upload".to_string());
        for file in &reconciliation.new_files {
            lines.push(format!(
                "{}{} {} {}",
                indent(1),
                file.name,
                file.mime,
                human_bytes(file.bytes.len())
            ));
        }
    }
    for (title, identities) in [
        ("Keep", &reconciliation.keep_identities),
        ("Delete", &reconciliation.delete_identities),
    ] {
        if identities.is_empty() {
            continue;
        }
        lines.push(title.to_string());
        lines.extend(identities.iter().map(|id| format!("{}{}", indent(1), id)));
    }
    lines
}

pub fn format_submit_outcome(outcome: SubmitOutcome, target: &SubmitTarget) -> String {
    let verb = match outcome {
        SubmitOutcome::Created => "Created",
        SubmitOutcome::Updated => "Updated",
    };
    format!("{} {}", verb, target.path())
}

/// Print the gallery and its reconciliation, separated by a blank line.
pub fn print_submission_plan(assets: &[ImageAsset], reconciliation: &Reconciliation) {
    for line in format_gallery(assets) {
        println!("{}", line);
    }
    println!();
    for line in format_reconciliation(reconciliation) {
        println!("{}", line);
    }
}

pub fn print_submit_outcome(outcome: SubmitOutcome, target: &SubmitTarget) {
    println!("{}", format_submit_outcome(outcome, target));
}
