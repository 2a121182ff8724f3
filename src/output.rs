//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Serve
//!
//! ```text
//! bulk-resize on http://0.0.0.0:8000/api
//!     Uploads: up to 100 files, 50.0 MB each
//!     Workers: 8
//!     Retention: 3600s
//! ```
//!
//! ## Resize
//!
//! ```text
//! Resizing 3 images to 800x600 (fill #ff0000)
//!     001 cat.png
//!     002 dog.jpg
//!     003 bird.webp
//! processing  33% (1/3)
//! processing  67% (2/3)
//! completed  100% (3/3)
//! Wrote out/resized_images.zip (48.2 KB)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns lines) for testability
//! and, where it is printed in one go, a `print_*` wrapper that writes to
//! stdout. Format functions are pure.

use crate::config::{Config, effective_threads};
use crate::imaging::{HexColor, ResizeMode};
use crate::task::{Artifact, ProgressSnapshot};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count with one decimal (B, KB, MB, GB; powers of 1024).
fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

// ============================================================================
// Serve
// ============================================================================

pub fn format_serve_summary(config: &Config) -> Vec<String> {
    vec![
        format!(
            "bulk-resize on http://{}:{}/api",
            config.server.host, config.server.port
        ),
        format!(
            "    Uploads: up to {} files, {} each",
            config.uploads.max_files,
            format_size(config.uploads.max_file_size)
        ),
        format!("    Workers: {}", effective_threads(&config.processing)),
        format!("    Retention: {}s", config.tasks.retention_secs),
    ]
}

pub fn print_serve_summary(config: &Config) {
    for line in format_serve_summary(config) {
        println!("{}", line);
    }
}

// ============================================================================
// Resize
// ============================================================================

/// Header plus one indexed line per input file.
pub fn format_resize_plan(
    filenames: &[String],
    width: u32,
    height: u32,
    mode: ResizeMode,
    fill_color: Option<HexColor>,
) -> Vec<String> {
    let noun = if filenames.len() == 1 { "image" } else { "images" };
    let mode_desc = match mode {
        ResizeMode::Fill => format!("fill {}", fill_color.unwrap_or_default()),
        other => other.to_string(),
    };

    let mut lines = vec![format!(
        "Resizing {} {} to {}x{} ({})",
        filenames.len(),
        noun,
        width,
        height,
        mode_desc
    )];
    lines.extend(
        filenames
            .iter()
            .enumerate()
            .map(|(i, name)| format!("    {} {}", format_index(i + 1), name)),
    );
    lines
}

pub fn print_resize_plan(
    filenames: &[String],
    width: u32,
    height: u32,
    mode: ResizeMode,
    fill_color: Option<HexColor>,
) {
    for line in format_resize_plan(filenames, width, height, mode, fill_color) {
        println!("{}", line);
    }
}

/// One progress line, e.g. `processing  67% (2/3)`.
pub fn format_progress(snapshot: &ProgressSnapshot) -> String {
    format!(
        "{:<10} {:>3}% ({}/{})",
        snapshot.status.as_str(),
        snapshot.progress,
        snapshot.completed,
        snapshot.total
    )
}

/// Final line for a task that ended in Error.
pub fn format_failure(snapshot: &ProgressSnapshot) -> String {
    format!(
        "Failed after {}/{} images: {}",
        snapshot.completed,
        snapshot.total,
        snapshot.error.as_deref().unwrap_or("unknown error")
    )
}

/// Final line after the artifact was written to `path`.
pub fn format_written(path: &Path, artifact: &Artifact) -> String {
    format!(
        "Wrote {} ({})",
        path.display(),
        format_size(artifact.bytes.len())
    )
}
