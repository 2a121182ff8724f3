//! Shared test utilities for the bulk-resize test suite.
//!
//! Provides in-memory image fixtures (no files on disk) and a polling
//! helper for waiting on background tasks.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let src = png_bytes(200, 100, [255, 0, 0]);
//! let img = decode(&src);
//! assert_eq!(img.width(), 200);
//! ```

use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::time::{Duration, Instant};

use crate::task::{ProgressSnapshot, TaskId, TaskManager, TaskStatus};

// =========================================================================
// Image fixtures
// =========================================================================

fn encode(img: DynamicImage, format: ImageFormat) -> Bytes {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    Bytes::from(buf.into_inner())
}

/// A solid-color opaque RGB PNG.
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Bytes {
    let img = RgbImage::from_pixel(width, height, Rgb(rgb));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

/// A solid-color RGBA PNG.
pub fn png_rgba_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Bytes {
    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

/// An RGB PNG of pseudo-random pixels, so its image data barely compresses.
pub fn noisy_png_bytes(width: u32, height: u32) -> Bytes {
    let mut state: u32 = 0x2545_f491;
    let img = RgbImage::from_fn(width, height, |_, _| {
        let mut channel = || {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        };
        Rgb([channel(), channel(), channel()])
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

/// A solid-color JPEG.
pub fn jpeg_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Bytes {
    let img = RgbImage::from_pixel(width, height, Rgb(rgb));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

/// Decode any supported image. Panics on failure.
pub fn decode(bytes: &[u8]) -> DynamicImage {
    image::load_from_memory(bytes).unwrap_or_else(|e| panic!("output is not an image: {e}"))
}

// =========================================================================
// Task polling
// =========================================================================

/// Poll until `pred` holds for the task's snapshot. Panics after 10 seconds.
pub fn wait_for(
    manager: &TaskManager,
    task_id: &TaskId,
    pred: impl Fn(&ProgressSnapshot) -> bool,
) -> ProgressSnapshot {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let snapshot = manager.progress(task_id).unwrap();
        if pred(&snapshot) {
            return snapshot;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting on task {task_id}; last snapshot: {snapshot:?}"
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Poll until the task reaches Completed or Error.
pub fn wait_until_terminal(manager: &TaskManager, task_id: &TaskId) -> ProgressSnapshot {
    wait_for(manager, task_id, |s| {
        matches!(s.status, TaskStatus::Completed | TaskStatus::Error)
    })
}
