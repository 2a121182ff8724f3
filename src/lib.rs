//! # bulk-resize
//!
//! A batch image resize service. Clients upload images, ask for them to be
//! resized to one target size, poll the task until it finishes, and download
//! the result: the image itself when there is one, a zip archive otherwise.
//!
//! # Architecture: Upload → Task → Artifact
//!
//! ```text
//! POST /api/upload    bytes        →  ImageStore      (file ids)
//! POST /api/resize    file ids     →  TaskManager     (task id, work on rayon pool)
//! GET  /api/progress  task id      →  ProgressSnapshot
//! GET  /api/download  task id      →  Artifact        (image or zip)
//! ```
//!
//! The HTTP layer is a thin async shell. All state lives in two in-memory
//! maps (uploads and tasks), and all pixel work happens on a dedicated
//! worker pool behind the [`imaging::ImageBackend`] trait.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | Uploaded source images keyed by opaque file ids |
//! | [`imaging`] | The resize engine: stretch, fit, and fill on in-memory bytes |
//! | [`task`] | Request validation, task state machine, execution, packaging |
//! | [`server`] | Axum router, CORS, upload limits, expiry sweeper |
//! | [`config`] | `config.toml` loading, validation, and merging |
//! | [`naming`] | `resized_<stem>.<ext>` output names and collision suffixes |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Fail Fast
//!
//! A task stops at its first failing image. The task moves to `error`, the
//! message is visible to pollers, and no partial download is offered. Items
//! after the failure are never attempted.
//!
//! ## Fill Is Fit With a Color
//!
//! Fill mode scales and centers exactly as Fit does; only the background
//! differs. The foreground is composited with integer arithmetic so opaque
//! pixels are bit-identical between the two modes.
//!
//! ## Package Once
//!
//! The result is packaged when the last image finishes, not on download.
//! Every download of a task returns the same bytes with the same `ETag`.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, Lanczos3 resampling, and encoding use the `image` crate only,
//! so the binary carries no system image libraries.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod server;
pub mod store;
pub mod task;

#[cfg(test)]
pub(crate) mod test_helpers;
