//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: identify and resize. Both work on in-memory bytes, since uploads
//! never touch the filesystem.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the mocks in [`tests`] to drive the task manager without
//! decoding anything.

use super::formats::OutputFormat;
use super::params::ResizeParams;
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// An encoded resize result.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub bytes: Bytes,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Implementations must be pure with respect to their inputs: the same
/// bytes and params always produce an image of the same dimensions and
/// background policy. `Send + Sync` so one backend can be shared by every
/// worker thread.
pub trait ImageBackend: Send + Sync {
    /// Read image dimensions without resizing.
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode `source`, transform it per `params`, and re-encode.
    fn resize(&self, source: &[u8], params: &ResizeParams) -> Result<EncodedImage, BackendError>;
}
