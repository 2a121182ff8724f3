//! Image processing: the resize engine.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Stretch** | `resize_exact` (Lanczos3) |
//! | **Fit / Fill** | `resize_exact` to the fitted size + centered letterbox |
//! | **Encode** | source format where possible, PNG otherwise |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and progress math (unit testable)
//! - **Parameters**: Data structures describing a resize
//! - **Formats**: Output format selection and content types
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
pub mod formats;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, EncodedImage, ImageBackend};
pub use calculations::{calculate_centered_offset, calculate_fit_dimensions, calculate_progress};
pub use formats::OutputFormat;
pub use params::{HexColor, MAX_DIMENSION, Quality, ResizeMode, ResizeParams};
pub use rust_backend::RustBackend;
