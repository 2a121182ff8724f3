//! Output format selection.
//!
//! Resized images keep their source format where an encoder is compiled in.
//! Formats we can decode but not sensibly re-encode fall back to PNG.
//!
//! | Source | Output | Alpha |
//! |---|---|---|
//! | PNG | PNG | yes |
//! | JPEG | JPEG (quality from config) | no |
//! | WebP | WebP (lossless) | yes |
//! | TIFF | TIFF | yes |
//! | GIF, BMP | PNG | yes |

use image::ImageFormat;

/// Encoders the backend can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Png,
    Jpeg,
    WebP,
    Tiff,
}

impl OutputFormat {
    /// Pick the output format for a detected source format.
    pub fn for_source(source: ImageFormat) -> Self {
        match source {
            ImageFormat::Jpeg => OutputFormat::Jpeg,
            ImageFormat::WebP => OutputFormat::WebP,
            ImageFormat::Tiff => OutputFormat::Tiff,
            _ => OutputFormat::Png,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Tiff => "image/tiff",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
        }
    }

    /// Whether transparent letterbox padding survives encoding.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, OutputFormat::Jpeg)
    }

    pub(crate) fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::WebP => ImageFormat::WebP,
            OutputFormat::Tiff => ImageFormat::Tiff,
        }
    }
}

/// Source formats with decoders compiled in.
const DECODABLE: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Tiff,
    ImageFormat::Gif,
    ImageFormat::Bmp,
];

/// Returns true if `format` has a working decoder in this build.
pub fn is_decodable(format: ImageFormat) -> bool {
    DECODABLE.contains(&format) && format.reading_enabled()
}
