//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Detect format | `image::guess_format` (magic bytes, never the filename) |
//! | Decode | `image::load_from_memory_with_format` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Letterbox (fit) | `image::imageops::replace` onto a transparent canvas |
//! | Letterbox (fill) | integer alpha compositing onto a solid canvas |
//! | Encode | `image` codecs, see [`formats`](super::formats) |

use super::backend::{BackendError, Dimensions, EncodedImage, ImageBackend};
use super::calculations::{calculate_centered_offset, calculate_fit_dimensions};
use super::formats::{OutputFormat, is_decodable};
use super::params::{HexColor, Quality, ResizeMode, ResizeParams};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    quality: Quality,
}

impl RustBackend {
    pub fn new() -> Self {
        Self::with_quality(Quality::default())
    }

    pub fn with_quality(quality: Quality) -> Self {
        Self { quality }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Identify the container format from magic bytes.
fn detect_format(source: &[u8]) -> Result<ImageFormat, BackendError> {
    let format = image::guess_format(source)
        .map_err(|e| BackendError::UnsupportedFormat(e.to_string()))?;
    if !is_decodable(format) {
        return Err(BackendError::UnsupportedFormat(format!("{format:?}")));
    }
    Ok(format)
}

fn load_image(source: &[u8], format: ImageFormat) -> Result<DynamicImage, BackendError> {
    image::load_from_memory_with_format(source, format)
        .map_err(|e| BackendError::Decode(format!("{format:?}: {e}")))
}

/// Apply the geometric transform for `params` to a decoded image.
fn transform(img: &DynamicImage, params: &ResizeParams, output: OutputFormat) -> DynamicImage {
    let target = (params.width, params.height);

    if params.mode == ResizeMode::Stretch {
        return img.resize_exact(params.width, params.height, FilterType::Lanczos3);
    }

    let (fit_w, fit_h) = calculate_fit_dimensions((img.width(), img.height()), target);
    let (x, y) = calculate_centered_offset((fit_w, fit_h), target);
    let scaled = img
        .resize_exact(fit_w, fit_h, FilterType::Lanczos3)
        .to_rgba8();

    match params.mode {
        ResizeMode::Fit if output.supports_alpha() => {
            let mut canvas = RgbaImage::from_pixel(params.width, params.height, Rgba([0, 0, 0, 0]));
            image::imageops::replace(&mut canvas, &scaled, x as i64, y as i64);
            DynamicImage::ImageRgba8(canvas)
        }
        // Formats without alpha letterbox onto their default white background
        ResizeMode::Fit => letterbox(&scaled, target, (x, y), HexColor::WHITE),
        _ => letterbox(&scaled, target, (x, y), params.background()),
    }
}

/// Composite `scaled` over a solid canvas of `color` at `offset`.
fn letterbox(
    scaled: &RgbaImage,
    canvas_size: (u32, u32),
    offset: (u32, u32),
    color: HexColor,
) -> DynamicImage {
    let mut canvas = RgbImage::from_pixel(canvas_size.0, canvas_size.1, Rgb(color.rgb()));
    for (sx, sy, px) in scaled.enumerate_pixels() {
        let (cx, cy) = (sx + offset.0, sy + offset.1);
        if cx >= canvas_size.0 || cy >= canvas_size.1 {
            continue;
        }
        let dst = canvas.get_pixel_mut(cx, cy);
        *dst = composite_over(*px, *dst);
    }
    DynamicImage::ImageRgb8(canvas)
}

/// Source-over compositing of one RGBA pixel onto an opaque RGB pixel.
///
/// Fully opaque pixels are copied unchanged.
fn composite_over(fg: Rgba<u8>, bg: Rgb<u8>) -> Rgb<u8> {
    let a = fg[3] as u32;
    if a == 255 {
        return Rgb([fg[0], fg[1], fg[2]]);
    }
    let mix = |f: u8, b: u8| ((f as u32 * a + b as u32 * (255 - a) + 127) / 255) as u8;
    Rgb([mix(fg[0], bg[0]), mix(fg[1], bg[1]), mix(fg[2], bg[2])])
}

/// Encode into `format`, normalizing the pixel layout to what the encoder accepts.
fn encode(img: DynamicImage, format: OutputFormat, quality: Quality) -> Result<Bytes, BackendError> {
    let img = match format {
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ if img.color().has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    };

    let mut buf = Cursor::new(Vec::new());
    let result = match format {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
            img.write_with_encoder(encoder)
        }
        OutputFormat::WebP => img.write_with_encoder(WebPEncoder::new_lossless(&mut buf)),
        other => img.write_to(&mut buf, other.image_format()),
    };
    result.map_err(|e| BackendError::Encode(format!("{format:?}: {e}")))?;

    Ok(Bytes::from(buf.into_inner()))
}

impl ImageBackend for RustBackend {
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError> {
        let format = detect_format(source)?;
        let img = image::ImageReader::with_format(Cursor::new(source), format);
        let (width, height) = img
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("{format:?}: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, source: &[u8], params: &ResizeParams) -> Result<EncodedImage, BackendError> {
        if params.width == 0 || params.height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "target size {}x{} has a zero dimension",
                params.width, params.height
            )));
        }

        let source_format = detect_format(source)?;
        let output = OutputFormat::for_source(source_format);
        let img = load_image(source, source_format)?;

        let resized = transform(&img, params, output);
        let (width, height) = (resized.width(), resized.height());
        let bytes = encode(resized, output, self.quality)?;

        Ok(EncodedImage {
            bytes,
            format: output,
            width,
            height,
        })
    }
}
