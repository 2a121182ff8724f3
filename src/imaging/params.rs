//! Parameter types for resize operations.
//!
//! These types describe *what* to do, not *how* to do it. They are the
//! interface between the task manager (which decides what each image should
//! become) and the [`backend`](super::backend) (which does the pixel work).
//!
//! ## Types
//!
//! - [`ResizeMode`]: Stretch, Fit (transparent letterbox) or Fill (colored letterbox).
//! - [`HexColor`]: An opaque `#RRGGBB` background color.
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`ResizeParams`]: Full specification for one resize: target size, mode, resolved color.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest accepted target width or height, in pixels.
pub const MAX_DIMENSION: u32 = 10_000;

/// How the source is mapped onto the target canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Scale each axis independently to the exact target size.
    Stretch,
    /// Preserve aspect ratio, center, pad with transparency.
    Fit,
    /// Preserve aspect ratio, center, pad with a solid color.
    Fill,
}

impl ResizeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResizeMode::Stretch => "stretch",
            ResizeMode::Fit => "fit",
            ResizeMode::Fill => "fill",
        }
    }
}

impl fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stretch" => Ok(ResizeMode::Stretch),
            "fit" => Ok(ResizeMode::Fit),
            "fill" => Ok(ResizeMode::Fill),
            other => Err(format!(
                "unknown mode '{other}' (expected stretch, fit or fill)"
            )),
        }
    }
}

/// An opaque RGB color parsed from `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor(pub [u8; 3]);

impl HexColor {
    pub const WHITE: HexColor = HexColor([0xff, 0xff, 0xff]);

    pub fn rgb(self) -> [u8; 3] {
        self.0
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl FromStr for HexColor {
    type Err = String;

    /// Accepts exactly `#` followed by six hex digits, in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid color '{s}' (expected #RRGGBB)");
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(HexColor([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Parameters for a single resize.
///
/// `fill_color` is only consulted in [`ResizeMode::Fill`]; `None` there means
/// white. Callers resolve per-image overrides before building this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
    pub mode: ResizeMode,
    pub fill_color: Option<HexColor>,
}

impl ResizeParams {
    /// Background color used for Fill mode.
    pub fn background(&self) -> HexColor {
        self.fill_color.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_lowercase_names() {
        assert_eq!("stretch".parse::<ResizeMode>(), Ok(ResizeMode::Stretch));
        assert_eq!("fit".parse::<ResizeMode>(), Ok(ResizeMode::Fit));
        assert_eq!("fill".parse::<ResizeMode>(), Ok(ResizeMode::Fill));
    }

    #[test]
    fn mode_rejects_unknown_and_uppercase() {
        assert!("crop".parse::<ResizeMode>().is_err());
        assert!("FIT".parse::<ResizeMode>().is_err());
        assert!("".parse::<ResizeMode>().is_err());
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ResizeMode::Fill).unwrap(), "\"fill\"");
    }

    #[test]
    fn color_parses_either_case() {
        assert_eq!("#ff0000".parse::<HexColor>(), Ok(HexColor([255, 0, 0])));
        assert_eq!("#00FF7f".parse::<HexColor>(), Ok(HexColor([0, 255, 127])));
    }

    #[test]
    fn color_rejects_malformed_input() {
        for bad in ["ff0000", "#ff000", "#ff00000", "#gg0000", "#fff", "", "#"] {
            assert!(bad.parse::<HexColor>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn color_displays_as_lowercase_hex() {
        assert_eq!(HexColor([0x0a, 0xBC, 0xff]).to_string(), "#0abcff");
    }

    #[test]
    fn color_defaults_to_white() {
        assert_eq!(HexColor::default(), HexColor::WHITE);
    }

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn background_falls_back_to_white() {
        let params = ResizeParams {
            width: 10,
            height: 10,
            mode: ResizeMode::Fill,
            fill_color: None,
        };
        assert_eq!(params.background(), HexColor::WHITE);
    }
}
