//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the request layer (which decides which operations a
//! user asked for) and the [`backend`](super::backend) (which does the actual
//! pixel work). This separation allows swapping backends (e.g. for testing
//! with a mock) without changing dispatch logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`Sharpening`]: Unsharp-mask parameters applied by `enhance`.
//! - [`OutputFormat`]: Encodable container formats.
//! - Per-operation parameter structs ([`ResizeParams`], [`CropParams`], …),
//!   deserialized straight from the request JSON with UI defaults.
//! - [`ProcessOptions`]: One backend call's worth of operations.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest edge, in pixels, any operation may produce.
pub const MAX_EDGE: u32 = 16_384;

/// Largest accepted watermark text height, in pixels.
pub const MAX_WATERMARK_SIZE: u32 = 2_048;

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
        Self(80)
    }
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// The sharpening pass that accompanies `enhance`.
    pub fn standard() -> Self {
        Self {
            sigma: 1.0,
            threshold: 2,
        }
    }
}

/// Container formats the backend can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [Self::Jpeg, Self::Png, Self::Webp, Self::Avif];

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            other => other.name(),
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Webp => ImageFormat::WebP,
            Self::Avif => ImageFormat::Avif,
        }
    }

    /// Map a decoded container format onto an encodable one.
    ///
    /// Formats without an encoder here (TIFF, GIF, …) return `None`; callers
    /// fall back to PNG so alpha survives.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::WebP => Some(Self::Webp),
            ImageFormat::Avif => Some(Self::Avif),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            "avif" => Ok(Self::Avif),
            other => Err(format!("unsupported output format: {other}")),
        }
    }
}

/// How `resize` reconciles the requested box with the source aspect ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Fill the box exactly, center-cropping the overflow.
    #[default]
    Cover,
    /// Fit inside the box, then pad to the exact box with transparency.
    Contain,
    /// Stretch to the box, ignoring aspect ratio.
    Fill,
    /// Fit inside the box; the result may be smaller on one axis.
    Inside,
}

impl FitMode {
    pub const ALL: [FitMode; 4] = [Self::Cover, Self::Contain, Self::Fill, Self::Inside];

    pub fn name(self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Contain => "contain",
            Self::Fill => "fill",
            Self::Inside => "inside",
        }
    }
}

/// Anchor for the watermark text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

impl Position {
    pub const ALL: [Position; 5] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
        Self::Center,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
            Self::Center => "center",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub fit: FitMode,
}

impl Default for ResizeParams {
    fn default() -> Self {
        Self {
            width: Some(800),
            height: Some(600),
            fit: FitMode::Cover,
        }
    }
}

/// Region to extract, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropParams {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CropParams {
    fn default() -> Self {
        Self {
            left: 0,
            top: 0,
            width: 500,
            height: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotateParams {
    /// Clockwise, in degrees.
    pub angle: f32,
}

impl Default for RotateParams {
    fn default() -> Self {
        Self { angle: 90.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkParams {
    pub text: String,
    pub position: Position,
    /// Glyph height in pixels; rounded down to a multiple of 8.
    pub size: u32,
    /// CSS color: `#rgb`, `#rrggbb`, `#rrggbbaa` or a basic color name.
    pub color: String,
    pub opacity: f32,
}

impl Default for WatermarkParams {
    fn default() -> Self {
        Self {
            text: "© imagedesk".to_string(),
            position: Position::BottomRight,
            size: 80,
            color: "white".to_string(),
            opacity: 0.8,
        }
    }
}

/// Multiplicative adjustments; `1.0` leaves a channel untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnhanceParams {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

impl Default for EnhanceParams {
    fn default() -> Self {
        Self {
            brightness: 1.2,
            contrast: 1.1,
            saturation: 1.3,
        }
    }
}

impl EnhanceParams {
    pub fn is_identity(&self) -> bool {
        self.brightness == 1.0 && self.contrast == 1.0 && self.saturation == 1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlurParams {
    /// Gaussian sigma.
    pub amount: f32,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self { amount: 5.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatParams {
    #[serde(rename = "type")]
    pub format: OutputFormat,
    pub quality: u32,
}

impl Default for FormatParams {
    fn default() -> Self {
        Self {
            format: OutputFormat::Webp,
            quality: Quality::default().value(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvatarParams {
    /// Edge length of the square output.
    pub size: u32,
}

impl Default for AvatarParams {
    fn default() -> Self {
        Self { size: 200 }
    }
}

/// Everything a single [`ImageBackend::process`](super::ImageBackend::process)
/// call should do. Absent fields are skipped; an all-default value just
/// decodes and re-encodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOptions {
    pub crop: Option<CropParams>,
    pub resize: Option<ResizeParams>,
    /// Clockwise degrees.
    pub rotate: Option<f32>,
    /// Mirror top-to-bottom.
    pub flip: bool,
    /// Mirror left-to-right.
    pub flop: bool,
    pub grayscale: bool,
    pub enhance: Option<EnhanceParams>,
    pub sharpen: Option<Sharpening>,
    /// Gaussian sigma.
    pub blur: Option<f32>,
    pub watermark: Option<WatermarkParams>,
    pub format: Option<OutputFormat>,
    pub quality: Option<Quality>,
}

impl ProcessOptions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn fit_mode_names_match_serde() {
        for fit in FitMode::ALL {
            assert_eq!(
                serde_json::to_string(&fit).unwrap(),
                format!("\"{}\"", fit.name())
            );
        }
    }

    #[test]
    fn quality_default_is_80() {
        assert_eq!(Quality::default().value(), 80);
    }

    #[test]
    fn output_format_parses_aliases() {
        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!(" WebP ".parse::<OutputFormat>().unwrap(), OutputFormat::Webp);
        assert!("bmp".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_mime_and_extension() {
        assert_eq!(OutputFormat::Jpeg.mime(), "image/jpeg");
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::Webp.extension(), "webp");
    }

    #[test]
    fn tiff_has_no_output_format() {
        assert_eq!(OutputFormat::from_image_format(ImageFormat::Tiff), None);
        assert_eq!(
            OutputFormat::from_image_format(ImageFormat::Png),
            Some(OutputFormat::Png)
        );
    }

    #[test]
    fn format_params_reads_type_key() {
        let params: FormatParams = serde_json::from_str(r#"{"type":"jpg","quality":55}"#).unwrap();
        assert_eq!(params.format, OutputFormat::Jpeg);
        assert_eq!(params.quality, 55);
    }

    #[test]
    fn position_is_kebab_case() {
        let pos: Position = serde_json::from_str(r#""top-right""#).unwrap();
        assert_eq!(pos, Position::TopRight);
        assert_eq!(Position::BottomLeft.name(), "bottom-left");
    }

    #[test]
    fn resize_params_accept_null_dimension() {
        let params: ResizeParams = serde_json::from_str(r#"{"width":320,"height":null}"#).unwrap();
        assert_eq!(params.width, Some(320));
        assert_eq!(params.height, None);
        assert_eq!(params.fit, FitMode::Cover);
    }

    #[test]
    fn empty_options_are_empty() {
        assert!(ProcessOptions::default().is_empty());
        let opts = ProcessOptions {
            grayscale: true,
            ..ProcessOptions::default()
        };
        assert!(!opts.is_empty());
    }

    #[test]
    fn enhance_identity() {
        let neutral = EnhanceParams {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
        };
        assert!(neutral.is_identity());
        assert!(!EnhanceParams::default().is_identity());
    }
}
