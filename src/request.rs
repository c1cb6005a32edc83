//! Operation names and their parameters.
//!
//! A request is a list of operation names plus one JSON object holding the
//! parameters for every operation the page knows about. This module turns
//! that pair into typed values and maps each [`Operation`] onto the
//! [`ProcessOptions`] the backend understands.
//!
//! ## JSON shape
//!
//! ```json
//! {
//!   "resize":    { "width": 800, "height": 600, "fit": "cover" },
//!   "crop":      { "left": 0, "top": 0, "width": 500, "height": 500 },
//!   "rotate":    { "angle": 90 },
//!   "watermark": { "text": "© imagedesk", "position": "bottom-right",
//!                  "size": 80, "color": "white", "opacity": 0.8 },
//!   "enhance":   { "brightness": 1.2, "contrast": 1.1, "saturation": 1.3 },
//!   "blur":      { "amount": 5 },
//!   "format":    { "type": "webp", "quality": 80 },
//!   "avatar":    { "size": 200 }
//! }
//! ```
//!
//! Every section and every field is optional; missing values take the
//! defaults shown above.

use crate::imaging::{
    AvatarParams, BlurParams, CropParams, EnhanceParams, FormatParams, MAX_EDGE,
    MAX_WATERMARK_SIZE, ProcessOptions, Quality, ResizeParams, RotateParams, Sharpening,
    WatermarkParams,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Unknown operation: {0:?}")]
    UnknownOperation(String),
    #[error("Invalid params JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid {operation} parameters: {message}")]
    Validation {
        operation: Operation,
        message: String,
    },
}

/// A named image transform selectable from the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Resize,
    Crop,
    Rotate,
    Grayscale,
    Format,
    Watermark,
    Enhance,
    Blur,
    Flip,
    Flop,
    Avatar,
}

impl Operation {
    /// Page order.
    pub const ALL: [Operation; 11] = [
        Self::Resize,
        Self::Crop,
        Self::Rotate,
        Self::Grayscale,
        Self::Format,
        Self::Watermark,
        Self::Enhance,
        Self::Blur,
        Self::Flip,
        Self::Flop,
        Self::Avatar,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Resize => "resize",
            Self::Crop => "crop",
            Self::Rotate => "rotate",
            Self::Grayscale => "grayscale",
            Self::Format => "format",
            Self::Watermark => "watermark",
            Self::Enhance => "enhance",
            Self::Blur => "blur",
            Self::Flip => "flip",
            Self::Flop => "flop",
            Self::Avatar => "avatar",
        }
    }

    /// Whether the operation has a parameter section.
    pub fn has_params(self) -> bool {
        !matches!(self, Self::Grayscale | Self::Flip | Self::Flop)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RequestError::UnknownOperation(wanted.to_string()))
    }
}

/// Parse operation names, keeping order and duplicates.
pub fn parse_operations<I, S>(names: I) -> Result<Vec<Operation>, RequestError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().map(|n| n.as_ref().parse()).collect()
}

/// Parameters for every operation, keyed by operation name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationParams {
    pub resize: ResizeParams,
    pub crop: CropParams,
    pub rotate: RotateParams,
    pub watermark: WatermarkParams,
    pub enhance: EnhanceParams,
    pub blur: BlurParams,
    pub format: FormatParams,
    pub avatar: AvatarParams,
}

fn finite_non_negative(operation: Operation, field: &str, value: f32) -> Result<(), RequestError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(RequestError::Validation {
            operation,
            message: format!("{field} must be a finite, non-negative number (got {value})"),
        })
    }
}

impl OperationParams {
    /// Parse the JSON blob. Blank input yields the defaults.
    pub fn from_json(text: &str) -> Result<Self, RequestError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), RequestError> {
        Operation::ALL.iter().try_for_each(|&op| self.check(op))
    }

    /// Validate only the sections the given operations read.
    pub fn validate_for(&self, operations: &[Operation]) -> Result<(), RequestError> {
        operations.iter().try_for_each(|&op| self.check(op))
    }

    fn check(&self, op: Operation) -> Result<(), RequestError> {
        let invalid = |message: &str| -> Result<(), RequestError> {
            Err(RequestError::Validation {
                operation: op,
                message: message.to_string(),
            })
        };
        match op {
            Operation::Resize => match (self.resize.width, self.resize.height) {
                (None, None) => invalid("width or height is required"),
                (Some(0), _) | (_, Some(0)) => invalid("width and height must be positive"),
                (w, h) if w.max(h).unwrap_or(0) > MAX_EDGE => {
                    invalid(&format!("width and height must be at most {MAX_EDGE}"))
                }
                _ => Ok(()),
            },
            Operation::Crop if self.crop.width == 0 || self.crop.height == 0 => {
                invalid("width and height must be positive")
            }
            Operation::Rotate if !self.rotate.angle.is_finite() => {
                invalid("angle must be a finite number")
            }
            Operation::Watermark => {
                if self.watermark.text.trim().is_empty() {
                    return invalid("text cannot be empty");
                }
                if self.watermark.size == 0 {
                    return invalid("size must be positive");
                }
                if self.watermark.size > MAX_WATERMARK_SIZE {
                    return invalid(&format!("size must be at most {MAX_WATERMARK_SIZE}"));
                }
                if !(0.0..=1.0).contains(&self.watermark.opacity) {
                    return invalid("opacity must be between 0 and 1");
                }
                Ok(())
            }
            Operation::Enhance => {
                finite_non_negative(op, "brightness", self.enhance.brightness)?;
                finite_non_negative(op, "contrast", self.enhance.contrast)?;
                finite_non_negative(op, "saturation", self.enhance.saturation)
            }
            Operation::Blur => finite_non_negative(op, "amount", self.blur.amount),
            Operation::Avatar if self.avatar.size == 0 => invalid("size must be positive"),
            Operation::Avatar if self.avatar.size > MAX_EDGE => {
                invalid(&format!("size must be at most {MAX_EDGE}"))
            }
            _ => Ok(()),
        }
    }

    fn apply(&self, op: Operation, options: &mut ProcessOptions) {
        match op {
            Operation::Resize => options.resize = Some(self.resize),
            Operation::Crop => options.crop = Some(self.crop),
            Operation::Rotate => options.rotate = Some(self.rotate.angle),
            Operation::Grayscale => options.grayscale = true,
            Operation::Format => {
                options.format = Some(self.format.format);
                options.quality = Some(Quality::new(self.format.quality));
            }
            Operation::Watermark => options.watermark = Some(self.watermark.clone()),
            Operation::Enhance => {
                options.enhance = Some(self.enhance);
                options.sharpen = Some(Sharpening::standard());
            }
            Operation::Blur => options.blur = Some(self.blur.amount),
            Operation::Flip => options.flip = true,
            Operation::Flop => options.flop = true,
            // Not a `process` option: the pipeline calls `create_avatar`.
            Operation::Avatar => {}
        }
    }

    /// Backend options for a single operation.
    ///
    /// `Avatar` maps to empty options; it has its own backend call.
    pub fn options_for(&self, op: Operation) -> ProcessOptions {
        let mut options = ProcessOptions::default();
        self.apply(op, &mut options);
        options
    }

    /// One aggregate set of options covering every listed operation.
    pub fn merged_options(&self, operations: &[Operation]) -> ProcessOptions {
        let mut options = ProcessOptions::default();
        for &op in operations {
            self.apply(op, &mut options);
        }
        options
    }
}

/// A parsed, validated request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessRequest {
    pub operations: Vec<Operation>,
    pub params: OperationParams,
}

impl ProcessRequest {
    /// Build a request from raw form values.
    ///
    /// A missing or blank `params_json` falls back to `defaults`. Only the
    /// sections of selected operations are validated, so an unused section
    /// left invalid on the page does not fail the request.
    pub fn from_parts<S: AsRef<str>>(
        names: &[S],
        params_json: Option<&str>,
        defaults: &OperationParams,
    ) -> Result<Self, RequestError> {
        let operations = parse_operations(names)?;
        let params = match params_json {
            Some(text) if !text.trim().is_empty() => OperationParams::from_json(text)?,
            _ => defaults.clone(),
        };
        params.validate_for(&operations)?;
        Ok(Self { operations, params })
    }

    pub fn contains(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }
}
