//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations every backend must
//! support: process, create_avatar, stats, and dominant_color. Batch
//! processing is a provided method on top of `process`.
//!
//! All operations work on encoded buffers: what comes in is an upload, what
//! goes out can be sent straight back to a browser. The production
//! implementation is [`RustBackend`](super::rust_backend::RustBackend).

use super::color::Rgb;
use super::params::{AvatarParams, OutputFormat, ProcessOptions};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode {format}: {message}")]
    Encode {
        format: OutputFormat,
        message: String,
    },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// An encoded image produced by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl ProcessedImage {
    /// `data:<mime>;base64,<payload>`, ready for an `<img src>`.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime(),
            STANDARD.encode(&self.data)
        )
    }
}

/// Container-level facts about an encoded image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStats {
    /// Encoded size in bytes.
    pub size: usize,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub has_alpha: bool,
    /// `"srgb"` for color images, `"b-w"` for grayscale.
    pub color_space: String,
    pub channels: u8,
}

/// Trait for image processing backends.
///
/// Every backend must implement all four operations so the rest of the
/// codebase is backend-agnostic.
pub trait ImageBackend: Sync {
    /// Decode, apply every present option, re-encode.
    fn process(&self, data: &[u8], options: &ProcessOptions)
    -> Result<ProcessedImage, BackendError>;

    /// Square, circularly masked PNG of `params.size` pixels.
    fn create_avatar(&self, data: &[u8], params: &AvatarParams)
    -> Result<ProcessedImage, BackendError>;

    /// Inspect an encoded image.
    fn stats(&self, data: &[u8]) -> Result<ImageStats, BackendError>;

    /// Most common color of an encoded image.
    fn dominant_color(&self, data: &[u8]) -> Result<Rgb, BackendError>;

    /// Process many buffers with the same options.
    ///
    /// Runs on the rayon pool; output order matches input order. Any failure
    /// fails the whole batch.
    fn batch_process(
        &self,
        buffers: &[&[u8]],
        options: &ProcessOptions,
    ) -> Result<Vec<ProcessedImage>, BackendError> {
        buffers
            .par_iter()
            .map(|data| self.process(data, options))
            .collect()
    }
}
