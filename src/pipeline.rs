//! Request shaping: turn uploads plus a [`ProcessRequest`] into backend calls.
//!
//! ## Single mode
//!
//! The upload is first normalized with an empty-options `process` call, then
//! every selected operation runs as its own backend call, each consuming the
//! previous call's encoded output:
//!
//! ```text
//! upload ─► process({}) ─► op 1 ─► op 2 ─► … ─► stats + dominant color
//! ```
//!
//! `avatar` goes through `create_avatar`; every other operation goes through
//! `process` with the options from
//! [`OperationParams::options_for`](crate::request::OperationParams::options_for).
//! Once a `format` operation has run, its quality is carried into the later
//! re-encodes so the chosen quality survives to the final output.
//!
//! ## Batch mode
//!
//! All uploads share one aggregate `batch_process` call built from
//! [`OperationParams::merged_options`](crate::request::OperationParams::merged_options),
//! so the fixed backend order applies instead of the selection order.
//! The `format` section is always part of that call, ticked or not, so every
//! batch output comes back in the requested format and quality.
//! `avatar` is applied per image afterwards. Stats and dominant colors are
//! computed in parallel with [rayon](https://docs.rs/rayon).

use crate::config::LimitsConfig;
use crate::imaging::{
    BackendError, ImageBackend, ImageStats, ProcessOptions, ProcessedImage, Rgb,
};
use crate::request::{Operation, ProcessRequest};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No files uploaded")]
    NoFiles,
    #[error("File {0:?} is empty")]
    EmptyUpload(String),
    #[error("File {name:?} is {size} bytes, over the {limit} byte limit")]
    TooLarge {
        name: String,
        size: usize,
        limit: usize,
    },
    #[error("{count} files uploaded, at most {limit} allowed per batch")]
    TooManyFiles { count: usize, limit: usize },
    #[error("Image processing failed: {0}")]
    Backend(#[from] BackendError),
}

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Client-side file name, used for logs and output naming.
    pub name: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// A processed image together with what was measured on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOutcome {
    pub output: ProcessedImage,
    pub stats: ImageStats,
    pub dominant_color: Rgb,
}

/// JSON body of a single-image response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    /// `data:` URL of the processed image.
    pub image: String,
    pub stats: ImageStats,
    pub dominant_color: Rgb,
}

impl From<&ImageOutcome> for ImageResult {
    fn from(outcome: &ImageOutcome) -> Self {
        Self {
            image: outcome.output.to_data_url(),
            stats: outcome.stats.clone(),
            dominant_color: outcome.dominant_color,
        }
    }
}

/// JSON body of a batch response. The three lists are index-aligned with
/// the uploads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub images: Vec<String>,
    pub stats: Vec<ImageStats>,
    pub dominant_colors: Vec<Rgb>,
}

impl From<&[ImageOutcome]> for BatchResult {
    fn from(outcomes: &[ImageOutcome]) -> Self {
        let mut result = Self::default();
        for outcome in outcomes {
            result.images.push(outcome.output.to_data_url());
            result.stats.push(outcome.stats.clone());
            result.dominant_colors.push(outcome.dominant_color);
        }
        result
    }
}

/// Reject empty or oversized uploads.
pub fn check_upload(upload: &Upload, limits: &LimitsConfig) -> Result<(), PipelineError> {
    if upload.data.is_empty() {
        return Err(PipelineError::EmptyUpload(upload.name.clone()));
    }
    if upload.data.len() > limits.max_upload_bytes {
        return Err(PipelineError::TooLarge {
            name: upload.name.clone(),
            size: upload.data.len(),
            limit: limits.max_upload_bytes,
        });
    }
    Ok(())
}

fn measure<B: ImageBackend + ?Sized>(
    backend: &B,
    output: ProcessedImage,
) -> Result<ImageOutcome, PipelineError> {
    let stats = backend.stats(&output.data)?;
    let dominant_color = backend.dominant_color(&output.data)?;
    Ok(ImageOutcome {
        output,
        stats,
        dominant_color,
    })
}

/// Run the single-image pipeline and keep the encoded output.
pub fn run_single<B: ImageBackend + ?Sized>(
    backend: &B,
    upload: &Upload,
    request: &ProcessRequest,
    limits: &LimitsConfig,
) -> Result<ImageOutcome, PipelineError> {
    check_upload(upload, limits)?;
    info!(
        file = %upload.name,
        bytes = upload.data.len(),
        operations = request.operations.len(),
        "processing image"
    );

    let mut current = backend.process(&upload.data, &ProcessOptions::default())?;
    let mut carried_quality = None;

    for &op in &request.operations {
        current = match op {
            Operation::Avatar => backend.create_avatar(&current.data, &request.params.avatar)?,
            _ => {
                let mut options = request.params.options_for(op);
                if op == Operation::Format {
                    carried_quality = options.quality;
                }
                options.quality = options.quality.or(carried_quality);
                backend.process(&current.data, &options)?
            }
        };
        debug!(
            operation = %op,
            width = current.width,
            height = current.height,
            format = %current.format,
            "operation applied"
        );
    }

    measure(backend, current)
}

/// Single mode, shaped for the JSON response.
pub fn process_image<B: ImageBackend + ?Sized>(
    backend: &B,
    upload: &Upload,
    request: &ProcessRequest,
    limits: &LimitsConfig,
) -> Result<ImageResult, PipelineError> {
    run_single(backend, upload, request, limits).map(|outcome| ImageResult::from(&outcome))
}

/// Run the batch pipeline and keep the encoded outputs, in upload order.
pub fn run_batch<B: ImageBackend + ?Sized>(
    backend: &B,
    uploads: &[Upload],
    request: &ProcessRequest,
    limits: &LimitsConfig,
) -> Result<Vec<ImageOutcome>, PipelineError> {
    if uploads.is_empty() {
        return Err(PipelineError::NoFiles);
    }
    if uploads.len() > limits.max_batch_files {
        return Err(PipelineError::TooManyFiles {
            count: uploads.len(),
            limit: limits.max_batch_files,
        });
    }
    for upload in uploads {
        check_upload(upload, limits)?;
    }

    let mut options = request.params.merged_options(&request.operations);
    let encoding = request.params.options_for(Operation::Format);
    options.format = encoding.format;
    options.quality = encoding.quality;
    info!(
        files = uploads.len(),
        operations = request.operations.len(),
        "processing batch"
    );

    let buffers: Vec<&[u8]> = uploads.iter().map(|u| u.data.as_slice()).collect();
    let mut outputs = backend.batch_process(&buffers, &options)?;

    if request.contains(Operation::Avatar) {
        let avatar = &request.params.avatar;
        outputs = outputs
            .par_iter()
            .map(|out| backend.create_avatar(&out.data, avatar))
            .collect::<Result<Vec<_>, _>>()?;
    }

    outputs
        .into_par_iter()
        .map(|out| measure(backend, out))
        .collect()
}

/// Batch mode, shaped for the JSON response.
pub fn batch_process_images<B: ImageBackend + ?Sized>(
    backend: &B,
    uploads: &[Upload],
    request: &ProcessRequest,
    limits: &LimitsConfig,
) -> Result<BatchResult, PipelineError> {
    run_batch(backend, uploads, request, limits).map(|outcomes| BatchResult::from(&outcomes[..]))
}
