//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF) | `image::ImageReader` with guessed format |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1), see [`super::avif`] |
//! | Crop, resize, flip, grayscale, blur | `image::DynamicImage` methods (Lanczos3 resize) |
//! | Arbitrary-angle rotate | `imageproc::geometric_transformations::rotate_about_center` |
//! | Sharpening | `image::imageops::unsharpen` |
//! | Watermark text | `font8x8` bitmap glyphs, alpha-blended |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG | `PngEncoder` |
//! | Encode → WebP | `WebPEncoder::new_lossless` |
//! | Encode → AVIF | `AvifEncoder` (rav1e, speed 6) |
//!
//! AVIF buffers are sniffed by their `ftyp` brand and routed around
//! `ImageReader`, whose AVIF decoder is not compiled in.

use super::avif;
use super::backend::{BackendError, ImageBackend, ImageStats, ProcessedImage};
use super::calculations::aspect_ratio;
use super::color::{Rgb, dominant_color_of};
use super::operations;
use super::params::{AvatarParams, OutputFormat, ProcessOptions, Quality};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn reader(data: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(BackendError::Io)
}

/// Decode an in-memory image, returning it with its container format.
fn decode(data: &[u8]) -> Result<(DynamicImage, Option<ImageFormat>), BackendError> {
    if avif::is_avif(data) {
        return Ok((avif::decode(data)?, Some(ImageFormat::Avif)));
    }
    let reader = reader(data)?;
    let format = reader.format();
    if format.is_none() {
        return Err(BackendError::Decode("unrecognized image format".to_string()));
    }
    let img = reader
        .decode()
        .map_err(|e| BackendError::Decode(e.to_string()))?;
    Ok((img, format))
}

/// Encode to `format`, converting the pixel layout to one the encoder accepts.
fn encode(
    img: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let has_alpha = img.color().has_alpha();
    let result = match format {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
            match img.color() {
                ColorType::L8 | ColorType::Rgb8 => img.write_with_encoder(encoder),
                _ => DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder),
            }
        }
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut buf)),
        OutputFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut buf);
            match img.color() {
                ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => {
                    img.write_with_encoder(encoder)
                }
                _ if has_alpha => DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder),
                _ => DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder),
            }
        }
        OutputFormat::Avif => {
            let encoder =
                AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, quality.value() as u8);
            if has_alpha {
                DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
            }
        }
    };
    result.map_err(|e| BackendError::Encode {
        format,
        message: e.to_string(),
    })?;
    Ok(buf)
}

fn finish(
    img: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<ProcessedImage, BackendError> {
    let data = encode(img, format, quality)?;
    Ok(ProcessedImage {
        data,
        format,
        width: img.width(),
        height: img.height(),
    })
}

/// Apply every present option in the fixed pipeline order.
fn apply(mut img: DynamicImage, options: &ProcessOptions) -> Result<DynamicImage, BackendError> {
    if let Some(crop) = &options.crop {
        img = operations::crop(&img, crop)?;
    }
    if let Some(resize) = &options.resize {
        img = operations::resize(&img, resize)?;
    }
    if let Some(degrees) = options.rotate {
        img = operations::rotate(img, degrees);
    }
    if options.flip {
        img = img.flipv();
    }
    if options.flop {
        img = img.fliph();
    }
    if options.grayscale {
        img = img.grayscale();
    }
    if let Some(enhance) = &options.enhance {
        img = operations::enhance(img, enhance);
    }
    if let Some(sharpening) = options.sharpen {
        img = operations::sharpen(&img, sharpening);
    }
    if let Some(sigma) = options.blur {
        img = operations::blur(img, sigma);
    }
    if let Some(watermark) = &options.watermark {
        img = operations::watermark(&img, watermark)?;
    }
    Ok(img)
}

impl ImageBackend for RustBackend {
    fn process(
        &self,
        data: &[u8],
        options: &ProcessOptions,
    ) -> Result<ProcessedImage, BackendError> {
        let (img, source_format) = decode(data)?;
        let format = options
            .format
            .or_else(|| source_format.and_then(OutputFormat::from_image_format))
            .unwrap_or(OutputFormat::Png);
        debug!(
            input_bytes = data.len(),
            width = img.width(),
            height = img.height(),
            %format,
            "processing image"
        );
        let out = apply(img, options)?;
        finish(&out, format, options.quality.unwrap_or_default())
    }

    fn create_avatar(
        &self,
        data: &[u8],
        params: &AvatarParams,
    ) -> Result<ProcessedImage, BackendError> {
        let (img, _) = decode(data)?;
        debug!(size = params.size, "creating avatar");
        let avatar = operations::avatar(&img, params.size)?;
        finish(&avatar, OutputFormat::Png, Quality::default())
    }

    fn stats(&self, data: &[u8]) -> Result<ImageStats, BackendError> {
        if avif::is_avif(data) {
            let header = avif::header(data)?;
            return Ok(ImageStats {
                size: data.len(),
                format: OutputFormat::Avif.name().to_string(),
                width: header.width,
                height: header.height,
                aspect_ratio: aspect_ratio(header.width, header.height),
                has_alpha: header.has_alpha,
                color_space: "srgb".to_string(),
                channels: if header.has_alpha { 4 } else { 3 },
            });
        }
        let reader = reader(data)?;
        let format = reader
            .format()
            .ok_or_else(|| BackendError::Decode("unrecognized image format".to_string()))?;
        let decoder = reader
            .into_decoder()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        let (width, height) = decoder.dimensions();
        let color = decoder.color_type();

        let format_name = match OutputFormat::from_image_format(format) {
            Some(known) => known.name().to_string(),
            None => format
                .extensions_str()
                .first()
                .map_or_else(|| format!("{format:?}").to_lowercase(), |s| s.to_string()),
        };

        Ok(ImageStats {
            size: data.len(),
            format: format_name,
            width,
            height,
            aspect_ratio: aspect_ratio(width, height),
            has_alpha: color.has_alpha(),
            color_space: if color.has_color() { "srgb" } else { "b-w" }.to_string(),
            channels: color.channel_count(),
        })
    }

    fn dominant_color(&self, data: &[u8]) -> Result<Rgb, BackendError> {
        let (img, _) = decode(data)?;
        Ok(dominant_color_of(&img))
    }
}
