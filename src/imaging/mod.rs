//! Image processing in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (format sniffed from bytes); AVIF via `avif-parse` + `rav1d` |
//! | **Geometry** | crop / resize (Lanczos3) / rotate / flip / flop |
//! | **Tone** | grayscale, enhance (brightness, contrast, saturation) + unsharp mask |
//! | **Blur** | Gaussian, `DynamicImage::blur` |
//! | **Watermark** | `font8x8` glyphs blended onto the canvas |
//! | **Encode** | JPEG / PNG / lossless WebP / AVIF |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and placement math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Color**: Color parsing and dominant-color estimation
//! - **Operations**: One function per pixel transform
//! - **AVIF**: Container parsing and AV1 decoding the `image` crate lacks
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod avif;
pub mod backend;
pub mod calculations;
pub mod color;
pub mod operations;
pub mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend, ImageStats, ProcessedImage};
pub use color::{Rgb, parse_color};
pub use params::{
    AvatarParams, BlurParams, CropParams, EnhanceParams, FitMode, FormatParams, MAX_EDGE,
    MAX_WATERMARK_SIZE, OutputFormat, Position, ProcessOptions, Quality, ResizeParams, RotateParams, Sharpening, WatermarkParams,
};
pub use rust_backend::RustBackend;
