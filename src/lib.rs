//! # imagedesk
//!
//! A small web studio for chaining image edits. Upload one or more images,
//! tick the operations you want (resize, crop, rotate, grayscale, format,
//! watermark, enhance, blur, flip, flop, avatar), and get back the processed
//! images with their statistics and dominant colors.
//!
//! # Architecture
//!
//! ```text
//! browser ──multipart──► server ──► request ──► pipeline ──► imaging
//!    ▲                                                         │
//!    └──────────── JSON (data URLs, stats, colors) ◄───────────┘
//! ```
//!
//! The same pipeline backs the `process` and `stats` CLI commands, so
//! everything the page does can be scripted against local files.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`request`] | Operation names, the parameter JSON, and the operation → backend-options table |
//! | [`pipeline`] | Single mode (one backend call per operation) and batch mode (one aggregate call) |
//! | [`imaging`] | `ImageBackend` trait, pure-Rust backend, dimension math, color helpers |
//! | [`server`] | axum routes, multipart parsing, error → status mapping |
//! | [`ui`] | The single page, rendered with Maud |
//! | [`config`] | `imagedesk.toml` loading, validation, and stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Single Mode Re-encodes Between Operations
//!
//! In single mode each selected operation is its own backend call on the
//! previous call's encoded output, in the order the user ticked them. Order is
//! visible in the result (crop-then-rotate differs from rotate-then-crop), and
//! each intermediate is a real image with a real format. Batch mode trades
//! that for throughput: one decode and one encode per image, with the backend's
//! fixed operation order.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling, and encoding use the `image` crate, with AVIF read
//! back through `avif-parse` and `rav1d`. Arbitrary-angle rotation uses
//! `imageproc` and watermark text uses the `font8x8` bitmap font. No
//! system libraries and no font files, so the binary is self-contained.
//!
//! ## Maud for the Page
//!
//! The page is generated with [Maud](https://maud.lambda.xyz/). Interpolated
//! values (including configured default watermark text) are escaped, and the
//! inputs are generated from the same parameter types the server parses.

pub mod config;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod request;
pub mod server;
pub mod ui;

/// Version shown by `--version` and `/health`.
///
/// Tagged release builds report the crate version; anything else carries a
/// `-dev` suffix with the git hash.
pub fn version_string() -> &'static str {
    env!("IMAGEDESK_VERSION")
}
