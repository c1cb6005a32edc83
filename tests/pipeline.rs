//! End-to-end runs of both pipeline modes with the real backend.
//!
//! Inputs are generated in memory so the tests need no fixture files.

use image::{DynamicImage, ImageFormat, Rgb as Px, RgbImage};
use imagedesk::config::LimitsConfig;
use imagedesk::imaging::params::{MAX_EDGE, MAX_WATERMARK_SIZE};
use imagedesk::imaging::{BackendError, ImageBackend, OutputFormat, Rgb, RustBackend};
use imagedesk::pipeline::{self, PipelineError, Upload};
use imagedesk::request::{OperationParams, ProcessRequest};
use std::io::Cursor;

/// A `width`×`height` PNG: left half red, right half blue.
fn two_tone_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Px([220, 20, 20])
        } else {
            Px([20, 20, 220])
        }
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn request(ops: &[&str], params: &str) -> ProcessRequest {
    ProcessRequest::from_parts(ops, Some(params), &OperationParams::default()).unwrap()
}

#[test]
fn single_mode_applies_operations_in_order() {
    let backend = RustBackend::new();
    let upload = Upload::new("two-tone.png", two_tone_png(200, 100));
    let req = request(
        &["crop", "rotate", "format"],
        r#"{
            "crop": {"left": 0, "top": 0, "width": 100, "height": 50},
            "rotate": {"angle": 90},
            "format": {"type": "jpeg", "quality": 90}
        }"#,
    );

    let outcome = pipeline::run_single(&backend, &upload, &req, &LimitsConfig::default()).unwrap();

    // Cropped to 100x50, then turned a quarter.
    assert_eq!((outcome.stats.width, outcome.stats.height), (50, 100));
    assert_eq!(outcome.stats.format, "jpeg");
    assert_eq!(outcome.output.format, OutputFormat::Jpeg);
    assert_eq!(outcome.stats.size, outcome.output.data.len());
    assert!(!outcome.stats.has_alpha);
}

#[test]
fn single_mode_without_operations_keeps_source_format() {
    let backend = RustBackend::new();
    let upload = Upload::new("plain.png", two_tone_png(40, 20));
    let req = request(&[], "");

    let result =
        pipeline::process_image(&backend, &upload, &req, &LimitsConfig::default()).unwrap();

    assert!(result.image.starts_with("data:image/png;base64,"));
    assert_eq!((result.stats.width, result.stats.height), (40, 20));
    assert_eq!(result.stats.channels, 3);
}

#[test]
fn grayscale_changes_color_space() {
    let backend = RustBackend::new();
    let upload = Upload::new("gray.png", two_tone_png(32, 32));
    let req = request(&["grayscale"], "");

    let outcome = pipeline::run_single(&backend, &upload, &req, &LimitsConfig::default()).unwrap();

    assert_eq!(outcome.stats.color_space, "b-w");
    let Rgb { r, g, b } = outcome.dominant_color;
    assert!(r == g && g == b, "{}", outcome.dominant_color);
}

#[test]
fn batch_mode_keeps_upload_order() {
    let backend = RustBackend::new();
    let uploads = vec![
        Upload::new("wide.png", two_tone_png(200, 100)),
        Upload::new("tall.png", two_tone_png(100, 200)),
    ];
    let req = request(
        &["resize", "format"],
        r#"{
            "resize": {"width": 50, "height": null, "fit": "inside"},
            "format": {"type": "png"}
        }"#,
    );

    let result =
        pipeline::batch_process_images(&backend, &uploads, &req, &LimitsConfig::default())
            .unwrap();

    assert_eq!(result.images.len(), 2);
    assert_eq!(result.dominant_colors.len(), 2);
    assert_eq!((result.stats[0].width, result.stats[0].height), (50, 25));
    assert_eq!((result.stats[1].width, result.stats[1].height), (50, 100));
    assert!(result.images.iter().all(|img| img.starts_with("data:image/png;base64,")));
}

#[test]
fn batch_avatar_is_square_png_with_alpha() {
    let backend = RustBackend::new();
    let uploads = vec![Upload::new("face.png", two_tone_png(120, 80))];
    let req = request(&["avatar"], r#"{"avatar": {"size": 64}}"#);

    let outcomes =
        pipeline::run_batch(&backend, &uploads, &req, &LimitsConfig::default()).unwrap();

    let stats = &outcomes[0].stats;
    assert_eq!((stats.width, stats.height), (64, 64));
    assert_eq!(stats.format, "png");
    assert!(stats.has_alpha);
}

#[test]
fn dominant_color_follows_the_larger_region() {
    let backend = RustBackend::new();
    let upload = Upload::new("mostly-blue.png", two_tone_png(100, 40));
    // Keep the right three quarters, which is two thirds blue.
    let req = request(
        &["crop"],
        r#"{"crop": {"left": 25, "top": 0, "width": 75, "height": 40}}"#,
    );

    let outcome = pipeline::run_single(&backend, &upload, &req, &LimitsConfig::default()).unwrap();

    assert_eq!(outcome.dominant_color, Rgb::new(20, 20, 220));
}

#[test]
fn single_mode_avif_output_is_measured() {
    let backend = RustBackend::new();
    let upload = Upload::new("photo.png", two_tone_png(32, 32));
    let req = request(&["format"], r#"{"format": {"type": "avif", "quality": 60}}"#);

    let result =
        pipeline::process_image(&backend, &upload, &req, &LimitsConfig::default()).unwrap();

    assert!(result.image.starts_with("data:image/avif;base64,"));
    assert_eq!(result.stats.format, "avif");
    assert_eq!((result.stats.width, result.stats.height), (32, 32));
}

#[test]
fn single_mode_keeps_working_after_avif() {
    let backend = RustBackend::new();
    let upload = Upload::new("photo.png", two_tone_png(40, 20));
    let req = request(
        &["format", "rotate", "avatar"],
        r#"{"format": {"type": "avif"}, "rotate": {"angle": 90}, "avatar": {"size": 16}}"#,
    );

    let outcome = pipeline::run_single(&backend, &upload, &req, &LimitsConfig::default()).unwrap();

    assert_eq!(outcome.stats.format, "png");
    assert_eq!((outcome.stats.width, outcome.stats.height), (16, 16));
}

#[test]
fn batch_mode_avif_output_is_measured() {
    let backend = RustBackend::new();
    let uploads = vec![
        Upload::new("a.png", two_tone_png(24, 16)),
        Upload::new("b.png", two_tone_png(16, 24)),
    ];
    let req = request(&["grayscale"], r#"{"format": {"type": "avif", "quality": 50}}"#);

    let result =
        pipeline::batch_process_images(&backend, &uploads, &req, &LimitsConfig::default())
            .unwrap();

    // Batch output always takes the requested format, even unticked.
    assert!(result.images.iter().all(|img| img.starts_with("data:image/avif;base64,")));
    assert_eq!((result.stats[0].width, result.stats[0].height), (24, 16));
    assert_eq!((result.stats[1].width, result.stats[1].height), (16, 24));
}

#[test]
fn oversized_parameters_are_rejected_before_processing() {
    let defaults = OperationParams::default();
    let edge = MAX_EDGE + 1;
    for (op, params) in [
        ("resize", format!(r#"{{"resize": {{"width": {edge}, "height": {edge}}}}}"#)),
        ("avatar", format!(r#"{{"avatar": {{"size": {edge}}}}}"#)),
        ("watermark", format!(r#"{{"watermark": {{"size": {}}}}}"#, MAX_WATERMARK_SIZE + 1)),
        ("watermark", r#"{"watermark": {"size": 4000000000}}"#.to_string()),
    ] {
        let result = ProcessRequest::from_parts(&[op], Some(params.as_str()), &defaults);
        assert!(result.is_err(), "{op} accepted {params}");
    }
}

#[test]
fn derived_resize_edge_over_limit_is_a_parameter_error() {
    let backend = RustBackend::new();
    let upload = Upload::new("strip.png", two_tone_png(2, 200));
    // Width is in range, but the proportional height is not.
    let req = request(
        &["resize"],
        r#"{"resize": {"width": 1000, "height": null}}"#,
    );

    let err = pipeline::run_single(&backend, &upload, &req, &LimitsConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Backend(BackendError::InvalidParameter(_))
    ));
}

#[test]
fn undecodable_upload_is_a_backend_error() {
    let backend = RustBackend::new();
    let upload = Upload::new("notes.txt", b"definitely not an image".to_vec());
    let req = request(&["grayscale"], "");

    let err = pipeline::run_single(&backend, &upload, &req, &LimitsConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Backend(_)));
}

#[test]
fn stats_report_the_input_itself() {
    let backend = RustBackend::new();
    let data = two_tone_png(64, 48);
    let stats = backend.stats(&data).unwrap();
    assert_eq!(stats.size, data.len());
    assert_eq!(stats.format, "png");
    assert_eq!((stats.width, stats.height), (64, 48));
    assert!((stats.aspect_ratio - 64.0 / 48.0).abs() < 1e-9);
}
