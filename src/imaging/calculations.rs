//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{CropParams, FitMode, Position, ResizeParams};

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Fill dimensions (at least one matches target)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = (h as f64 * src_aspect).round() as u32;
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = (w as f64 / src_aspect).round() as u32;
        (w, h)
    }
}

/// Calculate dimensions that fit inside a target area, preserving aspect ratio.
///
/// The inverse of [`calculate_fill_dimensions`]: one dimension matches the
/// target exactly, the other is smaller or equal. Never returns a zero edge.
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let scale = (tgt_w as f64 / src_w as f64).min(tgt_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).max(1);
    let h = ((src_h as f64 * scale).round() as u32).max(1);
    (w.min(tgt_w), h.min(tgt_h))
}

/// Resolve a resize request into a concrete target box.
///
/// A missing edge is derived from the source aspect ratio, in which case the
/// fit mode no longer matters: the box already has the source's shape.
/// Returns `None` when neither edge is given or one of them is zero.
///
/// # Examples
/// ```
/// # use imagedesk::imaging::{FitMode, ResizeParams, calculations::resolve_resize_box};
/// let params = ResizeParams { width: Some(400), height: None, fit: FitMode::Cover };
/// assert_eq!(resolve_resize_box((800, 600), &params), Some((400, 300)));
/// ```
pub fn resolve_resize_box(source: (u32, u32), params: &ResizeParams) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    match (params.width, params.height) {
        (Some(0), _) | (_, Some(0)) | (None, None) => None,
        (Some(w), Some(h)) => Some((w, h)),
        (Some(w), None) => {
            let h = (w as f64 * src_h as f64 / src_w as f64).round() as u32;
            Some((w, h.max(1)))
        }
        (None, Some(h)) => {
            let w = (h as f64 * src_w as f64 / src_h as f64).round() as u32;
            Some((w.max(1), h))
        }
    }
}

/// The scaled size of the image content for a fit mode, before any crop or pad.
pub fn scaled_dimensions(source: (u32, u32), target: (u32, u32), fit: FitMode) -> (u32, u32) {
    match fit {
        FitMode::Cover => calculate_fill_dimensions(source, target),
        FitMode::Contain | FitMode::Inside => calculate_fit_dimensions(source, target),
        FitMode::Fill => target,
    }
}

/// A crop rectangle that lies entirely inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Clamp a requested crop to the image bounds.
///
/// The region is shrunk to fit; returns `None` if its origin lies outside the
/// image or the requested size is zero.
pub fn clamp_crop(image: (u32, u32), crop: &CropParams) -> Option<CropRect> {
    let (img_w, img_h) = image;
    if crop.left >= img_w || crop.top >= img_h || crop.width == 0 || crop.height == 0 {
        return None;
    }
    Some(CropRect {
        x: crop.left,
        y: crop.top,
        width: crop.width.min(img_w - crop.left),
        height: crop.height.min(img_h - crop.top),
    })
}

/// Normalize an angle in degrees to `[0, 360)`.
pub fn normalize_angle(degrees: f32) -> f32 {
    let a = degrees.rem_euclid(360.0);
    if a >= 360.0 { 0.0 } else { a }
}

/// Number of clockwise quarter turns if the angle is a multiple of 90°.
pub fn quarter_turns(degrees: f32) -> Option<u8> {
    let a = normalize_angle(degrees);
    let turns = (a / 90.0).round();
    if (a - turns * 90.0).abs() < 0.01 {
        Some((turns as u8) % 4)
    } else {
        None
    }
}

/// Bounding box of a `(width, height)` rectangle rotated by `degrees`.
pub fn rotated_bounds(dims: (u32, u32), degrees: f32) -> (u32, u32) {
    let (w, h) = (dims.0 as f64, dims.1 as f64);
    let rad = (degrees as f64).to_radians();
    let (sin, cos) = (rad.sin().abs(), rad.cos().abs());
    let bw = (w * cos + h * sin).round() as u32;
    let bh = (w * sin + h * cos).round() as u32;
    (bw.max(1), bh.max(1))
}

/// Integer upscale factor for 8x8 bitmap glyphs of the requested pixel height.
pub fn glyph_scale(size: u32) -> u32 {
    (size / 8).max(1)
}

/// Margin between the watermark and the canvas edge.
pub fn watermark_margin(canvas: (u32, u32)) -> u32 {
    (canvas.0.min(canvas.1) / 40).max(4)
}

/// Top-left corner for a `text` box anchored at `position` on `canvas`.
///
/// Coordinates may be negative when the text is larger than the canvas; the
/// blitter clips.
pub fn watermark_origin(
    canvas: (u32, u32),
    text: (u32, u32),
    position: Position,
    margin: u32,
) -> (i64, i64) {
    let (cw, ch) = (canvas.0 as i64, canvas.1 as i64);
    let (tw, th) = (text.0 as i64, text.1 as i64);
    let m = margin as i64;
    match position {
        Position::TopLeft => (m, m),
        Position::TopRight => (cw - tw - m, m),
        Position::BottomLeft => (m, ch - th - m),
        Position::BottomRight => (cw - tw - m, ch - th - m),
        Position::Center => ((cw - tw) / 2, (ch - th) / 2),
    }
}

/// Width over height.
pub fn aspect_ratio(width: u32, height: u32) -> f64 {
    if height == 0 {
        return 0.0;
    }
    width as f64 / height as f64
}
