//! Single-image transforms.
//!
//! Each function takes a decoded image and the parameters for one operation
//! and returns the transformed image. They combine the pure math from
//! [`calculations`](super::calculations) with `image`/`imageproc` calls; the
//! backend decides the order they run in.

use super::backend::BackendError;
use super::calculations::{
    clamp_crop, glyph_scale, quarter_turns, resolve_resize_box, rotated_bounds, scaled_dimensions,
    watermark_margin, watermark_origin,
};
use super::color::{Rgba, parse_color};
use super::params::{
    CropParams, EnhanceParams, FitMode, MAX_EDGE, MAX_WATERMARK_SIZE, ResizeParams, Sharpening,
    WatermarkParams,
};
use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Gaussian sigma below which blurring is skipped.
pub const MIN_BLUR_SIGMA: f32 = 0.3;

const TRANSPARENT: image::Rgba<u8> = image::Rgba([0, 0, 0, 0]);

/// Extract a region, clamped to the image bounds.
pub fn crop(img: &DynamicImage, params: &CropParams) -> Result<DynamicImage> {
    let rect = clamp_crop(img.dimensions(), params).ok_or_else(|| {
        BackendError::InvalidParameter(format!(
            "crop origin ({}, {}) with size {}x{} lies outside a {}x{} image",
            params.left,
            params.top,
            params.width,
            params.height,
            img.width(),
            img.height()
        ))
    })?;
    Ok(img.crop_imm(rect.x, rect.y, rect.width, rect.height))
}

/// Resize according to the fit mode. Lanczos3 throughout.
pub fn resize(img: &DynamicImage, params: &ResizeParams) -> Result<DynamicImage> {
    let (tw, th) = resolve_resize_box(img.dimensions(), params).ok_or_else(|| {
        BackendError::InvalidParameter("resize needs a non-zero width or height".to_string())
    })?;
    if tw > MAX_EDGE || th > MAX_EDGE {
        return Err(BackendError::InvalidParameter(format!(
            "resize to {tw}x{th} exceeds the {MAX_EDGE} pixel edge limit"
        )));
    }

    let resized = match params.fit {
        FitMode::Cover => img.resize_to_fill(tw, th, FilterType::Lanczos3),
        FitMode::Fill => img.resize_exact(tw, th, FilterType::Lanczos3),
        FitMode::Inside => {
            let (w, h) = scaled_dimensions(img.dimensions(), (tw, th), FitMode::Inside);
            img.resize_exact(w, h, FilterType::Lanczos3)
        }
        FitMode::Contain => {
            let (w, h) = scaled_dimensions(img.dimensions(), (tw, th), FitMode::Contain);
            let scaled = img.resize_exact(w, h, FilterType::Lanczos3);
            let mut canvas = RgbaImage::from_pixel(tw, th, TRANSPARENT);
            image::imageops::overlay(
                &mut canvas,
                &scaled.to_rgba8(),
                ((tw - w) / 2) as i64,
                ((th - h) / 2) as i64,
            );
            DynamicImage::ImageRgba8(canvas)
        }
    };
    Ok(resized)
}

/// Rotate clockwise by `degrees`.
///
/// Right angles are exact pixel moves. Any other angle grows the canvas to
/// the rotated bounding box and fills the corners with transparency.
pub fn rotate(img: DynamicImage, degrees: f32) -> DynamicImage {
    match quarter_turns(degrees) {
        Some(0) => img,
        Some(1) => img.rotate90(),
        Some(2) => img.rotate180(),
        Some(3) => img.rotate270(),
        _ => {
            let (w, h) = img.dimensions();
            let (bw, bh) = rotated_bounds((w, h), degrees);
            let (cw, ch) = (bw.max(w), bh.max(h));
            let mut canvas = RgbaImage::from_pixel(cw, ch, TRANSPARENT);
            image::imageops::overlay(
                &mut canvas,
                &img.to_rgba8(),
                ((cw - w) / 2) as i64,
                ((ch - h) / 2) as i64,
            );
            let rotated = rotate_about_center(
                &canvas,
                degrees.to_radians(),
                Interpolation::Bilinear,
                TRANSPARENT,
            );
            DynamicImage::ImageRgba8(rotated)
        }
    }
}

/// Apply brightness, contrast and saturation multipliers.
///
/// Brightness and saturation are a single per-pixel pass; contrast goes
/// through `image`'s own adjustment.
pub fn enhance(img: DynamicImage, params: &EnhanceParams) -> DynamicImage {
    if params.is_identity() {
        return img;
    }

    let img = if params.brightness != 1.0 || params.saturation != 1.0 {
        let mut rgba = img.to_rgba8();
        let (b, s) = (params.brightness.max(0.0), params.saturation.max(0.0));
        for px in rgba.pixels_mut() {
            let [r, g, bl, a] = px.0;
            let (r, g, bl) = (r as f32 * b, g as f32 * b, bl as f32 * b);
            let luma = 0.2126 * r + 0.7152 * g + 0.0722 * bl;
            let sat = |c: f32| (luma + (c - luma) * s).round().clamp(0.0, 255.0) as u8;
            px.0 = [sat(r), sat(g), sat(bl), a];
        }
        DynamicImage::ImageRgba8(rgba)
    } else {
        img
    };

    if params.contrast != 1.0 {
        // image's contrast scales by ((100 + c) / 100)^2
        let c = (params.contrast.max(0.0).sqrt() - 1.0) * 100.0;
        img.adjust_contrast(c)
    } else {
        img
    }
}

pub fn sharpen(img: &DynamicImage, sharpening: Sharpening) -> DynamicImage {
    img.unsharpen(sharpening.sigma, sharpening.threshold)
}

pub fn blur(img: DynamicImage, sigma: f32) -> DynamicImage {
    if sigma < MIN_BLUR_SIGMA {
        return img;
    }
    img.blur(sigma)
}

/// Glyph for `ch`, falling back to `?` for characters outside Latin-1.
fn glyph(ch: char) -> [u8; 8] {
    const QUESTION_MARK: [u8; 8] = [0x1E, 0x33, 0x30, 0x18, 0x0C, 0x00, 0x0C, 0x00];
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .unwrap_or(QUESTION_MARK)
}

/// Pixel size of `text` rendered at `scale`, saturating at `u32::MAX`.
fn text_extent(text: &str, scale: u32) -> (u32, u32) {
    let n = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    let gap = scale;
    let width = n
        .saturating_mul(8)
        .saturating_mul(scale)
        .saturating_add(n.saturating_sub(1).saturating_mul(gap));
    (width, scale.saturating_mul(8))
}

/// Blend one pixel of `color` at `alpha` over `dst` ("over" operator).
fn blend(dst: &mut image::Rgba<u8>, color: Rgba, alpha: u8) {
    let a = alpha as u16;
    let inv = 255 - a;
    let mix = |d: u8, s: u8| ((d as u16 * inv + s as u16 * a) / 255) as u8;
    let out_alpha = a + (dst[3] as u16 * inv + 127) / 255;
    *dst = image::Rgba([
        mix(dst[0], color.r),
        mix(dst[1], color.g),
        mix(dst[2], color.b),
        out_alpha.min(255) as u8,
    ]);
}

/// Stamp `params.text` onto the image with an 8x8 bitmap font.
pub fn watermark(img: &DynamicImage, params: &WatermarkParams) -> Result<DynamicImage> {
    let text = params.text.trim();
    if text.is_empty() {
        return Err(BackendError::InvalidParameter(
            "watermark text cannot be empty".to_string(),
        ));
    }
    if params.size > MAX_WATERMARK_SIZE {
        return Err(BackendError::InvalidParameter(format!(
            "watermark size {} exceeds the {MAX_WATERMARK_SIZE} pixel limit",
            params.size
        )));
    }
    let color = parse_color(&params.color).map_err(BackendError::InvalidParameter)?;
    let alpha = (params.opacity.clamp(0.0, 1.0) * color.a as f32).round() as u8;

    let mut canvas = img.to_rgba8();
    if alpha == 0 {
        return Ok(DynamicImage::ImageRgba8(canvas));
    }

    let scale = glyph_scale(params.size);
    let (cw, ch) = canvas.dimensions();
    let extent = text_extent(text, scale);
    let (ox, oy) = watermark_origin((cw, ch), extent, params.position, watermark_margin((cw, ch)));

    let s = scale as i64;
    let (cw, ch) = (cw as i64, ch as i64);
    for (i, c) in text.chars().enumerate() {
        let gx = ox + i as i64 * 9 * s;
        if gx >= cw {
            break;
        }
        if gx + 8 * s <= 0 {
            continue;
        }
        for (row, bits) in glyph(c).iter().enumerate() {
            let y0 = oy + row as i64 * s;
            let (top, bottom) = (y0.max(0), (y0 + s).min(ch));
            for col in 0..8i64 {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                let x0 = gx + col * s;
                let (left, right) = (x0.max(0), (x0 + s).min(cw));
                for y in top..bottom {
                    for x in left..right {
                        blend(canvas.get_pixel_mut(x as u32, y as u32), color, alpha);
                    }
                }
            }
        }
    }
    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Square cover-crop with everything outside the inscribed circle made
/// transparent. The edge is antialiased over one pixel.
pub fn avatar(img: &DynamicImage, size: u32) -> Result<DynamicImage> {
    if size == 0 || size > MAX_EDGE {
        return Err(BackendError::InvalidParameter(format!(
            "avatar size must be between 1 and {MAX_EDGE}"
        )));
    }
    let mut square = img.resize_to_fill(size, size, FilterType::Lanczos3).to_rgba8();
    let radius = size as f32 / 2.0;
    for (x, y, px) in square.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - radius;
        let dy = y as f32 + 0.5 - radius;
        let coverage = (radius - (dx * dx + dy * dy).sqrt() + 0.5).clamp(0.0, 1.0);
        px[3] = (px[3] as f32 * coverage).round() as u8;
    }
    Ok(DynamicImage::ImageRgba8(square))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Position;
    use image::RgbImage;

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, image::Rgb(rgb)))
    }

    #[test]
    fn crop_clamps_overflow() {
        let out = crop(&gradient(300, 200), &CropParams::default()).unwrap();
        assert_eq!(out.dimensions(), (300, 200));
    }

    #[test]
    fn crop_extracts_region() {
        let params = CropParams {
            left: 10,
            top: 5,
            width: 20,
            height: 30,
        };
        let out = crop(&gradient(100, 100), &params).unwrap();
        assert_eq!(out.dimensions(), (20, 30));
        // Top-left pixel of the crop is source pixel (10, 5)
        assert_eq!(out.to_rgb8().get_pixel(0, 0).0, [10, 5, 128]);
    }

    #[test]
    fn crop_outside_errors() {
        let params = CropParams {
            left: 500,
            top: 0,
            width: 10,
            height: 10,
        };
        assert!(matches!(
            crop(&gradient(100, 100), &params),
            Err(BackendError::InvalidParameter(_))
        ));
    }

    #[test]
    fn resize_cover_is_exact() {
        let out = resize(&gradient(400, 300), &ResizeParams::default()).unwrap();
        assert_eq!(out.dimensions(), (800, 600));
    }

    #[test]
    fn resize_inside_keeps_aspect() {
        let params = ResizeParams {
            width: Some(100),
            height: Some(100),
            fit: FitMode::Inside,
        };
        let out = resize(&gradient(400, 200), &params).unwrap();
        assert_eq!(out.dimensions(), (100, 50));
    }

    #[test]
    fn resize_contain_pads_with_transparency() {
        let params = ResizeParams {
            width: Some(100),
            height: Some(100),
            fit: FitMode::Contain,
        };
        let out = resize(&gradient(400, 200), &params).unwrap();
        assert_eq!(out.dimensions(), (100, 100));
        let rgba = out.to_rgba8();
        assert_eq!(rgba.get_pixel(50, 0)[3], 0);
        assert_eq!(rgba.get_pixel(50, 50)[3], 255);
    }

    #[test]
    fn resize_without_edges_errors() {
        let params = ResizeParams {
            width: None,
            height: None,
            fit: FitMode::Cover,
        };
        assert!(resize(&gradient(10, 10), &params).is_err());
    }

    #[test]
    fn rotate_quarter_turn_swaps_dimensions() {
        let out = rotate(gradient(40, 20), 90.0);
        assert_eq!(out.dimensions(), (20, 40));
        let out = rotate(gradient(40, 20), -180.0);
        assert_eq!(out.dimensions(), (40, 20));
    }

    #[test]
    fn rotate_arbitrary_expands_canvas() {
        let out = rotate(gradient(100, 100), 45.0);
        assert_eq!(out.dimensions(), (141, 141));
        // Corners are outside the rotated square
        assert_eq!(out.to_rgba8().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn enhance_identity_is_noop() {
        let img = gradient(8, 8);
        let params = EnhanceParams {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
        };
        assert_eq!(enhance(img.clone(), &params), img);
    }

    #[test]
    fn enhance_brightness_scales_channels() {
        let params = EnhanceParams {
            brightness: 2.0,
            contrast: 1.0,
            saturation: 1.0,
        };
        let out = enhance(solid(4, 4, [50, 60, 200]), &params).to_rgb8();
        assert_eq!(out.get_pixel(0, 0).0, [100, 120, 255]);
    }

    #[test]
    fn enhance_zero_saturation_is_gray() {
        let params = EnhanceParams {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 0.0,
        };
        let [r, g, b] = enhance(solid(2, 2, [200, 40, 90]), &params)
            .to_rgb8()
            .get_pixel(0, 0)
            .0;
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn blur_below_threshold_is_noop() {
        let img = gradient(16, 16);
        assert_eq!(blur(img.clone(), 0.1), img);
    }

    #[test]
    fn blur_smooths_edges() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(20, 1, |x, _| {
            if x < 10 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        }));
        let out = blur(img, 2.0).to_rgb8();
        let edge = out.get_pixel(10, 0)[0];
        assert!(edge > 0 && edge < 255, "edge pixel {edge} should be mid-gray");
    }

    #[test]
    fn text_extent_counts_gaps() {
        // 3 glyphs at scale 2: 3*16 + 2*2
        assert_eq!(text_extent("abc", 2), (52, 16));
        assert_eq!(text_extent("©", 1), (8, 8));
    }

    #[test]
    fn text_extent_saturates() {
        assert_eq!(text_extent("abc", u32::MAX), (u32::MAX, u32::MAX));
    }

    #[test]
    fn latin_glyph_is_not_fallback() {
        assert_ne!(glyph('©'), glyph('?'));
        assert_eq!(glyph('\u{4e00}'), glyph('?'));
    }

    #[test]
    fn watermark_changes_corner_pixels() {
        let params = WatermarkParams {
            text: "XX".to_string(),
            position: Position::TopLeft,
            size: 16,
            color: "white".to_string(),
            opacity: 1.0,
        };
        let out = watermark(&solid(200, 100, [0, 0, 0]), &params)
            .unwrap()
            .to_rgba8();
        let white = out.pixels().filter(|p| p.0 == [255, 255, 255, 255]).count();
        assert!(white > 0);
        // Nothing lands in the bottom-right quadrant
        for y in 50..100 {
            for x in 100..200 {
                assert_eq!(out.get_pixel(x, y).0, [0, 0, 0, 255]);
            }
        }
    }

    #[test]
    fn watermark_rejects_bad_input() {
        let blank = WatermarkParams {
            text: "   ".to_string(),
            ..WatermarkParams::default()
        };
        let bad_color = WatermarkParams {
            color: "not-a-color".to_string(),
            ..WatermarkParams::default()
        };
        assert!(watermark(&gradient(10, 10), &blank).is_err());
        assert!(watermark(&gradient(10, 10), &bad_color).is_err());
    }

    #[test]
    fn avatar_is_round_square() {
        let out = avatar(&gradient(300, 200), 64).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (64, 64));
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(63, 63)[3], 0);
        assert_eq!(out.get_pixel(32, 32)[3], 255);
    }

    #[test]
    fn watermark_size_over_limit_errors() {
        let params = WatermarkParams {
            size: 4_000_000_000,
            ..WatermarkParams::default()
        };
        let result = watermark(&gradient(10, 10), &params);
        assert!(matches!(result, Err(BackendError::InvalidParameter(_))));
    }

    #[test]
    fn watermark_larger_than_canvas_is_clipped() {
        let params = WatermarkParams {
            text: "W".repeat(500),
            position: Position::Center,
            size: MAX_WATERMARK_SIZE,
            color: "white".to_string(),
            opacity: 1.0,
        };
        let out = watermark(&solid(40, 30, [0, 0, 0]), &params).unwrap();
        assert_eq!(out.dimensions(), (40, 30));
    }

    #[test]
    fn avatar_zero_size_errors() {
        assert!(avatar(&gradient(10, 10), 0).is_err());
    }

    #[test]
    fn avatar_over_edge_limit_errors() {
        let result = avatar(&gradient(10, 10), MAX_EDGE + 1);
        assert!(matches!(result, Err(BackendError::InvalidParameter(_))));
    }

    #[test]
    fn resize_over_edge_limit_errors() {
        let params = ResizeParams {
            width: Some(100_000),
            height: Some(100_000),
            fit: FitMode::Fill,
        };
        let result = resize(&gradient(10, 10), &params);
        assert!(matches!(result, Err(BackendError::InvalidParameter(_))));
    }

    #[test]
    fn resize_derived_edge_is_limited_too() {
        // A 1x100 strip widened to the limit would be 1.6M pixels tall.
        let params = ResizeParams {
            width: Some(MAX_EDGE),
            height: None,
            fit: FitMode::Cover,
        };
        assert!(resize(&gradient(1, 100), &params).is_err());
    }
}
