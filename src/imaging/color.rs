//! Color parsing and dominant-color extraction.

use image::DynamicImage;
use serde::{Serialize, Serializer};
use std::fmt;

/// An opaque 8-bit sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lowercase `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// A color with straight (non-premultiplied) alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

const NAMED_COLORS: &[(&str, Rgba)] = &[
    ("white", Rgba::opaque(255, 255, 255)),
    ("black", Rgba::opaque(0, 0, 0)),
    ("red", Rgba::opaque(255, 0, 0)),
    ("green", Rgba::opaque(0, 128, 0)),
    ("lime", Rgba::opaque(0, 255, 0)),
    ("blue", Rgba::opaque(0, 0, 255)),
    ("yellow", Rgba::opaque(255, 255, 0)),
    ("cyan", Rgba::opaque(0, 255, 255)),
    ("magenta", Rgba::opaque(255, 0, 255)),
    ("gray", Rgba::opaque(128, 128, 128)),
    ("grey", Rgba::opaque(128, 128, 128)),
    ("silver", Rgba::opaque(192, 192, 192)),
    ("orange", Rgba::opaque(255, 165, 0)),
    ("purple", Rgba::opaque(128, 0, 128)),
    ("pink", Rgba::opaque(255, 192, 203)),
    ("brown", Rgba::opaque(165, 42, 42)),
    ("navy", Rgba::opaque(0, 0, 128)),
    ("transparent", Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    }),
];

/// Parse `#rgb`, `#rrggbb`, `#rrggbbaa` (leading `#` optional) or a basic
/// CSS color name.
pub fn parse_color(input: &str) -> Result<Rgba, String> {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();
    if let Some((_, color)) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
        return Ok(*color);
    }

    let hex = lower.trim_start_matches('#');
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    let parsed = match hex.len() {
        3 => {
            let mut digits = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            match (digits.next(), digits.next(), digits.next()) {
                (Some(Some(r)), Some(Some(g)), Some(Some(b))) => Some(Rgba::opaque(r, g, b)),
                _ => None,
            }
        }
        6 | 8 if hex.is_ascii() => {
            let a = if hex.len() == 8 { channel(&hex[6..8]) } else { Some(255) };
            match (channel(&hex[0..2]), channel(&hex[2..4]), channel(&hex[4..6]), a) {
                (Some(r), Some(g), Some(b), Some(a)) => Some(Rgba { r, g, b, a }),
                _ => None,
            }
        }
        _ => None,
    };
    parsed.ok_or_else(|| format!("unrecognized color: {trimmed:?}"))
}

/// Pixels sampled per axis when estimating the dominant color.
const SAMPLE_GRID: u32 = 128;

/// Find the most common color of an image.
///
/// Sampled opaque pixels are binned into a 16×16×16 histogram; the result is
/// the mean color of the fullest bin, so it is an actual color of the image
/// rather than a bin corner. Images with no opaque pixel report black.
pub fn dominant_color_of(image: &DynamicImage) -> Rgb {
    let rgba = image.to_rgba8();
    let (w, h) = rgba.dimensions();
    if w == 0 || h == 0 {
        return Rgb::default();
    }
    let step_x = (w / SAMPLE_GRID).max(1);
    let step_y = (h / SAMPLE_GRID).max(1);

    // count, r_sum, g_sum, b_sum per bin
    let mut bins = vec![[0u64; 4]; 4096];
    for y in (0..h).step_by(step_y as usize) {
        for x in (0..w).step_by(step_x as usize) {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            if a < 128 {
                continue;
            }
            let idx = ((r as usize >> 4) << 8) | ((g as usize >> 4) << 4) | (b as usize >> 4);
            let bin = &mut bins[idx];
            bin[0] += 1;
            bin[1] += r as u64;
            bin[2] += g as u64;
            bin[3] += b as u64;
        }
    }

    // First fullest bin wins ties, so the result is deterministic.
    let mut best: Option<&[u64; 4]> = None;
    for bin in &bins {
        if bin[0] > best.map_or(0, |b| b[0]) {
            best = Some(bin);
        }
    }
    match best {
        Some([count, r, g, b]) => Rgb::new(
            (r / count) as u8,
            (g / count) as u8,
            (b / count) as u8,
        ),
        None => Rgb::default(),
    }
}
