//! CLI output formatting.
//!
//! Every image is shown by its positional index and source name, with
//! what was measured on it as indented context lines:
//!
//! ```text
//! 001 beach.jpg → out/beach-processed.webp
//!     Format: webp, 48.2 KiB
//!     Dimensions: 800 × 600 (1.33)
//!     Alpha: no, color space: srgb, 3 channels
//!     Dominant color: #5a7fa3
//!
//! Processed 1 image: resize → grayscale → format
//! ```
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::{ImageStats, Rgb};
use crate::request::Operation;
use std::path::Path;

/// One image's worth of output.
#[derive(Debug, Clone, Copy)]
pub struct FileReport<'a> {
    /// Name the image was read from.
    pub source: &'a str,
    /// Where the processed image was written, if anywhere.
    pub output: Option<&'a Path>,
    pub stats: &'a ImageStats,
    pub dominant_color: Rgb,
}

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count (binary units).
pub fn format_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.2} MiB", b / (KIB * KIB))
    }
}

/// The indented stat lines shared by `process` and `stats`.
pub fn format_stats_lines(stats: &ImageStats, dominant_color: Rgb) -> Vec<String> {
    let pad = indent(1);
    vec![
        format!("{pad}Format: {}, {}", stats.format, format_bytes(stats.size)),
        format!(
            "{pad}Dimensions: {} × {} ({:.2})",
            stats.width, stats.height, stats.aspect_ratio
        ),
        format!(
            "{pad}Alpha: {}, color space: {}, {} channel{}",
            if stats.has_alpha { "yes" } else { "no" },
            stats.color_space,
            stats.channels,
            if stats.channels == 1 { "" } else { "s" }
        ),
        format!("{pad}Dominant color: {dominant_color}"),
    ]
}

fn report_lines(index: usize, report: &FileReport) -> Vec<String> {
    let header = match report.output {
        Some(path) => format!(
            "{} {} → {}",
            format_index(index),
            report.source,
            path.display()
        ),
        None => format!("{} {}", format_index(index), report.source),
    };
    let mut lines = vec![header];
    lines.extend(format_stats_lines(report.stats, report.dominant_color));
    lines
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "image" } else { "images" }
}

/// Output of `imagedesk process`.
pub fn format_process_output(
    reports: &[FileReport],
    operations: &[Operation],
    batch: bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, report) in reports.iter().enumerate() {
        lines.extend(report_lines(i + 1, report));
    }
    lines.push(String::new());

    let ops = if operations.is_empty() {
        "no operations".to_string()
    } else {
        operations
            .iter()
            .map(|op| op.name())
            .collect::<Vec<_>>()
            .join(" → ")
    };
    let mode = if batch { " (batch)" } else { "" };
    lines.push(format!(
        "Processed {} {}{mode}: {ops}",
        reports.len(),
        plural(reports.len())
    ));
    lines
}

pub fn print_process_output(reports: &[FileReport], operations: &[Operation], batch: bool) {
    for line in format_process_output(reports, operations, batch) {
        println!("{}", line);
    }
}

/// Output of `imagedesk stats`.
pub fn format_stats_output(reports: &[FileReport]) -> Vec<String> {
    reports
        .iter()
        .enumerate()
        .flat_map(|(i, report)| report_lines(i + 1, report))
        .collect()
}

pub fn print_stats_output(reports: &[FileReport]) {
    for line in format_stats_output(reports) {
        println!("{}", line);
    }
}
