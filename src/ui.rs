//! The single-page front end.
//!
//! Rendered server-side with [maud](https://maud.lambda.xyz/); the embedded
//! script only collects the form into `multipart/form-data`, posts it, and
//! draws the JSON response. Parameter inputs are generated from
//! [`OperationParams`] so the page always starts from the configured
//! defaults.
//!
//! Each input carries `data-op`, `data-field`, and `data-kind` attributes;
//! the script rebuilds the params JSON from them without knowing the
//! operation list itself.

use crate::imaging::{FitMode, OutputFormat, Position};
use crate::request::{Operation, OperationParams};
use maud::{DOCTYPE, Markup, PreEscaped, html};

const CSS: &str = include_str!("../static/app.css");
const JS: &str = include_str!("../static/app.js");

/// How the script should read an input back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Int,
    /// Integer; blank means `null`.
    OptionalInt,
    Float,
    Text,
    Select,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::OptionalInt => "optional-int",
            Self::Float => "float",
            Self::Text | Self::Select => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Field {
    name: &'static str,
    label: &'static str,
    kind: FieldKind,
    value: String,
    /// Options of a `Select`.
    choices: Vec<&'static str>,
}

impl Field {
    fn new(name: &'static str, label: &'static str, kind: FieldKind, value: impl ToString) -> Self {
        Self {
            name,
            label,
            kind,
            value: value.to_string(),
            choices: Vec::new(),
        }
    }

    fn select(
        name: &'static str,
        label: &'static str,
        choices: impl IntoIterator<Item = &'static str>,
        value: &'static str,
    ) -> Self {
        Self {
            choices: choices.into_iter().collect(),
            ..Self::new(name, label, FieldKind::Select, value)
        }
    }
}

fn optional(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Inputs for one operation's parameter section.
fn fields_for(op: Operation, p: &OperationParams) -> Vec<Field> {
    use FieldKind::*;
    match op {
        Operation::Resize => vec![
            Field::new("width", "Width", OptionalInt, optional(p.resize.width)),
            Field::new("height", "Height", OptionalInt, optional(p.resize.height)),
            Field::select("fit", "Fit", FitMode::ALL.map(FitMode::name), p.resize.fit.name()),
        ],
        Operation::Crop => vec![
            Field::new("left", "Left", Int, p.crop.left),
            Field::new("top", "Top", Int, p.crop.top),
            Field::new("width", "Width", Int, p.crop.width),
            Field::new("height", "Height", Int, p.crop.height),
        ],
        Operation::Rotate => vec![Field::new("angle", "Rotation angle", Float, p.rotate.angle)],
        Operation::Watermark => vec![
            Field::new("text", "Text", Text, &p.watermark.text),
            Field::select(
                "position",
                "Position",
                Position::ALL.map(Position::name),
                p.watermark.position.name(),
            ),
            Field::new("size", "Size", Int, p.watermark.size),
            Field::new("color", "Color", Text, &p.watermark.color),
            Field::new("opacity", "Opacity", Float, p.watermark.opacity),
        ],
        Operation::Enhance => vec![
            Field::new("brightness", "Brightness", Float, p.enhance.brightness),
            Field::new("contrast", "Contrast", Float, p.enhance.contrast),
            Field::new("saturation", "Saturation", Float, p.enhance.saturation),
        ],
        Operation::Blur => vec![Field::new("amount", "Blur amount", Float, p.blur.amount)],
        Operation::Format => vec![
            Field::select(
                "type",
                "Format",
                OutputFormat::ALL.map(OutputFormat::name),
                p.format.format.name(),
            ),
            Field::new("quality", "Quality", Int, p.format.quality),
        ],
        Operation::Avatar => vec![Field::new("size", "Avatar size", Int, p.avatar.size)],
        Operation::Grayscale | Operation::Flip | Operation::Flop => Vec::new(),
    }
}

/// Renders the base HTML document structure
fn base_document(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                (content)
                script { (PreEscaped(JS)) }
            }
        }
    }
}

fn render_field(op: Operation, field: &Field) -> Markup {
    let id = format!("{}-{}", op.name(), field.name);
    html! {
        div.field {
            label for=(id) { (field.label) }
            @match field.kind {
                FieldKind::Select => {
                    select id=(id) data-op=(op.name()) data-field=(field.name) data-kind=(field.kind.name()) {
                        @for choice in &field.choices {
                            option value=(choice) selected[*choice == field.value] { (choice) }
                        }
                    }
                }
                FieldKind::Text => {
                    input id=(id) type="text" value=(field.value)
                        data-op=(op.name()) data-field=(field.name) data-kind=(field.kind.name());
                }
                FieldKind::Int | FieldKind::OptionalInt | FieldKind::Float => {
                    input id=(id) type="number" value=(field.value)
                        step=(if field.kind == FieldKind::Float { "any" } else { "1" })
                        data-op=(op.name()) data-field=(field.name) data-kind=(field.kind.name());
                }
            }
        }
    }
}

fn render_operation_params(op: Operation, params: &OperationParams) -> Markup {
    let fields = fields_for(op, params);
    html! {
        @if !fields.is_empty() {
            fieldset.params hidden data-params-for=(op.name()) {
                legend { (op.name()) }
                @for field in &fields {
                    (render_field(op, field))
                }
            }
        }
    }
}

/// Renders the whole page with inputs preset from `defaults`.
pub fn render_page(defaults: &OperationParams) -> Markup {
    let content = html! {
        header.page-header {
            h1 { "imagedesk" }
            p.tagline { "Upload images, chain operations, compare the results." }
        }
        main {
            section.card {
                label.dropzone for="image-upload" {
                    span.dropzone-title { "Click to upload" }
                    span.dropzone-hint {
                        "PNG, JPG, WebP, AVIF, TIFF or GIF (multiple files allowed)"
                    }
                    input id="image-upload" type="file" accept="image/*" multiple hidden;
                }
            }

            section.card id="previews" hidden {
                div.tabs {
                    button.tab.active type="button" data-tab="original" { "Original" }
                    button.tab type="button" data-tab="processed" disabled { "Processed" }
                }
                div.grid id="original-grid" data-panel="original" {}
                div.grid id="processed-grid" data-panel="processed" hidden {}
            }

            section.card {
                form id="process-form" {
                    div.batch-toggle {
                        input id="batch-processing" type="checkbox";
                        label for="batch-processing" { "Enable batch processing" }
                    }
                    div.operations {
                        @for op in Operation::ALL {
                            div.operation {
                                input id=(format!("op-{}", op.name())) type="checkbox"
                                    name="operations" value=(op.name());
                                label for=(format!("op-{}", op.name())) { (op.name()) }
                            }
                        }
                    }
                    @for op in Operation::ALL {
                        (render_operation_params(op, defaults))
                    }
                    p.error id="error-message" hidden {}
                    button.submit type="submit" disabled { "Process images" }
                }
            }

            section.card id="results" hidden {
                h2 { "Image statistics" }
                div.stats-grid id="stats-grid" {}
                h2 { "Dominant colors" }
                div.swatches id="swatches" {}
            }
        }
    };
    base_document("imagedesk", content)
}
