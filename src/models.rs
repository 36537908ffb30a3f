// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const DEFAULT_FONT_SIZE_PX: f32 = 14.0;
pub const DEFAULT_FONT_WEIGHT: u16 = 400;
pub const DEFAULT_TEXT_COLOR: &str = "#333333";
pub const DEFAULT_FRAME_WIDTH: u32 = 600;
pub const DEFAULT_FRAME_HEIGHT: u32 = 800;

/// Provenance tag for documents built by the template synthesizer.
pub const SYNTHESIZED_PROVIDER: &str = "synthesized";

/// The unit of work handed to generation: one frame plus where it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDescription {
    pub source_name: String,
    pub frame: Layout,
    /// Raw bytes of an uploaded design image, forwarded to vision-capable providers.
    #[serde(skip)]
    pub reference_image: Option<ReferenceImage>,
}

impl LayoutDescription {
    pub fn new(source_name: impl Into<String>, frame: Layout) -> Self {
        Self {
            source_name: source_name.into(),
            frame,
            reference_image: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub media_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default = "default_layout_name")]
    pub name: String,
    #[serde(default = "default_frame_width")]
    pub width: u32,
    #[serde(default = "default_frame_height")]
    pub height: u32,
    #[serde(default)]
    pub background_color: Option<ColorSpec>,
    #[serde(default)]
    pub elements: Vec<Element>,
}

fn default_layout_name() -> String {
    "Untitled".to_string()
}

fn default_frame_width() -> u32 {
    DEFAULT_FRAME_WIDTH
}

fn default_frame_height() -> u32 {
    DEFAULT_FRAME_HEIGHT
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A single design node. `kind` is a closed set; unrecognised tags land on `Other`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    #[serde(flatten)]
    pub kind: ElementKind,
    #[serde(default)]
    pub bounds: Option<Bounds>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ElementKind {
    #[serde(alias = "text", alias = "TEXT")]
    #[serde(rename_all = "camelCase")]
    Text {
        #[serde(default)]
        text: String,
        #[serde(default = "default_font_size")]
        font_size_px: f32,
        #[serde(default = "default_font_weight")]
        font_weight: u16,
        #[serde(default)]
        color: ColorSpec,
    },
    #[serde(alias = "image", alias = "IMAGE", alias = "imageRef")]
    #[serde(rename_all = "camelCase")]
    ImageRef {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_ref: Option<String>,
    },
    #[serde(alias = "coloredBox", alias = "box", alias = "RECTANGLE")]
    #[serde(rename_all = "camelCase")]
    ColoredBox { background_color: ColorSpec },
    #[serde(other)]
    Other,
}

fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE_PX
}

fn default_font_weight() -> u16 {
    DEFAULT_FONT_WEIGHT
}

impl Element {
    fn with_kind(kind: ElementKind) -> Self {
        Self {
            kind,
            bounds: None,
            visible: true,
            name: None,
        }
    }

    pub fn text(text: impl Into<String>, font_size_px: f32) -> Self {
        Self::with_kind(ElementKind::Text {
            text: text.into(),
            font_size_px,
            font_weight: DEFAULT_FONT_WEIGHT,
            color: ColorSpec::default(),
        })
    }

    pub fn image() -> Self {
        Self::with_kind(ElementKind::ImageRef { image_ref: None })
    }

    pub fn colored_box(background_color: ColorSpec) -> Self {
        Self::with_kind(ElementKind::ColoredBox { background_color })
    }

    pub fn other() -> Self {
        Self::with_kind(ElementKind::Other)
    }

    pub fn with_bounds(mut self, x: f32, y: f32, width: f32, height: f32) -> Self {
        self.bounds = Some(Bounds {
            x,
            y,
            width,
            height,
        });
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            ElementKind::Text { .. } => "text",
            ElementKind::ImageRef { .. } => "image",
            ElementKind::ColoredBox { .. } => "colored box",
            ElementKind::Other => "shape",
        }
    }
}

/// Either RGBA components in the unit range (as design tools export them) or a CSS color string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Rgba {
        r: f32,
        g: f32,
        b: f32,
        #[serde(default = "default_alpha")]
        a: f32,
    },
    Css(String),
}

fn default_alpha() -> f32 {
    1.0
}

impl Default for ColorSpec {
    fn default() -> Self {
        ColorSpec::Css(DEFAULT_TEXT_COLOR.to_string())
    }
}

impl ColorSpec {
    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        ColorSpec::Rgba { r, g, b, a }
    }

    pub fn css(value: impl Into<String>) -> Self {
        ColorSpec::Css(value.into())
    }

    /// Normalized CSS form: `rgb(r,g,b)`, `rgba(r,g,b,a)` or the trimmed CSS string.
    pub fn to_css(&self) -> String {
        match self {
            ColorSpec::Rgba { r, g, b, a } => {
                let (r, g, b) = (unit_to_byte(*r), unit_to_byte(*g), unit_to_byte(*b));
                let a = clamp_unit(*a);
                if a >= 1.0 {
                    format!("rgb({r},{g},{b})")
                } else {
                    format!("rgba({r},{g},{b},{})", (a * 100.0).round() / 100.0)
                }
            }
            ColorSpec::Css(value) => value.trim().to_string(),
        }
    }

    pub fn is_transparent(&self) -> bool {
        match self {
            ColorSpec::Rgba { a, .. } => clamp_unit(*a) <= 0.0,
            ColorSpec::Css(value) => {
                let value = value.trim();
                value.is_empty()
                    || value.eq_ignore_ascii_case("transparent")
                    || value.eq_ignore_ascii_case("none")
                    || parse_css_color(value).is_some_and(|(_, _, _, a)| a <= 0.0)
            }
        }
    }

    /// 8-bit channels, when the color can be resolved.
    pub fn channels(&self) -> Option<(u8, u8, u8)> {
        match self {
            ColorSpec::Rgba { r, g, b, .. } => {
                Some((unit_to_byte(*r), unit_to_byte(*g), unit_to_byte(*b)))
            }
            ColorSpec::Css(value) => parse_css_color(value).map(|(r, g, b, _)| (r, g, b)),
        }
    }
}

impl fmt::Display for ColorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn unit_to_byte(value: f32) -> u8 {
    (clamp_unit(value) * 255.0).round() as u8
}

/// Resolves `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()` and a few keywords.
pub fn parse_css_color(value: &str) -> Option<(u8, u8, u8, f32)> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "black" => return Some((0, 0, 0, 1.0)),
        "white" => return Some((255, 255, 255, 1.0)),
        "transparent" => return Some((0, 0, 0, 0.0)),
        _ => {}
    }

    if let Some(hex) = value.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;
        return match digits.len() {
            3 | 4 => {
                let alpha = digits.get(3).map_or(1.0, |d| f32::from(d * 17) / 255.0);
                Some((digits[0] * 17, digits[1] * 17, digits[2] * 17, alpha))
            }
            6 | 8 => {
                let byte = |i: usize| digits[i] * 16 + digits[i + 1];
                let alpha = if digits.len() == 8 {
                    f32::from(byte(6)) / 255.0
                } else {
                    1.0
                };
                Some((byte(0), byte(2), byte(4), alpha))
            }
            _ => None,
        };
    }

    let inner = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| s.parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8);
    let alpha = match parts.get(3) {
        Some(a) => a.parse::<f32>().ok()?.clamp(0.0, 1.0),
        None => 1.0,
    };
    Some((channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, alpha))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSummary {
    pub text: String,
    pub font_size_px: f32,
    pub color: String,
    pub font_weight: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColoredSummary {
    pub background_color: String,
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutType {
    RichContent,
    TextFocused,
    ImageFocused,
    #[default]
    Minimal,
}

impl LayoutType {
    /// Earlier rules win when several apply.
    pub fn classify(has_text: bool, has_images: bool, has_colored_sections: bool) -> Self {
        if has_text && has_images && has_colored_sections {
            LayoutType::RichContent
        } else if has_text && has_colored_sections {
            LayoutType::TextFocused
        } else if has_images {
            LayoutType::ImageFocused
        } else {
            LayoutType::Minimal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutType::RichContent => "rich-content",
            LayoutType::TextFocused => "text-focused",
            LayoutType::ImageFocused => "image-focused",
            LayoutType::Minimal => "minimal",
        }
    }
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutProfile {
    pub has_text: bool,
    pub has_images: bool,
    pub has_colored_sections: bool,
    pub text_elements: Vec<TextSummary>,
    pub colored_elements: Vec<ColoredSummary>,
    pub primary_colors: Vec<String>,
    pub element_count: usize,
    pub layout_type: LayoutType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDocument {
    pub source_provider: String,
    pub used_fallback: bool,
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    InvalidAttribute,
    PaddingShorthand,
    InvalidNesting,
    MissingAltText,
    /// Reported by the compiler rather than the local rules.
    CompilerWarning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub kind: IssueKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub corrected_document: String,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptError {
    pub provider: String,
    pub error_message: String,
}

/// What the fallback chain produced for one request.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub document: GeneratedDocument,
    pub provider_used: String,
    pub used_fallback: bool,
    pub attempt_errors: Vec<AttemptError>,
    pub usage: Option<TokenUsage>,
}

// HTTP boundary

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaConvertRequest {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub providers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConvertRequest {
    pub layout: LayoutDescription,
    #[serde(default)]
    pub providers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRequest {
    pub mjml: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub success: bool,
    pub mjml: String,
    pub html: String,
    pub used_fallback: bool,
    pub metadata: ConversionMetadata,
    pub validation: ValidationSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionMetadata {
    pub request_id: Uuid,
    pub processing_time_ms: u64,
    pub ai_used: bool,
    pub provider_used: String,
    pub attempt_errors: Vec<AttemptError>,
    pub source_name: String,
    pub layout_type: LayoutType,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub is_valid: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}
