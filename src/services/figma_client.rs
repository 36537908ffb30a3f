// src/services/figma_client.rs
use crate::errors::MailSketchError;
use crate::models::{
    Bounds, ColorSpec, DEFAULT_FONT_SIZE_PX, DEFAULT_FONT_WEIGHT, DEFAULT_FRAME_HEIGHT,
    DEFAULT_FRAME_WIDTH, Element, ElementKind, Layout,
    LayoutDescription,
};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

const FRAME_TYPES: &[&str] = &["FRAME", "COMPONENT", "COMPONENT_SET", "INSTANCE"];

#[derive(Error, Debug)]
pub enum FigmaError {
    #[error("Figma access token not configured")]
    MissingToken,

    #[error("Invalid Figma file id '{0}'")]
    InvalidFileId(String),

    #[error("Figma request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Figma API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Figma file '{0}' contains no frames")]
    NoFrames(String),

    #[error("Unreadable Figma response: {0}")]
    Malformed(String),
}

impl FigmaError {
    /// HTTP-like status for the failure; transport problems count as a bad gateway.
    pub fn status(&self) -> u16 {
        match self {
            FigmaError::MissingToken => 500,
            FigmaError::InvalidFileId(_) => 400,
            FigmaError::Api { status, .. } => *status,
            FigmaError::NoFrames(_) => 422,
            FigmaError::Network(_) | FigmaError::Malformed(_) => 502,
        }
    }
}

impl From<FigmaError> for MailSketchError {
    fn from(err: FigmaError) -> Self {
        match err {
            FigmaError::MissingToken => MailSketchError::Configuration(err.to_string()),
            FigmaError::InvalidFileId(_) | FigmaError::NoFrames(_) => {
                MailSketchError::Validation(err.to_string())
            }
            other => MailSketchError::DesignSource {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

/// Figma file keys are alphanumeric with `-` and `_`.
fn is_valid_file_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[derive(Debug, Deserialize)]
pub struct FigmaFile {
    #[serde(default)]
    pub name: String,
    pub document: FigmaNode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
    #[serde(default)]
    pub absolute_bounding_box: Option<FigmaRect>,
    #[serde(default)]
    pub fills: Vec<FigmaPaint>,
    #[serde(default)]
    pub background_color: Option<FigmaColor>,
    #[serde(default)]
    pub characters: Option<String>,
    #[serde(default)]
    pub style: Option<FigmaTypeStyle>,
    #[serde(default)]
    pub children: Vec<FigmaNode>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FigmaRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaPaint {
    #[serde(rename = "type")]
    pub paint_type: String,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
    #[serde(default)]
    pub opacity: Option<f32>,
    #[serde(default)]
    pub color: Option<FigmaColor>,
    #[serde(default)]
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FigmaColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "opaque")]
    pub a: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaTypeStyle {
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub font_weight: Option<f32>,
}

fn visible_by_default() -> bool {
    true
}

fn opaque() -> f32 {
    1.0
}

impl FigmaNode {
    fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }

    fn visible_fills(&self) -> impl Iterator<Item = &FigmaPaint> {
        self.fills.iter().filter(|f| f.visible)
    }

    fn solid_fill(&self) -> Option<ColorSpec> {
        self.visible_fills()
            .find(|f| f.paint_type == "SOLID")
            .and_then(|f| {
                f.color.map(|c| {
                    ColorSpec::rgba(c.r, c.g, c.b, c.a * f.opacity.unwrap_or(1.0))
                })
            })
    }

    fn image_fill(&self) -> Option<&FigmaPaint> {
        self.visible_fills().find(|f| f.paint_type == "IMAGE")
    }
}

/// Thin client for the Figma REST API (`GET /v1/files/{key}`).
pub struct FigmaClient {
    token: Option<String>,
    base_url: String,
    client: Client,
}

impl FigmaClient {
    pub fn new(token: Option<String>, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    pub async fn fetch_layout(&self, file_id: &str) -> Result<LayoutDescription, FigmaError> {
        if !is_valid_file_id(file_id) {
            return Err(FigmaError::InvalidFileId(file_id.to_string()));
        }
        let token = self.token.as_ref().ok_or(FigmaError::MissingToken)?;

        info!("Fetching Figma file {}", file_id);
        let response = self
            .client
            .get(format!("{}/v1/files/{}", self.base_url, file_id))
            .header("X-Figma-Token", token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v["err"]
                        .as_str()
                        .or_else(|| v["message"].as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(FigmaError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let file: FigmaFile = response
            .json()
            .await
            .map_err(|e| FigmaError::Malformed(e.to_string()))?;
        layout_from_file(&file)
    }
}

/// Picks the top-level frame with the most descendants (first one on ties) and
/// flattens it into a layout.
pub fn layout_from_file(file: &FigmaFile) -> Result<LayoutDescription, FigmaError> {
    let mut best: Option<(&FigmaNode, usize)> = None;
    for page in &file.document.children {
        for node in page
            .children
            .iter()
            .filter(|n| FRAME_TYPES.contains(&n.node_type.as_str()))
        {
            let count = node.descendant_count();
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((node, count));
            }
        }
    }
    let (frame, count) = best.ok_or_else(|| FigmaError::NoFrames(file.name.clone()))?;
    debug!("Selected frame '{}' ({} descendants)", frame.name, count);

    let origin = frame.absolute_bounding_box;
    let mut elements = Vec::new();
    for child in &frame.children {
        flatten(child, origin, &mut elements);
    }

    let (width, height) = origin
        .map(|r| (r.width.round().max(1.0) as u32, r.height.round().max(1.0) as u32))
        .unwrap_or((DEFAULT_FRAME_WIDTH, DEFAULT_FRAME_HEIGHT));

    let background_color = frame.solid_fill().or_else(|| {
        frame
            .background_color
            .map(|c| ColorSpec::rgba(c.r, c.g, c.b, c.a))
    });

    let source_name = if file.name.is_empty() {
        frame.name.clone()
    } else {
        file.name.clone()
    };

    Ok(LayoutDescription::new(
        source_name,
        Layout {
            name: frame.name.clone(),
            width,
            height,
            background_color,
            elements,
        },
    ))
}

fn flatten(node: &FigmaNode, origin: Option<FigmaRect>, out: &mut Vec<Element>) {
    let bounds = match (node.absolute_bounding_box, origin) {
        (Some(rect), Some(origin)) => Some(Bounds {
            x: rect.x - origin.x,
            y: rect.y - origin.y,
            width: rect.width,
            height: rect.height,
        }),
        (Some(rect), None) => Some(Bounds {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }),
        _ => None,
    };

    let kind = if node.node_type == "TEXT" {
        let style = node.style.as_ref();
        Some(ElementKind::Text {
            text: node.characters.clone().unwrap_or_default(),
            font_size_px: style
                .and_then(|s| s.font_size)
                .unwrap_or(DEFAULT_FONT_SIZE_PX),
            font_weight: style
                .and_then(|s| s.font_weight)
                .map(|w| w.round() as u16)
                .unwrap_or(DEFAULT_FONT_WEIGHT),
            color: node.solid_fill().unwrap_or_default(),
        })
    } else if let Some(paint) = node.image_fill() {
        Some(ElementKind::ImageRef {
            image_ref: paint.image_ref.clone(),
        })
    } else if let Some(color) = node.solid_fill() {
        Some(ElementKind::ColoredBox {
            background_color: color,
        })
    } else if node.children.is_empty() || !node.visible {
        Some(ElementKind::Other)
    } else {
        None
    };

    if let Some(kind) = kind {
        out.push(Element {
            kind,
            bounds,
            visible: node.visible,
            name: (!node.name.is_empty()).then(|| node.name.clone()),
        });
    }

    // Hidden subtrees contribute nothing beyond the hidden marker itself.
    if !node.visible || node.node_type == "TEXT" {
        return;
    }
    for child in &node.children {
        flatten(child, origin, out);
    }
}
