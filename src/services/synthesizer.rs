// src/services/synthesizer.rs
use crate::models::{
    ColorSpec, Element, ElementKind, GeneratedDocument, Layout, LayoutProfile,
    SYNTHESIZED_PROVIDER, parse_css_color,
};
use crate::services::analyzer::ElementAnalyzer;
use std::cmp::Ordering;

/// Header background used when the design has no colored sections.
pub const BRAND_BLUE: &str = "#1a73e8";
pub const FALLBACK_BODY_TEXT: &str =
    "No specific elements found in this design. Replace this block with your own content.";

const LIGHT_TEXT: &str = "#ffffff";
const DARK_TEXT: &str = "#333333";
const MUTED_TEXT: &str = "#999999";
const FOOTER_BACKGROUND: &str = "#f4f4f4";
const DEFAULT_BODY_BACKGROUND: &str = "#ffffff";
const MAX_RENDERED_TEXTS: usize = 3;
const DEFAULT_SPACER_HEIGHT_PX: u32 = 50;
const DEFAULT_IMAGE_HEIGHT_PX: u32 = 300;
const MIN_BODY_WIDTH_PX: u32 = 320;
const MAX_BODY_WIDTH_PX: u32 = 800;
/// Perceived brightness (0-255) under which a color counts as near-black.
const NEAR_BLACK_BRIGHTNESS: f32 = 50.0;

/// Builds an MJML document from layout data alone, without any AI provider.
///
/// This is the terminal link of the generation chain and is total: every
/// layout, including one without elements, yields a compilable document.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSynthesizer;

/// A piece of body markup. Consecutive column content shares one section.
enum Block {
    Content(String),
    Section(String),
}

impl TemplateSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(&self, layout: &Layout, source_name: &str) -> GeneratedDocument {
        let mut elements: Vec<&Element> = layout.elements.iter().filter(|e| e.visible).collect();
        elements.sort_by(|a, b| position_order(a, b));

        let profile = ElementAnalyzer::analyze(elements.iter().copied());

        let primary_color = profile
            .primary_colors
            .first()
            .cloned()
            .unwrap_or_else(|| BRAND_BLUE.to_string());
        let text_color = contrast_text_color(&primary_color);
        let body_width = layout.width.clamp(MIN_BODY_WIDTH_PX, MAX_BODY_WIDTH_PX);
        let title = if layout.name.trim().is_empty() {
            "Untitled design"
        } else {
            layout.name.trim()
        };

        let background = layout
            .background_color
            .as_ref()
            .filter(|c| !c.is_transparent())
            .map(ColorSpec::to_css)
            .unwrap_or_else(|| DEFAULT_BODY_BACKGROUND.to_string());

        let mut out = String::with_capacity(4096);
        out.push_str("<mjml>\n  <mj-head>\n");
        out.push_str(&format!("    <mj-title>{}</mj-title>\n", escape_text(title)));
        out.push_str("    <mj-attributes>\n");
        out.push_str("      <mj-all font-family=\"Arial, Helvetica, sans-serif\" />\n");
        out.push_str(&format!(
            "      <mj-text font-size=\"14px\" line-height=\"1.5\" color=\"{DARK_TEXT}\" />\n"
        ));
        out.push_str("    </mj-attributes>\n  </mj-head>\n");
        out.push_str(&format!(
            "  <mj-body background-color=\"{}\" width=\"{body_width}px\">\n",
            escape_attr(&background)
        ));

        out.push_str(&header_section(title, &primary_color, text_color));
        let blocks = body_blocks(&elements, &profile, &primary_color, text_color, body_width);
        for block in merge_blocks(blocks) {
            out.push_str(&block);
        }
        out.push_str(&footer_section(layout, source_name, &profile));

        out.push_str("  </mj-body>\n</mjml>\n");

        GeneratedDocument {
            source_provider: SYNTHESIZED_PROVIDER.to_string(),
            used_fallback: true,
            raw: out,
        }
    }
}

/// Top-to-bottom, then left-to-right. Elements without bounds keep their order
/// after positioned ones.
fn position_order(a: &Element, b: &Element) -> Ordering {
    match (a.bounds, b.bounds) {
        (Some(a), Some(b)) => a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Two buckets only: white on near-black, dark gray on everything else.
pub fn contrast_text_color(background: &str) -> &'static str {
    match parse_css_color(background) {
        Some((r, g, b, _)) => {
            let brightness =
                (299.0 * f32::from(r) + 587.0 * f32::from(g) + 114.0 * f32::from(b)) / 1000.0;
            if brightness < NEAR_BLACK_BRIGHTNESS {
                LIGHT_TEXT
            } else {
                DARK_TEXT
            }
        }
        None => DARK_TEXT,
    }
}

fn header_section(title: &str, primary_color: &str, text_color: &str) -> String {
    format!(
        "    <mj-section background-color=\"{}\" padding-top=\"24px\" padding-bottom=\"24px\">\n\
         \x20     <mj-column>\n\
         \x20       <mj-text align=\"center\" font-size=\"28px\" font-weight=\"700\" color=\"{text_color}\">{}</mj-text>\n\
         \x20     </mj-column>\n\
         \x20   </mj-section>\n",
        escape_attr(primary_color),
        escape_text(title)
    )
}

fn body_blocks(
    elements: &[&Element],
    profile: &LayoutProfile,
    primary_color: &str,
    text_color: &str,
    body_width: u32,
) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut rendered_texts = 0;

    for element in elements {
        match &element.kind {
            ElementKind::Text {
                text,
                font_size_px,
                font_weight,
                color,
            } => {
                if rendered_texts >= MAX_RENDERED_TEXTS {
                    continue;
                }
                rendered_texts += 1;
                blocks.push(Block::Content(format!(
                    "        <mj-text font-size=\"{}\" font-weight=\"{}\" color=\"{}\">{}</mj-text>\n",
                    px(sanitize_font_size(*font_size_px)),
                    font_weight,
                    escape_attr(&color.to_css()),
                    render_text(text)
                )));
            }
            ElementKind::ImageRef { .. } => {}
            ElementKind::ColoredBox { background_color } if !background_color.is_transparent() => {
                blocks.push(Block::Section(colored_block(element, &background_color.to_css())));
            }
            ElementKind::ColoredBox { .. } | ElementKind::Other => {
                blocks.push(Block::Content(spacer(element)));
            }
        }
    }

    if profile.text_elements.is_empty() {
        blocks.push(Block::Content(format!(
            "        <mj-text align=\"center\" color=\"{MUTED_TEXT}\">{FALLBACK_BODY_TEXT}</mj-text>\n"
        )));
    }

    if profile.has_colored_sections {
        let count = profile.colored_elements.len();
        let noun = if count == 1 { "section" } else { "sections" };
        blocks.push(Block::Content(format!(
            "        <mj-text>This design contains {count} colored {noun} using {}.</mj-text>\n",
            escape_text(&profile.primary_colors.join(", "))
        )));
    }

    if profile.has_images {
        let image_bounds = elements
            .iter()
            .find(|e| matches!(e.kind, ElementKind::ImageRef { .. }))
            .and_then(|e| e.bounds);
        let content_width = body_width.saturating_sub(50).max(1);
        let width = image_bounds
            .map(|b| round_px(b.width).clamp(1, content_width))
            .unwrap_or(content_width);
        let height = image_bounds
            .map(|b| round_px(b.height).max(1))
            .unwrap_or(DEFAULT_IMAGE_HEIGHT_PX);
        blocks.push(Block::Content(format!(
            "        <mj-image src=\"https://placehold.co/{width}x{height}?text=Image\" alt=\"Image placeholder\" width=\"{width}px\" />\n"
        )));
    }

    blocks.push(Block::Content(format!(
        "        <mj-button background-color=\"{}\" color=\"{text_color}\" href=\"#\">Learn more</mj-button>\n",
        escape_attr(primary_color)
    )));

    blocks
}

fn merge_blocks(blocks: Vec<Block>) -> Vec<String> {
    let mut sections = Vec::new();
    let mut pending = String::new();

    let flush = |pending: &mut String, sections: &mut Vec<String>| {
        if !pending.is_empty() {
            sections.push(format!(
                "    <mj-section padding-top=\"20px\" padding-bottom=\"20px\">\n      <mj-column>\n{}      </mj-column>\n    </mj-section>\n",
                pending
            ));
            pending.clear();
        }
    };

    for block in blocks {
        match block {
            Block::Content(markup) => pending.push_str(&markup),
            Block::Section(markup) => {
                flush(&mut pending, &mut sections);
                sections.push(markup);
            }
        }
    }
    flush(&mut pending, &mut sections);
    sections
}

fn colored_block(element: &Element, background: &str) -> String {
    let label = element
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("Colored section");
    format!(
        "    <mj-section background-color=\"{}\" padding-top=\"20px\" padding-bottom=\"20px\">\n\
         \x20     <mj-column>\n\
         \x20       <mj-text align=\"center\" color=\"{}\">{}</mj-text>\n\
         \x20     </mj-column>\n\
         \x20   </mj-section>\n",
        escape_attr(background),
        contrast_text_color(background),
        escape_text(label)
    )
}

fn spacer(element: &Element) -> String {
    let height = element
        .bounds
        .map(|b| round_px(b.height).max(1))
        .unwrap_or(DEFAULT_SPACER_HEIGHT_PX);
    format!("        <mj-spacer height=\"{height}px\" />\n")
}

fn footer_section(layout: &Layout, source_name: &str, profile: &LayoutProfile) -> String {
    let source = if source_name.trim().is_empty() {
        "unknown source"
    } else {
        source_name.trim()
    };
    format!(
        "    <mj-section background-color=\"{FOOTER_BACKGROUND}\" padding-top=\"16px\" padding-bottom=\"16px\">\n\
         \x20     <mj-column>\n\
         \x20       <mj-text align=\"center\" font-size=\"12px\" color=\"{MUTED_TEXT}\">Generated automatically from your design.</mj-text>\n\
         \x20       <mj-text align=\"center\" font-size=\"11px\" color=\"{MUTED_TEXT}\">Source: {} | {}x{}px | Layout: {} | Elements: {}</mj-text>\n\
         \x20     </mj-column>\n\
         \x20   </mj-section>\n",
        escape_text(source),
        layout.width,
        layout.height,
        profile.layout_type,
        profile.element_count
    )
}

fn sanitize_font_size(size: f32) -> f32 {
    if size.is_finite() && size > 0.0 {
        size
    } else {
        crate::models::DEFAULT_FONT_SIZE_PX
    }
}

fn round_px(value: f32) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(u32::MAX as f32) as u32
    } else {
        0
    }
}

fn px(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{}px", value as u32)
    } else {
        format!("{:.1}px", value)
    }
}

fn render_text(text: &str) -> String {
    escape_text(text.trim()).replace('\n', "<br />")
}

pub(crate) fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(crate) fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
