// src/services/providers/prompt.rs
use crate::models::{Element, ElementKind, LayoutDescription};
use crate::services::analyzer::ElementAnalyzer;
use crate::services::providers::ProviderError;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_LISTED_ELEMENTS: usize = 50;
const MAX_TEXT_CHARS: usize = 100;

pub const SYSTEM_PROMPT: &str = r#"You are an expert email developer. Convert the design description you are given into a complete, responsive MJML document.

Rules:
- Return one document wrapped in a ```mjml fenced code block, starting with <mjml> and ending with </mjml>.
- Every mj-section contains mj-column elements; never put an mj-section or mj-wrapper inside an mj-column.
- Do not use border-radius on mj-text. Round corners through a css-class on the enclosing column instead.
- Write padding as explicit padding-top, padding-right, padding-bottom and padding-left attributes.
- Every mj-image has a descriptive alt attribute. Use https://placehold.co placeholders for images.
- Keep the body width at or below 600px and use web-safe fonts.
- Reproduce the text content exactly as given, in the given order."#;

static FENCED_MJML: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```[ \t]*mjml[^\n]*\n(.*?)```").expect("fenced block regex should be valid")
});

static MJML_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<mjml(?:\s[^>]*)?>.*?</mjml>").expect("mjml span regex should be valid")
});

/// Natural-language summary of the frame followed by an element inventory.
pub fn build_user_prompt(layout: &LayoutDescription) -> String {
    let frame = &layout.frame;
    let visible: Vec<&Element> = frame.elements.iter().filter(|e| e.visible).collect();
    let profile = ElementAnalyzer::analyze(visible.iter().copied());

    let mut prompt = String::with_capacity(2048);
    prompt.push_str(&format!(
        "Create an MJML email from the design \"{}\".\n\n",
        layout.source_name
    ));
    prompt.push_str(&format!(
        "Frame: \"{}\", {}x{}px\n",
        frame.name, frame.width, frame.height
    ));
    if let Some(background) = frame.background_color.as_ref().filter(|c| !c.is_transparent()) {
        prompt.push_str(&format!("Background color: {}\n", background.to_css()));
    }
    prompt.push_str(&format!(
        "Layout type: {} ({} text, {} colored sections, images: {})\n",
        profile.layout_type,
        profile.text_elements.len(),
        profile.colored_elements.len(),
        if profile.has_images { "yes" } else { "no" }
    ));
    if !profile.primary_colors.is_empty() {
        prompt.push_str(&format!(
            "Brand colors: {}\n",
            profile.primary_colors.join(", ")
        ));
    }
    if layout.reference_image.is_some() {
        prompt.push_str("The attached image shows the original design.\n");
    }

    prompt.push_str("\nElements (top to bottom as discovered):\n");
    if visible.is_empty() {
        prompt.push_str("- none; produce a simple, clean single-column email\n");
    }
    for (index, element) in visible.iter().take(MAX_LISTED_ELEMENTS).enumerate() {
        let position = element
            .bounds
            .map(|b| {
                format!(
                    " at ({}, {}) {}x{}",
                    b.x.round(),
                    b.y.round(),
                    b.width.round(),
                    b.height.round()
                )
            })
            .unwrap_or_default();
        let detail = match &element.kind {
            ElementKind::Text {
                text,
                font_size_px,
                font_weight,
                color,
            } => format!(
                ": \"{}\" ({}px, weight {}, color {})",
                truncate(text, MAX_TEXT_CHARS),
                font_size_px,
                font_weight,
                color.to_css()
            ),
            ElementKind::ColoredBox { background_color } => {
                format!(": background {}", background_color.to_css())
            }
            ElementKind::ImageRef { .. } | ElementKind::Other => String::new(),
        };
        prompt.push_str(&format!(
            "{}. {}{}{}\n",
            index + 1,
            element.kind_label(),
            position,
            detail
        ));
    }
    if visible.len() > MAX_LISTED_ELEMENTS {
        prompt.push_str(&format!(
            "... and {} more elements\n",
            visible.len() - MAX_LISTED_ELEMENTS
        ));
    }
    prompt
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim().replace('\n', " ");
    if text.chars().count() <= max_chars {
        text
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Pulls the document out of a model reply: a ```mjml block, else an
/// `<mjml>...</mjml>` span, else the whole reply.
pub fn extract_mjml(provider: &str, response: &str) -> Result<String, ProviderError> {
    if let Some(captures) = FENCED_MJML.captures(response) {
        let block = captures[1].trim();
        if !block.is_empty() {
            return Ok(block.to_string());
        }
    }

    if let Some(span) = MJML_SPAN.find(response) {
        return Ok(span.as_str().to_string());
    }

    let whole = response.trim();
    if whole.is_empty() {
        return Err(ProviderError::malformed(provider, "empty completion"));
    }
    warn!(
        "{} reply has neither an mjml block nor an <mjml> root; using the whole reply as the document",
        provider
    );
    Ok(whole.to_string())
}
