// src/services/validator.rs
use crate::models::{Issue, IssueKind, ValidationReport};
use crate::services::markup::{Document, Tag};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// Alt text injected into images that lack one.
pub const PLACEHOLDER_ALT: &str = "Image";

const LENGTH: &str = r"\d+(?:\.\d+)?(?:px|%|em|rem)?";

static TWO_VALUE_PADDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^\s*({LENGTH})\s+({LENGTH})\s*$")).expect("valid padding pattern")
});

/// MJML tags that never wrap children, whether or not they are self-closed.
const CHILDLESS_TAGS: &[&str] = &[
    "mj-image",
    "mj-divider",
    "mj-spacer",
    "mj-carousel-image",
    "mj-all",
    "mj-class",
    "mj-font",
    "mj-breakpoint",
    "mj-include",
];

const SECTION_TAGS: &[&str] = &["mj-section", "mj-wrapper"];

/// Repairs known-invalid MJML patterns and reports what it changed.
///
/// Rules run in a fixed order over one parsed document:
/// 1. `border-radius` on `mj-text` is stripped (warning)
/// 2. two-value `padding` shorthand is expanded to four sides (warning)
/// 3. sections nested inside columns are reported (error, left as is)
/// 4. images without `alt` get a placeholder (warning)
///
/// Running the validator on its own output changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentValidator;

impl DocumentValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_and_correct(&self, document: &str) -> ValidationReport {
        let mut parsed = Document::parse(document);
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        strip_text_border_radius(&mut parsed, &mut warnings);
        expand_padding_shorthand(&mut parsed, &mut warnings);
        check_section_nesting(&parsed, &mut errors);
        inject_alt_text(&mut parsed, &mut warnings);

        for issue in warnings.iter().chain(errors.iter()) {
            debug!("validator: {:?}: {}", issue.kind, issue.message);
        }

        ValidationReport {
            is_valid: errors.is_empty(),
            corrected_document: parsed.render(),
            errors,
            warnings,
        }
    }
}

fn open_tags_mut(document: &mut Document) -> impl Iterator<Item = &mut Tag> {
    document.tags_mut().filter(|t| !t.closing)
}

fn strip_text_border_radius(document: &mut Document, warnings: &mut Vec<Issue>) {
    for tag in open_tags_mut(document).filter(|t| t.is("mj-text")) {
        if let Some(removed) = tag.remove_attribute("border-radius") {
            let value = removed.value.unwrap_or_default();
            warnings.push(Issue {
                kind: IssueKind::InvalidAttribute,
                message: format!(
                    "Removed border-radius=\"{value}\" from <mj-text> on line {}: mj-text does not support border-radius. Apply rounding through a css-class on the parent mj-column instead.",
                    tag.line
                ),
            });
        }
    }
}

fn expand_padding_shorthand(document: &mut Document, warnings: &mut Vec<Issue>) {
    for tag in open_tags_mut(document).filter(|t| t.is_mjml()) {
        let Some(index) = tag
            .attributes
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case("padding"))
        else {
            continue;
        };
        let Some(value) = tag.attributes[index].value.clone() else {
            continue;
        };
        let Some(captures) = TWO_VALUE_PADDING.captures(&value) else {
            continue;
        };
        let vertical = captures[1].to_string();
        let horizontal = captures[2].to_string();

        tag.remove_attribute("padding");
        let mut at = index;
        for (side, side_value) in [
            ("padding-top", &vertical),
            ("padding-right", &horizontal),
            ("padding-bottom", &vertical),
            ("padding-left", &horizontal),
        ] {
            // An explicit per-side value already takes precedence over the shorthand.
            if !tag.has_attribute(side) {
                tag.insert_attribute(at, side, side_value);
                at += 1;
            }
        }

        warnings.push(Issue {
            kind: IssueKind::PaddingShorthand,
            message: format!(
                "Rewrote padding=\"{}\" on <{}> (line {}) as padding-top=\"{vertical}\" padding-right=\"{horizontal}\" padding-bottom=\"{vertical}\" padding-left=\"{horizontal}\"",
                value.trim(),
                tag.name,
                tag.line
            ),
        });
    }
}

fn check_section_nesting(document: &Document, errors: &mut Vec<Issue>) {
    let mut open: Vec<(String, usize)> = Vec::new();

    for tag in document.tags().filter(|t| t.is_mjml()) {
        let name = tag.name.to_ascii_lowercase();

        if tag.closing {
            if let Some(index) = open.iter().rposition(|(n, _)| *n == name) {
                open.truncate(index);
            }
            continue;
        }

        if SECTION_TAGS.contains(&name.as_str()) {
            if let Some((_, column_line)) = open.iter().rev().find(|(n, _)| n == "mj-column") {
                errors.push(Issue {
                    kind: IssueKind::InvalidNesting,
                    message: format!(
                        "<{name}> on line {} is nested inside <mj-column> opened on line {column_line}; sections must be direct children of mj-body or mj-wrapper",
                        tag.line
                    ),
                });
            }
        }

        if !tag.self_closing && !CHILDLESS_TAGS.contains(&name.as_str()) {
            open.push((name, tag.line));
        }
    }
}

fn inject_alt_text(document: &mut Document, warnings: &mut Vec<Issue>) {
    for tag in open_tags_mut(document).filter(|t| t.is("mj-image") || t.is("img")) {
        if tag.has_attribute("alt") {
            continue;
        }
        tag.push_attribute("alt", PLACEHOLDER_ALT);
        warnings.push(Issue {
            kind: IssueKind::MissingAltText,
            message: format!(
                "Added alt=\"{PLACEHOLDER_ALT}\" to <{}> on line {}; replace it with a description of the image",
                tag.name, tag.line
            ),
        });
    }
}
