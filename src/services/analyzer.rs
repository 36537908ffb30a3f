// src/services/analyzer.rs
use crate::models::{
    ColoredSummary, Element, ElementKind, LayoutProfile, LayoutType, TextSummary,
};

/// Reduces a list of design elements to the aggregate facts the synthesizer and
/// prompt builder work from.
pub struct ElementAnalyzer;

impl ElementAnalyzer {
    /// Single pass, document order preserved. Never fails.
    pub fn analyze<'a, I>(elements: I) -> LayoutProfile
    where
        I: IntoIterator<Item = &'a Element>,
    {
        let mut profile = LayoutProfile::default();

        for element in elements {
            profile.element_count += 1;
            match &element.kind {
                ElementKind::Text {
                    text,
                    font_size_px,
                    font_weight,
                    color,
                } => {
                    profile.has_text = true;
                    profile.text_elements.push(TextSummary {
                        text: text.clone(),
                        font_size_px: *font_size_px,
                        color: color.to_css(),
                        font_weight: *font_weight,
                    });
                }
                ElementKind::ImageRef { .. } => profile.has_images = true,
                ElementKind::ColoredBox { background_color } => {
                    if background_color.is_transparent() {
                        continue;
                    }
                    let css = background_color.to_css();
                    profile.has_colored_sections = true;
                    if !profile.primary_colors.contains(&css) {
                        profile.primary_colors.push(css.clone());
                    }
                    profile.colored_elements.push(ColoredSummary {
                        background_color: css,
                        bounds: element.bounds,
                    });
                }
                ElementKind::Other => {}
            }
        }

        profile.layout_type = LayoutType::classify(
            profile.has_text,
            profile.has_images,
            profile.has_colored_sections,
        );
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColorSpec;

    #[test]
    fn empty_input_yields_minimal_profile() {
        let profile = ElementAnalyzer::analyze(std::iter::empty());
        assert!(!profile.has_text);
        assert!(!profile.has_images);
        assert!(!profile.has_colored_sections);
        assert_eq!(profile.element_count, 0);
        assert_eq!(profile.layout_type, LayoutType::Minimal);
    }

    #[test]
    fn text_order_is_preserved() {
        let elements = vec![
            Element::text("second", 14.0).with_bounds(0.0, 200.0, 100.0, 20.0),
            Element::text("first", 32.0).with_bounds(0.0, 10.0, 100.0, 20.0),
        ];
        let profile = ElementAnalyzer::analyze(&elements);
        let texts: Vec<&str> = profile
            .text_elements
            .iter()
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(texts, vec!["second", "first"]);
        assert_eq!(profile.text_elements[1].font_size_px, 32.0);
    }

    #[test]
    fn primary_colors_are_deduplicated_in_insertion_order() {
        let elements = vec![
            Element::colored_box(ColorSpec::css("#ff0000")),
            Element::colored_box(ColorSpec::css("#00ff00")),
            Element::colored_box(ColorSpec::css("#ff0000")),
            Element::colored_box(ColorSpec::css("transparent")),
        ];
        let profile = ElementAnalyzer::analyze(&elements);
        assert!(profile.has_colored_sections);
        assert_eq!(profile.primary_colors, vec!["#ff0000", "#00ff00"]);
        assert_eq!(profile.colored_elements.len(), 3);
    }

    #[test]
    fn transparent_boxes_do_not_count_as_colored_sections() {
        let elements = vec![Element::colored_box(ColorSpec::rgba(1.0, 1.0, 1.0, 0.0))];
        let profile = ElementAnalyzer::analyze(&elements);
        assert!(!profile.has_colored_sections);
        assert!(profile.primary_colors.is_empty());
    }

    #[test]
    fn counts_only_the_elements_it_is_given() {
        let elements = vec![
            Element::text("shown", 14.0),
            Element::text("hidden", 14.0).hidden(),
            Element::image().hidden(),
        ];
        let profile = ElementAnalyzer::analyze(elements.iter().filter(|e| e.visible));
        assert_eq!(profile.element_count, 1);
        assert!(!profile.has_images);
        assert_eq!(profile.layout_type, LayoutType::Minimal);
    }

    #[test]
    fn rich_content_wins_over_text_focused() {
        let elements = vec![
            Element::text("Hello", 18.0),
            Element::image(),
            Element::colored_box(ColorSpec::css("#f0f0f0")),
        ];
        let profile = ElementAnalyzer::analyze(&elements);
        assert!(profile.has_text && profile.has_images && profile.has_colored_sections);
        assert_eq!(profile.layout_type, LayoutType::RichContent);
    }
}
