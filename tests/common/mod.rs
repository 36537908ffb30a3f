#![allow(dead_code)]

use async_trait::async_trait;
use mailsketch::config::AppConfig;
use mailsketch::models::{ColorSpec, Element, Layout, LayoutDescription};
use mailsketch::services::compiler::{CompilationResult, CompileError, CompileOptions, Compiler};
use std::sync::Mutex;

/// Accepts any document with an `<mjml>` root and echoes it back as the "html".
#[derive(Default)]
pub struct EchoCompiler {
    pub seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Compiler for EchoCompiler {
    fn name(&self) -> &str {
        "echo"
    }

    async fn compile(
        &self,
        document: &str,
        _options: &CompileOptions,
    ) -> Result<CompilationResult, CompileError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(document.to_string());
        }
        let trimmed = document.trim();
        if trimmed.starts_with("<mjml") && trimmed.ends_with("</mjml>") {
            Ok(CompilationResult {
                success: true,
                output: format!("<!doctype html><html><body>{}</body></html>", trimmed.len()),
                errors: vec![],
                warnings: vec![],
            })
        } else {
            Ok(CompilationResult {
                success: false,
                output: String::new(),
                errors: vec!["Document has no <mjml> root".to_string()],
                warnings: vec![],
            })
        }
    }
}

pub fn empty_config() -> AppConfig {
    AppConfig::from_lookup(|_| None).expect("default config")
}

pub fn newsletter() -> LayoutDescription {
    LayoutDescription::new(
        "newsletter.fig",
        Layout {
            name: "Newsletter".into(),
            width: 600,
            height: 800,
            background_color: None,
            elements: vec![
                Element::text("Hi", 24.0),
                Element::colored_box(ColorSpec::css("#f0f0f0")),
                Element::image(),
            ],
        },
    )
}

pub fn blank() -> LayoutDescription {
    LayoutDescription::new(
        "blank.fig",
        Layout {
            name: "Blank".into(),
            width: 600,
            height: 800,
            background_color: None,
            elements: vec![],
        },
    )
}
