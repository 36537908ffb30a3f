// src/services/pipeline.rs
use crate::config::AppConfig;
use crate::errors::MailSketchError;
use crate::models::{
    GenerationOutcome, Issue, IssueKind, LayoutDescription, LayoutType, ValidationReport,
};
use crate::services::analyzer::ElementAnalyzer;
use crate::services::compiler::{CompilationResult, CompileOptions, Compiler, build_compiler};
use crate::services::orchestrator::FallbackOrchestrator;
use crate::services::validator::DocumentValidator;
use log::{error, info};
use reqwest::Client;
use std::sync::Arc;

/// Everything one conversion produced, before it is shaped into a response.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub generation: GenerationOutcome,
    pub validation: ValidationReport,
    pub compilation: CompilationResult,
    pub layout_type: LayoutType,
    /// Validator warnings followed by compiler warnings.
    pub warnings: Vec<Issue>,
}

impl ConversionOutcome {
    pub fn mjml(&self) -> &str {
        &self.validation.corrected_document
    }

    pub fn html(&self) -> &str {
        &self.compilation.output
    }
}

/// generate -> validate/correct -> compile.
///
/// Provider failures never reach the caller. Structural validation errors are
/// reported but do not stop compilation; only a compiler rejection fails the
/// conversion.
pub struct ConversionPipeline {
    orchestrator: FallbackOrchestrator,
    validator: DocumentValidator,
    compiler: Arc<dyn Compiler>,
    compile_options: CompileOptions,
    default_order: Vec<String>,
}

impl ConversionPipeline {
    pub fn new(
        orchestrator: FallbackOrchestrator,
        compiler: Arc<dyn Compiler>,
        default_order: Vec<String>,
    ) -> Self {
        Self {
            orchestrator,
            validator: DocumentValidator::new(),
            compiler,
            compile_options: CompileOptions::default(),
            default_order,
        }
    }

    pub fn from_config(config: &AppConfig, client: &Client) -> Self {
        Self::new(
            FallbackOrchestrator::from_config(config, client),
            build_compiler(&config.compiler, client),
            config.provider_order.clone(),
        )
    }

    pub fn with_compile_options(mut self, options: CompileOptions) -> Self {
        self.compile_options = options;
        self
    }

    pub fn orchestrator(&self) -> &FallbackOrchestrator {
        &self.orchestrator
    }

    pub fn default_order(&self) -> &[String] {
        &self.default_order
    }

    pub fn validator(&self) -> &DocumentValidator {
        &self.validator
    }

    /// `providers: None` uses the configured order; an empty slice goes straight
    /// to the synthesizer.
    pub async fn convert(
        &self,
        layout: &LayoutDescription,
        providers: Option<&[String]>,
    ) -> Result<ConversionOutcome, MailSketchError> {
        let order = providers.unwrap_or(&self.default_order);
        let generation = self.orchestrator.generate(layout, order).await;

        let validation = self.validator.validate_and_correct(&generation.document.raw);
        if !validation.is_valid {
            info!(
                "Document for '{}' has {} structural errors; compiling anyway",
                layout.source_name,
                validation.errors.len()
            );
        }

        let compilation = match self
            .compiler
            .compile(&validation.corrected_document, &self.compile_options)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!("{} failed for '{}': {}", self.compiler.name(), layout.source_name, e);
                return Err(MailSketchError::Compilation {
                    errors: vec![e.to_string()],
                    document: validation.corrected_document,
                });
            }
        };
        if !compilation.success {
            error!(
                "{} rejected the document for '{}': {}",
                self.compiler.name(),
                layout.source_name,
                compilation.errors.join("; ")
            );
            return Err(MailSketchError::Compilation {
                errors: compilation.errors,
                document: validation.corrected_document,
            });
        }

        let warnings = validation
            .warnings
            .iter()
            .cloned()
            .chain(compilation.warnings.iter().map(|w| Issue {
                kind: IssueKind::CompilerWarning,
                message: w.clone(),
            }))
            .collect();

        let visible = layout.frame.elements.iter().filter(|e| e.visible);
        let layout_type = ElementAnalyzer::analyze(visible).layout_type;

        Ok(ConversionOutcome {
            generation,
            validation,
            compilation,
            layout_type,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Element, Layout};
    use crate::services::compiler::CompileError;
    use crate::services::providers::{ProviderAdapter, ProviderError, ProviderOutput};
    use async_trait::async_trait;
    use std::time::Duration;

    enum Mode {
        Accept(Vec<String>),
        Reject,
        Broken,
    }

    struct StubCompiler(Mode);

    #[async_trait]
    impl Compiler for StubCompiler {
        fn name(&self) -> &str {
            "stub"
        }

        async fn compile(
            &self,
            document: &str,
            _options: &CompileOptions,
        ) -> Result<CompilationResult, CompileError> {
            match &self.0 {
                Mode::Accept(warnings) => Ok(CompilationResult {
                    success: true,
                    output: format!("<html>{}</html>", document.len()),
                    errors: vec![],
                    warnings: warnings.clone(),
                }),
                Mode::Reject => Ok(CompilationResult {
                    success: false,
                    output: String::new(),
                    errors: vec!["Line 1: bad".into()],
                    warnings: vec![],
                }),
                Mode::Broken => Err(CompileError::Unavailable {
                    compiler: "stub".into(),
                    detail: "offline".into(),
                }),
            }
        }
    }

    struct FixedAdapter(&'static str);

    #[async_trait]
    impl ProviderAdapter for FixedAdapter {
        fn name(&self) -> &str {
            "fixed"
        }

        fn is_configured(&self) -> bool {
            true
        }

        fn model(&self) -> &str {
            "fixed-1"
        }

        async fn generate(
            &self,
            _layout: &LayoutDescription,
        ) -> Result<ProviderOutput, ProviderError> {
            Ok(ProviderOutput {
                raw_text: self.0.to_string(),
                usage: None,
                model: "fixed-1".into(),
            })
        }
    }

    fn pipeline(adapter_output: &'static str, mode: Mode) -> ConversionPipeline {
        let orchestrator = FallbackOrchestrator::new(
            vec![Arc::new(FixedAdapter(adapter_output))],
            Duration::from_secs(5),
        );
        ConversionPipeline::new(orchestrator, Arc::new(StubCompiler(mode)), vec!["fixed".into()])
    }

    fn layout() -> LayoutDescription {
        LayoutDescription::new(
            "promo.fig",
            Layout {
                name: "Promo".into(),
                width: 600,
                height: 800,
                background_color: None,
                elements: vec![Element::text("Hi", 24.0), Element::image()],
            },
        )
    }

    #[tokio::test]
    async fn provider_output_is_corrected_before_compiling() {
        let doc = r#"<mjml><mj-body><mj-section><mj-column><mj-image src="a.png"/></mj-column></mj-section></mj-body></mjml>"#;
        let pipeline = pipeline(doc, Mode::Accept(vec!["Attribute foo is illegal".into()]));

        let outcome = pipeline.convert(&layout(), None).await.expect("convert");

        assert_eq!(outcome.generation.provider_used, "fixed");
        assert!(outcome.mjml().contains(r#"alt="Image""#));
        assert!(outcome.html().starts_with("<html>"));
        assert_eq!(outcome.layout_type, LayoutType::ImageFocused);
        let kinds: Vec<IssueKind> = outcome.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![IssueKind::MissingAltText, IssueKind::CompilerWarning]);
    }

    #[tokio::test]
    async fn nesting_errors_do_not_block_compilation() {
        let doc = "<mjml><mj-body><mj-column><mj-section></mj-section></mj-column></mj-body></mjml>";
        let outcome = pipeline(doc, Mode::Accept(vec![]))
            .convert(&layout(), None)
            .await
            .expect("convert");
        assert!(!outcome.validation.is_valid);
        assert!(outcome.compilation.success);
    }

    #[tokio::test]
    async fn empty_provider_list_uses_the_synthesizer() {
        let outcome = pipeline("<mjml></mjml>", Mode::Accept(vec![]))
            .convert(&layout(), Some(&[]))
            .await
            .expect("convert");
        assert!(outcome.generation.used_fallback);
        assert!(outcome.mjml().contains("Hi"));
    }

    #[tokio::test]
    async fn compiler_rejection_is_a_compilation_error() {
        let err = pipeline("<mjml></mjml>", Mode::Reject)
            .convert(&layout(), None)
            .await
            .expect_err("should fail");
        match err {
            MailSketchError::Compilation { errors, document } => {
                assert_eq!(errors, vec!["Line 1: bad"]);
                assert_eq!(document, "<mjml></mjml>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_compiler_is_a_compilation_error() {
        let err = pipeline("<mjml></mjml>", Mode::Broken)
            .convert(&layout(), None)
            .await
            .expect_err("should fail");
        assert!(matches!(err, MailSketchError::Compilation { .. }));
        assert!(err.to_string().contains("offline"));
    }
}
