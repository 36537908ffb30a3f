// src/services/orchestrator.rs
use crate::config::AppConfig;
use crate::models::{
    AttemptError, GeneratedDocument, GenerationOutcome, LayoutDescription, SYNTHESIZED_PROVIDER,
};
use crate::services::providers::{ProviderAdapter, ProviderError, build_adapters};
use crate::services::synthesizer::TemplateSynthesizer;
use log::{info, warn};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Ordered provider chain with the template synthesizer as its fixed last link.
///
/// Providers are tried one at a time in the requested order; the first success
/// ends the chain. Every failure (missing key, transport, HTTP status, bad body,
/// timeout, unknown name) is recorded and skipped. When nothing answers, or the
/// order reaches `"synthesized"`, the synthesizer builds the document, so
/// [`FallbackOrchestrator::generate`] always returns one.
pub struct FallbackOrchestrator {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    synthesizer: TemplateSynthesizer,
    attempt_timeout: Duration,
}

impl FallbackOrchestrator {
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, attempt_timeout: Duration) -> Self {
        Self {
            adapters,
            synthesizer: TemplateSynthesizer::new(),
            attempt_timeout,
        }
    }

    pub fn from_config(config: &AppConfig, client: &Client) -> Self {
        Self::new(build_adapters(&config.providers, client), config.attempt_timeout)
    }

    pub fn adapters(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    fn adapter(&self, name: &str) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.name().eq_ignore_ascii_case(name))
    }

    pub async fn generate(
        &self,
        layout: &LayoutDescription,
        order: &[String],
    ) -> GenerationOutcome {
        let mut attempt_errors = Vec::new();

        for name in order.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            if name.eq_ignore_ascii_case(SYNTHESIZED_PROVIDER) {
                break;
            }

            let Some(adapter) = self.adapter(name) else {
                warn!("Skipping unknown provider '{}'", name);
                attempt_errors.push(AttemptError {
                    provider: name.to_string(),
                    error_message: ProviderError::UnknownProvider(name.to_string()).to_string(),
                });
                continue;
            };

            info!("Generating '{}' with {}", layout.source_name, adapter.name());
            let attempt = tokio::time::timeout(self.attempt_timeout, adapter.generate(layout));
            let result = match attempt.await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    provider: adapter.name().to_string(),
                    after: self.attempt_timeout,
                }),
            };

            match result {
                Ok(output) => {
                    info!(
                        "{} ({}) produced a document for '{}'",
                        adapter.name(),
                        output.model,
                        layout.source_name
                    );
                    return GenerationOutcome {
                        document: GeneratedDocument {
                            source_provider: adapter.name().to_string(),
                            used_fallback: false,
                            raw: output.raw_text,
                        },
                        provider_used: adapter.name().to_string(),
                        used_fallback: false,
                        attempt_errors,
                        usage: output.usage,
                    };
                }
                Err(e) => {
                    if e.is_credentials_error() {
                        info!("Skipping {}: {}", adapter.name(), e);
                    } else {
                        warn!("{} failed: {}", adapter.name(), e);
                    }
                    attempt_errors.push(AttemptError {
                        provider: adapter.name().to_string(),
                        error_message: e.to_string(),
                    });
                }
            }
        }

        warn!(
            "No provider produced a document for '{}' ({} failed attempts); using the synthesized template",
            layout.source_name,
            attempt_errors.len()
        );
        let document = self
            .synthesizer
            .synthesize(&layout.frame, &layout.source_name);
        GenerationOutcome {
            document,
            provider_used: SYNTHESIZED_PROVIDER.to_string(),
            used_fallback: true,
            attempt_errors,
            usage: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Element, Layout};
    use crate::services::providers::ProviderOutput;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Succeed(&'static str),
        Fail,
        NoKey,
        Hang,
    }

    struct FakeAdapter {
        name: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeAdapter {
        fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name,
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderAdapter for FakeAdapter {
        fn name(&self) -> &str {
            self.name
        }

        fn is_configured(&self) -> bool {
            !matches!(self.behaviour, Behaviour::NoKey)
        }

        fn model(&self) -> &str {
            "fake"
        }

        async fn generate(
            &self,
            _layout: &LayoutDescription,
        ) -> Result<ProviderOutput, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed(raw) => Ok(ProviderOutput {
                    raw_text: raw.to_string(),
                    usage: None,
                    model: "fake".into(),
                }),
                Behaviour::Fail => Err(ProviderError::Http {
                    provider: self.name.into(),
                    status: 500,
                    detail: "boom".into(),
                }),
                Behaviour::NoKey => Err(ProviderError::MissingCredentials {
                    provider: self.name.into(),
                }),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(ProviderError::malformed(self.name, "unreachable"))
                }
            }
        }
    }

    fn layout() -> LayoutDescription {
        LayoutDescription::new(
            "test.fig",
            Layout {
                name: "Test".into(),
                width: 600,
                height: 800,
                background_color: None,
                elements: vec![Element::text("Hello", 16.0)],
            },
        )
    }

    fn order(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn first_success_wins() {
        let a = FakeAdapter::new("a", Behaviour::Fail);
        let b = FakeAdapter::new("b", Behaviour::Succeed("<mjml>b</mjml>"));
        let c = FakeAdapter::new("c", Behaviour::Succeed("<mjml>c</mjml>"));
        let orchestrator = FallbackOrchestrator::new(
            vec![a.clone(), b.clone(), c.clone()],
            Duration::from_secs(5),
        );

        let outcome = orchestrator.generate(&layout(), &order(&["a", "b", "c"])).await;

        assert_eq!(outcome.provider_used, "b");
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.document.raw, "<mjml>b</mjml>");
        assert_eq!(outcome.attempt_errors.len(), 1);
        assert_eq!(outcome.attempt_errors[0].provider, "a");
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn empty_order_synthesizes() {
        let a = FakeAdapter::new("a", Behaviour::Succeed("<mjml></mjml>"));
        let orchestrator = FallbackOrchestrator::new(vec![a.clone()], Duration::from_secs(5));

        let outcome = orchestrator.generate(&layout(), &[]).await;

        assert!(outcome.used_fallback);
        assert_eq!(outcome.provider_used, SYNTHESIZED_PROVIDER);
        assert!(outcome.document.raw.contains("Hello"));
        assert!(outcome.attempt_errors.is_empty());
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn unconfigured_and_unknown_providers_fall_through() {
        let orchestrator = FallbackOrchestrator::new(
            vec![
                FakeAdapter::new("openai", Behaviour::NoKey),
                FakeAdapter::new("anthropic", Behaviour::NoKey),
            ],
            Duration::from_secs(5),
        );

        let outcome = orchestrator
            .generate(&layout(), &order(&["openai", "mystery", "anthropic"]))
            .await;

        assert!(outcome.used_fallback);
        assert!(!outcome.document.raw.is_empty());
        let providers: Vec<&str> = outcome
            .attempt_errors
            .iter()
            .map(|e| e.provider.as_str())
            .collect();
        assert_eq!(providers, vec!["openai", "mystery", "anthropic"]);
        assert!(outcome.attempt_errors[1].error_message.contains("Unknown provider"));
    }

    #[tokio::test]
    async fn slow_provider_times_out_and_chain_continues() {
        let slow = FakeAdapter::new("slow", Behaviour::Hang);
        let fast = FakeAdapter::new("fast", Behaviour::Succeed("<mjml>fast</mjml>"));
        let orchestrator =
            FallbackOrchestrator::new(vec![slow, fast], Duration::from_millis(50));

        let outcome = orchestrator.generate(&layout(), &order(&["slow", "fast"])).await;

        assert_eq!(outcome.provider_used, "fast");
        assert_eq!(outcome.attempt_errors.len(), 1);
        assert_eq!(
            outcome.attempt_errors[0].error_message,
            "slow did not answer within 50ms"
        );
    }

    #[tokio::test]
    async fn synthesized_entry_ends_the_chain() {
        let later = FakeAdapter::new("later", Behaviour::Succeed("<mjml></mjml>"));
        let orchestrator = FallbackOrchestrator::new(vec![later.clone()], Duration::from_secs(5));

        let outcome = orchestrator
            .generate(&layout(), &order(&["synthesized", "later"]))
            .await;

        assert!(outcome.used_fallback);
        assert_eq!(later.calls(), 0);
    }

    #[tokio::test]
    async fn provider_names_match_case_insensitively() {
        let a = FakeAdapter::new("openai", Behaviour::Succeed("<mjml></mjml>"));
        let orchestrator = FallbackOrchestrator::new(vec![a], Duration::from_secs(5));
        let outcome = orchestrator.generate(&layout(), &order(&[" OpenAI "])).await;
        assert_eq!(outcome.provider_used, "openai");
    }
}
