// src/services/providers/mod.rs
pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod prompt;

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;

use crate::config::ProviderSettings;
use crate::models::{LayoutDescription, TokenUsage};
use async_trait::async_trait;
use log::warn;
use reqwest::{Client, Response};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} API key not configured")]
    MissingCredentials { provider: String },

    #[error("{provider} request failed: {detail}")]
    Network { provider: String, detail: String },

    #[error("{provider} error (HTTP {status}): {detail}")]
    Http {
        provider: String,
        status: u16,
        detail: String,
    },

    #[error("{provider} returned an unusable response: {detail}")]
    MalformedResponse { provider: String, detail: String },

    #[error("{provider} did not answer within {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

impl ProviderError {
    /// True when the adapter refused to run before touching the network.
    pub fn is_credentials_error(&self) -> bool {
        matches!(self, ProviderError::MissingCredentials { .. })
    }

    pub(crate) fn malformed(provider: &str, detail: impl Into<String>) -> Self {
        ProviderError::MalformedResponse {
            provider: provider.to_string(),
            detail: detail.into(),
        }
    }
}

/// Extracted markup plus whatever accounting the backend reported.
#[derive(Debug, Clone)]
pub struct ProviderOutput {
    pub raw_text: String,
    pub usage: Option<TokenUsage>,
    pub model: String,
}

/// One external generation backend.
///
/// Implementations send exactly one request per call and never validate the
/// markup they return; that happens once, after the chain has produced a document.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn is_configured(&self) -> bool;

    fn model(&self) -> &str;

    async fn generate(&self, layout: &LayoutDescription) -> Result<ProviderOutput, ProviderError>;
}

/// Builds one adapter per known provider entry. Entries without a key still get an
/// adapter; it fails fast when asked to generate.
pub fn build_adapters(
    settings: &[ProviderSettings],
    client: &Client,
) -> Vec<Arc<dyn ProviderAdapter>> {
    let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();
    for entry in settings {
        match entry.name.as_str() {
            openai::NAME => adapters.push(Arc::new(OpenAiAdapter::new(entry, client.clone()))),
            anthropic::NAME => {
                adapters.push(Arc::new(AnthropicAdapter::new(entry, client.clone())))
            }
            gemini::NAME => adapters.push(Arc::new(GeminiAdapter::new(entry, client.clone()))),
            other => warn!("Ignoring settings for unsupported provider '{}'", other),
        }
    }
    adapters
}

pub(crate) fn network_error(provider: &str, error: reqwest::Error) -> ProviderError {
    ProviderError::Network {
        provider: provider.to_string(),
        detail: error.to_string(),
    }
}

/// Turns a response into JSON, mapping non-2xx statuses to [`ProviderError::Http`]
/// with the upstream `error.message` when the body carries one.
pub(crate) async fn read_json(
    provider: &str,
    response: Response,
) -> Result<serde_json::Value, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&error_text)
            .ok()
            .and_then(|body| {
                body["error"]["message"]
                    .as_str()
                    .or_else(|| body["error"].as_str())
                    .or_else(|| body["message"].as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                if error_text.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("no response body")
                        .to_string()
                } else {
                    error_text.trim().to_string()
                }
            });
        return Err(ProviderError::Http {
            provider: provider.to_string(),
            status: status.as_u16(),
            detail,
        });
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::malformed(provider, format!("invalid JSON body: {}", e)))
}

pub(crate) fn base_url(settings: &ProviderSettings) -> String {
    settings.base_url.trim_end_matches('/').to_string()
}
