// src/services/providers/anthropic.rs
use crate::config::ProviderSettings;
use crate::models::{LayoutDescription, TokenUsage};
use crate::services::providers::prompt::{SYSTEM_PROMPT, build_user_prompt, extract_mjml};
use crate::services::providers::{
    ProviderAdapter, ProviderError, ProviderOutput, base_url, network_error, read_json,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use serde_json::json;

pub const NAME: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: Client,
}

impl AnthropicAdapter {
    pub fn new(settings: &ProviderSettings, client: Client) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: base_url(settings),
            client,
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, layout: &LayoutDescription) -> Result<ProviderOutput, ProviderError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::MissingCredentials {
                provider: NAME.to_string(),
            })?;

        let mut content = Vec::new();
        if let Some(image) = &layout.reference_image {
            content.push(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": image.media_type,
                    "data": general_purpose::STANDARD.encode(&image.data)
                }
            }));
        }
        content.push(json!({
            "type": "text",
            "text": build_user_prompt(layout)
        }));

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.model,
                "max_tokens": 4096,
                "system": SYSTEM_PROMPT,
                "messages": [{
                    "role": "user",
                    "content": content
                }]
            }))
            .send()
            .await
            .map_err(|e| network_error(NAME, e))?;

        let result = read_json(NAME, response).await?;

        let text: String = result["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ProviderError::malformed(
                NAME,
                "No text content in Anthropic response",
            ));
        }

        let usage = result.get("usage").map(|u| TokenUsage {
            input_tokens: u["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: u["output_tokens"].as_u64().unwrap_or(0),
        });

        Ok(ProviderOutput {
            raw_text: extract_mjml(NAME, &text)?,
            usage,
            model: self.model.clone(),
        })
    }
}
