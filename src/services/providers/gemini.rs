// src/services/providers/gemini.rs
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

pub const NAME: &str = "gemini";

pub struct GeminiAdapter {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: Client,
}

impl GeminiAdapter {
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
impl ProviderAdapter for GeminiAdapter {
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

        let mut parts = vec![json!({ "text": build_user_prompt(layout) })];
        if let Some(image) = &layout.reference_image {
            parts.push(json!({
                "inline_data": {
                    "mime_type": image.media_type,
                    "data": general_purpose::STANDARD.encode(&image.data)
                }
            }));
        }

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", api_key)
            .json(&json!({
                "system_instruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
                "contents": [{ "role": "user", "parts": parts }],
                "generationConfig": { "maxOutputTokens": 8192, "temperature": 0.2 }
            }))
            .send()
            .await
            .map_err(|e| network_error(NAME, e))?;

        let result = read_json(NAME, response).await?;

        if let Some(reason) = result["promptFeedback"]["blockReason"].as_str() {
            return Err(ProviderError::malformed(
                NAME,
                format!("prompt blocked: {}", reason),
            ));
        }

        let text: String = result["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ProviderError::malformed(
                NAME,
                "No candidates in Gemini response",
            ));
        }

        let usage = result.get("usageMetadata").map(|u| TokenUsage {
            input_tokens: u["promptTokenCount"].as_u64().unwrap_or(0),
            output_tokens: u["candidatesTokenCount"].as_u64().unwrap_or(0),
        });

        Ok(ProviderOutput {
            raw_text: extract_mjml(NAME, &text)?,
            usage,
            model: self.model.clone(),
        })
    }
}
