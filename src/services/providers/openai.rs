// src/services/providers/openai.rs
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

pub const NAME: &str = "openai";

pub struct OpenAiAdapter {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: Client,
}

impl OpenAiAdapter {
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
impl ProviderAdapter for OpenAiAdapter {
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

        let mut content = vec![json!({
            "type": "text",
            "text": build_user_prompt(layout)
        })];
        if let Some(image) = &layout.reference_image {
            content.push(json!({
                "type": "image_url",
                "image_url": {
                    "url": format!(
                        "data:{};base64,{}",
                        image.media_type,
                        general_purpose::STANDARD.encode(&image.data)
                    )
                }
            }));
        }

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": content }
                ],
                "max_tokens": 4096,
                "temperature": 0.2
            }))
            .send()
            .await
            .map_err(|e| network_error(NAME, e))?;

        let result = read_json(NAME, response).await?;

        let text = result["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::malformed(NAME, "No content in OpenAI response"))?;

        let usage = result.get("usage").map(|u| TokenUsage {
            input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
            output_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
        });

        Ok(ProviderOutput {
            raw_text: extract_mjml(NAME, text)?,
            usage,
            model: self.model.clone(),
        })
    }
}
