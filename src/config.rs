// src/config.rs
use crate::errors::MailSketchError;
use std::time::Duration;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_PROVIDER_ORDER: &[&str] = &["anthropic", "openai", "gemini"];
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Credentials and endpoint for one generation backend. `api_key: None` means
/// the provider is known but unconfigured.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub name: String,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl ProviderSettings {
    /// Settings with the stock model and endpoint for a known provider.
    pub fn new(name: &str, api_key: Option<String>) -> Self {
        let (model, base_url) = match name {
            "openai" => ("gpt-4o", "https://api.openai.com"),
            "anthropic" => ("claude-3-5-sonnet-20241022", "https://api.anthropic.com"),
            "gemini" => ("gemini-1.5-pro", "https://generativelanguage.googleapis.com"),
            _ => ("", ""),
        };
        Self {
            name: name.to_string(),
            api_key,
            model: model.to_string(),
            base_url: base_url.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompilerSettings {
    /// Hosted MJML render API, used when both credentials are present.
    Api {
        app_id: String,
        secret_key: String,
        base_url: String,
    },
    /// Local `mjml` binary.
    Cli { binary: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub provider_order: Vec<String>,
    pub providers: Vec<ProviderSettings>,
    pub attempt_timeout: Duration,
    pub max_upload_bytes: usize,
    pub figma_token: Option<String>,
    pub figma_base_url: String,
    pub compiler: CompilerSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, MailSketchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MailSketchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider_order = match get("MAILSKETCH_PROVIDER_ORDER") {
            Some(order) => parse_provider_list(&order),
            None => DEFAULT_PROVIDER_ORDER.iter().map(|s| s.to_string()).collect(),
        };

        let providers = ["openai", "anthropic", "gemini"]
            .iter()
            .map(|name| {
                let prefix = name.to_ascii_uppercase();
                let mut settings = ProviderSettings::new(name, get(&format!("{prefix}_API_KEY")));
                if let Some(model) = get(&format!("{prefix}_MODEL")) {
                    settings.model = model;
                }
                if let Some(base_url) = get(&format!("{prefix}_BASE_URL")) {
                    settings.base_url = base_url;
                }
                settings
            })
            .collect();

        let attempt_timeout_secs = parse_number(
            "MAILSKETCH_ATTEMPT_TIMEOUT_SECS",
            get("MAILSKETCH_ATTEMPT_TIMEOUT_SECS"),
            DEFAULT_ATTEMPT_TIMEOUT_SECS,
        )?;
        if attempt_timeout_secs == 0 {
            return Err(MailSketchError::Configuration(
                "MAILSKETCH_ATTEMPT_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let max_upload_bytes = parse_number(
            "MAILSKETCH_MAX_UPLOAD_BYTES",
            get("MAILSKETCH_MAX_UPLOAD_BYTES"),
            DEFAULT_MAX_UPLOAD_BYTES,
        )?;

        let compiler = match (get("MJML_APP_ID"), get("MJML_SECRET_KEY")) {
            (Some(app_id), Some(secret_key)) => CompilerSettings::Api {
                app_id,
                secret_key,
                base_url: get("MJML_API_URL").unwrap_or_else(|| "https://api.mjml.io".to_string()),
            },
            _ => CompilerSettings::Cli {
                binary: get("MJML_BINARY").unwrap_or_else(|| "mjml".to_string()),
            },
        };

        Ok(Self {
            bind_address: get("MAILSKETCH_BIND")
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            provider_order,
            providers,
            attempt_timeout: Duration::from_secs(attempt_timeout_secs),
            max_upload_bytes,
            figma_token: get("FIGMA_ACCESS_TOKEN"),
            figma_base_url: get("FIGMA_BASE_URL")
                .unwrap_or_else(|| "https://api.figma.com".to_string()),
            compiler,
        })
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.name == name)
    }
}

/// Comma-separated, lowercased, blanks dropped.
pub fn parse_provider_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_number<T: std::str::FromStr>(
    key: &str,
    value: Option<String>,
    default: T,
) -> Result<T, MailSketchError> {
    match value {
        Some(raw) => raw.parse().map_err(|_| {
            MailSketchError::Configuration(format!("{key} must be a number, got '{raw}'"))
        }),
        None => Ok(default),
    }
}
