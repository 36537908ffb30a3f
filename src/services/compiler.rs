// src/services/compiler.rs
use crate::config::CompilerSettings;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationLevel {
    Strict,
    #[default]
    Soft,
    Skip,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::Strict => "strict",
            ValidationLevel::Soft => "soft",
            ValidationLevel::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileOptions {
    pub validation_level: ValidationLevel,
    pub minify: bool,
}

/// Outcome of a compile that reached the compiler. `success: false` means the
/// compiler rejected the document; transport problems are a [`CompileError`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompilationResult {
    pub success: bool,
    pub output: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{compiler} compiler unavailable: {detail}")]
    Unavailable { compiler: String, detail: String },

    #[error("MJML API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("MJML API returned an unusable response: {0}")]
    MalformedResponse(String),

    #[error("I/O error while running the compiler: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Compiler: Send + Sync {
    fn name(&self) -> &str;

    async fn compile(
        &self,
        document: &str,
        options: &CompileOptions,
    ) -> Result<CompilationResult, CompileError>;
}

pub fn build_compiler(settings: &CompilerSettings, client: &Client) -> Arc<dyn Compiler> {
    match settings {
        CompilerSettings::Api {
            app_id,
            secret_key,
            base_url,
        } => Arc::new(MjmlApiCompiler::new(
            app_id.clone(),
            secret_key.clone(),
            base_url.clone(),
            client.clone(),
        )),
        CompilerSettings::Cli { binary } => Arc::new(MjmlCliCompiler::new(binary.clone())),
    }
}

/// Hosted render endpoint (`POST /v1/render`, HTTP basic auth).
pub struct MjmlApiCompiler {
    app_id: String,
    secret_key: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    errors: Vec<RenderIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderIssue {
    #[serde(default)]
    line: Option<u64>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    formatted_message: Option<String>,
}

impl RenderIssue {
    fn describe(&self) -> String {
        match (&self.formatted_message, self.line) {
            (Some(formatted), _) => formatted.clone(),
            (None, Some(line)) => format!("Line {}: {}", line, self.message),
            (None, None) => self.message.clone(),
        }
    }
}

impl MjmlApiCompiler {
    pub fn new(app_id: String, secret_key: String, base_url: String, client: Client) -> Self {
        Self {
            app_id,
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl Compiler for MjmlApiCompiler {
    fn name(&self) -> &str {
        "mjml-api"
    }

    async fn compile(
        &self,
        document: &str,
        options: &CompileOptions,
    ) -> Result<CompilationResult, CompileError> {
        let response = self
            .client
            .post(format!("{}/v1/render", self.base_url))
            .basic_auth(&self.app_id, Some(&self.secret_key))
            .json(&json!({ "mjml": document }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| body.trim().to_string());
            error!("MJML API rejected the document (HTTP {}): {}", status, message);
            return Ok(CompilationResult {
                success: false,
                output: String::new(),
                errors: vec![format!("HTTP {}: {}", status.as_u16(), message)],
                warnings: Vec::new(),
            });
        }

        let rendered: RenderResponse = serde_json::from_str(&body)
            .map_err(|e| CompileError::MalformedResponse(e.to_string()))?;
        let issues: Vec<String> = rendered.errors.iter().map(RenderIssue::describe).collect();
        let html = rendered.html.unwrap_or_default();

        let mut result = CompilationResult {
            success: true,
            output: html,
            errors: Vec::new(),
            warnings: Vec::new(),
        };
        match options.validation_level {
            ValidationLevel::Strict if !issues.is_empty() => {
                result.success = false;
                result.errors = issues;
            }
            ValidationLevel::Skip => {}
            _ => result.warnings = issues,
        }
        if result.success && result.output.is_empty() {
            return Err(CompileError::MalformedResponse(
                "response carried no html".to_string(),
            ));
        }
        debug!(
            "MJML API rendered {} bytes with {} warnings",
            result.output.len(),
            result.warnings.len()
        );
        Ok(result)
    }
}

/// Local `mjml` binary fed through stdin (`mjml -i -s`).
pub struct MjmlCliCompiler {
    binary: String,
}

impl MjmlCliCompiler {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Compiler for MjmlCliCompiler {
    fn name(&self) -> &str {
        "mjml-cli"
    }

    async fn compile(
        &self,
        document: &str,
        options: &CompileOptions,
    ) -> Result<CompilationResult, CompileError> {
        let mut child = Command::new(&self.binary)
            .arg("-i")
            .arg("-s")
            .arg("--config.validationLevel")
            .arg(options.validation_level.as_str())
            .arg("--config.minify")
            .arg(if options.minify { "true" } else { "false" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CompileError::Unavailable {
                    compiler: self.binary.clone(),
                    detail: "binary not found on PATH".to_string(),
                },
                _ => CompileError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(document.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        let diagnostics: Vec<String> = String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        if !output.status.success() {
            error!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                diagnostics.join("; ")
            );
            return Ok(CompilationResult {
                success: false,
                output: String::new(),
                errors: if diagnostics.is_empty() {
                    vec![format!("{} exited with {}", self.binary, output.status)]
                } else {
                    diagnostics
                },
                warnings: Vec::new(),
            });
        }

        Ok(CompilationResult {
            success: true,
            output: String::from_utf8_lossy(&output.stdout).into_owned(),
            errors: Vec::new(),
            warnings: diagnostics,
        })
    }
}
