// src/lib.rs
use actix_web::error::JsonPayloadError;
use actix_web::web;
use reqwest::Client;
use std::sync::Arc;

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;

use crate::config::AppConfig;
use crate::errors::MailSketchError;
use crate::handlers::{
    convert_figma, convert_image, convert_layout, health_check, list_providers,
    validate_document,
};
use crate::services::{ConversionPipeline, FigmaClient, ImageProcessor};

/// Largest accepted JSON body (layout descriptions and documents).
pub const JSON_LIMIT_BYTES: usize = 4 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ConversionPipeline>,
    pub figma_client: Arc<FigmaClient>,
    pub image_processor: Arc<ImageProcessor>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        pipeline: ConversionPipeline,
        figma_client: FigmaClient,
        config: AppConfig,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            figma_client: Arc::new(figma_client),
            image_processor: Arc::new(ImageProcessor::new(config.max_upload_bytes)),
            config: Arc::new(config),
        }
    }

    /// Wires every service from configuration, sharing one HTTP client.
    pub fn from_config(config: AppConfig) -> Self {
        let client = Client::new();
        let pipeline = ConversionPipeline::from_config(&config, &client);
        let figma_client = FigmaClient::new(
            config.figma_token.clone(),
            config.figma_base_url.clone(),
            client,
        );
        Self::new(pipeline, figma_client, config)
    }
}

fn json_error(err: JsonPayloadError) -> MailSketchError {
    match err {
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            MailSketchError::PayloadTooLarge {
                limit: JSON_LIMIT_BYTES,
            }
        }
        other => MailSketchError::Validation(other.to_string()),
    }
}

/// Route table, shared by the server and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_LIMIT_BYTES)
            .error_handler(|err, _req| json_error(err).into()),
    )
    .service(
        web::scope("/api/v1")
            .route("/convert/figma", web::post().to(convert_figma))
            .route("/convert/image", web::post().to(convert_image))
            .route("/convert/layout", web::post().to(convert_layout))
            .route("/validate", web::post().to(validate_document))
            .route("/providers", web::get().to(list_providers)),
    )
    .route("/health", web::get().to(health_check));
}
