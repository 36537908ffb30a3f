// src/handlers.rs
use crate::config::parse_provider_list;
use crate::services::ConversionOutcome;
use crate::{AppState, errors::MailSketchError, models::*};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use bytes::BytesMut;
use futures_util::TryStreamExt;
use log::info;
use serde_json::json;
use std::time::Instant;
use uuid::Uuid;

/// Largest accepted `providers` form field.
pub const PROVIDERS_FIELD_LIMIT_BYTES: usize = 1024;

pub async fn convert_figma(
    data: web::Data<AppState>,
    body: web::Json<FigmaConvertRequest>,
) -> Result<HttpResponse, Error> {
    let started = Instant::now();
    let request = body.into_inner();

    let file_id = request
        .file_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| MailSketchError::Validation("fileId is required".to_string()))?;

    let layout = data
        .figma_client
        .fetch_layout(file_id)
        .await
        .map_err(MailSketchError::from)?;

    run_conversion(&data, layout, request.providers, started).await
}

pub async fn convert_image(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let started = Instant::now();
    let limit = data.image_processor.max_upload_bytes();
    let mut image: Option<(String, BytesMut)> = None;
    let mut providers = None;

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().to_string();
        match name.as_str() {
            "image" => {
                let filename = field
                    .content_disposition()
                    .get_filename()
                    .filter(|f| !f.is_empty())
                    .unwrap_or("upload")
                    .to_string();

                let mut buffer = BytesMut::new();
                while let Some(chunk) = field.try_next().await? {
                    if buffer.len() + chunk.len() > limit {
                        return Err(MailSketchError::PayloadTooLarge { limit }.into());
                    }
                    buffer.extend_from_slice(&chunk);
                }
                image = Some((filename, buffer));
            }
            "providers" => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = field.try_next().await? {
                    if buffer.len() + chunk.len() > PROVIDERS_FIELD_LIMIT_BYTES {
                        return Err(MailSketchError::PayloadTooLarge {
                            limit: PROVIDERS_FIELD_LIMIT_BYTES,
                        }
                        .into());
                    }
                    buffer.extend_from_slice(&chunk);
                }
                let text = String::from_utf8_lossy(&buffer);
                if !text.trim().is_empty() {
                    providers = Some(parse_provider_list(&text));
                }
            }
            _ => {
                while field.try_next().await?.is_some() {}
            }
        }
    }

    let (filename, buffer) = image.ok_or_else(|| {
        MailSketchError::Validation("multipart field 'image' is required".to_string())
    })?;
    let metadata = data.image_processor.read_metadata(&buffer)?;
    info!(
        "Received {} ({}, {} bytes, {}x{})",
        filename,
        metadata.format,
        metadata.size,
        metadata.width.map_or("?".to_string(), |w| w.to_string()),
        metadata.height.map_or("?".to_string(), |h| h.to_string())
    );
    let layout = data
        .image_processor
        .layout_from_image(&filename, &metadata, buffer.to_vec());

    run_conversion(&data, layout, providers, started).await
}

pub async fn convert_layout(
    data: web::Data<AppState>,
    body: web::Json<LayoutConvertRequest>,
) -> Result<HttpResponse, Error> {
    let started = Instant::now();
    let request = body.into_inner();

    if request.layout.frame.width == 0 || request.layout.frame.height == 0 {
        return Err(MailSketchError::Validation(
            "layout width and height must be greater than zero".to_string(),
        )
        .into());
    }

    run_conversion(&data, request.layout, request.providers, started).await
}

pub async fn validate_document(
    data: web::Data<AppState>,
    body: web::Json<ValidateRequest>,
) -> Result<HttpResponse, Error> {
    if body.mjml.trim().is_empty() {
        return Err(MailSketchError::Validation("mjml is required".to_string()).into());
    }

    let report = data.pipeline.validator().validate_and_correct(&body.mjml);
    Ok(HttpResponse::Ok().json(&report))
}

pub async fn list_providers(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let providers: Vec<_> = data
        .pipeline
        .orchestrator()
        .adapters()
        .iter()
        .map(|adapter| {
            json!({
                "name": adapter.name(),
                "model": adapter.model(),
                "configured": adapter.is_configured()
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "order": data.pipeline.default_order(),
        "providers": providers,
        "fallback": SYNTHESIZED_PROVIDER,
        "figmaConfigured": data.figma_client.is_configured()
    })))
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "mailsketch",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn run_conversion(
    data: &AppState,
    layout: LayoutDescription,
    providers: Option<Vec<String>>,
    started: Instant,
) -> Result<HttpResponse, Error> {
    let outcome = data.pipeline.convert(&layout, providers.as_deref()).await?;
    let response = conversion_response(outcome, &layout, started);

    info!(
        "Converted '{}' via {} in {}ms ({} warnings)",
        response.metadata.source_name,
        response.metadata.provider_used,
        response.metadata.processing_time_ms,
        response.validation.warnings.len()
    );
    Ok(HttpResponse::Ok().json(&response))
}

fn conversion_response(
    outcome: ConversionOutcome,
    layout: &LayoutDescription,
    started: Instant,
) -> ConversionResponse {
    let ConversionOutcome {
        generation,
        validation,
        compilation,
        layout_type,
        warnings,
    } = outcome;

    ConversionResponse {
        success: true,
        mjml: validation.corrected_document,
        html: compilation.output,
        used_fallback: generation.used_fallback,
        metadata: ConversionMetadata {
            request_id: Uuid::new_v4(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            ai_used: !generation.used_fallback,
            provider_used: generation.provider_used,
            attempt_errors: generation.attempt_errors,
            source_name: layout.source_name.clone(),
            layout_type,
            generated_at: chrono::Utc::now(),
            usage: generation.usage,
        },
        validation: ValidationSummary {
            is_valid: validation.is_valid,
            errors: validation.errors,
            warnings,
        },
    }
}
