// src/errors.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailSketchError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("Payload too large: exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Design source error: {message}")]
    DesignSource { status: u16, message: String },

    #[error("Compilation failed: {}", .errors.join("; "))]
    Compilation {
        errors: Vec<String>,
        document: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ResponseError for MailSketchError {
    fn status_code(&self) -> StatusCode {
        match self {
            MailSketchError::Validation(_) => StatusCode::BAD_REQUEST,
            MailSketchError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            MailSketchError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            MailSketchError::DesignSource { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            MailSketchError::Compilation { .. } | MailSketchError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            MailSketchError::Validation(_) => HttpResponse::build(status).json(json!({
                "success": false,
                "error": "Validation error",
                "message": self.to_string()
            })),
            MailSketchError::UnsupportedMedia(_) => HttpResponse::build(status).json(json!({
                "success": false,
                "error": "Unsupported media type",
                "message": self.to_string()
            })),
            MailSketchError::PayloadTooLarge { limit } => HttpResponse::build(status).json(json!({
                "success": false,
                "error": "Payload too large",
                "message": self.to_string(),
                "limit": limit
            })),
            MailSketchError::DesignSource { .. } => HttpResponse::build(status).json(json!({
                "success": false,
                "error": "Design source error",
                "message": self.to_string()
            })),
            MailSketchError::Compilation { errors, document } => {
                HttpResponse::build(status).json(json!({
                    "success": false,
                    "error": "Compilation error",
                    "message": self.to_string(),
                    "details": errors,
                    "mjml": document
                }))
            }
            MailSketchError::Configuration(_) => HttpResponse::build(status).json(json!({
                "success": false,
                "error": "Configuration error",
                "message": self.to_string()
            })),
        }
    }
}
