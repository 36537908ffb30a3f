mod common;

use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{App, test, web};
use common::{EchoCompiler, empty_config};
use image::{DynamicImage, ImageFormat, RgbImage};
use mailsketch::services::{ConversionPipeline, FallbackOrchestrator, FigmaClient};
use mailsketch::{AppState, JSON_LIMIT_BYTES, configure};
use reqwest::Client;
use serde_json::{Value, json};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOUNDARY: &str = "mailsketch-test-boundary";

fn state(figma_token: Option<&str>, figma_url: &str, max_upload_bytes: usize) -> AppState {
    let mut config = empty_config();
    config.max_upload_bytes = max_upload_bytes;
    let pipeline = ConversionPipeline::new(
        FallbackOrchestrator::new(vec![], Duration::from_secs(1)),
        Arc::new(EchoCompiler::default()),
        vec![],
    );
    let figma = FigmaClient::new(figma_token.map(str::to_string), figma_url, Client::new());
    AppState::new(pipeline, figma, config)
}

fn default_state() -> AppState {
    state(None, "http://127.0.0.1:9", 1024 * 1024)
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .expect("encode");
    output
}

fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/v1/convert/image")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(body)
}

#[actix_web::test]
async fn health_reports_service() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(default_state()))
            .configure(configure),
    )
    .await;

    let body: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request())
            .await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "mailsketch");
}

#[actix_web::test]
async fn converts_a_layout_through_the_synthesizer() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(default_state()))
            .configure(configure),
    )
    .await;

    let request = test::TestRequest::post()
        .uri("/api/v1/convert/layout")
        .set_json(json!({
            "layout": {
                "sourceName": "newsletter.fig",
                "frame": {
                    "name": "Newsletter",
                    "width": 600,
                    "height": 800,
                    "elements": [
                        { "kind": "Text", "text": "Hi", "fontSizePx": 24 },
                        { "kind": "ColoredBox", "backgroundColor": "#f0f0f0" },
                        { "kind": "ImageRef" }
                    ]
                }
            }
        }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["usedFallback"], true);
    assert!(body["mjml"].as_str().unwrap_or_default().contains("Hi"));
    assert!(body["html"].as_str().unwrap_or_default().starts_with("<!doctype html>"));
    assert_eq!(body["metadata"]["aiUsed"], false);
    assert_eq!(body["metadata"]["providerUsed"], "synthesized");
    assert_eq!(body["metadata"]["layoutType"], "rich-content");
    assert_eq!(body["metadata"]["sourceName"], "newsletter.fig");
    assert_eq!(body["validation"]["isValid"], true);
}

#[actix_web::test]
async fn rejects_bad_layout_input() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(default_state()))
            .configure(configure),
    )
    .await;

    let zero_width = test::TestRequest::post()
        .uri("/api/v1/convert/layout")
        .set_json(json!({ "layout": { "sourceName": "x", "frame": { "width": 0, "height": 10 } } }))
        .to_request();
    let response = test::call_service(&app, zero_width).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let malformed = test::TestRequest::post()
        .uri("/api/v1/convert/layout")
        .insert_header(ContentType::json())
        .set_payload("{ not json")
        .to_request();
    let response = test::call_service(&app, malformed).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Validation error");

    let oversized = test::TestRequest::post()
        .uri("/api/v1/validate")
        .set_json(json!({ "mjml": "x".repeat(JSON_LIMIT_BYTES + 1) }))
        .to_request();
    let response = test::call_service(&app, oversized).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["error"], "Payload too large");
}

#[actix_web::test]
async fn validate_endpoint_returns_the_report() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(default_state()))
            .configure(configure),
    )
    .await;

    let request = test::TestRequest::post()
        .uri("/api/v1/validate")
        .set_json(json!({
            "mjml": "<mjml><mj-body><mj-section padding=\"20px 10px\"><mj-column><mj-image src=\"a.png\" /></mj-column></mj-section></mj-body></mjml>"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, request).await;

    assert_eq!(body["isValid"], true);
    let corrected = body["correctedDocument"].as_str().unwrap_or_default();
    assert!(corrected.contains(r#"padding-top="20px""#));
    assert!(corrected.contains(r#"alt="Image""#));
    assert_eq!(body["warnings"].as_array().map(Vec::len), Some(2));

    let empty = test::TestRequest::post()
        .uri("/api/v1/validate")
        .set_json(json!({ "mjml": "  " }))
        .to_request();
    let response = test::call_service(&app, empty).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn figma_conversion_needs_id_and_token() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(default_state()))
            .configure(configure),
    )
    .await;

    let missing_id = test::TestRequest::post()
        .uri("/api/v1/convert/figma")
        .set_json(json!({}))
        .to_request();
    let response = test::call_service(&app, missing_id).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let path_like = test::TestRequest::post()
        .uri("/api/v1/convert/figma")
        .set_json(json!({ "fileId": "abc/../me" }))
        .to_request();
    let response = test::call_service(&app, path_like).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let no_token = test::TestRequest::post()
        .uri("/api/v1/convert/figma")
        .set_json(json!({ "fileId": "abc" }))
        .to_request();
    let response = test::call_service(&app, no_token).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["error"], "Configuration error");
}

#[actix_web::test]
async fn converts_a_figma_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/files/abc"))
        .and(header("X-Figma-Token", "figd_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Launch",
            "document": {
                "type": "DOCUMENT",
                "children": [{
                    "type": "CANVAS",
                    "children": [{
                        "name": "Announcement",
                        "type": "FRAME",
                        "absoluteBoundingBox": { "x": 0, "y": 0, "width": 640, "height": 480 },
                        "children": [{
                            "type": "TEXT",
                            "characters": "We launched",
                            "absoluteBoundingBox": { "x": 20, "y": 20, "width": 200, "height": 30 }
                        }]
                    }]
                }]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/files/gone"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "status": 404, "err": "Not found" })),
        )
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(
                Some("figd_test"),
                &server.uri(),
                1024 * 1024,
            )))
            .configure(configure),
    )
    .await;

    let request = test::TestRequest::post()
        .uri("/api/v1/convert/figma")
        .set_json(json!({ "fileId": "abc" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["metadata"]["sourceName"], "Launch");
    assert_eq!(body["metadata"]["layoutType"], "minimal");
    assert!(body["mjml"].as_str().unwrap_or_default().contains("We launched"));

    let missing = test::TestRequest::post()
        .uri("/api/v1/convert/figma")
        .set_json(json!({ "fileId": "gone" }))
        .to_request();
    let response = test::call_service(&app, missing).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn converts_an_uploaded_image() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(default_state()))
            .configure(configure),
    )
    .await;

    let body = multipart(&[
        ("image", Some("hero.png"), &png(64, 48)[..]),
        ("providers", None, &b""[..]),
    ]);
    let response = test::call_service(&app, upload_request(body).to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["metadata"]["sourceName"], "hero.png");
    assert_eq!(body["metadata"]["layoutType"], "image-focused");
    assert_eq!(body["usedFallback"], true);
    assert!(
        body["mjml"]
            .as_str()
            .unwrap_or_default()
            .contains("placehold.co/64x48")
    );
}

#[actix_web::test]
async fn rejects_bad_uploads() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(None, "http://127.0.0.1:9", 256)))
            .configure(configure),
    )
    .await;

    let not_an_image = multipart(&[("image", Some("notes.txt"), &b"just some text"[..])]);
    let response = test::call_service(&app, upload_request(not_an_image).to_request()).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let oversized = multipart(&[("image", Some("big.png"), &[0u8; 512][..])]);
    let response = test::call_service(&app, upload_request(oversized).to_request()).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let long_providers = "openai,".repeat(200);
    let oversized_field = multipart(&[
        ("providers", None, long_providers.as_bytes()),
        ("image", Some("tiny.png"), &png(2, 2)[..]),
    ]);
    let response = test::call_service(&app, upload_request(oversized_field).to_request()).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let no_image = multipart(&[("providers", None, &b"openai"[..])]);
    let response = test::call_service(&app, upload_request(no_image).to_request()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn lists_providers() {
    let config = empty_config();
    let state = AppState::from_config(config);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure),
    )
    .await;

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/v1/providers").to_request(),
    )
    .await;
    assert_eq!(body["order"], json!(["anthropic", "openai", "gemini"]));
    assert_eq!(body["fallback"], "synthesized");
    assert_eq!(body["figmaConfigured"], false);
    let providers = body["providers"].as_array().expect("providers");
    assert_eq!(providers.len(), 3);
    assert!(providers.iter().all(|p| p["configured"] == false));
}
