#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use weighbridge_core::picture::backend::FsBackend;
use weighbridge_core::picture::store::{EvidenceStore, PictureConfig};

use weighbridge_api::config::ServerConfig;
use weighbridge_api::router::build_app_router;
use weighbridge_api::state::AppState;

const BOUNDARY: &str = "weighbridge-test-boundary";

/// Build a test `ServerConfig` with the picture root at `root`.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a small upload limit so oversized bodies are easy to produce.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 64 * 1024,
        picture: PictureConfig::new(root),
    }
}

/// Build the full application router over a filesystem store at `root`.
///
/// Uses the same [`build_app_router`] as `main.rs`, so tests exercise the
/// production middleware stack.
pub fn build_test_app(root: &Path) -> Router {
    build_test_app_with(test_config(root))
}

/// Build the application router from an explicit configuration.
pub fn build_test_app_with(config: ServerConfig) -> Router {
    let store = EvidenceStore::new(&config.picture, Arc::new(FsBackend::new()));
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
    };
    build_app_router(state, &config)
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// POST a multipart form with a single file part named `field`.
pub async fn post_file(
    app: Router,
    uri: &str,
    field: &str,
    filename: &str,
    data: &[u8],
) -> Response<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
