//! Integration tests for the Ingress API, driven directly against the
//! router via `tower::ServiceExt::oneshot` — no socket bound.
//!
//! Covers admission idempotency, validation coverage, metadata echo, and
//! the happy-path multipart submission.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use xray_fabric::api::models::{AnalyzeResponse, ErrorResponse};
use xray_fabric::api::state::AppState;
use xray_fabric::api::{self};
use xray_fabric::config::{ApiConfig, Config, QueueConfig, StoreConfig};
use xray_fabric::observability::Metrics;
use xray_fabric::queue::TaskQueue;
use xray_fabric::store::TaskStore;

async fn build_test_app() -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().expect("tempdir");

    let config = Config {
        api: ApiConfig {
            upload_dir: temp_dir.path().join("uploads"),
            ..ApiConfig::default()
        },
        worker: Default::default(),
        queue: QueueConfig {
            path: temp_dir.path().join("queue"),
            visibility_timeout_sec: 30,
        },
        store: StoreConfig {
            path: temp_dir.path().join("store"),
            ttl_sec: 3600,
        },
        callback: Default::default(),
        image_download: Default::default(),
        pipelines: Default::default(),
    };

    let store = Arc::new(TaskStore::open(&config.store.path).expect("open store"));
    let queue = Arc::new(
        TaskQueue::open(
            &config.queue.path,
            std::time::Duration::from_secs(config.queue.visibility_timeout_sec),
        )
        .expect("open queue"),
    );
    let metrics = Arc::new(Metrics::new());
    let request_timeout = config.api.request_timeout_sec;
    let state = AppState::new(Arc::new(config), store, queue, metrics);

    let app = api::build_router(state, request_timeout);
    (app, temp_dir)
}

fn json_request(body: Value) -> Request<Body> {
    Request::builder()
        .uri("/api/v1/analyze")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn multipart_request(
    task_id: &str,
    task_type: &str,
    callback_url: &str,
    file_bytes: &[u8],
) -> Request<Body> {
    let boundary = "xray-fabric-test-boundary";
    let mut body = Vec::new();
    let mut push_field = |name: &str, value: &str| {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    };
    push_field("taskId", task_id);
    push_field("taskType", task_type);
    push_field("callbackUrl", callback_url);

    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"scan.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file_bytes);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Request::builder()
        .uri("/api/v1/analyze")
        .method("POST")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn s1_happy_path_multipart_panoramic_is_accepted() {
    let (app, _dir) = build_test_app().await;

    let request = multipart_request(
        "11111111-1111-4111-8111-111111111111",
        "panoramic",
        "http://cb.local/r",
        &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0],
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: AnalyzeResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.task_id, "11111111-1111-4111-8111-111111111111");
    assert_eq!(parsed.status, "QUEUED");
}

#[tokio::test]
async fn s2_duplicate_task_id_is_rejected_with_409() {
    let (app, _dir) = build_test_app().await;

    let submission = json!({
        "taskId": "22222222-2222-4222-8222-222222222222",
        "taskType": "panoramic",
        "imageUrl": "https://example.com/x.jpg",
        "callbackUrl": "http://cb.local/r",
    });

    let first = app.clone().oneshot(json_request(submission.clone())).await.unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = app.oneshot(json_request(submission)).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let body = axum::body::to_bytes(second.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.code, 10002);
}

#[tokio::test]
async fn s3_cephalometric_without_patient_info_is_rejected_with_400() {
    let (app, _dir) = build_test_app().await;

    let submission = json!({
        "taskId": "33333333-3333-4333-8333-333333333333",
        "taskType": "cephalometric",
        "imageUrl": "https://example.com/x.jpg",
        "callbackUrl": "http://cb.local/r",
    });

    let response = app.oneshot(json_request(submission)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.code, 10001);
}

#[tokio::test]
async fn rejects_non_uuidv4_task_id() {
    let (app, _dir) = build_test_app().await;

    let submission = json!({
        "taskId": "not-a-uuid",
        "taskType": "panoramic",
        "imageUrl": "https://example.com/x.jpg",
        "callbackUrl": "http://cb.local/r",
    });

    let response = app.oneshot(json_request(submission)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejects_non_http_callback_url() {
    let (app, _dir) = build_test_app().await;

    let submission = json!({
        "taskId": "44444444-4444-4444-8444-444444444444",
        "taskType": "panoramic",
        "imageUrl": "https://example.com/x.jpg",
        "callbackUrl": "ftp://cb.local/r",
    });

    let response = app.oneshot(json_request(submission)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejects_unsupported_content_type() {
    let (app, _dir) = build_test_app().await;

    let request = Request::builder()
        .uri("/api/v1/analyze")
        .method("POST")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.code, 10003);
}

#[tokio::test]
async fn metadata_is_echoed_verbatim() {
    let (app, _dir) = build_test_app().await;

    let submission = json!({
        "taskId": "55555555-5555-4555-8555-555555555555",
        "taskType": "dental_age",
        "imageUrl": "https://example.com/x.jpg",
        "callbackUrl": "http://cb.local/r",
        "metadata": {"patientRef": "abc-123", "priority": 2},
    });

    let response = app.oneshot(json_request(submission)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: AnalyzeResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.metadata, json!({"patientRef": "abc-123", "priority": 2}));
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let (app, _dir) = build_test_app().await;

    let request = Request::builder()
        .uri("/health")
        .method("GET")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
