//! Router-level tests: full HTTP round-trips against the in-memory state.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::handlers::router;
use crate::test_helpers::test_state;

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_subnet4_crud_round_trip() {
    let (state, _channel) = test_state().await;
    let app = router(state);

    let (status, created) = request(
        &app,
        "POST",
        "/api/v1/subnets4",
        Some(json!({ "prefix": "10.0.0.0/24", "nodes": ["node-a"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["subnet_id"], 1);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = request(&app, "GET", &format!("/api/v1/subnets4/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["prefix"], "10.0.0.0/24");

    let (status, listed) = request(&app, "GET", "/api/v1/subnets4", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = request(&app, "DELETE", &format!("/api/v1/subnets4/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = request(&app, "GET", &format!("/api/v1/subnets4/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_error_kinds_map_to_status_codes() {
    let (state, _channel) = test_state().await;
    let app = router(state);

    let (status, created) = request(
        &app,
        "POST",
        "/api/v1/subnets4",
        Some(json!({ "prefix": "10.0.0.0/16", "nodes": ["node-a"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let subnet_id = created["id"].as_str().unwrap().to_string();

    // Overlapping sibling is a conflict.
    let (status, body) = request(
        &app,
        "POST",
        "/api/v1/subnets4",
        Some(json!({ "prefix": "10.0.5.0/24", "nodes": ["node-a"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    // A reserved range the subnet cannot fund is a validation error.
    let (status, body) = request(
        &app,
        "POST",
        "/api/v1/reserved-pools4",
        Some(json!({
            "subnet_id": subnet_id,
            "begin_address": "10.0.0.50",
            "end_address": "10.0.0.59",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn test_health() {
    let (state, _channel) = test_state().await;
    let app = router(state);

    let (status, body) = request(&app, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
