//! Health check and general HTTP behaviour.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app};
use serde_json::json;

#[tokio::test]
async fn health_reports_database_and_backend() {
    let app = build_test_app(json!({"message": "ok"})).await;

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "mediaflow-api");
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["toolkit"], "healthy");
    assert_eq!(app.transport.calls.lock().unwrap().as_slice(), ["GET /v1/toolkit/test"]);
}

#[tokio::test]
async fn response_carries_request_id() {
    let app = build_test_app(json!({})).await;

    let response = app.get("/health").await;

    let request_id = response.headers().get("x-request-id").unwrap();
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app(json!({})).await;
    let response = app.get("/api/nothing-here").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn endpoint_catalog_is_listed() {
    let app = build_test_app(json!({})).await;

    let json = body_json(app.get("/api/endpoints").await).await;

    let operations = json["data"].as_array().unwrap();
    assert!(operations
        .iter()
        .any(|op| op["endpoint"] == "/v1/audio/concatenate" && op["method"] == "POST"));
}
