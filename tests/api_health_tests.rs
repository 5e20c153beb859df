//! 健康检查与公共端点集成测试

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};

mod common;
use common::TestApp;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_welcome_endpoint() {
    let app = TestApp::new();

    let response = app.send(get("/")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text, "Welcome to Auth service");
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();

    let response = app.send(get("/health")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["status"], "ok");
    assert_eq!(response.json["version"], env!("CARGO_PKG_VERSION"));
    assert!(response.json["uptime_secs"].is_number());
}

#[tokio::test]
async fn test_ready_endpoint() {
    let app = TestApp::new();

    let response = app.send(get("/ready")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["ready"], true);
    assert_eq!(response.json["checks"][0]["name"], "credential_store");
    assert_eq!(response.json["checks"][0]["status"], "healthy");
}

#[tokio::test]
async fn test_jwks_endpoint() {
    let app = TestApp::new();

    let response = app.send(get("/.well-known/jwks.json")).await;

    assert_eq!(response.status, StatusCode::OK);
    let keys = response.json["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["kty"], "OKP");
    assert_eq!(keys[0]["crv"], "Ed25519");
    assert_eq!(keys[0]["alg"], "EdDSA");
    assert_eq!(keys[0]["use"], "sig");
    assert_eq!(keys[0]["x"], common::PUBLIC_X);
    assert_eq!(keys[0]["kid"], app.jwt_service.signing_kid());
    assert!(keys[0].get("d").is_none());
}

#[tokio::test]
async fn test_response_carries_trace_headers() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header("x-trace-id", "trace-abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.headers.get("x-trace-id").unwrap(), "trace-abc");
    assert!(response.headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn test_cors_allows_configured_origin_with_credentials() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .method("OPTIONS")
                .uri("/auth/login")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(
        response
            .headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:5173"
    );
    assert_eq!(
        response
            .headers
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );

    let foreign = app
        .send(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "http://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(foreign
        .headers
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_error_body_request_id_matches_header() {
    let app = TestApp::new();

    let response = app.send(get("/auth/self")).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    let header_id = response.headers.get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(response.json["error"]["request_id"], header_id);
}
