//! Health and authentication tests.

mod common;

use axum::http::StatusCode;
use common::{bearer_for, TestHarness};
use recharge_core::TenantId;
use recharge_service::ServiceConfig;
use serde_json::Value;

#[tokio::test]
async fn health_is_public() {
    let harness = TestHarness::with_config(ServiceConfig {
        max_codes_per_import: 250,
        ..ServiceConfig::default()
    });

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["notifications"], "log");
    assert_eq!(body["auth_configured"], true);
    assert_eq!(body["max_codes_per_import"], 250);
}

#[tokio::test]
async fn health_is_degraded_without_jwt_secret() {
    let harness = TestHarness::with_raw_config(ServiceConfig {
        auth_jwt_secret: String::new(),
        ..ServiceConfig::default()
    });

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["auth_configured"], false);

    harness
        .server
        .get("/v1/apps")
        .add_header("authorization", harness.auth_header())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/customers").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn token_signed_with_another_secret_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/apps")
        .add_header("authorization", bearer_for(TenantId::generate(), "wrong-secret"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_bearer_scheme_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/orders")
        .add_header("authorization", "Basic dXNlcjpwYXNz")
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}
