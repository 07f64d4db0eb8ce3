//! Code import and inventory tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::{json, Value};

#[tokio::test]
async fn import_accepts_list_and_text() {
    let harness = TestHarness::new();
    let app = harness.create_app("Netflix", 2500).await;

    let response = harness
        .server
        .post("/v1/codes/import")
        .add_header("authorization", harness.auth_header())
        .json(&json!({
            "app_id": app,
            "codes": ["N1"],
            "text": " N2 \n\nN3\nN1\n"
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["added"], json!(["N1", "N2", "N3"]));
    assert_eq!(body["duplicates"], json!([]));
}

#[tokio::test]
async fn duplicates_reject_whole_import_with_report() {
    let harness = TestHarness::new();
    let x = harness.create_app("X", 1000).await;
    let y = harness.create_app("Y", 1000).await;
    harness.import(&x, &["A1", "A2"]).await;

    let response = harness
        .server
        .post("/v1/codes/import")
        .add_header("authorization", harness.auth_header())
        .json(&json!({ "app_id": y, "codes": ["A1", "A3"] }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "duplicate_codes");
    let duplicates = body["error"]["details"]["duplicates"].as_array().unwrap();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0]["code"], "A1");
    assert_eq!(duplicates[0]["app_name"], "X");
    assert_eq!(duplicates[0]["app_id"], x.as_str());

    let response = harness
        .server
        .get("/v1/codes")
        .add_query_param("search", "A3")
        .add_header("authorization", harness.auth_header())
        .await;
    let codes: Vec<Value> = response.json();
    assert!(codes.is_empty());
}

#[tokio::test]
async fn empty_import_is_bad_request() {
    let harness = TestHarness::new();
    let app = harness.create_app("Netflix", 2500).await;

    harness
        .server
        .post("/v1/codes/import")
        .add_header("authorization", harness.auth_header())
        .json(&json!({ "app_id": app, "text": "\n  \n" }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn list_filters_by_status_and_search() {
    let harness = TestHarness::new();
    let netflix = harness.create_app("Netflix", 2500).await;
    let spotify = harness.create_app("Spotify", 1990).await;
    harness.import(&netflix, &["NF-001", "NF-002"]).await;
    harness.import(&spotify, &["SP-001"]).await;
    let customer = harness.create_customer("Ana", "5511999990000").await;
    let order = harness.create_order(&customer, &netflix, 1).await;
    harness
        .server
        .post(&format!("/v1/orders/{order}/complete"))
        .add_header("authorization", harness.auth_header())
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/codes")
        .add_query_param("status", "unused")
        .add_query_param("search", "nf")
        .add_header("authorization", harness.auth_header())
        .await;

    response.assert_status_ok();
    let codes: Vec<Value> = response.json();
    assert_eq!(codes.len(), 1);
    assert_eq!(codes[0]["code"], "NF-002");
    assert_eq!(codes[0]["app_name"], "Netflix");
    assert_eq!(codes[0]["is_used"], false);
}

#[tokio::test]
async fn used_code_cannot_be_deleted() {
    let harness = TestHarness::new();
    let app = harness.create_app("Netflix", 2500).await;
    harness.import(&app, &["N1", "N2"]).await;
    let customer = harness.create_customer("Ana", "5511999990000").await;
    let order = harness.create_order(&customer, &app, 1).await;
    harness
        .server
        .post(&format!("/v1/orders/{order}/complete"))
        .add_header("authorization", harness.auth_header())
        .await
        .assert_status_ok();

    let codes: Vec<Value> = harness
        .server
        .get("/v1/codes")
        .add_header("authorization", harness.auth_header())
        .await
        .json();
    let used = codes.iter().find(|c| c["code"] == "N1").unwrap();
    let unused = codes.iter().find(|c| c["code"] == "N2").unwrap();

    harness
        .server
        .delete(&format!("/v1/codes/{}", used["id"].as_str().unwrap()))
        .add_header("authorization", harness.auth_header())
        .await
        .assert_status(StatusCode::CONFLICT);
    harness
        .server
        .delete(&format!("/v1/codes/{}", unused["id"].as_str().unwrap()))
        .add_header("authorization", harness.auth_header())
        .await
        .assert_status(StatusCode::NO_CONTENT);
}
