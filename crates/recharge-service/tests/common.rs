//! Common test utilities for recharge service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use recharge_core::TenantId;
use recharge_engine::{Notifier, NotifyOutcome};
use recharge_service::{create_router, AppState, Claims, ServiceConfig, StoreBackend};
use recharge_store::MemoryStore;

/// Secret the harness signs its tokens with.
pub const TEST_JWT_SECRET: &str = "test-jwt-secret";

/// Notifier that keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    /// Messages sent so far as `(recipient, text)`.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> NotifyOutcome {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        NotifyOutcome::delivered()
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The tenant the default token authenticates as.
    pub tenant_id: TenantId,
    /// Messages the service tried to send.
    pub notifier: Arc<RecordingNotifier>,
}

impl TestHarness {
    /// Create a new test harness with a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    /// Create a harness with config overrides; the JWT secret is always set.
    pub fn with_config(config: ServiceConfig) -> Self {
        Self::with_raw_config(ServiceConfig {
            auth_jwt_secret: TEST_JWT_SECRET.into(),
            ..config
        })
    }

    /// Create a harness with the config exactly as given, over a memory store.
    pub fn with_raw_config(config: ServiceConfig) -> Self {
        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            store_backend: Some(StoreBackend::Memory),
            ..config
        };

        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::with_notifier(Arc::new(MemoryStore::new()), notifier.clone(), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            tenant_id: TenantId::generate(),
            notifier,
        }
    }

    /// Authorization header for the harness tenant.
    pub fn auth_header(&self) -> String {
        bearer_for(self.tenant_id, TEST_JWT_SECRET)
    }

    /// Authorization header for a different, fresh tenant.
    pub fn other_tenant_auth_header() -> String {
        bearer_for(TenantId::generate(), TEST_JWT_SECRET)
    }

    /// Create a customer and return its id.
    pub async fn create_customer(&self, name: &str, phone: &str) -> String {
        let response = self
            .server
            .post("/v1/customers")
            .add_header("authorization", self.auth_header())
            .json(&json!({
                "name": name,
                "email": format!("{}@example.com", name.to_lowercase()),
                "phone": phone
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["id"].as_str().unwrap().to_string()
    }

    /// Create an app and return its id.
    pub async fn create_app(&self, name: &str, price_cents: i64) -> String {
        let response = self
            .server
            .post("/v1/apps")
            .add_header("authorization", self.auth_header())
            .json(&json!({ "name": name, "price_cents": price_cents }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["id"].as_str().unwrap().to_string()
    }

    /// Import codes for an app, expecting success.
    pub async fn import(&self, app_id: &str, codes: &[&str]) {
        self.server
            .post("/v1/codes/import")
            .add_header("authorization", self.auth_header())
            .json(&json!({ "app_id": app_id, "codes": codes }))
            .await
            .assert_status_ok();
    }

    /// Create an order with one line item and return its id.
    pub async fn create_order(&self, customer_id: &str, app_id: &str, quantity: u32) -> String {
        let response = self
            .server
            .post("/v1/orders")
            .add_header("authorization", self.auth_header())
            .json(&json!({
                "customer_id": customer_id,
                "items": [{ "app_id": app_id, "quantity": quantity }]
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["id"].as_str().unwrap().to_string()
    }
}

/// Mint a bearer header for a tenant, valid for an hour.
pub fn bearer_for(tenant_id: TenantId, secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: tenant_id.to_string(),
        exp: now + 3600,
        iat: Some(now),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign token");
    format!("Bearer {token}")
}
