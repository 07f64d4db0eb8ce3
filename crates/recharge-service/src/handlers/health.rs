//! Health check handler.
//!
//! Public and unauthenticated. Reports what the process is wired to so an
//! operator can tell a log-only or unauthenticated deployment at a glance.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when tenant tokens cannot be verified.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Storage backend in use.
    pub storage: &'static str,
    /// Where customer messages go: `whatsapp` or `log`.
    pub notifications: &'static str,
    /// Whether a JWT secret is configured.
    pub auth_configured: bool,
    /// Largest accepted import batch and order item quantity.
    pub max_codes_per_import: usize,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let config = &state.config;
    let auth_configured = !config.auth_jwt_secret.is_empty();

    Json(HealthResponse {
        status: if auth_configured { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        storage: config.resolved_backend().as_str(),
        notifications: if config.whatsapp.is_some() {
            "whatsapp"
        } else {
            "log"
        },
        auth_configured,
        max_codes_per_import: state.engine.config().max_codes_per_import,
    })
}
