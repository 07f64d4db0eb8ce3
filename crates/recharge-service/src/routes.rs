//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{apps, codes, customers, health, orders};
use crate::state::AppState;

/// Maximum concurrent requests for code imports.
/// Imports are large and hold the tenant lock while checking duplicates.
const IMPORT_MAX_CONCURRENT_REQUESTS: usize = 10;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Customers (tenant JWT auth)
/// - `POST /v1/customers`, `GET /v1/customers`
/// - `GET|PATCH|DELETE /v1/customers/:id`
///
/// ## Apps (tenant JWT auth)
/// - `POST /v1/apps`, `GET /v1/apps`
/// - `GET|PATCH|DELETE /v1/apps/:id`
///
/// ## Codes (tenant JWT auth)
/// - `GET /v1/codes?app_id=&status=&search=` - List inventory
/// - `POST /v1/codes/import` - Import codes (409 with report on duplicates)
/// - `DELETE /v1/codes/:id` - Delete an unused code
///
/// ## Orders (tenant JWT auth)
/// - `POST /v1/orders`, `GET /v1/orders`
/// - `GET|PATCH|DELETE /v1/orders/:id`
/// - `POST /v1/orders/:id/complete` - Allocate codes and deliver them
/// - `POST /v1/orders/:id/cancel` - Cancel a pending order
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let import_routes = Router::new()
        .route("/", post(codes::import_codes))
        .layer(ConcurrencyLimitLayer::new(IMPORT_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Customers
        .route(
            "/customers",
            post(customers::create_customer).get(customers::list_customers),
        )
        .route(
            "/customers/:id",
            get(customers::get_customer)
                .patch(customers::update_customer)
                .delete(customers::delete_customer),
        )
        // Apps
        .route("/apps", post(apps::create_app).get(apps::list_apps))
        .route(
            "/apps/:id",
            get(apps::get_app)
                .patch(apps::update_app)
                .delete(apps::delete_app),
        )
        // Codes
        .route("/codes", get(codes::list_codes))
        .route("/codes/:id", delete(codes::delete_code))
        .nest("/codes/import", import_routes)
        // Orders
        .route(
            "/orders",
            post(orders::create_order).get(orders::list_orders),
        )
        .route(
            "/orders/:id",
            get(orders::get_order)
                .patch(orders::update_order)
                .delete(orders::delete_order),
        )
        .route("/orders/:id/complete", post(orders::complete_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
