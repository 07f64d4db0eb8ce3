//! Customer management handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use recharge_core::{Customer, CustomerId, CustomerUpdate, NewCustomer};

use super::parse_id;
use crate::auth::AuthTenant;
use crate::error::ApiError;
use crate::state::AppState;

/// Register a customer.
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Json(body): Json<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let customer = state.engine.create_customer(auth.tenant_id, body).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// List the tenant's customers, newest first.
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
) -> Result<Json<Vec<Customer>>, ApiError> {
    Ok(Json(state.engine.list_customers(auth.tenant_id).await?))
}

/// Get one customer.
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    let customer_id: CustomerId = parse_id(&id)?;
    Ok(Json(
        state.engine.get_customer(auth.tenant_id, customer_id).await?,
    ))
}

/// Update a customer; absent fields are left unchanged.
pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Path(id): Path<String>,
    Json(body): Json<CustomerUpdate>,
) -> Result<Json<Customer>, ApiError> {
    let customer_id: CustomerId = parse_id(&id)?;
    let customer = state
        .engine
        .update_customer(auth.tenant_id, customer_id, body)
        .await?;
    Ok(Json(customer))
}

/// Delete a customer. Their orders are kept.
pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let customer_id: CustomerId = parse_id(&id)?;
    state
        .engine
        .delete_customer(auth.tenant_id, customer_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
