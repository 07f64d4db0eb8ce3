//! Order handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use recharge_core::{CustomerId, NewOrderItem, Order, OrderId, OrderUpdate, RechargeCode};
use recharge_engine::Fulfillment;

use super::parse_id;
use crate::auth::AuthTenant;
use crate::error::ApiError;
use crate::state::AppState;

/// Create order request.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// The ordering customer.
    pub customer_id: CustomerId,
    /// Requested apps and quantities.
    pub items: Vec<NewOrderItem>,
}

/// An order with the codes delivered for it.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// The order.
    #[serde(flatten)]
    pub order: Order,
    /// Delivered codes in allocation order; empty until completed.
    pub codes: Vec<RechargeCode>,
}

/// Create a pending order.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state
        .engine
        .create_order(auth.tenant_id, body.customer_id, body.items)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List orders, newest first.
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.engine.list_orders(auth.tenant_id).await?))
}

/// Get an order and its delivered codes.
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let order = state.engine.get_order(auth.tenant_id, order_id).await?;
    let codes = state.engine.order_codes(&order).await?;
    Ok(Json(OrderResponse { order, codes }))
}

/// Update customer, items or payment fields of an order.
pub async fn update_order(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Path(id): Path<String>,
    Json(body): Json<OrderUpdate>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(
        state
            .engine
            .update_order(auth.tenant_id, order_id, body)
            .await?,
    ))
}

/// Delete an order.
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    state.engine.delete_order(auth.tenant_id, order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Complete an order, allocating its codes.
pub async fn complete_order(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Path(id): Path<String>,
) -> Result<Json<Fulfillment>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let fulfillment = state
        .engine
        .complete_order(auth.tenant_id, order_id)
        .await?;
    Ok(Json(fulfillment))
}

/// Cancel a pending order.
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(
        state.engine.cancel_order(auth.tenant_id, order_id).await?,
    ))
}
