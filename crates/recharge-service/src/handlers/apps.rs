//! App catalog handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use recharge_core::{App, AppId, AppUpdate, NewApp};

use super::parse_id;
use crate::auth::AuthTenant;
use crate::error::ApiError;
use crate::state::AppState;

/// Add an app to the catalog.
pub async fn create_app(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Json(body): Json<NewApp>,
) -> Result<(StatusCode, Json<App>), ApiError> {
    let app = state.engine.create_app(auth.tenant_id, body).await?;
    Ok((StatusCode::CREATED, Json(app)))
}

/// List apps by name.
pub async fn list_apps(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
) -> Result<Json<Vec<App>>, ApiError> {
    Ok(Json(state.engine.list_apps(auth.tenant_id).await?))
}

/// Get one app.
pub async fn get_app(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Path(id): Path<String>,
) -> Result<Json<App>, ApiError> {
    let app_id: AppId = parse_id(&id)?;
    Ok(Json(state.engine.get_app(auth.tenant_id, app_id).await?))
}

/// Update an app. Price changes don't affect existing orders.
pub async fn update_app(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Path(id): Path<String>,
    Json(body): Json<AppUpdate>,
) -> Result<Json<App>, ApiError> {
    let app_id: AppId = parse_id(&id)?;
    Ok(Json(
        state.engine.update_app(auth.tenant_id, app_id, body).await?,
    ))
}

/// Remove an app from the catalog.
pub async fn delete_app(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let app_id: AppId = parse_id(&id)?;
    state.engine.delete_app(auth.tenant_id, app_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
