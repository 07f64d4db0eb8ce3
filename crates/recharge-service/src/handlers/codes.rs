//! Inventory handlers: code import, listing and removal.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use recharge_core::{split_code_text, AppId, CodeFilter, CodeId, RechargeCode, UNKNOWN_APP_NAME};
use recharge_engine::IngestReport;

use super::parse_id;
use crate::auth::AuthTenant;
use crate::error::ApiError;
use crate::state::AppState;

/// Import request.
///
/// Codes may be sent as a list, as newline-separated text, or both.
#[derive(Debug, Deserialize)]
pub struct ImportCodesRequest {
    /// Target app.
    pub app_id: AppId,
    /// Codes, one per element.
    #[serde(default)]
    pub codes: Vec<String>,
    /// Codes, one per line.
    #[serde(default)]
    pub text: Option<String>,
}

/// A code together with the name of its app.
#[derive(Debug, Serialize)]
pub struct CodeResponse {
    /// The code.
    #[serde(flatten)]
    pub code: RechargeCode,
    /// Name of the owning app, or a placeholder if it was deleted.
    pub app_name: String,
}

/// Import codes for an app.
///
/// Answers 200 with the added values, or 409 with the duplicate report when
/// any value already exists; in that case nothing was imported.
pub async fn import_codes(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Json(body): Json<ImportCodesRequest>,
) -> Result<Json<IngestReport>, ApiError> {
    let mut raw = body.codes;
    if let Some(text) = body.text.as_deref() {
        raw.extend(split_code_text(text));
    }

    let report = state.engine.ingest(auth.tenant_id, body.app_id, &raw).await?;
    if report.is_rejected() {
        return Err(ApiError::DuplicateCodes(report));
    }
    Ok(Json(report))
}

/// List codes, optionally filtered by app, status and a substring.
pub async fn list_codes(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Query(filter): Query<CodeFilter>,
) -> Result<Json<Vec<CodeResponse>>, ApiError> {
    let codes = state.engine.list_codes(auth.tenant_id, &filter).await?;
    let names: HashMap<AppId, String> = state
        .engine
        .list_apps(auth.tenant_id)
        .await?
        .into_iter()
        .map(|app| (app.id, app.name))
        .collect();

    Ok(Json(
        codes
            .into_iter()
            .map(|code| CodeResponse {
                app_name: names
                    .get(&code.app_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_APP_NAME.to_string()),
                code,
            })
            .collect(),
    ))
}

/// Delete an unused code.
pub async fn delete_code(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let code_id: CodeId = parse_id(&id)?;
    state.engine.delete_code(auth.tenant_id, code_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
