//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use recharge_core::{AppId, RechargeError};
use recharge_engine::IngestReport;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - invalid state transition or a concurrent change.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Code import refused because some values already exist.
    #[error("duplicate codes: {}", .0.duplicates.len())]
    DuplicateCodes(IngestReport),

    /// Not enough unused codes to complete an order.
    #[error("insufficient stock for {app_name}: needed={needed}, available={available}")]
    InsufficientStock {
        /// The under-supplied app.
        app_id: AppId,
        /// Display name of the app.
        app_name: String,
        /// Codes required.
        needed: u32,
        /// Codes available.
        available: u32,
    },

    /// Storage temporarily unavailable; the request can be retried.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::DuplicateCodes(report) => (
                StatusCode::CONFLICT,
                "duplicate_codes",
                format!(
                    "{} code(s) already exist; nothing was imported",
                    report.duplicates.len()
                ),
                serde_json::to_value(report).ok(),
            ),
            Self::InsufficientStock {
                app_id,
                app_name,
                needed,
                available,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_stock",
                self.to_string(),
                Some(serde_json::json!({
                    "app_id": app_id,
                    "app_name": app_name,
                    "needed": needed,
                    "available": available,
                    "shortfall": needed.saturating_sub(*available),
                })),
            ),
            Self::Unavailable(msg) => {
                tracing::warn!(error = %msg, "Storage unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "unavailable",
                    "Storage is temporarily unavailable, retry later".to_string(),
                    None,
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<RechargeError> for ApiError {
    fn from(err: RechargeError) -> Self {
        match err {
            RechargeError::Validation(msg) => Self::BadRequest(msg),
            RechargeError::InvalidId(_) => Self::BadRequest(err.to_string()),
            RechargeError::OrderNotFound { .. }
            | RechargeError::CustomerNotFound { .. }
            | RechargeError::AppNotFound { .. }
            | RechargeError::CodeNotFound { .. } => Self::NotFound(err.to_string()),
            RechargeError::AlreadyCompleted { .. }
            | RechargeError::OrderCancelled { .. }
            | RechargeError::CodeAlreadyUsed { .. }
            | RechargeError::Conflict(_) => Self::Conflict(err.to_string()),
            RechargeError::InsufficientStock {
                app_id,
                app_name,
                needed,
                available,
            } => Self::InsufficientStock {
                app_id,
                app_name,
                needed,
                available,
            },
            RechargeError::Unavailable(msg) => Self::Unavailable(msg),
            RechargeError::Storage(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use recharge_core::OrderId;

    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (
                RechargeError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                RechargeError::OrderNotFound {
                    order_id: OrderId::generate(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                RechargeError::AlreadyCompleted {
                    order_id: OrderId::generate(),
                },
                StatusCode::CONFLICT,
            ),
            (
                RechargeError::InsufficientStock {
                    app_id: AppId::generate(),
                    app_name: "Netflix".into(),
                    needed: 5,
                    available: 3,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                RechargeError::Unavailable("pool timed out".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                RechargeError::Storage("corrupt".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
