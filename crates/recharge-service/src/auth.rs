//! Tenant authentication.
//!
//! Tenants authenticate with an HS256 JWT whose `sub` claim is the tenant
//! id. Token issuance happens elsewhere; this service only verifies.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde::{Deserialize, Serialize};

use recharge_core::TenantId;

use crate::error::ApiError;
use crate::state::AppState;

/// JWT claims for tenant tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (tenant ID).
    pub sub: String,
    /// Expiration time.
    pub exp: i64,
    /// Issued at.
    #[serde(default)]
    pub iat: Option<i64>,
}

/// An authenticated tenant extracted from the bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthTenant {
    /// The tenant every operation in this request is scoped to.
    pub tenant_id: TenantId,
}

impl FromRequestParts<Arc<AppState>> for AuthTenant {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            // Extract the Authorization header
            let auth_header = parts
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .ok_or(ApiError::Unauthorized)?;

            // Extract the Bearer token
            let token = auth_header
                .strip_prefix("Bearer ")
                .ok_or(ApiError::Unauthorized)?;

            let claims = validate_jwt(token, state)?;
            let tenant_id = claims.sub.parse::<TenantId>().map_err(|_| {
                tracing::debug!(subject = %claims.sub, "Token subject is not a tenant id");
                ApiError::Unauthorized
            })?;

            Ok(AuthTenant { tenant_id })
        })
    }
}

/// Verify signature and expiry of a tenant token.
fn validate_jwt(token: &str, state: &AppState) -> Result<Claims, ApiError> {
    if state.config.auth_jwt_secret.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &state.decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            ApiError::Unauthorized
        })
}
