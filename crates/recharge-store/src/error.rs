//! Error types for recharge storage.

use recharge_core::RechargeError;

/// Unique constraint on code values within a tenant (PostgreSQL).
pub(crate) const CODE_VALUE_CONSTRAINT: &str = "recharge_codes_tenant_code_key";

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// The backend could not be reached in time. Safe to retry.
    #[error("database unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A code value already exists in the tenant's inventory.
    #[error("duplicate recharge code: {code}")]
    DuplicateCode {
        /// The offending value.
        code: String,
    },

    /// The records changed since they were read; nothing was written.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for RechargeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::Unavailable(msg),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::DuplicateCode { code } => {
                Self::Conflict(format!("recharge code already exists: {code}"))
            }
            StoreError::NotFound { entity, id } => {
                Self::Storage(format!("{entity} not found: {id}"))
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Storage(msg),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                let detail = db
                    .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                    .and_then(sqlx::postgres::PgDatabaseError::detail);
                unique_violation(db.constraint(), detail, db.message())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Serialization(err.to_string())
            }
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Map a unique violation. Only the code-value constraint is a duplicate code;
/// any other key clash means the row changed under us.
fn unique_violation(constraint: Option<&str>, detail: Option<&str>, message: &str) -> StoreError {
    if constraint != Some(CODE_VALUE_CONSTRAINT) {
        return StoreError::Conflict(message.to_string());
    }
    // Detail reads "Key (tenant_id, code)=(<uuid>, <code>) already exists."
    let code = detail
        .and_then(|d| d.split_once(")=("))
        .and_then(|(_, values)| values.rsplit_once(") already exists"))
        .and_then(|(values, _)| values.split_once(", "))
        .map_or_else(|| message.to_string(), |(_, code)| code.to_string());
    StoreError::DuplicateCode { code }
}
