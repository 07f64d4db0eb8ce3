//! Error types for the recharge back-office.

use crate::ids::{AppId, CodeId, CustomerId, IdError, OrderId};

/// Result type for recharge operations.
pub type Result<T> = std::result::Result<T, RechargeError>;

/// Errors that can occur in recharge operations.
///
/// Variants fall into the caller-facing classes validation, not found,
/// conflict, stock and transient storage; see [`RechargeError::is_retryable`].
#[derive(Debug, thiserror::Error)]
pub enum RechargeError {
    /// Invalid input, rejected before any mutation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Order not found in the tenant's scope.
    #[error("order not found: {order_id}")]
    OrderNotFound {
        /// The order ID that was not found.
        order_id: OrderId,
    },

    /// Customer not found in the tenant's scope.
    #[error("customer not found: {customer_id}")]
    CustomerNotFound {
        /// The customer ID that was not found.
        customer_id: CustomerId,
    },

    /// App not found in the tenant's catalog.
    #[error("app not found: {app_id}")]
    AppNotFound {
        /// The app ID that was not found.
        app_id: AppId,
    },

    /// Recharge code not found in the tenant's inventory.
    #[error("recharge code not found: {code_id}")]
    CodeNotFound {
        /// The code ID that was not found.
        code_id: CodeId,
    },

    /// The order was already completed.
    #[error("order already completed: {order_id}")]
    AlreadyCompleted {
        /// The completed order.
        order_id: OrderId,
    },

    /// The order was cancelled and can no longer be completed.
    #[error("order cancelled: {order_id}")]
    OrderCancelled {
        /// The cancelled order.
        order_id: OrderId,
    },

    /// The recharge code was already delivered to an order.
    #[error("recharge code already used: {code_id}")]
    CodeAlreadyUsed {
        /// The used code.
        code_id: CodeId,
    },

    /// Not enough unused codes to fulfill one of the order's line items.
    #[error("insufficient stock for {app_name}: needed={needed}, available={available}")]
    InsufficientStock {
        /// The under-supplied app.
        app_id: AppId,
        /// Display name of the app.
        app_name: String,
        /// Codes required by the line item.
        needed: u32,
        /// Unused codes that were still available for it.
        available: u32,
    },

    /// A concurrent writer changed the state this operation depended on.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage backend temporarily unavailable; safe to retry.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl RechargeError {
    /// Whether retrying the same call may succeed without caller changes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict(_))
    }

    /// For stock errors, how many more codes must be imported.
    #[must_use]
    pub const fn shortfall(&self) -> Option<u32> {
        match self {
            Self::InsufficientStock {
                needed, available, ..
            } => Some(needed.saturating_sub(*available)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortfall_is_needed_minus_available() {
        let err = RechargeError::InsufficientStock {
            app_id: AppId::generate(),
            app_name: "Netflix".into(),
            needed: 5,
            available: 3,
        };
        assert_eq!(err.shortfall(), Some(2));
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "insufficient stock for Netflix: needed=5, available=3"
        );
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(RechargeError::Unavailable("pool timed out".into()).is_retryable());
        assert!(!RechargeError::Storage("corrupt row".into()).is_retryable());
    }
}
