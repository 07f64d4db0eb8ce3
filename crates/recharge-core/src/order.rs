//! Orders and their line items.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::App;
use crate::error::{RechargeError, Result};
use crate::ids::{AppId, CodeId, CustomerId, OrderId, OrderItemId, TenantId};

/// Lifecycle of an order.
///
/// `Pending` moves to `Completed` only through fulfillment. `Cancelled` is set
/// directly by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting fulfillment.
    Pending,
    /// Codes allocated and delivered.
    Completed,
    /// Abandoned by the operator.
    Cancelled,
}

impl OrderStatus {
    /// Stable lowercase name, used as the SQL column value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = RechargeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(RechargeError::Validation(format!("unknown order status: {other}"))),
        }
    }
}

/// Payment state reported by the payment gateway. Informational only:
/// completion does not depend on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No confirmation yet.
    #[default]
    Pending,
    /// Payment confirmed.
    Approved,
    /// Payment refused.
    Rejected,
}

impl PaymentStatus {
    /// Stable lowercase name, used as the SQL column value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = RechargeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(RechargeError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// A requested line item, before prices are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    /// App to deliver codes for.
    pub app_id: AppId,
    /// Number of codes. Must be at least 1.
    pub quantity: u32,
}

/// A line item of an order with its price snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Item ID.
    pub id: OrderItemId,
    /// App the codes are for.
    pub app_id: AppId,
    /// Number of codes.
    pub quantity: u32,
    /// Unit price in cents, copied from the catalog when the item was priced.
    pub unit_price_cents: i64,
}

impl OrderItem {
    /// Price a requested item against the current catalog entry.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::Validation` for a zero quantity.
    pub fn priced(request: NewOrderItem, app: &App) -> Result<Self> {
        if request.quantity == 0 {
            return Err(RechargeError::Validation(format!(
                "quantity for app {} must be at least 1",
                request.app_id
            )));
        }
        Ok(Self {
            id: OrderItemId::generate(),
            app_id: app.id,
            quantity: request.quantity,
            unit_price_cents: app.price_cents,
        })
    }

    /// `quantity * unit_price`, in cents. `None` if it does not fit an `i64`.
    #[must_use]
    pub fn subtotal_cents(&self) -> Option<i64> {
        i64::from(self.quantity).checked_mul(self.unit_price_cents)
    }
}

/// An order placed for a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order ID.
    pub id: OrderId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Customer the codes go to. May dangle if the customer was deleted.
    pub customer_id: CustomerId,
    /// Line items in the order they were requested.
    pub items: Vec<OrderItem>,
    /// Sum of item subtotals, in cents.
    pub total_cents: i64,
    /// Lifecycle state.
    pub status: OrderStatus,
    /// Allocated codes, concatenated in item order. Empty until completion.
    pub recharge_codes: Vec<CodeId>,
    /// Payment gateway reference.
    pub payment_id: Option<String>,
    /// Payment gateway state.
    #[serde(default)]
    pub payment_status: PaymentStatus,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// When the order was completed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a pending order from priced items.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::Validation` if there are no items or the total
    /// overflows.
    pub fn new(
        tenant_id: TenantId,
        customer_id: CustomerId,
        items: Vec<OrderItem>,
    ) -> Result<Self> {
        let mut order = Self {
            id: OrderId::generate(),
            tenant_id,
            customer_id,
            items: Vec::new(),
            total_cents: 0,
            status: OrderStatus::Pending,
            recharge_codes: Vec::new(),
            payment_id: None,
            payment_status: PaymentStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        };
        order.replace_items(items)?;
        Ok(order)
    }

    /// Replace all items and recompute the total.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::Validation` if there are no items or the total
    /// does not fit in an `i64`. The order is left unchanged on error.
    pub fn replace_items(&mut self, items: Vec<OrderItem>) -> Result<()> {
        if items.is_empty() {
            return Err(RechargeError::Validation(
                "an order needs at least one item".into(),
            ));
        }
        self.total_cents = items
            .iter()
            .try_fold(0_i64, |total, item| {
                item.subtotal_cents().and_then(|s| total.checked_add(s))
            })
            .ok_or_else(|| RechargeError::Validation("order total is too large".into()))?;
        self.items = items;
        Ok(())
    }

    /// Total number of codes the order consumes.
    #[must_use]
    pub fn code_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Per-item code requirements, in item order and not merged by app.
    #[must_use]
    pub fn requirements(&self) -> Vec<(AppId, u32)> {
        self.items.iter().map(|i| (i.app_id, i.quantity)).collect()
    }

    /// Whether the order was already fulfilled.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }

    /// Mark the order as fulfilled with the given codes.
    pub fn complete_with(&mut self, code_ids: Vec<CodeId>) {
        self.status = OrderStatus::Completed;
        self.recharge_codes = code_ids;
        self.completed_at = Some(Utc::now());
    }
}
