//! Explicit partial-update commands.
//!
//! A field that is absent from an update request must leave the stored value
//! alone, which is different from setting it to an empty value. [`Patch`]
//! makes the two cases distinct in the type system.

use serde::{Deserialize, Deserializer};

use crate::ids::CustomerId;
use crate::order::{NewOrderItem, PaymentStatus};

/// A single field of an update command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    /// Keep the current value.
    Unchanged,
    /// Replace the current value.
    Set(T),
}

impl<T> Patch<T> {
    /// Whether this patch changes anything.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// Write the new value into `target` if one was given.
    pub fn apply_to(self, target: &mut T) {
        if let Self::Set(value) = self {
            *target = value;
        }
    }

    /// Borrow the new value, if any.
    #[must_use]
    pub const fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            Self::Unchanged => None,
        }
    }
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Unchanged
    }
}

// Used together with `#[serde(default)]`: absent fields never reach this impl,
// so every value that does reach it is a `Set`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self::Set)
    }
}

/// Update command for a customer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomerUpdate {
    /// New display name.
    pub name: Patch<String>,
    /// New email address.
    pub email: Patch<String>,
    /// New phone number (notification recipient).
    pub phone: Patch<String>,
}

impl CustomerUpdate {
    /// Whether the command changes no field.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.name.is_set() || self.email.is_set() || self.phone.is_set())
    }
}

/// Update command for a catalog app.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppUpdate {
    /// New product name.
    pub name: Patch<String>,
    /// New unit price in cents. Existing order items keep their snapshot.
    pub price_cents: Patch<i64>,
}

impl AppUpdate {
    /// Whether the command changes no field.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.name.is_set() || self.price_cents.is_set())
    }
}

/// Update command for an order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderUpdate {
    /// Move the order to another customer.
    pub customer_id: Patch<CustomerId>,
    /// Replace every line item; prices are snapshotted again.
    pub items: Patch<Vec<NewOrderItem>>,
    /// Payment gateway reference. `null` clears it.
    pub payment_id: Patch<Option<String>>,
    /// Payment status as reported by the gateway.
    pub payment_status: Patch<PaymentStatus>,
}

impl OrderUpdate {
    /// Whether the command touches the order's items or customer.
    ///
    /// Those fields are frozen once the order is completed.
    #[must_use]
    pub const fn changes_contents(&self) -> bool {
        self.customer_id.is_set() || self.items.is_set()
    }
}
