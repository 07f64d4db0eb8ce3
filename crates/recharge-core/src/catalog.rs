//! Catalog apps: the products a tenant sells codes for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RechargeError, Result};
use crate::ids::{AppId, TenantId};
use crate::patch::AppUpdate;

/// Name shown for an app that was deleted while still referenced.
pub const UNKNOWN_APP_NAME: &str = "unknown app";

/// Highest unit price an app may carry, in cents (one billion currency units).
pub const MAX_PRICE_CENTS: i64 = 100_000_000_000;

/// A product definition owned by a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    /// App ID.
    pub id: AppId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Product name, e.g. "Netflix".
    pub name: String,
    /// Current unit price in cents. Between 0 and `MAX_PRICE_CENTS`.
    pub price_cents: i64,
    /// When the app was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating an app.
#[derive(Debug, Clone, Deserialize)]
pub struct NewApp {
    /// Product name.
    pub name: String,
    /// Unit price in cents.
    pub price_cents: i64,
}

impl App {
    /// Build an app from validated input.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::Validation` for a blank name or a price outside
    /// `0..=MAX_PRICE_CENTS`.
    pub fn new(tenant_id: TenantId, input: NewApp) -> Result<Self> {
        let app = Self {
            id: AppId::generate(),
            tenant_id,
            name: input.name.trim().to_string(),
            price_cents: input.price_cents,
            created_at: Utc::now(),
        };
        app.validate()?;
        Ok(app)
    }

    /// Apply an update command. Existing order items are not affected.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::Validation` if the result would be invalid.
    pub fn apply(&mut self, update: AppUpdate) -> Result<()> {
        let mut next = self.clone();
        update.name.apply_to(&mut next.name);
        update.price_cents.apply_to(&mut next.price_cents);
        next.name = next.name.trim().to_string();
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(RechargeError::Validation("app name is required".into()));
        }
        if self.price_cents < 0 {
            return Err(RechargeError::Validation(format!(
                "app price must not be negative: {}",
                self.price_cents
            )));
        }
        if self.price_cents > MAX_PRICE_CENTS {
            return Err(RechargeError::Validation(format!(
                "app price {} exceeds the maximum of {MAX_PRICE_CENTS}",
                self.price_cents
            )));
        }
        Ok(())
    }
}

/// Display name for an app reference that may dangle.
#[must_use]
pub fn app_display_name(app: Option<&App>) -> String {
    app.map_or_else(|| UNKNOWN_APP_NAME.to_string(), |a| a.name.clone())
}
