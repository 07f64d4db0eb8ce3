//! Customer records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RechargeError, Result};
use crate::ids::{CustomerId, TenantId};
use crate::patch::CustomerUpdate;

/// An end customer of a tenant. The phone number is where codes are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer ID.
    pub id: CustomerId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name, used in message greetings.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Phone number in the messaging gateway's format.
    pub phone: String,
    /// When the customer was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a customer.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Phone number.
    pub phone: String,
}

impl Customer {
    /// Build a customer from validated input.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::Validation` if the name or phone is blank.
    pub fn new(tenant_id: TenantId, input: NewCustomer) -> Result<Self> {
        let customer = Self {
            id: CustomerId::generate(),
            tenant_id,
            name: input.name.trim().to_string(),
            email: input.email.trim().to_string(),
            phone: input.phone.trim().to_string(),
            created_at: Utc::now(),
        };
        customer.validate()?;
        Ok(customer)
    }

    /// Apply an update command, re-validating the result.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::Validation` if the update blanks a required field.
    pub fn apply(&mut self, update: CustomerUpdate) -> Result<()> {
        let mut next = self.clone();
        update.name.apply_to(&mut next.name);
        update.email.apply_to(&mut next.email);
        update.phone.apply_to(&mut next.phone);
        next.name = next.name.trim().to_string();
        next.email = next.email.trim().to_string();
        next.phone = next.phone.trim().to_string();
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(RechargeError::Validation("customer name is required".into()));
        }
        if self.phone.is_empty() {
            return Err(RechargeError::Validation("customer phone is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Patch;

    fn input() -> NewCustomer {
        NewCustomer {
            name: " Ana ".into(),
            email: "ana@example.com".into(),
            phone: "5511999990000".into(),
        }
    }

    #[test]
    fn new_customer_trims_fields() {
        let customer = Customer::new(TenantId::generate(), input()).unwrap();
        assert_eq!(customer.name, "Ana");
    }

    #[test]
    fn blank_phone_is_rejected() {
        let mut data = input();
        data.phone = "   ".into();
        let result = Customer::new(TenantId::generate(), data);
        assert!(matches!(result, Err(RechargeError::Validation(_))));
    }

    #[test]
    fn failed_update_leaves_customer_untouched() {
        let mut customer = Customer::new(TenantId::generate(), input()).unwrap();
        let update = CustomerUpdate {
            name: Patch::Set("Ana Maria".into()),
            phone: Patch::Set(String::new()),
            ..CustomerUpdate::default()
        };
        assert!(customer.apply(update).is_err());
        assert_eq!(customer.name, "Ana");
        assert_eq!(customer.phone, "5511999990000");
    }
}
