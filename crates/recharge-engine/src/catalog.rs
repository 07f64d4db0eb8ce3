//! Customer, catalog and inventory management.

use recharge_core::{
    App, AppId, AppUpdate, CodeFilter, CodeId, Customer, CustomerId, CustomerUpdate, NewApp,
    NewCustomer, RechargeCode, RechargeError, Result, TenantId,
};

use crate::engine::{or_not_found, Engine};

impl Engine {
    // =========================================================================
    // Customers
    // =========================================================================

    /// Register a customer.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::Validation` for a blank name or phone.
    pub async fn create_customer(
        &self,
        tenant_id: TenantId,
        input: NewCustomer,
    ) -> Result<Customer> {
        let customer = Customer::new(tenant_id, input)?;
        self.store.put_customer(&customer).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            customer_id = %customer.id,
            "Customer created"
        );
        Ok(customer)
    }

    /// Get a customer.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::CustomerNotFound` if it is absent in the tenant.
    pub async fn get_customer(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
    ) -> Result<Customer> {
        self.store
            .get_customer(&tenant_id, &customer_id)
            .await?
            .ok_or(RechargeError::CustomerNotFound { customer_id })
    }

    /// List customers, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list_customers(&self, tenant_id: TenantId) -> Result<Vec<Customer>> {
        Ok(self.store.list_customers(&tenant_id).await?)
    }

    /// Apply an update to a customer.
    ///
    /// # Errors
    ///
    /// Returns `CustomerNotFound`, or `Validation` if the result is invalid.
    pub async fn update_customer(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Customer> {
        let mut customer = self.get_customer(tenant_id, customer_id).await?;
        if update.is_empty() {
            return Ok(customer);
        }
        customer.apply(update)?;
        self.store.put_customer(&customer).await?;
        Ok(customer)
    }

    /// Delete a customer. Their orders stay and show the customer as missing.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::CustomerNotFound` if it is absent in the tenant.
    pub async fn delete_customer(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
    ) -> Result<()> {
        self.store
            .delete_customer(&tenant_id, &customer_id)
            .await
            .map_err(|e| or_not_found(e, RechargeError::CustomerNotFound { customer_id }))?;

        tracing::info!(tenant_id = %tenant_id, customer_id = %customer_id, "Customer deleted");
        Ok(())
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Add an app to the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::Validation` for a blank name or negative price.
    pub async fn create_app(&self, tenant_id: TenantId, input: NewApp) -> Result<App> {
        let app = App::new(tenant_id, input)?;
        self.store.put_app(&app).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            app_id = %app.id,
            price_cents = app.price_cents,
            "App created"
        );
        Ok(app)
    }

    /// Get an app.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::AppNotFound` if it is absent in the tenant.
    pub async fn get_app(&self, tenant_id: TenantId, app_id: AppId) -> Result<App> {
        self.store
            .get_app(&tenant_id, &app_id)
            .await?
            .ok_or(RechargeError::AppNotFound { app_id })
    }

    /// List apps ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list_apps(&self, tenant_id: TenantId) -> Result<Vec<App>> {
        Ok(self.store.list_apps(&tenant_id).await?)
    }

    /// Apply an update to an app. Existing orders keep their price snapshot.
    ///
    /// # Errors
    ///
    /// Returns `AppNotFound`, or `Validation` if the result is invalid.
    pub async fn update_app(
        &self,
        tenant_id: TenantId,
        app_id: AppId,
        update: AppUpdate,
    ) -> Result<App> {
        let mut app = self.get_app(tenant_id, app_id).await?;
        if update.is_empty() {
            return Ok(app);
        }
        app.apply(update)?;
        self.store.put_app(&app).await?;
        Ok(app)
    }

    /// Delete an app. Its codes and order items are kept.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::AppNotFound` if it is absent in the tenant.
    pub async fn delete_app(&self, tenant_id: TenantId, app_id: AppId) -> Result<()> {
        self.store
            .delete_app(&tenant_id, &app_id)
            .await
            .map_err(|e| or_not_found(e, RechargeError::AppNotFound { app_id }))?;

        tracing::info!(tenant_id = %tenant_id, app_id = %app_id, "App deleted");
        Ok(())
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    /// List codes matching a filter, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list_codes(
        &self,
        tenant_id: TenantId,
        filter: &CodeFilter,
    ) -> Result<Vec<RechargeCode>> {
        Ok(self.store.list_codes(&tenant_id, filter).await?)
    }

    /// Delete an unused code.
    ///
    /// # Errors
    ///
    /// Returns `CodeNotFound`, or `CodeAlreadyUsed` for a delivered code.
    pub async fn delete_code(&self, tenant_id: TenantId, code_id: CodeId) -> Result<()> {
        let _guard = self.locks.lock(tenant_id).await;

        let code = self
            .store
            .get_code(&tenant_id, &code_id)
            .await?
            .ok_or(RechargeError::CodeNotFound { code_id })?;
        if code.is_used {
            return Err(RechargeError::CodeAlreadyUsed { code_id });
        }

        self.store
            .delete_code(&tenant_id, &code_id)
            .await
            .map_err(|e| or_not_found(e, RechargeError::CodeNotFound { code_id }))?;

        tracing::info!(tenant_id = %tenant_id, code_id = %code_id, "Recharge code deleted");
        Ok(())
    }
}
