//! In-memory storage implementation.
//!
//! All tenants live behind one `RwLock`, so every write is trivially atomic.
//! Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use recharge_core::{
    App, AppId, CodeFilter, CodeId, Customer, CustomerId, Order, OrderId, OrderStatus,
    RechargeCode, TenantId,
};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Default)]
struct TenantData {
    customers: HashMap<CustomerId, Customer>,
    apps: HashMap<AppId, App>,
    codes: HashMap<CodeId, RechargeCode>,
    code_values: HashMap<String, CodeId>,
    orders: HashMap<OrderId, Order>,
}

impl TenantData {
    fn sorted_codes(&self, keep: impl Fn(&RechargeCode) -> bool) -> Vec<RechargeCode> {
        let mut codes: Vec<_> = self.codes.values().filter(|c| keep(c)).cloned().collect();
        codes.sort_by_key(RechargeCode::allocation_key);
        codes
    }

    fn check_unused(&self, ids: &[CodeId]) -> Result<()> {
        for id in ids {
            let code = self
                .codes
                .get(id)
                .ok_or_else(|| StoreError::not_found("recharge code", id))?;
            if code.is_used {
                return Err(StoreError::Conflict(format!(
                    "recharge code already used: {id}"
                )));
            }
        }
        Ok(())
    }

    fn mark_used(&mut self, ids: &[CodeId]) {
        for id in ids {
            if let Some(code) = self.codes.get_mut(id) {
                code.is_used = true;
            }
        }
    }
}

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStore {
    tenants: RwLock<HashMap<TenantId, TenantData>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    // =========================================================================
    // Customer Operations
    // =========================================================================

    async fn put_customer(&self, customer: &Customer) -> Result<()> {
        let mut tenants = self.tenants.write().await;
        tenants
            .entry(customer.tenant_id)
            .or_default()
            .customers
            .insert(customer.id, customer.clone());
        Ok(())
    }

    async fn get_customer(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Customer>> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(tenant_id)
            .and_then(|t| t.customers.get(customer_id))
            .cloned())
    }

    async fn list_customers(&self, tenant_id: &TenantId) -> Result<Vec<Customer>> {
        let tenants = self.tenants.read().await;
        let mut customers: Vec<_> = tenants
            .get(tenant_id)
            .map(|t| t.customers.values().cloned().collect())
            .unwrap_or_default();
        customers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(customers)
    }

    async fn delete_customer(&self, tenant_id: &TenantId, customer_id: &CustomerId) -> Result<()> {
        let mut tenants = self.tenants.write().await;
        tenants
            .get_mut(tenant_id)
            .and_then(|t| t.customers.remove(customer_id))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("customer", customer_id))
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    async fn put_app(&self, app: &App) -> Result<()> {
        let mut tenants = self.tenants.write().await;
        tenants
            .entry(app.tenant_id)
            .or_default()
            .apps
            .insert(app.id, app.clone());
        Ok(())
    }

    async fn get_app(&self, tenant_id: &TenantId, app_id: &AppId) -> Result<Option<App>> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(tenant_id)
            .and_then(|t| t.apps.get(app_id))
            .cloned())
    }

    async fn list_apps(&self, tenant_id: &TenantId) -> Result<Vec<App>> {
        let tenants = self.tenants.read().await;
        let mut apps: Vec<_> = tenants
            .get(tenant_id)
            .map(|t| t.apps.values().cloned().collect())
            .unwrap_or_default();
        apps.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(apps)
    }

    async fn delete_app(&self, tenant_id: &TenantId, app_id: &AppId) -> Result<()> {
        let mut tenants = self.tenants.write().await;
        tenants
            .get_mut(tenant_id)
            .and_then(|t| t.apps.remove(app_id))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("app", app_id))
    }

    // =========================================================================
    // Recharge Code Operations
    // =========================================================================

    async fn insert_codes(
        &self,
        tenant_id: &TenantId,
        app_id: &AppId,
        values: &[String],
    ) -> Result<Vec<RechargeCode>> {
        let mut tenants = self.tenants.write().await;
        let data = tenants.entry(*tenant_id).or_default();

        if let Some(existing) = values.iter().find(|v| data.code_values.contains_key(*v)) {
            return Err(StoreError::DuplicateCode {
                code: existing.clone(),
            });
        }

        let codes = RechargeCode::batch(*tenant_id, *app_id, values);
        for code in &codes {
            data.code_values.insert(code.code.clone(), code.id);
            data.codes.insert(code.id, code.clone());
        }
        Ok(codes)
    }

    async fn get_code(
        &self,
        tenant_id: &TenantId,
        code_id: &CodeId,
    ) -> Result<Option<RechargeCode>> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(tenant_id)
            .and_then(|t| t.codes.get(code_id))
            .cloned())
    }

    async fn get_codes(&self, tenant_id: &TenantId, ids: &[CodeId]) -> Result<Vec<RechargeCode>> {
        let tenants = self.tenants.read().await;
        let Some(data) = tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| data.codes.get(id)).cloned().collect())
    }

    async fn find_code_by_value(
        &self,
        tenant_id: &TenantId,
        code: &str,
    ) -> Result<Option<RechargeCode>> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant_id).and_then(|t| {
            t.code_values
                .get(code)
                .and_then(|id| t.codes.get(id))
                .cloned()
        }))
    }

    async fn find_unused_codes(
        &self,
        tenant_id: &TenantId,
        app_id: &AppId,
        excluding: &[CodeId],
    ) -> Result<Vec<RechargeCode>> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(tenant_id)
            .map(|t| {
                t.sorted_codes(|c| {
                    !c.is_used && c.app_id == *app_id && !excluding.contains(&c.id)
                })
            })
            .unwrap_or_default())
    }

    async fn list_codes(
        &self,
        tenant_id: &TenantId,
        filter: &CodeFilter,
    ) -> Result<Vec<RechargeCode>> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(tenant_id)
            .map(|t| t.sorted_codes(|c| filter.matches(c)))
            .unwrap_or_default())
    }

    async fn mark_codes_used(&self, tenant_id: &TenantId, ids: &[CodeId]) -> Result<()> {
        let mut tenants = self.tenants.write().await;
        let data = tenants
            .get_mut(tenant_id)
            .ok_or_else(|| StoreError::not_found("tenant", tenant_id))?;
        data.check_unused(ids)?;
        data.mark_used(ids);
        Ok(())
    }

    async fn delete_code(&self, tenant_id: &TenantId, code_id: &CodeId) -> Result<()> {
        let mut tenants = self.tenants.write().await;
        let data = tenants
            .get_mut(tenant_id)
            .ok_or_else(|| StoreError::not_found("recharge code", code_id))?;
        let code = data
            .codes
            .remove(code_id)
            .ok_or_else(|| StoreError::not_found("recharge code", code_id))?;
        data.code_values.remove(&code.code);
        Ok(())
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    async fn put_order(&self, order: &Order) -> Result<()> {
        let mut tenants = self.tenants.write().await;
        tenants
            .entry(order.tenant_id)
            .or_default()
            .orders
            .insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, tenant_id: &TenantId, order_id: &OrderId) -> Result<Option<Order>> {
        let tenants = self.tenants.read().await;
        Ok(tenants
            .get(tenant_id)
            .and_then(|t| t.orders.get(order_id))
            .cloned())
    }

    async fn list_orders(&self, tenant_id: &TenantId) -> Result<Vec<Order>> {
        let tenants = self.tenants.read().await;
        let mut orders: Vec<_> = tenants
            .get(tenant_id)
            .map(|t| t.orders.values().cloned().collect())
            .unwrap_or_default();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn delete_order(&self, tenant_id: &TenantId, order_id: &OrderId) -> Result<()> {
        let mut tenants = self.tenants.write().await;
        tenants
            .get_mut(tenant_id)
            .and_then(|t| t.orders.remove(order_id))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("order", order_id))
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    async fn fulfill_order(
        &self,
        tenant_id: &TenantId,
        order_id: &OrderId,
        code_ids: &[CodeId],
    ) -> Result<Order> {
        let mut tenants = self.tenants.write().await;
        let data = tenants
            .get_mut(tenant_id)
            .ok_or_else(|| StoreError::not_found("order", order_id))?;

        let mut order = data
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("order", order_id))?;
        if order.status != OrderStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "order {order_id} is {}",
                order.status
            )));
        }
        data.check_unused(code_ids)?;

        data.mark_used(code_ids);
        order.complete_with(code_ids.to_vec());
        data.orders.insert(order.id, order.clone());
        Ok(order)
    }
}
