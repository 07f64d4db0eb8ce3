//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//! Compound writes go through one `WriteBatch` each; the read-check-write
//! sequences are serialized by an in-process write lock.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use tokio::sync::Mutex;

use recharge_core::{
    App, AppId, CodeFilter, CodeId, Customer, CustomerId, Order, OrderId, OrderStatus,
    RechargeCode, TenantId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn put<T: serde::Serialize>(&self, cf_name: &str, key: Vec<u8>, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let value = Self::serialize(value)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: Vec<u8>,
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Delete a key, failing with `NotFound` if it is absent.
    fn delete_existing(
        &self,
        cf_name: &str,
        key: Vec<u8>,
        entity: &'static str,
        id: impl ToString,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let exists = self
            .db
            .get_cf(&cf, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if !exists {
            return Err(StoreError::not_found(entity, id));
        }
        self.db
            .delete_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Decode every record under the tenant's prefix, in key order.
    fn scan_tenant<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        tenant_id: &TenantId,
    ) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let prefix = keys::tenant_prefix(tenant_id);
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            records.push(Self::deserialize(&value)?);
        }
        Ok(records)
    }

    fn sorted_codes(
        &self,
        tenant_id: &TenantId,
        keep: impl Fn(&RechargeCode) -> bool,
    ) -> Result<Vec<RechargeCode>> {
        let mut codes: Vec<RechargeCode> = self
            .scan_tenant(cf::CODES, tenant_id)?
            .into_iter()
            .filter(|c| keep(c))
            .collect();
        codes.sort_by_key(RechargeCode::allocation_key);
        Ok(codes)
    }

    /// Load the codes and verify each exists and is unused.
    fn load_unused(&self, tenant_id: &TenantId, ids: &[CodeId]) -> Result<Vec<RechargeCode>> {
        let mut codes = Vec::with_capacity(ids.len());
        for id in ids {
            let code: RechargeCode = self
                .get(cf::CODES, keys::code_key(tenant_id, id))?
                .ok_or_else(|| StoreError::not_found("recharge code", id))?;
            if code.is_used {
                return Err(StoreError::Conflict(format!(
                    "recharge code already used: {id}"
                )));
            }
            codes.push(code);
        }
        Ok(codes)
    }

    fn batch_mark_used(&self, batch: &mut WriteBatch, codes: Vec<RechargeCode>) -> Result<()> {
        let cf_codes = self.cf(cf::CODES)?;
        for mut code in codes {
            code.is_used = true;
            let key = keys::code_key(&code.tenant_id, &code.id);
            batch.put_cf(&cf_codes, key, Self::serialize(&code)?);
        }
        Ok(())
    }
}

#[async_trait]
impl Store for RocksStore {
    // =========================================================================
    // Customer Operations
    // =========================================================================

    async fn put_customer(&self, customer: &Customer) -> Result<()> {
        let key = keys::tenant_key(&customer.tenant_id, customer.id.as_bytes());
        self.put(cf::CUSTOMERS, key, customer)
    }

    async fn get_customer(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Customer>> {
        self.get(cf::CUSTOMERS, keys::tenant_key(tenant_id, customer_id.as_bytes()))
    }

    async fn list_customers(&self, tenant_id: &TenantId) -> Result<Vec<Customer>> {
        let mut customers: Vec<Customer> = self.scan_tenant(cf::CUSTOMERS, tenant_id)?;
        customers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(customers)
    }

    async fn delete_customer(&self, tenant_id: &TenantId, customer_id: &CustomerId) -> Result<()> {
        let key = keys::tenant_key(tenant_id, customer_id.as_bytes());
        self.delete_existing(cf::CUSTOMERS, key, "customer", customer_id)
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    async fn put_app(&self, app: &App) -> Result<()> {
        let key = keys::tenant_key(&app.tenant_id, app.id.as_bytes());
        self.put(cf::APPS, key, app)
    }

    async fn get_app(&self, tenant_id: &TenantId, app_id: &AppId) -> Result<Option<App>> {
        self.get(cf::APPS, keys::tenant_key(tenant_id, app_id.as_bytes()))
    }

    async fn list_apps(&self, tenant_id: &TenantId) -> Result<Vec<App>> {
        let mut apps: Vec<App> = self.scan_tenant(cf::APPS, tenant_id)?;
        apps.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(apps)
    }

    async fn delete_app(&self, tenant_id: &TenantId, app_id: &AppId) -> Result<()> {
        let key = keys::tenant_key(tenant_id, app_id.as_bytes());
        self.delete_existing(cf::APPS, key, "app", app_id)
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
        let _guard = self.write_lock.lock().await;
        let cf_codes = self.cf(cf::CODES)?;
        let cf_values = self.cf(cf::CODE_VALUES)?;

        for value in values {
            let exists = self
                .db
                .get_cf(&cf_values, keys::code_value_key(tenant_id, value))
                .map_err(|e| StoreError::Database(e.to_string()))?
                .is_some();
            if exists {
                return Err(StoreError::DuplicateCode {
                    code: value.clone(),
                });
            }
        }

        let codes = RechargeCode::batch(*tenant_id, *app_id, values);
        let mut batch = WriteBatch::default();
        for code in &codes {
            batch.put_cf(
                &cf_codes,
                keys::code_key(tenant_id, &code.id),
                Self::serialize(code)?,
            );
            batch.put_cf(
                &cf_values,
                keys::code_value_key(tenant_id, &code.code),
                code.id.to_bytes(),
            );
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(codes)
    }

    async fn get_code(
        &self,
        tenant_id: &TenantId,
        code_id: &CodeId,
    ) -> Result<Option<RechargeCode>> {
        self.get(cf::CODES, keys::code_key(tenant_id, code_id))
    }

    async fn get_codes(&self, tenant_id: &TenantId, ids: &[CodeId]) -> Result<Vec<RechargeCode>> {
        let mut codes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(code) = self.get(cf::CODES, keys::code_key(tenant_id, id))? {
                codes.push(code);
            }
        }
        Ok(codes)
    }

    async fn find_code_by_value(
        &self,
        tenant_id: &TenantId,
        code: &str,
    ) -> Result<Option<RechargeCode>> {
        let cf_values = self.cf(cf::CODE_VALUES)?;
        let Some(raw) = self
            .db
            .get_cf(&cf_values, keys::code_value_key(tenant_id, code))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let bytes: [u8; 16] = raw
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Serialization("malformed code index entry".into()))?;
        self.get(cf::CODES, keys::code_key(tenant_id, &CodeId::from_bytes(bytes)))
    }

    async fn find_unused_codes(
        &self,
        tenant_id: &TenantId,
        app_id: &AppId,
        excluding: &[CodeId],
    ) -> Result<Vec<RechargeCode>> {
        self.sorted_codes(tenant_id, |c| {
            !c.is_used && c.app_id == *app_id && !excluding.contains(&c.id)
        })
    }

    async fn list_codes(
        &self,
        tenant_id: &TenantId,
        filter: &CodeFilter,
    ) -> Result<Vec<RechargeCode>> {
        self.sorted_codes(tenant_id, |c| filter.matches(c))
    }

    async fn mark_codes_used(&self, tenant_id: &TenantId, ids: &[CodeId]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let codes = self.load_unused(tenant_id, ids)?;

        let mut batch = WriteBatch::default();
        self.batch_mark_used(&mut batch, codes)?;
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn delete_code(&self, tenant_id: &TenantId, code_id: &CodeId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf_codes = self.cf(cf::CODES)?;
        let cf_values = self.cf(cf::CODE_VALUES)?;

        let key = keys::code_key(tenant_id, code_id);
        let code: RechargeCode = self
            .get(cf::CODES, key.clone())?
            .ok_or_else(|| StoreError::not_found("recharge code", code_id))?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_codes, key);
        batch.delete_cf(&cf_values, keys::code_value_key(tenant_id, &code.code));
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    async fn put_order(&self, order: &Order) -> Result<()> {
        let key = keys::tenant_key(&order.tenant_id, order.id.as_bytes());
        self.put(cf::ORDERS, key, order)
    }

    async fn get_order(&self, tenant_id: &TenantId, order_id: &OrderId) -> Result<Option<Order>> {
        self.get(cf::ORDERS, keys::tenant_key(tenant_id, order_id.as_bytes()))
    }

    async fn list_orders(&self, tenant_id: &TenantId) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.scan_tenant(cf::ORDERS, tenant_id)?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn delete_order(&self, tenant_id: &TenantId, order_id: &OrderId) -> Result<()> {
        let key = keys::tenant_key(tenant_id, order_id.as_bytes());
        self.delete_existing(cf::ORDERS, key, "order", order_id)
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
        let _guard = self.write_lock.lock().await;
        let order_key = keys::tenant_key(tenant_id, order_id.as_bytes());

        let mut order: Order = self
            .get(cf::ORDERS, order_key.clone())?
            .ok_or_else(|| StoreError::not_found("order", order_id))?;
        if order.status != OrderStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "order {order_id} is {}",
                order.status
            )));
        }
        let codes = self.load_unused(tenant_id, code_ids)?;

        order.complete_with(code_ids.to_vec());

        let cf_orders = self.cf(cf::ORDERS)?;
        let mut batch = WriteBatch::default();
        self.batch_mark_used(&mut batch, codes)?;
        batch.put_cf(&cf_orders, order_key, Self::serialize(&order)?);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(order)
    }
}
