//! Storage layer for the recharge back-office.
//!
//! This crate defines the repository contract consumed by the fulfillment
//! engine and provides three backends:
//!
//! - [`MemoryStore`]: in-process maps, used by tests and local runs
//! - [`RocksStore`]: embedded `RocksDB` with column families (feature `rocksdb-backend`)
//! - [`PgStore`]: PostgreSQL through `sqlx`, with row locking for fulfillment
//!
//! # Tenancy
//!
//! Every call takes the tenant explicitly. Backends never return a record that
//! belongs to a different tenant, even when given its id.
//!
//! # Atomicity
//!
//! [`Store::insert_codes`] and [`Store::fulfill_order`] are all-or-nothing:
//! either every record is written or none is. `fulfill_order` re-checks the
//! state it depends on inside its own write, so two racing completions can
//! never claim the same code.
//!
//! # Example
//!
//! ```no_run
//! use recharge_store::{MemoryStore, Store};
//! use recharge_core::{AppId, TenantId};
//!
//! # async fn example() -> recharge_store::Result<()> {
//! let store = MemoryStore::new();
//! let tenant = TenantId::generate();
//! let app = AppId::generate();
//!
//! let codes = store
//!     .insert_codes(&tenant, &app, &["N1".to_string(), "N2".to_string()])
//!     .await?;
//! let unused = store.find_unused_codes(&tenant, &app, &[codes[0].id]).await?;
//! assert_eq!(unused.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
#[cfg(feature = "rocksdb-backend")]
pub mod keys;
pub mod memory;
pub mod postgres;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use async_trait::async_trait;
use recharge_core::{
    App, AppId, CodeFilter, CodeId, Customer, CustomerId, Order, OrderId, RechargeCode, TenantId,
};

/// The storage trait defining all repository operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (`RocksDB`, PostgreSQL, in-memory for testing).
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Customer Operations
    // =========================================================================

    /// Insert or update a customer record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_customer(&self, customer: &Customer) -> Result<()>;

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_customer(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Customer>>;

    /// List a tenant's customers, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_customers(&self, tenant_id: &TenantId) -> Result<Vec<Customer>>;

    /// Delete a customer. Orders referencing it are left in place.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the customer doesn't exist.
    async fn delete_customer(&self, tenant_id: &TenantId, customer_id: &CustomerId) -> Result<()>;

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Insert or update an app record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_app(&self, app: &App) -> Result<()>;

    /// Get an app by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_app(&self, tenant_id: &TenantId, app_id: &AppId) -> Result<Option<App>>;

    /// List a tenant's apps ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_apps(&self, tenant_id: &TenantId) -> Result<Vec<App>>;

    /// Delete an app. Codes and order items referencing it are left in place.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the app doesn't exist.
    async fn delete_app(&self, tenant_id: &TenantId, app_id: &AppId) -> Result<()>;

    // =========================================================================
    // Recharge Code Operations
    // =========================================================================

    /// Insert new unused codes for an app, all or nothing.
    ///
    /// Returns the created records in submission order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateCode` if any value already exists in the
    /// tenant's inventory (under any app). Nothing is written in that case.
    async fn insert_codes(
        &self,
        tenant_id: &TenantId,
        app_id: &AppId,
        values: &[String],
    ) -> Result<Vec<RechargeCode>>;

    /// Get a code by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_code(&self, tenant_id: &TenantId, code_id: &CodeId)
        -> Result<Option<RechargeCode>>;

    /// Get several codes by ID, in the order given. Missing ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_codes(&self, tenant_id: &TenantId, ids: &[CodeId]) -> Result<Vec<RechargeCode>>;

    /// Look up a code by its exact value, across all of the tenant's apps.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_code_by_value(
        &self,
        tenant_id: &TenantId,
        code: &str,
    ) -> Result<Option<RechargeCode>>;

    /// Unused codes for an app, oldest first (`created_at`, then id),
    /// skipping the ids in `excluding`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_unused_codes(
        &self,
        tenant_id: &TenantId,
        app_id: &AppId,
        excluding: &[CodeId],
    ) -> Result<Vec<RechargeCode>>;

    /// List codes matching a filter, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_codes(&self, tenant_id: &TenantId, filter: &CodeFilter)
        -> Result<Vec<RechargeCode>>;

    /// Mark codes as used, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if a code doesn't exist and
    /// `StoreError::Conflict` if one is already used.
    async fn mark_codes_used(&self, tenant_id: &TenantId, ids: &[CodeId]) -> Result<()>;

    /// Delete a code.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the code doesn't exist.
    async fn delete_code(&self, tenant_id: &TenantId, code_id: &CodeId) -> Result<()>;

    // =========================================================================
    // Order Operations
    // =========================================================================

    /// Insert or update an order with its items.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_order(&self, order: &Order) -> Result<()>;

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_order(&self, tenant_id: &TenantId, order_id: &OrderId) -> Result<Option<Order>>;

    /// List a tenant's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_orders(&self, tenant_id: &TenantId) -> Result<Vec<Order>>;

    /// Delete an order. Codes bound to it stay used.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the order doesn't exist.
    async fn delete_order(&self, tenant_id: &TenantId, order_id: &OrderId) -> Result<()>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Complete an order with the given codes atomically.
    ///
    /// Re-checks that the order is still pending and that every code exists,
    /// is unused, and belongs to the tenant; then marks the codes used and
    /// stores the order as completed with `recharge_codes = code_ids`.
    ///
    /// Returns the updated order.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the order doesn't exist.
    /// - `StoreError::Conflict` if the order is no longer pending or a code
    ///   was claimed in the meantime. Nothing is written.
    async fn fulfill_order(
        &self,
        tenant_id: &TenantId,
        order_id: &OrderId,
        code_ids: &[CodeId],
    ) -> Result<Order>;
}
