//! Database schema definitions.
//!
//! `RocksDB` column families live here; the PostgreSQL schema is in
//! `migrations/` and embedded by [`crate::PgStore::migrate`].

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Customer records, keyed by `tenant_id || customer_id`.
    pub const CUSTOMERS: &str = "customers";

    /// Catalog apps, keyed by `tenant_id || app_id`.
    pub const APPS: &str = "apps";

    /// Recharge codes, keyed by `tenant_id || code_id` (ULID, time-ordered).
    pub const CODES: &str = "codes";

    /// Index: code value uniqueness, keyed by `tenant_id || value`.
    /// Value is the owning `code_id`.
    pub const CODE_VALUES: &str = "code_values";

    /// Orders with embedded items, keyed by `tenant_id || order_id`.
    pub const ORDERS: &str = "orders";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::CUSTOMERS,
        cf::APPS,
        cf::CODES,
        cf::CODE_VALUES,
        cf::ORDERS,
    ]
}
