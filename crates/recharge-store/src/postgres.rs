//! PostgreSQL storage implementation.
//!
//! Orders are spread over `orders`, `order_items` and `order_codes`; the
//! compound operations run in one transaction and lock the rows they check
//! with `SELECT ... FOR UPDATE`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use recharge_core::{
    App, AppId, CodeFilter, CodeId, CodeStatus, Customer, CustomerId, Order, OrderId, OrderItem,
    OrderItemId, OrderStatus, PaymentStatus, RechargeCode, TenantId,
};

use crate::error::{Result, StoreError};
use crate::Store;

const CODE_COLUMNS: &str = "id, tenant_id, app_id, code, is_used, created_at";
const ORDER_COLUMNS: &str = "id, tenant_id, customer_id, total_cents, status, payment_id, \
                             payment_status, created_at, completed_at";

/// PostgreSQL-backed storage implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database at `url`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if no connection can be established.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Attach items and allocated codes to freshly loaded order rows.
    async fn hydrate_orders(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let mut orders = rows.iter().map(order_from_row).collect::<Result<Vec<_>>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }
        let ids: Vec<Uuid> = orders.iter().map(|o| *o.id.as_uuid()).collect();

        let item_rows = sqlx::query(
            "SELECT id, order_id, app_id, quantity, unit_price_cents FROM order_items \
             WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            let quantity: i32 = row.try_get("quantity")?;
            items.entry(order_id).or_default().push(OrderItem {
                id: OrderItemId::from_uuid(row.try_get("id")?),
                app_id: AppId::from_uuid(row.try_get("app_id")?),
                quantity: u32::try_from(quantity)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?,
                unit_price_cents: row.try_get("unit_price_cents")?,
            });
        }

        let code_rows = sqlx::query(
            "SELECT order_id, code_id FROM order_codes \
             WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut codes: HashMap<Uuid, Vec<CodeId>> = HashMap::new();
        for row in &code_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            codes
                .entry(order_id)
                .or_default()
                .push(CodeId::from_uuid(row.try_get("code_id")?));
        }

        for order in &mut orders {
            order.items = items.remove(order.id.as_uuid()).unwrap_or_default();
            order.recharge_codes = codes.remove(order.id.as_uuid()).unwrap_or_default();
        }
        Ok(orders)
    }

    async fn delete_row(
        &self,
        sql: &str,
        tenant_id: &TenantId,
        id: Uuid,
        entity: &'static str,
    ) -> Result<()> {
        let result = sqlx::query(sql)
            .bind(tenant_id.as_uuid())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(entity, id));
        }
        Ok(())
    }
}

/// Lock the codes and check every one exists and is unused.
async fn lock_unused_codes(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &TenantId,
    ids: &[Uuid],
) -> Result<()> {
    let rows = sqlx::query(
        "SELECT id, is_used FROM recharge_codes \
         WHERE tenant_id = $1 AND id = ANY($2) FOR UPDATE",
    )
    .bind(tenant_id.as_uuid())
    .bind(ids)
    .fetch_all(&mut **tx)
    .await?;

    let mut found: HashMap<Uuid, bool> = HashMap::with_capacity(rows.len());
    for row in &rows {
        found.insert(row.try_get("id")?, row.try_get("is_used")?);
    }
    for id in ids {
        match found.get(id) {
            None => return Err(StoreError::not_found("recharge code", CodeId::from_uuid(*id))),
            Some(true) => {
                return Err(StoreError::Conflict(format!(
                    "recharge code already used: {}",
                    CodeId::from_uuid(*id)
                )))
            }
            Some(false) => {}
        }
    }
    Ok(())
}

async fn set_codes_used(tx: &mut Transaction<'_, Postgres>, ids: &[Uuid]) -> Result<()> {
    sqlx::query("UPDATE recharge_codes SET is_used = TRUE WHERE id = ANY($1)")
        .bind(ids)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn position(index: usize) -> Result<i32> {
    i32::try_from(index).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn customer_from_row(row: &PgRow) -> Result<Customer> {
    Ok(Customer {
        id: CustomerId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        created_at: row.try_get("created_at")?,
    })
}

fn app_from_row(row: &PgRow) -> Result<App> {
    Ok(App {
        id: AppId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        name: row.try_get("name")?,
        price_cents: row.try_get("price_cents")?,
        created_at: row.try_get("created_at")?,
    })
}

fn code_from_row(row: &PgRow) -> Result<RechargeCode> {
    Ok(RechargeCode {
        id: CodeId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        app_id: AppId::from_uuid(row.try_get("app_id")?),
        code: row.try_get("code")?,
        is_used: row.try_get("is_used")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Order header without items or codes; see `PgStore::hydrate_orders`.
fn order_from_row(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        customer_id: CustomerId::from_uuid(row.try_get("customer_id")?),
        items: Vec::new(),
        total_cents: row.try_get("total_cents")?,
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        recharge_codes: Vec::new(),
        payment_id: row.try_get("payment_id")?,
        payment_status: payment_status
            .parse::<PaymentStatus>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    // =========================================================================
    // Customer Operations
    // =========================================================================

    async fn put_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            "INSERT INTO customers (id, tenant_id, name, email, phone, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, email = EXCLUDED.email, \
             phone = EXCLUDED.phone",
        )
        .bind(customer.id.as_uuid())
        .bind(customer.tenant_id.as_uuid())
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_customer(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Customer>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, name, email, phone, created_at FROM customers \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(customer_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(customer_from_row).transpose()
    }

    async fn list_customers(&self, tenant_id: &TenantId) -> Result<Vec<Customer>> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, name, email, phone, created_at FROM customers \
             WHERE tenant_id = $1 ORDER BY created_at DESC, id",
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(customer_from_row).collect()
    }

    async fn delete_customer(&self, tenant_id: &TenantId, customer_id: &CustomerId) -> Result<()> {
        self.delete_row(
            "DELETE FROM customers WHERE tenant_id = $1 AND id = $2",
            tenant_id,
            *customer_id.as_uuid(),
            "customer",
        )
        .await
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    async fn put_app(&self, app: &App) -> Result<()> {
        sqlx::query(
            "INSERT INTO apps (id, tenant_id, name, price_cents, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
             price_cents = EXCLUDED.price_cents",
        )
        .bind(app.id.as_uuid())
        .bind(app.tenant_id.as_uuid())
        .bind(&app.name)
        .bind(app.price_cents)
        .bind(app.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_app(&self, tenant_id: &TenantId, app_id: &AppId) -> Result<Option<App>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, name, price_cents, created_at FROM apps \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(app_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(app_from_row).transpose()
    }

    async fn list_apps(&self, tenant_id: &TenantId) -> Result<Vec<App>> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, name, price_cents, created_at FROM apps \
             WHERE tenant_id = $1 ORDER BY name, id",
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(app_from_row).collect()
    }

    async fn delete_app(&self, tenant_id: &TenantId, app_id: &AppId) -> Result<()> {
        self.delete_row(
            "DELETE FROM apps WHERE tenant_id = $1 AND id = $2",
            tenant_id,
            *app_id.as_uuid(),
            "app",
        )
        .await
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
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            "SELECT code FROM recharge_codes WHERE tenant_id = $1 AND code = ANY($2) LIMIT 1",
        )
        .bind(tenant_id.as_uuid())
        .bind(values)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = existing {
            return Err(StoreError::DuplicateCode {
                code: row.try_get("code")?,
            });
        }

        let codes = RechargeCode::batch(*tenant_id, *app_id, values);
        let Some(created_at) = codes.first().map(|c| c.created_at) else {
            return Ok(codes);
        };
        let ids: Vec<Uuid> = codes.iter().map(|c| c.id.to_uuid()).collect();

        sqlx::query(
            "INSERT INTO recharge_codes (id, tenant_id, app_id, code, is_used, created_at) \
             SELECT u.id, $1, $2, u.code, FALSE, $3 \
             FROM UNNEST($4::uuid[], $5::text[]) AS u(id, code)",
        )
        .bind(tenant_id.as_uuid())
        .bind(app_id.as_uuid())
        .bind(created_at)
        .bind(&ids)
        .bind(values)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(codes)
    }

    async fn get_code(
        &self,
        tenant_id: &TenantId,
        code_id: &CodeId,
    ) -> Result<Option<RechargeCode>> {
        let row = sqlx::query(&format!(
            "SELECT {CODE_COLUMNS} FROM recharge_codes WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(code_id.to_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(code_from_row).transpose()
    }

    async fn get_codes(&self, tenant_id: &TenantId, ids: &[CodeId]) -> Result<Vec<RechargeCode>> {
        let uuids: Vec<Uuid> = ids.iter().map(CodeId::to_uuid).collect();
        let rows = sqlx::query(&format!(
            "SELECT {CODE_COLUMNS} FROM recharge_codes WHERE tenant_id = $1 AND id = ANY($2)"
        ))
        .bind(tenant_id.as_uuid())
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id = HashMap::with_capacity(rows.len());
        for row in &rows {
            let code = code_from_row(row)?;
            by_id.insert(code.id, code);
        }
        Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }

    async fn find_code_by_value(
        &self,
        tenant_id: &TenantId,
        code: &str,
    ) -> Result<Option<RechargeCode>> {
        let row = sqlx::query(&format!(
            "SELECT {CODE_COLUMNS} FROM recharge_codes WHERE tenant_id = $1 AND code = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(code_from_row).transpose()
    }

    async fn find_unused_codes(
        &self,
        tenant_id: &TenantId,
        app_id: &AppId,
        excluding: &[CodeId],
    ) -> Result<Vec<RechargeCode>> {
        let excluded: Vec<Uuid> = excluding.iter().map(CodeId::to_uuid).collect();
        let rows = sqlx::query(&format!(
            "SELECT {CODE_COLUMNS} FROM recharge_codes \
             WHERE tenant_id = $1 AND app_id = $2 AND NOT is_used AND NOT (id = ANY($3)) \
             ORDER BY created_at, id"
        ))
        .bind(tenant_id.as_uuid())
        .bind(app_id.as_uuid())
        .bind(&excluded)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(code_from_row).collect()
    }

    async fn list_codes(
        &self,
        tenant_id: &TenantId,
        filter: &CodeFilter,
    ) -> Result<Vec<RechargeCode>> {
        let used = filter.status.map(|s| s == CodeStatus::Used);
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let rows = sqlx::query(&format!(
            "SELECT {CODE_COLUMNS} FROM recharge_codes \
             WHERE tenant_id = $1 \
               AND ($2::uuid IS NULL OR app_id = $2) \
               AND ($3::bool IS NULL OR is_used = $3) \
               AND ($4::text IS NULL OR strpos(lower(code), lower($4)) > 0) \
             ORDER BY created_at, id"
        ))
        .bind(tenant_id.as_uuid())
        .bind(filter.app_id.map(|a| *a.as_uuid()))
        .bind(used)
        .bind(search)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(code_from_row).collect()
    }

    async fn mark_codes_used(&self, tenant_id: &TenantId, ids: &[CodeId]) -> Result<()> {
        let uuids: Vec<Uuid> = ids.iter().map(CodeId::to_uuid).collect();
        let mut tx = self.pool.begin().await?;
        lock_unused_codes(&mut tx, tenant_id, &uuids).await?;
        set_codes_used(&mut tx, &uuids).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_code(&self, tenant_id: &TenantId, code_id: &CodeId) -> Result<()> {
        self.delete_row(
            "DELETE FROM recharge_codes WHERE tenant_id = $1 AND id = $2",
            tenant_id,
            code_id.to_uuid(),
            "recharge code",
        )
        .await
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    async fn put_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, tenant_id, customer_id, total_cents, status, payment_id, \
             payment_status, created_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET customer_id = EXCLUDED.customer_id, \
             total_cents = EXCLUDED.total_cents, status = EXCLUDED.status, \
             payment_id = EXCLUDED.payment_id, payment_status = EXCLUDED.payment_status, \
             completed_at = EXCLUDED.completed_at",
        )
        .bind(order.id.as_uuid())
        .bind(order.tenant_id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.total_cents)
        .bind(order.status.as_str())
        .bind(order.payment_id.as_deref())
        .bind(order.payment_status.as_str())
        .bind(order.created_at)
        .bind(order.completed_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order.id.as_uuid())
            .execute(&mut *tx)
            .await?;
        for (index, item) in order.items.iter().enumerate() {
            let quantity =
                i32::try_from(item.quantity).map_err(|e| StoreError::Serialization(e.to_string()))?;
            sqlx::query(
                "INSERT INTO order_items (id, order_id, position, app_id, quantity, \
                 unit_price_cents) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(position(index)?)
            .bind(item.app_id.as_uuid())
            .bind(quantity)
            .bind(item.unit_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM order_codes WHERE order_id = $1")
            .bind(order.id.as_uuid())
            .execute(&mut *tx)
            .await?;
        for (index, code_id) in order.recharge_codes.iter().enumerate() {
            sqlx::query("INSERT INTO order_codes (order_id, code_id, position) VALUES ($1, $2, $3)")
                .bind(order.id.as_uuid())
                .bind(code_id.to_uuid())
                .bind(position(index)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, tenant_id: &TenantId, order_id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(self
            .hydrate_orders(row.into_iter().collect())
            .await?
            .into_iter()
            .next())
    }

    async fn list_orders(&self, tenant_id: &TenantId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE tenant_id = $1 \
             ORDER BY created_at DESC, id"
        ))
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_orders(rows).await
    }

    async fn delete_order(&self, tenant_id: &TenantId, order_id: &OrderId) -> Result<()> {
        self.delete_row(
            "DELETE FROM orders WHERE tenant_id = $1 AND id = $2",
            tenant_id,
            *order_id.as_uuid(),
            "order",
        )
        .await
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
        let uuids: Vec<Uuid> = code_ids.iter().map(CodeId::to_uuid).collect();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT status FROM orders WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(tenant_id.as_uuid())
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("order", order_id))?;
        let status: String = row.try_get("status")?;
        if status != OrderStatus::Pending.as_str() {
            return Err(StoreError::Conflict(format!("order {order_id} is {status}")));
        }

        lock_unused_codes(&mut tx, tenant_id, &uuids).await?;
        set_codes_used(&mut tx, &uuids).await?;

        sqlx::query(
            "UPDATE orders SET status = $1, completed_at = $2 WHERE tenant_id = $3 AND id = $4",
        )
        .bind(OrderStatus::Completed.as_str())
        .bind(Utc::now())
        .bind(tenant_id.as_uuid())
        .bind(order_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO order_codes (order_id, code_id, position) \
             SELECT $1, c.id, (c.ord - 1)::int \
             FROM UNNEST($2::uuid[]) WITH ORDINALITY AS c(id, ord)",
        )
        .bind(order_id.as_uuid())
        .bind(&uuids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_order(tenant_id, order_id)
            .await?
            .ok_or_else(|| StoreError::not_found("order", order_id))
    }
}
