//! Order lifecycle outside of fulfillment.

use recharge_core::message::{order_received, ReceivedLine};
use recharge_core::{
    app_display_name, Customer, CustomerId, NewOrderItem, Order, OrderId, OrderItem, OrderStatus,
    OrderUpdate, Patch, RechargeCode, RechargeError, Result, TenantId,
};

use crate::engine::{or_not_found, Engine};

impl Engine {
    /// Create a pending order.
    ///
    /// Unit prices are copied from the catalog now; later price changes do
    /// not affect the order. The customer is sent an order confirmation.
    ///
    /// # Errors
    ///
    /// - `CustomerNotFound` if the customer is absent in the tenant.
    /// - `AppNotFound` if an item references an unknown app.
    /// - `Validation` for an empty item list, a quantity outside
    ///   `1..=max_codes_per_import`, or a total that overflows.
    pub async fn create_order(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        items: Vec<NewOrderItem>,
    ) -> Result<Order> {
        let customer = self.get_customer(tenant_id, customer_id).await?;
        let priced = self.price_items(tenant_id, &items).await?;
        let order = Order::new(tenant_id, customer_id, priced)?;

        {
            let _guard = self.locks.lock(tenant_id).await;
            self.store.put_order(&order).await?;
        }

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order.id,
            customer_id = %customer_id,
            total_cents = order.total_cents,
            "Order created"
        );

        self.notify_received(&customer, &order).await;
        Ok(order)
    }

    /// Get an order.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::OrderNotFound` if it is absent in the tenant.
    pub async fn get_order(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(&tenant_id, &order_id)
            .await?
            .ok_or(RechargeError::OrderNotFound { order_id })
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list_orders(&self, tenant_id: TenantId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders(&tenant_id).await?)
    }

    /// The codes bound to an order, in allocation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn order_codes(&self, order: &Order) -> Result<Vec<RechargeCode>> {
        Ok(self
            .store
            .get_codes(&order.tenant_id, &order.recharge_codes)
            .await?)
    }

    /// Apply an update to an order.
    ///
    /// Items and customer are frozen once the order is completed; payment
    /// fields can be set at any time. Replacing items snapshots current prices
    /// and recomputes the total.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound`, `CustomerNotFound`, `AppNotFound` for missing records.
    /// - `AlreadyCompleted` when changing items or customer of a completed order.
    /// - `Validation` for invalid items.
    pub async fn update_order(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        update: OrderUpdate,
    ) -> Result<Order> {
        let _guard = self.locks.lock(tenant_id).await;

        let mut order = self.get_order(tenant_id, order_id).await?;
        if update.changes_contents() && order.is_completed() {
            return Err(RechargeError::AlreadyCompleted { order_id });
        }

        if let Patch::Set(customer_id) = update.customer_id {
            self.get_customer(tenant_id, customer_id).await?;
            order.customer_id = customer_id;
        }
        if let Patch::Set(items) = update.items {
            let priced = self.price_items(tenant_id, &items).await?;
            order.replace_items(priced)?;
        }
        update.payment_id.apply_to(&mut order.payment_id);
        update.payment_status.apply_to(&mut order.payment_status);

        self.store.put_order(&order).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order_id,
            total_cents = order.total_cents,
            "Order updated"
        );
        Ok(order)
    }

    /// Cancel a pending order. Cancelling twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound`, or `AlreadyCompleted` for a completed order.
    pub async fn cancel_order(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Order> {
        let _guard = self.locks.lock(tenant_id).await;

        let mut order = self.get_order(tenant_id, order_id).await?;
        match order.status {
            OrderStatus::Completed => return Err(RechargeError::AlreadyCompleted { order_id }),
            OrderStatus::Cancelled => return Ok(order),
            OrderStatus::Pending => {}
        }

        order.status = OrderStatus::Cancelled;
        self.store.put_order(&order).await?;

        tracing::info!(tenant_id = %tenant_id, order_id = %order_id, "Order cancelled");
        Ok(order)
    }

    /// Delete an order. Codes it received stay used.
    ///
    /// # Errors
    ///
    /// Returns `RechargeError::OrderNotFound` if it is absent in the tenant.
    pub async fn delete_order(&self, tenant_id: TenantId, order_id: OrderId) -> Result<()> {
        let _guard = self.locks.lock(tenant_id).await;

        let order = self.get_order(tenant_id, order_id).await?;
        self.store
            .delete_order(&tenant_id, &order_id)
            .await
            .map_err(|e| or_not_found(e, RechargeError::OrderNotFound { order_id }))?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order_id,
            status = %order.status,
            codes_kept_used = order.recharge_codes.len(),
            "Order deleted"
        );
        Ok(())
    }

    /// Price requested items against the current catalog.
    ///
    /// An item may not ask for more codes than one import can supply.
    async fn price_items(
        &self,
        tenant_id: TenantId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>> {
        let limit = self.config.max_codes_per_import;
        let mut priced = Vec::with_capacity(items.len());
        for item in items {
            if usize::try_from(item.quantity).unwrap_or(usize::MAX) > limit {
                return Err(RechargeError::Validation(format!(
                    "quantity {} for app {} exceeds the limit of {limit}",
                    item.quantity, item.app_id
                )));
            }
            let app = self.get_app(tenant_id, item.app_id).await?;
            priced.push(OrderItem::priced(*item, &app)?);
        }
        Ok(priced)
    }

    async fn notify_received(&self, customer: &Customer, order: &Order) {
        let names = match self
            .app_names(&order.tenant_id, order.items.iter().map(|i| i.app_id).collect::<Vec<_>>())
            .await
        {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(
                    order_id = %order.id,
                    error = %e,
                    "Confirmation not sent: app lookup failed"
                );
                return;
            }
        };

        let lines: Vec<ReceivedLine> = order
            .items
            .iter()
            .map(|item| ReceivedLine {
                app_name: names
                    .get(&item.app_id)
                    .cloned()
                    .unwrap_or_else(|| app_display_name(None)),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
            })
            .collect();

        let message =
            order_received(&customer.name, &order.id.short(), &lines, order.total_cents);
        self.deliver(order.tenant_id, &customer.phone, &message).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use recharge_core::{AppId, NewApp, NewCustomer, PaymentStatus};
    use recharge_store::{MemoryStore, Store};

    use super::*;
    use crate::{EngineConfig, LogNotifier};

    async fn setup() -> (Engine, TenantId, CustomerId, AppId) {
        let engine = Engine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LogNotifier),
            EngineConfig::default(),
        );
        let tenant = TenantId::generate();
        let customer = engine
            .create_customer(
                tenant,
                NewCustomer {
                    name: "Ana".into(),
                    email: String::new(),
                    phone: "5511999990000".into(),
                },
            )
            .await
            .unwrap();
        let app = engine
            .create_app(
                tenant,
                NewApp {
                    name: "Netflix".into(),
                    price_cents: 2500,
                },
            )
            .await
            .unwrap();
        (engine, tenant, customer.id, app.id)
    }

    #[tokio::test]
    async fn unknown_customer_is_rejected() {
        let (engine, tenant, _, app) = setup().await;

        let result = engine
            .create_order(
                tenant,
                CustomerId::generate(),
                vec![NewOrderItem { app_id: app, quantity: 1 }],
            )
            .await;

        assert!(matches!(result, Err(RechargeError::CustomerNotFound { .. })));
        assert!(engine.list_orders(tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_app_is_rejected() {
        let (engine, tenant, customer, _) = setup().await;

        let result = engine
            .create_order(
                tenant,
                customer,
                vec![NewOrderItem { app_id: AppId::generate(), quantity: 1 }],
            )
            .await;

        assert!(matches!(result, Err(RechargeError::AppNotFound { .. })));
    }

    #[tokio::test]
    async fn quantity_above_limit_is_rejected() {
        let (engine, tenant, customer, app) = setup().await;

        let huge = engine
            .create_order(tenant, customer, vec![NewOrderItem { app_id: app, quantity: u32::MAX }])
            .await;
        assert!(matches!(huge, Err(RechargeError::Validation(_))));

        let order = engine
            .create_order(tenant, customer, vec![NewOrderItem { app_id: app, quantity: 1 }])
            .await
            .unwrap();
        let limit = u32::try_from(engine.config().max_codes_per_import).unwrap();
        let update = engine
            .update_order(
                tenant,
                order.id,
                OrderUpdate {
                    items: Patch::Set(vec![
                        NewOrderItem { app_id: app, quantity: limit },
                        NewOrderItem { app_id: app, quantity: limit + 1 },
                    ]),
                    ..OrderUpdate::default()
                },
            )
            .await;
        assert!(matches!(update, Err(RechargeError::Validation(_))));
        assert_eq!(engine.list_orders(tenant).await.unwrap().len(), 1);
        assert_eq!(engine.get_order(tenant, order.id).await.unwrap().items[0].quantity, 1);
    }

    #[tokio::test]
    async fn replacing_items_reprices_at_current_catalog() {
        let (engine, tenant, customer, app) = setup().await;
        let order = engine
            .create_order(tenant, customer, vec![NewOrderItem { app_id: app, quantity: 1 }])
            .await
            .unwrap();
        engine
            .update_app(
                tenant,
                app,
                recharge_core::AppUpdate {
                    price_cents: Patch::Set(3000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = engine
            .update_order(
                tenant,
                order.id,
                OrderUpdate {
                    items: Patch::Set(vec![NewOrderItem { app_id: app, quantity: 2 }]),
                    ..OrderUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.total_cents, 6000);
        assert_eq!(updated.items[0].unit_price_cents, 3000);
    }

    #[tokio::test]
    async fn completed_order_accepts_payment_fields_only() {
        let (engine, tenant, customer, app) = setup().await;
        engine.ingest(tenant, app, &["N1"]).await.unwrap();
        let order = engine
            .create_order(tenant, customer, vec![NewOrderItem { app_id: app, quantity: 1 }])
            .await
            .unwrap();
        engine.complete_order(tenant, order.id).await.unwrap();

        let items_change = engine
            .update_order(
                tenant,
                order.id,
                OrderUpdate {
                    items: Patch::Set(vec![NewOrderItem { app_id: app, quantity: 3 }]),
                    ..OrderUpdate::default()
                },
            )
            .await;
        assert!(matches!(items_change, Err(RechargeError::AlreadyCompleted { .. })));

        let paid = engine
            .update_order(
                tenant,
                order.id,
                OrderUpdate {
                    payment_id: Patch::Set(Some("pay-123".into())),
                    payment_status: Patch::Set(PaymentStatus::Approved),
                    ..OrderUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Approved);
        assert_eq!(paid.status, OrderStatus::Completed);
        assert_eq!(paid.recharge_codes.len(), 1);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_but_not_for_completed() {
        let (engine, tenant, customer, app) = setup().await;
        engine.ingest(tenant, app, &["N1"]).await.unwrap();
        let pending = engine
            .create_order(tenant, customer, vec![NewOrderItem { app_id: app, quantity: 1 }])
            .await
            .unwrap();
        let done = engine
            .create_order(tenant, customer, vec![NewOrderItem { app_id: app, quantity: 1 }])
            .await
            .unwrap();
        engine.complete_order(tenant, done.id).await.unwrap();

        assert_eq!(
            engine.cancel_order(tenant, pending.id).await.unwrap().status,
            OrderStatus::Cancelled
        );
        assert_eq!(
            engine.cancel_order(tenant, pending.id).await.unwrap().status,
            OrderStatus::Cancelled
        );
        assert!(matches!(
            engine.cancel_order(tenant, done.id).await,
            Err(RechargeError::AlreadyCompleted { .. })
        ));
    }

    #[tokio::test]
    async fn deleting_completed_order_keeps_codes_used() {
        let (engine, tenant, customer, app) = setup().await;
        engine.ingest(tenant, app, &["N1"]).await.unwrap();
        let order = engine
            .create_order(tenant, customer, vec![NewOrderItem { app_id: app, quantity: 1 }])
            .await
            .unwrap();
        let done = engine.complete_order(tenant, order.id).await.unwrap();

        engine.delete_order(tenant, order.id).await.unwrap();

        let code = engine
            .store()
            .get_code(&tenant, &done.codes[0].id)
            .await
            .unwrap()
            .unwrap();
        assert!(code.is_used);
        assert!(matches!(
            engine.get_order(tenant, order.id).await,
            Err(RechargeError::OrderNotFound { .. })
        ));
    }
}
