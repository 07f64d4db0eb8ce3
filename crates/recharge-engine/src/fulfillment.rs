//! Order fulfillment: all-or-nothing code allocation.

use serde::Serialize;

use recharge_core::message::{order_completed, DeliveredCode};
use recharge_core::{
    app_display_name, CodeId, Order, OrderId, OrderStatus, RechargeCode, RechargeError, Result,
    TenantId,
};
use recharge_store::StoreError;

use crate::engine::Engine;

/// A completed order together with the codes it received, in item order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fulfillment {
    /// The order, now `completed`.
    pub order: Order,
    /// Allocated codes; `order.recharge_codes` lists the same ids.
    pub codes: Vec<RechargeCode>,
}

impl Engine {
    /// Complete a pending order.
    ///
    /// Each line item is satisfied in item order with the oldest unused codes
    /// of its app, skipping codes already picked for an earlier item. If any
    /// item falls short nothing is written. Otherwise the codes are marked
    /// used and bound to the order in one store write, and the customer is
    /// sent their codes.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound` if the order is absent in the tenant.
    /// - `AlreadyCompleted` / `OrderCancelled` if it is not pending.
    /// - `InsufficientStock` naming the first under-supplied app.
    /// - `Unavailable` if storage failed; nothing was written and the call
    ///   can be retried.
    pub async fn complete_order(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
    ) -> Result<Fulfillment> {
        let guard = self.locks.lock(tenant_id).await;

        let order = self
            .store
            .get_order(&tenant_id, &order_id)
            .await?
            .ok_or(RechargeError::OrderNotFound { order_id })?;
        match order.status {
            OrderStatus::Pending => {}
            OrderStatus::Completed => return Err(RechargeError::AlreadyCompleted { order_id }),
            OrderStatus::Cancelled => return Err(RechargeError::OrderCancelled { order_id }),
        }

        let codes = self.select_codes(&order).await?;
        let ids: Vec<CodeId> = codes.iter().map(|c| c.id).collect();

        let completed = match self.store.fulfill_order(&tenant_id, &order_id, &ids).await {
            Ok(order) => order,
            Err(StoreError::NotFound { entity: "order", .. }) => {
                return Err(RechargeError::OrderNotFound { order_id })
            }
            Err(e) => return Err(e.into()),
        };
        drop(guard);

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order_id,
            codes = ids.len(),
            "Order completed"
        );

        let codes: Vec<RechargeCode> = codes
            .into_iter()
            .map(|mut c| {
                c.is_used = true;
                c
            })
            .collect();
        self.notify_completed(&completed, &codes).await;

        Ok(Fulfillment {
            order: completed,
            codes,
        })
    }

    /// Pick codes for every requirement, or fail with the first shortfall.
    async fn select_codes(&self, order: &Order) -> Result<Vec<RechargeCode>> {
        let mut selected: Vec<RechargeCode> = Vec::new();

        for (app_id, quantity) in order.requirements() {
            let excluding: Vec<CodeId> = selected.iter().map(|c| c.id).collect();
            let candidates = self
                .store
                .find_unused_codes(&order.tenant_id, &app_id, &excluding)
                .await?;

            let needed = usize::try_from(quantity).unwrap_or(usize::MAX);
            if candidates.len() < needed {
                let app = self.store.get_app(&order.tenant_id, &app_id).await?;
                let err = RechargeError::InsufficientStock {
                    app_id,
                    app_name: app_display_name(app.as_ref()),
                    needed: quantity,
                    available: u32::try_from(candidates.len()).unwrap_or(u32::MAX),
                };
                tracing::warn!(
                    tenant_id = %order.tenant_id,
                    order_id = %order.id,
                    app_id = %app_id,
                    needed = quantity,
                    available = candidates.len(),
                    "Order cannot be completed: insufficient stock"
                );
                return Err(err);
            }

            selected.extend(candidates.into_iter().take(needed));
        }

        Ok(selected)
    }

    async fn notify_completed(&self, order: &Order, codes: &[RechargeCode]) {
        let customer = match self.store.get_customer(&order.tenant_id, &order.customer_id).await {
            Ok(Some(customer)) => customer,
            Ok(None) => {
                tracing::warn!(
                    tenant_id = %order.tenant_id,
                    order_id = %order.id,
                    customer_id = %order.customer_id,
                    "Codes not sent: customer no longer exists"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(
                    order_id = %order.id,
                    error = %e,
                    "Codes not sent: customer lookup failed"
                );
                return;
            }
        };

        let names = match self
            .app_names(&order.tenant_id, codes.iter().map(|c| c.app_id).collect::<Vec<_>>())
            .await
        {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(
                    order_id = %order.id,
                    error = %e,
                    "Codes not sent: app lookup failed"
                );
                return;
            }
        };

        let delivered: Vec<DeliveredCode> = codes
            .iter()
            .map(|c| DeliveredCode {
                app_name: names
                    .get(&c.app_id)
                    .cloned()
                    .unwrap_or_else(|| app_display_name(None)),
                code: c.code.clone(),
            })
            .collect();

        let message = order_completed(&customer.name, &order.id.short(), &delivered);
        self.deliver(order.tenant_id, &customer.phone, &message).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use recharge_core::{NewApp, NewCustomer, NewOrderItem};
    use recharge_store::{MemoryStore, Store};

    use super::*;
    use crate::{EngineConfig, LogNotifier};

    async fn setup() -> (Engine, TenantId, recharge_core::CustomerId) {
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
        (engine, tenant, customer.id)
    }

    async fn app_with_codes(
        engine: &Engine,
        tenant: TenantId,
        name: &str,
        codes: &[&str],
    ) -> recharge_core::AppId {
        let app = engine
            .create_app(
                tenant,
                NewApp {
                    name: name.into(),
                    price_cents: 1000,
                },
            )
            .await
            .unwrap();
        engine.ingest(tenant, app.id, codes).await.unwrap();
        app.id
    }

    #[tokio::test]
    async fn items_for_the_same_app_get_disjoint_codes() {
        let (engine, tenant, customer) = setup().await;
        let app = app_with_codes(&engine, tenant, "Netflix", &["N1", "N2", "N3"]).await;
        let order = engine
            .create_order(
                tenant,
                customer,
                vec![
                    NewOrderItem { app_id: app, quantity: 1 },
                    NewOrderItem { app_id: app, quantity: 2 },
                ],
            )
            .await
            .unwrap();

        let done = engine.complete_order(tenant, order.id).await.unwrap();

        let values: Vec<_> = done.codes.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(values, vec!["N1", "N2", "N3"]);
        assert_eq!(done.order.recharge_codes.len(), 3);
    }

    #[tokio::test]
    async fn shortfall_on_second_app_writes_nothing() {
        let (engine, tenant, customer) = setup().await;
        let netflix = app_with_codes(&engine, tenant, "Netflix", &["N1", "N2"]).await;
        let spotify = app_with_codes(&engine, tenant, "Spotify", &["S1"]).await;
        let order = engine
            .create_order(
                tenant,
                customer,
                vec![
                    NewOrderItem { app_id: netflix, quantity: 2 },
                    NewOrderItem { app_id: spotify, quantity: 2 },
                ],
            )
            .await
            .unwrap();

        let result = engine.complete_order(tenant, order.id).await;

        match result {
            Err(RechargeError::InsufficientStock {
                app_id,
                app_name,
                needed,
                available,
            }) => {
                assert_eq!(app_id, spotify);
                assert_eq!(app_name, "Spotify");
                assert_eq!((needed, available), (2, 1));
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
        let unused = engine
            .store()
            .find_unused_codes(&tenant, &netflix, &[])
            .await
            .unwrap();
        assert_eq!(unused.len(), 2);
    }

    #[tokio::test]
    async fn huge_stored_quantity_is_a_shortfall() {
        let (engine, tenant, customer) = setup().await;
        let app = app_with_codes(&engine, tenant, "Netflix", &["N1"]).await;
        let mut order = engine
            .create_order(tenant, customer, vec![NewOrderItem { app_id: app, quantity: 1 }])
            .await
            .unwrap();
        // Written around the engine's quantity limit, as a legacy row would be.
        order.items[0].quantity = u32::MAX;
        engine.store().put_order(&order).await.unwrap();

        let result = engine.complete_order(tenant, order.id).await;

        match result {
            Err(RechargeError::InsufficientStock {
                needed, available, ..
            }) => assert_eq!((needed, available), (u32::MAX, 1)),
            other => panic!("expected insufficient stock, got {other:?}"),
        }
        let stored = engine.get_order(tenant, order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn cancelled_order_cannot_be_completed() {
        let (engine, tenant, customer) = setup().await;
        let app = app_with_codes(&engine, tenant, "Netflix", &["N1"]).await;
        let order = engine
            .create_order(tenant, customer, vec![NewOrderItem { app_id: app, quantity: 1 }])
            .await
            .unwrap();
        engine.cancel_order(tenant, order.id).await.unwrap();

        let result = engine.complete_order(tenant, order.id).await;

        assert!(matches!(result, Err(RechargeError::OrderCancelled { .. })));
    }

    #[tokio::test]
    async fn missing_order_is_reported() {
        let (engine, tenant, _) = setup().await;

        let result = engine.complete_order(tenant, OrderId::generate()).await;

        assert!(matches!(result, Err(RechargeError::OrderNotFound { .. })));
    }
}
