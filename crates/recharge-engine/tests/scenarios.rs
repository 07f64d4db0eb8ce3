//! End-to-end engine scenarios over the in-memory store.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use recharge_core::{
    AppId, CodeFilter, CodeStatus, CustomerId, NewApp, NewCustomer, NewOrderItem, OrderStatus,
    RechargeError, TenantId,
};
use recharge_engine::{Engine, EngineConfig, Notifier, NotifyOutcome};
use recharge_store::{MemoryStore, Store};

/// Records every message and answers with a fixed outcome.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> NotifyOutcome {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        if self.fail {
            NotifyOutcome::failed("gateway down")
        } else {
            NotifyOutcome::delivered()
        }
    }
}

struct Fixture {
    engine: Engine,
    notifier: Arc<RecordingNotifier>,
    tenant: TenantId,
    ana: CustomerId,
    netflix: AppId,
}

async fn fixture_with(notifier: RecordingNotifier) -> Fixture {
    let notifier = Arc::new(notifier);
    let engine = Engine::new(
        Arc::new(MemoryStore::new()),
        notifier.clone(),
        EngineConfig::default(),
    );
    let tenant = TenantId::generate();
    let ana = engine
        .create_customer(
            tenant,
            NewCustomer {
                name: "Ana".into(),
                email: "ana@example.com".into(),
                phone: "5511999990000".into(),
            },
        )
        .await
        .unwrap();
    let netflix = engine
        .create_app(
            tenant,
            NewApp {
                name: "Netflix".into(),
                price_cents: 2500,
            },
        )
        .await
        .unwrap();
    engine
        .ingest(tenant, netflix.id, &["N1", "N2", "N3"])
        .await
        .unwrap();

    Fixture {
        engine,
        notifier,
        tenant,
        ana: ana.id,
        netflix: netflix.id,
    }
}

async fn fixture() -> Fixture {
    fixture_with(RecordingNotifier::default()).await
}

async fn used_codes(f: &Fixture) -> Vec<String> {
    f.engine
        .list_codes(
            f.tenant,
            &CodeFilter {
                status: Some(CodeStatus::Used),
                ..CodeFilter::default()
            },
        )
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.code)
        .collect()
}

#[tokio::test]
async fn complete_order_allocates_oldest_codes_once() {
    let f = fixture().await;
    let order = f
        .engine
        .create_order(
            f.tenant,
            f.ana,
            vec![NewOrderItem {
                app_id: f.netflix,
                quantity: 2,
            }],
        )
        .await
        .unwrap();
    assert_eq!(order.total_cents, 5000);
    assert_eq!(order.status, OrderStatus::Pending);

    let done = f.engine.complete_order(f.tenant, order.id).await.unwrap();

    assert_eq!(done.order.status, OrderStatus::Completed);
    assert_eq!(done.order.recharge_codes.len(), 2);
    assert!(done.order.completed_at.is_some());
    assert_eq!(used_codes(&f).await, vec!["N1", "N2"]);

    let snapshot = f.engine.get_order(f.tenant, order.id).await.unwrap();
    let again = f.engine.complete_order(f.tenant, order.id).await;
    assert!(matches!(again, Err(RechargeError::AlreadyCompleted { .. })));
    assert_eq!(f.engine.get_order(f.tenant, order.id).await.unwrap(), snapshot);
    assert_eq!(used_codes(&f).await, vec!["N1", "N2"]);
}

#[tokio::test]
async fn insufficient_stock_changes_nothing() {
    let f = fixture().await;
    let order = f
        .engine
        .create_order(
            f.tenant,
            f.ana,
            vec![NewOrderItem {
                app_id: f.netflix,
                quantity: 5,
            }],
        )
        .await
        .unwrap();
    let codes_before = f
        .engine
        .list_codes(f.tenant, &CodeFilter::default())
        .await
        .unwrap();

    let result = f.engine.complete_order(f.tenant, order.id).await;

    match result {
        Err(err @ RechargeError::InsufficientStock { .. }) => {
            assert_eq!(err.shortfall(), Some(2));
            assert!(matches!(
                err,
                RechargeError::InsufficientStock { needed: 5, available: 3, .. }
            ));
        }
        other => panic!("expected insufficient stock, got {other:?}"),
    }
    let codes_after = f
        .engine
        .list_codes(f.tenant, &CodeFilter::default())
        .await
        .unwrap();
    assert_eq!(codes_before, codes_after);
    assert_eq!(f.engine.get_order(f.tenant, order.id).await.unwrap(), order);
}

#[tokio::test]
async fn duplicate_import_names_owning_app_and_inserts_nothing() {
    let engine = Engine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
        EngineConfig::default(),
    );
    let tenant = TenantId::generate();
    let app = |name: &str| NewApp {
        name: name.into(),
        price_cents: 1000,
    };
    let x = engine.create_app(tenant, app("X")).await.unwrap();
    let y = engine.create_app(tenant, app("Y")).await.unwrap();

    let first = engine.ingest(tenant, x.id, &["A1", "A2"]).await.unwrap();
    assert_eq!(first.added, vec!["A1", "A2"]);
    assert!(first.duplicates.is_empty());

    let second = engine.ingest(tenant, y.id, &["A1", "A3"]).await.unwrap();
    assert!(second.added.is_empty());
    assert_eq!(second.duplicates.len(), 1);
    assert_eq!(second.duplicates[0].code, "A1");
    assert_eq!(second.duplicates[0].app_name, "X");
    assert_eq!(second.duplicates[0].app_id, x.id);

    assert!(engine
        .store()
        .find_code_by_value(&tenant, "A3")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn concurrent_completions_never_share_codes() {
    let f = fixture().await;
    let mut orders = Vec::new();
    for _ in 0..6 {
        let order = f
            .engine
            .create_order(
                f.tenant,
                f.ana,
                vec![NewOrderItem {
                    app_id: f.netflix,
                    quantity: 1,
                }],
            )
            .await
            .unwrap();
        orders.push(order.id);
    }

    let handles: Vec<_> = orders
        .iter()
        .map(|&order_id| {
            let engine = f.engine.clone();
            let tenant = f.tenant;
            tokio::spawn(async move { engine.complete_order(tenant, order_id).await })
        })
        .collect();

    let mut allocated = Vec::new();
    let mut short = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(done) => allocated.extend(done.order.recharge_codes),
            Err(RechargeError::InsufficientStock { .. }) => short += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(allocated.len(), 3);
    assert_eq!(short, 3);
    let distinct: HashSet<_> = allocated.iter().collect();
    assert_eq!(distinct.len(), allocated.len());
}

#[tokio::test]
async fn total_keeps_creation_price() {
    let f = fixture().await;
    let order = f
        .engine
        .create_order(
            f.tenant,
            f.ana,
            vec![NewOrderItem {
                app_id: f.netflix,
                quantity: 3,
            }],
        )
        .await
        .unwrap();

    f.engine
        .update_app(
            f.tenant,
            f.netflix,
            recharge_core::AppUpdate {
                price_cents: recharge_core::Patch::Set(9900),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stored = f.engine.get_order(f.tenant, order.id).await.unwrap();
    assert_eq!(stored.items[0].unit_price_cents, 2500);
    assert_eq!(
        stored.total_cents,
        stored.items.iter().filter_map(|i| i.subtotal_cents()).sum::<i64>()
    );
    assert_eq!(stored.total_cents, 7500);
}

#[tokio::test]
async fn customer_receives_confirmation_and_codes() {
    let f = fixture().await;
    let order = f
        .engine
        .create_order(
            f.tenant,
            f.ana,
            vec![NewOrderItem {
                app_id: f.netflix,
                quantity: 2,
            }],
        )
        .await
        .unwrap();
    f.engine.complete_order(f.tenant, order.id).await.unwrap();

    let messages = f.notifier.messages();
    assert_eq!(messages.len(), 2);
    let (recipient, confirmation) = &messages[0];
    assert_eq!(recipient, "5511999990000");
    assert!(confirmation.contains(&format!("#{}", order.id.short())));
    assert!(confirmation.contains("- 2x Netflix (R$ 25.00)"));
    assert!(confirmation.contains("*Total: R$ 50.00*"));

    let (_, delivery) = &messages[1];
    assert!(delivery.contains("- Netflix: N1"));
    assert!(delivery.contains("- Netflix: N2"));
    assert!(!delivery.contains("N3"));
}

#[tokio::test]
async fn failed_notification_does_not_undo_completion() {
    let f = fixture_with(RecordingNotifier::failing()).await;
    let order = f
        .engine
        .create_order(
            f.tenant,
            f.ana,
            vec![NewOrderItem {
                app_id: f.netflix,
                quantity: 1,
            }],
        )
        .await
        .unwrap();

    let done = f.engine.complete_order(f.tenant, order.id).await.unwrap();

    assert_eq!(done.order.status, OrderStatus::Completed);
    assert_eq!(f.notifier.messages().len(), 2);
    assert_eq!(used_codes(&f).await, vec!["N1"]);
}

#[tokio::test]
async fn deleted_customer_still_gets_order_completed() {
    let f = fixture().await;
    let order = f
        .engine
        .create_order(
            f.tenant,
            f.ana,
            vec![NewOrderItem {
                app_id: f.netflix,
                quantity: 1,
            }],
        )
        .await
        .unwrap();
    f.engine.delete_customer(f.tenant, f.ana).await.unwrap();

    let done = f.engine.complete_order(f.tenant, order.id).await.unwrap();

    assert_eq!(done.order.customer_id, f.ana);
    assert_eq!(f.notifier.messages().len(), 1);
}

#[tokio::test]
async fn other_tenants_cannot_touch_orders() {
    let f = fixture().await;
    let order = f
        .engine
        .create_order(
            f.tenant,
            f.ana,
            vec![NewOrderItem {
                app_id: f.netflix,
                quantity: 1,
            }],
        )
        .await
        .unwrap();
    let stranger = TenantId::generate();

    assert!(matches!(
        f.engine.complete_order(stranger, order.id).await,
        Err(RechargeError::OrderNotFound { .. })
    ));
    assert!(matches!(
        f.engine.delete_order(stranger, order.id).await,
        Err(RechargeError::OrderNotFound { .. })
    ));
    assert_eq!(
        f.engine.get_order(f.tenant, order.id).await.unwrap().status,
        OrderStatus::Pending
    );
}
