use std::collections::HashMap;
use std::sync::Arc;

use recharge_core::{app_display_name, AppId, RechargeError, Result, TenantId};
use recharge_store::{Store, StoreError};

use crate::locks::TenantLocks;
use crate::notify::Notifier;

/// Default upper bound on codes accepted by one import.
pub const DEFAULT_MAX_CODES_PER_IMPORT: usize = 5000;

/// Engine limits.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Largest accepted ingestion batch, after trimming and de-duplication.
    /// Also the largest quantity a single order item may request.
    pub max_codes_per_import: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_codes_per_import: DEFAULT_MAX_CODES_PER_IMPORT,
        }
    }
}

/// The recharge back-office service layer.
///
/// Cheap to clone; clones share the store, notifier and lock table.
#[derive(Clone)]
pub struct Engine {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) locks: TenantLocks,
    pub(crate) config: EngineConfig,
}

impl Engine {
    /// Create an engine over a store and a notifier.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, config: EngineConfig) -> Self {
        Self {
            store,
            notifier,
            locks: TenantLocks::new(),
            config,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The configured limits.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Send a notification, logging instead of failing.
    pub(crate) async fn deliver(&self, tenant_id: TenantId, recipient: &str, message: &str) {
        let outcome = self.notifier.notify(recipient, message).await;
        if !outcome.success {
            tracing::warn!(
                tenant_id = %tenant_id,
                recipient = %recipient,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Customer notification failed"
            );
        }
    }

    /// Resolve app names once per call, falling back for deleted apps.
    pub(crate) async fn app_names(
        &self,
        tenant_id: &TenantId,
        app_ids: impl IntoIterator<Item = AppId>,
    ) -> Result<HashMap<AppId, String>> {
        let mut names = HashMap::new();
        for app_id in app_ids {
            if names.contains_key(&app_id) {
                continue;
            }
            let app = self.store.get_app(tenant_id, &app_id).await?;
            names.insert(app_id, app_display_name(app.as_ref()));
        }
        Ok(names)
    }
}

/// Map a store `NotFound` to the domain error for the entity, everything
/// else through the usual conversion.
pub(crate) fn or_not_found(err: StoreError, not_found: RechargeError) -> RechargeError {
    match err {
        StoreError::NotFound { .. } => not_found,
        other => other.into(),
    }
}
