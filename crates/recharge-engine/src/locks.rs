//! Per-tenant write serialization.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use recharge_core::TenantId;

/// One async mutex per tenant, created on first use.
///
/// Holding the guard gives exclusive access to the tenant's code pool and
/// orders within this process. Different tenants never wait on each other.
#[derive(Clone, Default)]
pub struct TenantLocks {
    inner: Arc<DashMap<TenantId, Arc<Mutex<()>>>>,
}

impl TenantLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the tenant's lock.
    pub async fn lock(&self, tenant_id: TenantId) -> OwnedMutexGuard<()> {
        let mutex = Arc::clone(&self.inner.entry(tenant_id).or_default());
        mutex.lock_owned().await
    }

    /// Number of tenants seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no tenant has been locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
