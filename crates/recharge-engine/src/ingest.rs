//! Code ingestion.

use serde::Serialize;

use recharge_core::{
    app_display_name, normalize_codes, AppId, DuplicateCode, RechargeError, Result, TenantId,
};
use recharge_store::StoreError;

use crate::engine::Engine;

/// Outcome of an import.
///
/// When `duplicates` is non-empty the batch was rejected and `added` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Values stored as new unused codes, in submission order.
    pub added: Vec<String>,
    /// Submitted values that already exist, with the app that owns them.
    pub duplicates: Vec<DuplicateCode>,
}

impl IngestReport {
    /// Whether the batch was refused because of duplicates.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        !self.duplicates.is_empty()
    }
}

impl Engine {
    /// Import codes for an app.
    ///
    /// Values are trimmed, blanks dropped and repeats inside the submission
    /// collapsed. If any value already exists anywhere in the tenant's
    /// inventory the whole batch is refused and the report lists every such
    /// value with its owning app. Otherwise every value is stored unused.
    ///
    /// # Errors
    ///
    /// - `RechargeError::AppNotFound` if the target app doesn't exist.
    /// - `RechargeError::Validation` if nothing remains after trimming or the
    ///   batch exceeds the configured limit.
    pub async fn ingest<S: AsRef<str> + Sync>(
        &self,
        tenant_id: TenantId,
        app_id: AppId,
        raw_codes: &[S],
    ) -> Result<IngestReport> {
        let values = normalize_codes(raw_codes);
        if values.is_empty() {
            return Err(RechargeError::Validation("no codes to import".into()));
        }
        if values.len() > self.config.max_codes_per_import {
            return Err(RechargeError::Validation(format!(
                "too many codes in one import: {} (max {})",
                values.len(),
                self.config.max_codes_per_import
            )));
        }

        let _guard = self.locks.lock(tenant_id).await;

        if self.store.get_app(&tenant_id, &app_id).await?.is_none() {
            return Err(RechargeError::AppNotFound { app_id });
        }

        let duplicates = self.find_duplicates(tenant_id, &values).await?;
        if !duplicates.is_empty() {
            tracing::warn!(
                tenant_id = %tenant_id,
                app_id = %app_id,
                submitted = values.len(),
                duplicates = duplicates.len(),
                "Code import rejected: duplicates found"
            );
            return Ok(IngestReport {
                added: Vec::new(),
                duplicates,
            });
        }

        match self.store.insert_codes(&tenant_id, &app_id, &values).await {
            Ok(codes) => {
                tracing::info!(
                    tenant_id = %tenant_id,
                    app_id = %app_id,
                    added = codes.len(),
                    "Codes imported"
                );
                Ok(IngestReport {
                    added: codes.into_iter().map(|c| c.code).collect(),
                    duplicates: Vec::new(),
                })
            }
            // Another writer got there first; report it like any duplicate.
            Err(StoreError::DuplicateCode { code }) => {
                let duplicates = self.find_duplicates(tenant_id, &values).await?;
                if duplicates.is_empty() {
                    return Err(RechargeError::Conflict(format!(
                        "recharge code already exists: {code}"
                    )));
                }
                Ok(IngestReport {
                    added: Vec::new(),
                    duplicates,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_duplicates(
        &self,
        tenant_id: TenantId,
        values: &[String],
    ) -> Result<Vec<DuplicateCode>> {
        let mut existing = Vec::new();
        for value in values {
            if let Some(code) = self.store.find_code_by_value(&tenant_id, value).await? {
                existing.push(code);
            }
        }
        if existing.is_empty() {
            return Ok(Vec::new());
        }

        let names = self
            .app_names(&tenant_id, existing.iter().map(|c| c.app_id).collect::<Vec<_>>())
            .await?;
        Ok(existing
            .into_iter()
            .map(|code| DuplicateCode {
                app_name: names
                    .get(&code.app_id)
                    .cloned()
                    .unwrap_or_else(|| app_display_name(None)),
                app_id: code.app_id,
                code: code.code,
            })
            .collect())
    }
}
