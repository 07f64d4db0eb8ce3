//! Recharge codes: the single-use vouchers a tenant delivers to customers.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::{Generator, Ulid};

use crate::ids::{AppId, CodeId, TenantId};

/// A single recharge code in a tenant's inventory.
///
/// The `code` value is unique within the tenant, across all apps.
/// `is_used` flips from `false` to `true` exactly once, when an order is
/// completed with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RechargeCode {
    /// Code ID (ULID, time-ordered).
    pub id: CodeId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// The app this code recharges.
    pub app_id: AppId,
    /// The opaque voucher value.
    pub code: String,
    /// Whether the code was delivered to an order.
    pub is_used: bool,
    /// When the code was imported.
    pub created_at: DateTime<Utc>,
}

impl RechargeCode {
    /// Build unused codes for one import batch.
    ///
    /// All codes share one `created_at` and receive strictly increasing ids,
    /// so sorting by `(created_at, id)` reproduces the submission order.
    #[must_use]
    pub fn batch(tenant_id: TenantId, app_id: AppId, values: &[String]) -> Vec<Self> {
        let created_at = Utc::now();
        let mut generator = Generator::new();
        values
            .iter()
            .map(|value| Self {
                id: CodeId::from_ulid(generator.generate().unwrap_or_else(|_| Ulid::new())),
                tenant_id,
                app_id,
                code: value.clone(),
                is_used: false,
                created_at,
            })
            .collect()
    }

    /// Allocation order key: oldest first, ties broken by id.
    #[must_use]
    pub fn allocation_key(&self) -> (DateTime<Utc>, CodeId) {
        (self.created_at, self.id)
    }
}

/// Trim raw submissions, drop blanks and collapse repeats (first occurrence wins).
#[must_use]
pub fn normalize_codes<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .filter(|c| seen.insert(c.to_string()))
        .map(str::to_string)
        .collect()
}

/// Split a newline separated text block into raw code values.
#[must_use]
pub fn split_code_text(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

/// A submitted code that already exists in the tenant's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCode {
    /// The submitted value.
    pub code: String,
    /// App that already owns the value.
    pub app_id: AppId,
    /// Name of that app (not the import target).
    pub app_name: String,
}

/// Usage state filter for code listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeStatus {
    /// Still available for allocation.
    Unused,
    /// Delivered to an order.
    Used,
}

/// Filter for listing a tenant's codes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeFilter {
    /// Only codes for this app.
    pub app_id: Option<AppId>,
    /// Only codes in this state.
    pub status: Option<CodeStatus>,
    /// Case-insensitive substring of the code value.
    pub search: Option<String>,
}

impl CodeFilter {
    /// Whether a code passes the filter.
    #[must_use]
    pub fn matches(&self, code: &RechargeCode) -> bool {
        if self.app_id.is_some_and(|app_id| app_id != code.app_id) {
            return false;
        }
        match self.status {
            Some(CodeStatus::Used) if !code.is_used => return false,
            Some(CodeStatus::Unused) if code.is_used => return false,
            _ => {}
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => code
                .code
                .to_lowercase()
                .contains(&term.to_lowercase()),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_drops_blanks_and_repeats() {
        let raw = vec!["  A1 ", "", "A2", "   ", "A1", "A3\r"];
        assert_eq!(normalize_codes(&raw), vec!["A1", "A2", "A3"]);
    }

    #[test]
    fn batch_preserves_submission_order() {
        let tenant = TenantId::generate();
        let app = AppId::generate();
        let values: Vec<String> = (0..50).map(|i| format!("CODE-{i:03}")).collect();
        let mut codes = RechargeCode::batch(tenant, app, &values);

        codes.reverse();
        codes.sort_by_key(RechargeCode::allocation_key);

        let sorted: Vec<_> = codes.iter().map(|c| c.code.clone()).collect();
        assert_eq!(sorted, values);
        assert!(codes.iter().all(|c| !c.is_used));
    }

    #[test]
    fn filter_by_status_and_search() {
        let tenant = TenantId::generate();
        let app = AppId::generate();
        let mut codes = RechargeCode::batch(tenant, app, &["NFX-1".into(), "spt-2".into()]);
        codes[0].is_used = true;

        let used = CodeFilter {
            status: Some(CodeStatus::Used),
            ..CodeFilter::default()
        };
        assert!(used.matches(&codes[0]));
        assert!(!used.matches(&codes[1]));

        let search = CodeFilter {
            search: Some("SPT".into()),
            ..CodeFilter::default()
        };
        assert!(search.matches(&codes[1]));
        assert!(!search.matches(&codes[0]));

        let other_app = CodeFilter {
            app_id: Some(AppId::generate()),
            ..CodeFilter::default()
        };
        assert!(!other_app.matches(&codes[0]));
    }

    #[test]
    fn split_text_block() {
        assert_eq!(split_code_text("A1\nA2\r\n\nA3"), vec!["A1", "A2", "", "A3"]);
    }
}
