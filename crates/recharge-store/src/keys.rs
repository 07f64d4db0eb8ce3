//! Key encoding utilities for `RocksDB`.
//!
//! All keys start with the 16 tenant bytes, so a prefix scan over one tenant
//! never touches another tenant's records.

use recharge_core::{CodeId, TenantId};

/// Create a key for a record owned by a tenant.
///
/// Format: `tenant_id (16 bytes) || id (16 bytes)`
#[must_use]
pub fn tenant_key(tenant_id: &TenantId, id: &[u8; 16]) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(tenant_id.as_bytes());
    key.extend_from_slice(id);
    key
}

/// Create a code key. Code ids are ULIDs, so a tenant's codes iterate in
/// creation order.
#[must_use]
pub fn code_key(tenant_id: &TenantId, code_id: &CodeId) -> Vec<u8> {
    tenant_key(tenant_id, &code_id.to_bytes())
}

/// Create a code-value index key.
///
/// Format: `tenant_id (16 bytes) || value (utf-8)`
#[must_use]
pub fn code_value_key(tenant_id: &TenantId, value: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + value.len());
    key.extend_from_slice(tenant_id.as_bytes());
    key.extend_from_slice(value.as_bytes());
    key
}

/// Create a prefix for iterating all records of a tenant.
#[must_use]
pub fn tenant_prefix(tenant_id: &TenantId) -> Vec<u8> {
    tenant_id.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_key_format() {
        let tenant = TenantId::generate();
        let code = CodeId::generate();
        let key = code_key(&tenant, &code);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], tenant.as_bytes());
        assert_eq!(&key[16..], code.to_bytes());
    }

    #[test]
    fn code_value_keys_are_tenant_scoped() {
        let a = TenantId::generate();
        let b = TenantId::generate();
        assert_ne!(code_value_key(&a, "X1"), code_value_key(&b, "X1"));
        assert!(code_value_key(&a, "X1").starts_with(&tenant_prefix(&a)));
    }
}
