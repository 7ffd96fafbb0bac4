//! Membership and ownership predicates. The single source of truth for
//! access decisions, used by both the request pipeline's authorization step
//! and the permission cache.

use crate::store::{OrgStore, StoreError};
use crate::types::Role;

/// True iff the organization exists and the account holds an *active*
/// membership in it. Blank inputs fail closed to `false` without touching
/// the store.
pub async fn is_member(
    store: &dyn OrgStore,
    org_id: &str,
    account_id: &str,
) -> Result<bool, StoreError> {
    if org_id.trim().is_empty() || account_id.trim().is_empty() {
        return Ok(false);
    }
    Ok(store.member_roles(org_id, account_id).await?.is_some())
}

/// Same as [`is_member`], additionally requiring the `owner` role.
pub async fn is_owner(
    store: &dyn OrgStore,
    org_id: &str,
    account_id: &str,
) -> Result<bool, StoreError> {
    if org_id.trim().is_empty() || account_id.trim().is_empty() {
        return Ok(false);
    }
    match store.member_roles(org_id, account_id).await? {
        Some(roles) => Ok(roles.contains(&Role::Owner)),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing;

    #[tokio::test]
    async fn blank_inputs_are_false_without_store_access() {
        let store = MemoryStore::new();
        assert!(!is_member(&store, "", "acct-1").await.unwrap());
        assert!(!is_member(&store, "org-1", "").await.unwrap());
        assert!(!is_member(&store, "  ", "acct-1").await.unwrap());
        assert!(!is_owner(&store, "", "").await.unwrap());
    }

    #[tokio::test]
    async fn membership_reflects_active_flag_and_roles() {
        let store = MemoryStore::new();
        testing::seed_organization(&store, "org-1", "Acme", "acct-owner").await;
        testing::seed_member(&store, "org-1", "acct-plain", &[], true).await;
        testing::seed_member(&store, "org-1", "acct-inactive", &[], false).await;

        assert!(is_member(&store, "org-1", "acct-owner").await.unwrap());
        assert!(is_owner(&store, "org-1", "acct-owner").await.unwrap());

        assert!(is_member(&store, "org-1", "acct-plain").await.unwrap());
        assert!(!is_owner(&store, "org-1", "acct-plain").await.unwrap());

        // Inactive members do not count at all.
        assert!(!is_member(&store, "org-1", "acct-inactive").await.unwrap());

        // Unknown org and unknown account are both false, not errors.
        assert!(!is_member(&store, "org-missing", "acct-owner").await.unwrap());
        assert!(!is_member(&store, "org-1", "acct-missing").await.unwrap());
    }
}
