//! User profile resolution and bootstrap.

use chrono::Utc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::store::{OrgStore, StoreError, UserProfile};
use crate::types::InternalProfileId;

/// Find the profile for an account, creating it on first contact.
///
/// Bootstrap sequence: the row is inserted with the external account id in
/// the audit fields (there is no profile id yet), then immediately corrected
/// to reference the new profile id. Everywhere else audit fields carry
/// profile ids only.
pub async fn ensure_profile(
    store: &dyn OrgStore,
    user: &AuthUser,
) -> Result<UserProfile, ApiError> {
    if user.account_id.is_blank() {
        return Err(ApiError::unauthorized("Not authenticated"));
    }

    if let Some(profile) = store
        .find_profile_by_account(user.account_id.as_str())
        .await?
    {
        return Ok(profile);
    }

    let now = Utc::now();
    let id = Uuid::new_v4();
    let account = user.account_id.as_str().to_string();

    let bootstrap = UserProfile {
        id,
        account_id: account.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        created_at: now,
        updated_at: now,
        created_by: account.clone(),
        updated_by: account,
    };

    let mut created = match store.insert_profile(bootstrap).await {
        Ok(profile) => profile,
        // Concurrent first request already created it; use the winner.
        Err(StoreError::UniqueViolation { .. }) => {
            return store
                .find_profile_by_account(user.account_id.as_str())
                .await?
                .ok_or_else(|| ApiError::internal("Profile creation race left no profile"));
        }
        Err(e) => return Err(e.into()),
    };

    created.created_by = id.to_string();
    created.updated_by = id.to_string();
    tracing::debug!("Bootstrapped profile {} for account {}", id, user.account_id);
    store.update_profile(created).await.map_err(Into::into)
}

pub async fn get_profile(
    store: &dyn OrgStore,
    profile_id: InternalProfileId,
) -> Result<Option<UserProfile>, ApiError> {
    store.find_profile(profile_id.0).await.map_err(Into::into)
}

pub async fn update_profile(
    store: &dyn OrgStore,
    profile_id: InternalProfileId,
    name: Option<String>,
    email: Option<String>,
) -> Result<UserProfile, ApiError> {
    let mut profile = store
        .find_profile(profile_id.0)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    if let Some(name) = name {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ApiError::validation_field(
                "Invalid profile",
                "name",
                "Name cannot be empty",
            ));
        }
        profile.name = trimmed.to_string();
    }
    if let Some(email) = email {
        profile.email = Some(email);
    }

    profile.updated_at = Utc::now();
    profile.updated_by = profile_id.to_string();
    store.update_profile(profile).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::ExternalAccountId;

    fn user(account: &str) -> AuthUser {
        AuthUser {
            account_id: ExternalAccountId(account.to_string()),
            name: "Alice".to_string(),
            email: Some("alice@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn bootstrap_corrects_audit_fields_to_profile_id() {
        let store = MemoryStore::new();
        let profile = ensure_profile(&store, &user("acct-1")).await.unwrap();

        // Audit fields reference the internal profile id, not the account id.
        assert_eq!(profile.created_by, profile.id.to_string());
        assert_eq!(profile.updated_by, profile.id.to_string());
        assert_eq!(profile.account_id, "acct-1");
    }

    #[tokio::test]
    async fn ensure_profile_is_idempotent_per_account() {
        let store = MemoryStore::new();
        let first = ensure_profile(&store, &user("acct-1")).await.unwrap();
        let second = ensure_profile(&store, &user("acct-1")).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn blank_account_is_rejected() {
        let store = MemoryStore::new();
        let err = ensure_profile(&store, &user("  ")).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
