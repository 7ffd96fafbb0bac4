//! Persisted per-user session preferences. One record per user, addressed by
//! a user-parameterized key so concurrent sessions for different users never
//! share state.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

/// The single persisted value: which organization the user is acting in.
/// Empty string is a meaningful state (explicitly cleared), distinct from an
/// absent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgSettings {
    pub active_org_id: String,
}

impl OrgSettings {
    pub fn cleared() -> Self {
        Self {
            active_org_id: String::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings read failed: {0}")]
    Read(String),

    #[error("Settings write failed: {0}")]
    Write(String),
}

/// Storage key for a user's settings record.
pub fn settings_key(user_id: &str) -> String {
    format!("org.settings.{}", user_id)
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<OrgSettings>, SettingsError>;

    /// Persist the settings. Failures propagate to the caller; they are
    /// never silently swallowed.
    async fn save(&self, user_id: &str, settings: &OrgSettings) -> Result<(), SettingsError>;
}

#[derive(Default)]
pub struct MemorySettingsStore {
    records: Mutex<HashMap<String, OrgSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self, user_id: &str) -> Result<Option<OrgSettings>, SettingsError> {
        let records = self.records.lock().unwrap();
        Ok(records.get(&settings_key(user_id)).cloned())
    }

    async fn save(&self, user_id: &str, settings: &OrgSettings) -> Result<(), SettingsError> {
        let mut records = self.records.lock().unwrap();
        records.insert(settings_key(user_id), settings.clone());
        Ok(())
    }
}

pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn load(&self, user_id: &str) -> Result<Option<OrgSettings>, SettingsError> {
        use sqlx::Row;

        let row = sqlx::query("SELECT active_org_id FROM user_settings WHERE key = $1")
            .bind(settings_key(user_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SettingsError::Read(e.to_string()))?;

        match row {
            Some(r) => {
                let active_org_id: String = r
                    .try_get("active_org_id")
                    .map_err(|e| SettingsError::Read(e.to_string()))?;
                Ok(Some(OrgSettings { active_org_id }))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, user_id: &str, settings: &OrgSettings) -> Result<(), SettingsError> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (key, active_org_id, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET active_org_id = $2, updated_at = now()
            "#,
        )
        .bind(settings_key(user_id))
        .bind(&settings.active_org_id)
        .execute(&self.pool)
        .await
        .map_err(|e| SettingsError::Write(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_user_scoped() {
        assert_ne!(settings_key("user-a"), settings_key("user-b"));
        assert_eq!(settings_key("user-a"), "org.settings.user-a");
    }

    #[tokio::test]
    async fn memory_store_isolates_users() {
        let store = MemorySettingsStore::new();
        store
            .save(
                "user-a",
                &OrgSettings {
                    active_org_id: "org-1".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            store.load("user-a").await.unwrap().unwrap().active_org_id,
            "org-1"
        );
        assert!(store.load("user-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_string_is_distinct_from_absent() {
        let store = MemorySettingsStore::new();
        assert!(store.load("user-a").await.unwrap().is_none());

        store.save("user-a", &OrgSettings::cleared()).await.unwrap();
        let loaded = store.load("user-a").await.unwrap();
        assert_eq!(loaded, Some(OrgSettings::cleared()));
    }
}
