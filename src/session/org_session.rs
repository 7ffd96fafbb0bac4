//! Per-session "acting as" context. The single source of truth for which
//! organization the user is currently working in, continuously reconciled
//! against real membership data, plus the permissions for exactly that
//! organization.
//!
//! Created per authenticated session and passed down the call graph; there
//! is no ambient global here.

use std::sync::Arc;

use thiserror::Error;

use crate::permissions::{PermissionCache, PermissionKey, PermissionView};
use crate::session::settings::{OrgSettings, SettingsError, SettingsStore};
use crate::store::{OrgStore, Organization, OrganizationDetail, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct OrgSession {
    account_id: String,
    store: Arc<dyn OrgStore>,
    settings: Arc<dyn SettingsStore>,
    cache: Arc<PermissionCache>,
    organizations: Vec<Organization>,
    selected_detail: Option<OrganizationDetail>,
    /// `None` = nothing persisted yet; `Some("")` = explicitly cleared.
    /// These are distinct states and both differ from a valid id.
    active_org_id: Option<String>,
}

impl OrgSession {
    pub fn new(
        account_id: impl Into<String>,
        store: Arc<dyn OrgStore>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let account_id = account_id.into();
        let cache = Arc::new(PermissionCache::new(account_id.clone(), store.clone()));
        Self {
            account_id,
            store,
            settings,
            cache,
            organizations: Vec::new(),
            selected_detail: None,
            active_org_id: None,
        }
    }

    /// Load the session: resolve the persisted active-org preference (a
    /// server-supplied seed applies only when nothing is persisted yet),
    /// load the organization list, reconcile the stored id against it, fetch
    /// the detail record for the active organization and warm its
    /// permissions.
    pub async fn load(&mut self, server_seed: Option<&str>) -> Result<(), SessionError> {
        match self.settings.load(&self.account_id).await? {
            // Once a persisted value exists, it wins over any later
            // server-supplied value.
            Some(persisted) => {
                self.active_org_id = Some(persisted.active_org_id);
            }
            None => match server_seed {
                Some(seed) => {
                    let settings = OrgSettings {
                        active_org_id: seed.to_string(),
                    };
                    self.settings.save(&self.account_id, &settings).await?;
                    self.active_org_id = Some(settings.active_org_id);
                }
                None => {
                    self.active_org_id = None;
                }
            },
        }

        self.organizations = self
            .store
            .list_organizations_for_account(&self.account_id)
            .await?;

        self.reconcile().await?;
        self.refresh_selected_detail().await?;

        if let Some(id) = self.active_id_nonempty() {
            let key = PermissionKey::organization(id);
            self.cache.get(&key).await;
        }

        Ok(())
    }

    /// Reconcile the stored active id against the loaded organization set.
    ///
    /// A non-empty stored id that is not in the set (including when the set
    /// is empty) is cleared to `""` exactly once. When no id is stored (or
    /// it was just cleared) and the set is non-empty, the alphabetically
    /// first organization by name is selected and persisted; the sort is
    /// stable so ties resolve deterministically.
    async fn reconcile(&mut self) -> Result<(), SessionError> {
        if let Some(id) = self.active_org_id.clone() {
            if !id.is_empty() && !self.organizations.iter().any(|o| o.id == id) {
                tracing::debug!(
                    "Active organization '{}' no longer accessible, clearing",
                    id
                );
                self.settings
                    .save(&self.account_id, &OrgSettings::cleared())
                    .await?;
                self.active_org_id = Some(String::new());
            }
        }

        let unset = match self.active_org_id.as_deref() {
            None | Some("") => true,
            Some(_) => false,
        };
        if unset && !self.organizations.is_empty() {
            let mut by_name: Vec<&Organization> = self.organizations.iter().collect();
            by_name.sort_by(|a, b| a.name.cmp(&b.name));
            let first = by_name[0].id.clone();

            tracing::debug!("Auto-selecting active organization '{}'", first);
            self.settings
                .save(
                    &self.account_id,
                    &OrgSettings {
                        active_org_id: first.clone(),
                    },
                )
                .await?;
            self.active_org_id = Some(first);
        }

        Ok(())
    }

    async fn refresh_selected_detail(&mut self) -> Result<(), SessionError> {
        self.selected_detail = match self.active_id_nonempty() {
            Some(id) => self.store.find_organization_detail(&id).await?,
            None => None,
        };
        Ok(())
    }

    fn active_id_nonempty(&self) -> Option<String> {
        match self.active_org_id.as_deref() {
            None | Some("") => None,
            Some(id) => Some(id.to_string()),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn active_org_id(&self) -> Option<&str> {
        self.active_org_id.as_deref()
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    /// The currently selected organization. The single-org detail fetch
    /// takes priority over the bulk-list entry of the same id; the bulk
    /// list is a fallback, not a cache override.
    pub fn selected_organization(&self) -> Option<Organization> {
        let active = self.active_id_nonempty()?;
        if let Some(detail) = &self.selected_detail {
            if detail.organization.id == active {
                return Some(detail.organization.clone());
            }
        }
        self.organizations.iter().find(|o| o.id == active).cloned()
    }

    pub fn selected_detail(&self) -> Option<&OrganizationDetail> {
        self.selected_detail.as_ref()
    }

    /// Switch the active organization. An exact no-op when the target equals
    /// the current active id: no persistence write, no cache invalidation.
    /// Otherwise persists once, then invalidates the permission entry for
    /// exactly the new organization's key.
    pub async fn switch_organization(&mut self, new_id: &str) -> Result<(), SessionError> {
        if self.active_org_id.as_deref() == Some(new_id) {
            return Ok(());
        }

        self.settings
            .save(
                &self.account_id,
                &OrgSettings {
                    active_org_id: new_id.to_string(),
                },
            )
            .await?;
        self.active_org_id = Some(new_id.to_string());

        let key = PermissionKey::organization(new_id);
        self.cache.invalidate_exact(&key).await;

        self.refresh_selected_detail().await?;
        Ok(())
    }

    /// Force a refetch of the active organization's permissions. A no-op
    /// (no cache calls at all) when the active id is unset or empty; those
    /// are distinct states from a valid id and both skip invalidation.
    pub async fn refresh_permissions(&self) -> Result<(), SessionError> {
        match self.active_org_id.as_deref() {
            None => Ok(()),
            Some("") => Ok(()),
            Some(id) => {
                let key = PermissionKey::organization(id);
                self.cache.invalidate_exact(&key).await;
                Ok(())
            }
        }
    }

    /// Permissions for the active organization only. Never a union across
    /// organizations; with no active organization this denies everything.
    pub async fn active_permissions(&self) -> PermissionView {
        match self.active_id_nonempty() {
            Some(id) => self.cache.get(&PermissionKey::organization(id)).await,
            None => PermissionView::denied(),
        }
    }

    /// The session's permission cache, for page-context queries addressed
    /// to an explicit organization id (bypassing the active-org state).
    pub fn permissions(&self) -> &Arc<PermissionCache> {
        &self.cache
    }
}
