//! Per-session permission cache, keyed strictly by `(area, organization_id)`.
//!
//! The isolation property of the whole system lives here: two keys that
//! differ in organization id never share an entry, and a view never answers
//! `true` unless its own key's snapshot is loaded and grants the action.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::permissions::set::PermissionSet;
use crate::store::OrgStore;
use crate::types::{Action, Area};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionKey {
    pub area: Area,
    pub organization_id: String,
}

impl PermissionKey {
    pub fn organization(organization_id: impl Into<String>) -> Self {
        Self {
            area: Area::Organization,
            organization_id: organization_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryState {
    Loading,
    Ready(PermissionSet),
    Failed,
}

#[derive(Debug, Clone)]
struct Entry {
    state: EntryState,
    generation: u64,
}

/// Read-only view over one cache entry. `can` fails closed: loading, failed
/// and absent entries all answer `false` for every action.
#[derive(Debug, Clone)]
pub struct PermissionView {
    state: EntryState,
    generation: u64,
}

impl PermissionView {
    /// A view that denies every action. Used when there is no organization
    /// to resolve permissions against.
    pub fn denied() -> Self {
        Self {
            state: EntryState::Loading,
            generation: 0,
        }
    }

    pub fn can(&self, action: Action) -> bool {
        match &self.state {
            EntryState::Ready(set) => set.allows(action),
            EntryState::Loading | EntryState::Failed => false,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, EntryState::Loading)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, EntryState::Failed)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One cache per authenticated session; created alongside the session's
/// `OrgSession` and shared by all its consumers.
pub struct PermissionCache {
    account_id: String,
    store: Arc<dyn OrgStore>,
    entries: Mutex<HashMap<PermissionKey, Entry>>,
}

impl PermissionCache {
    pub fn new(account_id: impl Into<String>, store: Arc<dyn OrgStore>) -> Self {
        Self {
            account_id: account_id.into(),
            store,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Current state of a key without triggering a fetch. Absent keys read
    /// as loading (and therefore deny everything).
    pub fn peek(&self, key: &PermissionKey) -> PermissionView {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) => PermissionView {
                state: entry.state.clone(),
                generation: entry.generation,
            },
            None => PermissionView {
                state: EntryState::Loading,
                generation: 0,
            },
        }
    }

    /// Resolve permissions for a key, fetching on first use.
    pub async fn get(&self, key: &PermissionKey) -> PermissionView {
        {
            let entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get(key) {
                if !matches!(entry.state, EntryState::Loading) {
                    return PermissionView {
                        state: entry.state.clone(),
                        generation: entry.generation,
                    };
                }
            }
        }

        let generation = {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries.entry(key.clone()).or_insert(Entry {
                state: EntryState::Loading,
                generation: 1,
            });
            entry.generation
        };

        let state = self.fetch(key).await;

        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.clone()).or_insert(Entry {
            state: EntryState::Loading,
            generation,
        });
        // An invalidation may have superseded this fetch while it was in
        // flight; its refetched state wins over ours.
        if entry.generation == generation {
            entry.state = state;
        }
        PermissionView {
            state: entry.state.clone(),
            generation: entry.generation,
        }
    }

    /// Invalidate exactly this key and refetch before returning, so any read
    /// after this call resolves against fresh data. No other key is touched.
    pub async fn invalidate_exact(&self, key: &PermissionKey) {
        let generation = {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries.entry(key.clone()).or_insert(Entry {
                state: EntryState::Loading,
                generation: 0,
            });
            entry.generation += 1;
            entry.state = EntryState::Loading;
            entry.generation
        };

        tracing::debug!(
            "Invalidating permissions for {}/{} (generation {})",
            key.area.as_str(),
            key.organization_id,
            generation
        );

        let state = self.fetch(key).await;

        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            // A later invalidation may already have superseded this fetch.
            if entry.generation == generation {
                entry.state = state;
            }
        }
    }

    /// Generation counter for a key; starts at 0 for unseen keys. Bumped on
    /// every invalidation.
    pub fn generation(&self, key: &PermissionKey) -> u64 {
        let entries = self.entries.lock().unwrap();
        entries.get(key).map(|e| e.generation).unwrap_or(0)
    }

    async fn fetch(&self, key: &PermissionKey) -> EntryState {
        // Blank ids can never match a record; skip the store entirely.
        if key.organization_id.trim().is_empty() || self.account_id.trim().is_empty() {
            return EntryState::Ready(PermissionSet::empty());
        }

        match self
            .store
            .member_roles(&key.organization_id, &self.account_id)
            .await
        {
            Ok(Some(roles)) => EntryState::Ready(PermissionSet::from_roles(&roles)),
            // Not an active member of a real organization: no permissions,
            // same as any malformed or adversarial id.
            Ok(None) => EntryState::Ready(PermissionSet::empty()),
            Err(e) => {
                tracing::warn!(
                    "Permission fetch failed for {}/{}: {}",
                    key.area.as_str(),
                    key.organization_id,
                    e
                );
                EntryState::Failed
            }
        }
    }
}
