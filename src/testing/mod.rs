//! Fixtures shared by unit and integration tests: seeded stores, resolved
//! request contexts, and recording/failing doubles for the settings and
//! mailer boundaries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::mailer::{EmailRequest, Mailer, MailerError};
use crate::pipeline::RequestContext;
use crate::services::profile_service;
use crate::session::settings::{OrgSettings, SettingsError, SettingsStore};
use crate::store::{InvitationStatus, OrgInvitation, OrgMember, OrgStore, Organization};
use crate::types::{ExternalAccountId, InternalProfileId, Role, RoleSet};

pub fn auth_user(account_id: &str, name: &str) -> AuthUser {
    AuthUser {
        account_id: ExternalAccountId(account_id.to_string()),
        name: name.to_string(),
        email: Some(format!("{}@example.com", account_id)),
    }
}

/// Resolve a full request context, bootstrapping the profile.
pub async fn context_for(store: &dyn OrgStore, account_id: &str, name: &str) -> RequestContext {
    let user = auth_user(account_id, name);
    let profile = profile_service::ensure_profile(store, &user)
        .await
        .expect("profile bootstrap");
    RequestContext {
        user,
        profile_id: InternalProfileId(profile.id),
    }
}

/// Seed an organization with an active owner membership for `owner_account`.
pub async fn seed_organization(
    store: &dyn OrgStore,
    org_id: &str,
    name: &str,
    owner_account: &str,
) -> Organization {
    let now = Utc::now();
    let organization = Organization {
        id: org_id.to_string(),
        name: name.to_string(),
        created_at: now,
        updated_at: now,
        created_by: "seed".to_string(),
        updated_by: "seed".to_string(),
    };
    let owner = OrgMember {
        id: Uuid::new_v4().to_string(),
        organization_id: org_id.to_string(),
        account_id: owner_account.to_string(),
        roles: [Role::Owner].into_iter().collect(),
        active: true,
        created_at: now,
        updated_at: now,
        created_by: "seed".to_string(),
        updated_by: "seed".to_string(),
    };
    store
        .insert_organization(organization, owner)
        .await
        .expect("seed organization")
}

pub async fn seed_member(
    store: &dyn OrgStore,
    org_id: &str,
    account_id: &str,
    roles: &[Role],
    active: bool,
) -> OrgMember {
    let now = Utc::now();
    let member = OrgMember {
        id: Uuid::new_v4().to_string(),
        organization_id: org_id.to_string(),
        account_id: account_id.to_string(),
        roles: roles.iter().copied().collect(),
        active,
        created_at: now,
        updated_at: now,
        created_by: "seed".to_string(),
        updated_by: "seed".to_string(),
    };
    store.insert_member(member).await.expect("seed member")
}

pub async fn seed_invitation(
    store: &dyn OrgStore,
    org_id: &str,
    token: &str,
    invitee_email: &str,
    roles: RoleSet,
    inviter_profile_id: Uuid,
    expires_in_hours: i64,
) -> OrgInvitation {
    let now = Utc::now();
    let invitation = OrgInvitation {
        id: Uuid::new_v4().to_string(),
        organization_id: org_id.to_string(),
        token: Some(token.to_string()),
        expires: now + Duration::hours(expires_in_hours),
        status: InvitationStatus::Pending,
        inviter_profile_id,
        invitee_email: invitee_email.to_string(),
        roles,
        created_at: now,
        updated_at: now,
        created_by: inviter_profile_id.to_string(),
        updated_by: inviter_profile_id.to_string(),
    };
    store
        .insert_invitation(invitation)
        .await
        .expect("seed invitation")
}

/// Settings store double that records every write.
#[derive(Default)]
pub struct RecordingSettingsStore {
    records: Mutex<Vec<(String, OrgSettings)>>,
    current: Mutex<std::collections::HashMap<String, OrgSettings>>,
    pub fail_writes: bool,
}

impl RecordingSettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn save_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn saved_values(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(_, s)| s.active_org_id.clone())
            .collect()
    }

    pub fn preset(&self, user_id: &str, active_org_id: &str) {
        self.current.lock().unwrap().insert(
            user_id.to_string(),
            OrgSettings {
                active_org_id: active_org_id.to_string(),
            },
        );
    }
}

#[async_trait]
impl SettingsStore for RecordingSettingsStore {
    async fn load(&self, user_id: &str) -> Result<Option<OrgSettings>, SettingsError> {
        Ok(self.current.lock().unwrap().get(user_id).cloned())
    }

    async fn save(&self, user_id: &str, settings: &OrgSettings) -> Result<(), SettingsError> {
        if self.fail_writes {
            return Err(SettingsError::Write("injected write failure".into()));
        }
        self.records
            .lock()
            .unwrap()
            .push((user_id.to_string(), settings.clone()));
        self.current
            .lock()
            .unwrap()
            .insert(user_id.to_string(), settings.clone());
        Ok(())
    }
}

/// Mailer double that records sends and can be told to fail.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailRequest>>,
    failures: AtomicUsize,
    pub fail_sends: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<EmailRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, request: EmailRequest) -> Result<(), MailerError> {
        if self.fail_sends {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(MailerError("injected send failure".into()));
        }
        self.sent.lock().unwrap().push(request);
        Ok(())
    }
}
