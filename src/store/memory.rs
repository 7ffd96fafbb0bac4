//! In-process store used by tests and local development. Mirrors the
//! constraints the Postgres schema enforces (unique account per profile,
//! unique active membership per organization/account pair).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::store::models::{
    OrgInvitation, OrgMember, Organization, OrganizationDetail, UserProfile,
};
use crate::store::{OrgStore, StoreError};
use crate::types::RoleSet;

#[derive(Default)]
struct Tables {
    profiles: HashMap<String, UserProfile>,        // keyed by profile id
    organizations: HashMap<String, Organization>,  // keyed by org id
    members: HashMap<String, OrgMember>,           // keyed by member id
    invitations: HashMap<String, OrgInvitation>,   // keyed by invitation id
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a membership inactive in place, simulating revocation happening
    /// behind a live session.
    pub fn deactivate_member(&self, org_id: &str, account_id: &str) {
        let mut tables = self.tables.lock().unwrap();
        for member in tables.members.values_mut() {
            if member.organization_id == org_id && member.account_id == account_id {
                member.active = false;
            }
        }
    }
}

#[async_trait]
impl OrgStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_profile(&self, id: uuid::Uuid) -> Result<Option<UserProfile>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.profiles.get(&id.to_string()).cloned())
    }

    async fn find_profile_by_account(
        &self,
        account_id: &str,
    ) -> Result<Option<UserProfile>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .profiles
            .values()
            .find(|p| p.account_id == account_id)
            .cloned())
    }

    async fn insert_profile(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .profiles
            .values()
            .any(|p| p.account_id == profile.account_id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "user_profiles_account_id_key".into(),
                field: Some("account_id".into()),
            });
        }
        tables
            .profiles
            .insert(profile.id.to_string(), profile.clone());
        Ok(profile)
    }

    async fn update_profile(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let key = profile.id.to_string();
        if !tables.profiles.contains_key(&key) {
            return Err(StoreError::NotFound(format!("Profile {} not found", profile.id)));
        }
        tables.profiles.insert(key, profile.clone());
        Ok(profile)
    }

    async fn insert_organization(
        &self,
        organization: Organization,
        owner: OrgMember,
    ) -> Result<Organization, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables
            .organizations
            .insert(organization.id.clone(), organization.clone());
        tables.members.insert(owner.id.clone(), owner);
        Ok(organization)
    }

    async fn find_organization(&self, org_id: &str) -> Result<Option<Organization>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.organizations.get(org_id).cloned())
    }

    async fn find_organization_detail(
        &self,
        org_id: &str,
    ) -> Result<Option<OrganizationDetail>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let Some(organization) = tables.organizations.get(org_id).cloned() else {
            return Ok(None);
        };
        let mut members: Vec<OrgMember> = tables
            .members
            .values()
            .filter(|m| m.organization_id == org_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(Some(OrganizationDetail {
            organization,
            members,
        }))
    }

    async fn list_organizations_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<Organization>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let mut orgs: Vec<Organization> = tables
            .members
            .values()
            .filter(|m| m.account_id == account_id && m.active)
            .filter_map(|m| tables.organizations.get(&m.organization_id).cloned())
            .collect();
        orgs.sort_by(|a, b| a.id.cmp(&b.id));
        orgs.dedup_by(|a, b| a.id == b.id);
        Ok(orgs)
    }

    async fn find_org_by_creator_and_name_ci(
        &self,
        created_by: &str,
        name: &str,
    ) -> Result<Option<Organization>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let wanted = name.to_lowercase();
        Ok(tables
            .organizations
            .values()
            .find(|o| o.created_by == created_by && o.name.to_lowercase() == wanted)
            .cloned())
    }

    async fn update_organization(
        &self,
        organization: Organization,
    ) -> Result<Organization, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.organizations.contains_key(&organization.id) {
            return Err(StoreError::NotFound(format!(
                "Organization {} not found",
                organization.id
            )));
        }
        tables
            .organizations
            .insert(organization.id.clone(), organization.clone());
        Ok(organization)
    }

    async fn delete_organization(&self, org_id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let existed = tables.organizations.remove(org_id).is_some();
        if existed {
            tables.members.retain(|_, m| m.organization_id != org_id);
            tables
                .invitations
                .retain(|_, i| i.organization_id != org_id);
        }
        Ok(existed)
    }

    async fn member_roles(
        &self,
        org_id: &str,
        account_id: &str,
    ) -> Result<Option<RoleSet>, StoreError> {
        let tables = self.tables.lock().unwrap();
        if !tables.organizations.contains_key(org_id) {
            return Ok(None);
        }
        Ok(tables
            .members
            .values()
            .find(|m| m.organization_id == org_id && m.account_id == account_id && m.active)
            .map(|m| m.roles.clone()))
    }

    async fn find_member(
        &self,
        org_id: &str,
        account_id: &str,
    ) -> Result<Option<OrgMember>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .members
            .values()
            .find(|m| m.organization_id == org_id && m.account_id == account_id)
            .cloned())
    }

    async fn insert_member(&self, member: OrgMember) -> Result<OrgMember, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .members
            .values()
            .any(|m| m.organization_id == member.organization_id && m.account_id == member.account_id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "org_members_org_account_key".into(),
                field: Some("account_id".into()),
            });
        }
        tables.members.insert(member.id.clone(), member.clone());
        Ok(member)
    }

    async fn insert_invitation(
        &self,
        invitation: OrgInvitation,
    ) -> Result<OrgInvitation, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables
            .invitations
            .insert(invitation.id.clone(), invitation.clone());
        Ok(invitation)
    }

    async fn find_invitation_by_token(
        &self,
        token: &str,
    ) -> Result<Option<OrgInvitation>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .invitations
            .values()
            .find(|i| i.token.as_deref() == Some(token))
            .cloned())
    }

    async fn find_invitation(
        &self,
        org_id: &str,
        invitation_id: &str,
    ) -> Result<Option<OrgInvitation>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .invitations
            .get(invitation_id)
            .filter(|i| i.organization_id == org_id)
            .cloned())
    }

    async fn list_invitations(&self, org_id: &str) -> Result<Vec<OrgInvitation>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let mut invitations: Vec<OrgInvitation> = tables
            .invitations
            .values()
            .filter(|i| i.organization_id == org_id)
            .cloned()
            .collect();
        invitations.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(invitations)
    }

    async fn update_invitation(
        &self,
        invitation: OrgInvitation,
    ) -> Result<OrgInvitation, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.invitations.contains_key(&invitation.id) {
            return Err(StoreError::NotFound(format!(
                "Invitation {} not found",
                invitation.id
            )));
        }
        tables
            .invitations
            .insert(invitation.id.clone(), invitation.clone());
        Ok(invitation)
    }
}
