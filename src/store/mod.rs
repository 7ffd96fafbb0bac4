pub mod memory;
pub mod models;
pub mod pg;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use models::{
    InvitationStatus, OrgInvitation, OrgMember, Organization, OrganizationDetail, UserProfile,
};
pub use pg::PgStore;

use crate::types::RoleSet;

/// Errors surfaced by a store implementation. The HTTP layer never sees
/// these directly; `ApiError::from` remaps them to the closed taxonomy.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unique violation on {constraint}")]
    UniqueViolation {
        constraint: String,
        field: Option<String>,
    },

    #[error("Foreign key violation on {constraint}")]
    ForeignKeyViolation {
        constraint: String,
        field: Option<String>,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("{0}")]
    Other(String),
}

/// CRUD data-access boundary for profiles, organizations, memberships and
/// invitations. Addressed by primary key or the specific predicates the
/// authorization core issues; the storage engine behind it is opaque.
#[async_trait]
pub trait OrgStore: Send + Sync {
    /// Liveness probe for the underlying engine.
    async fn health_check(&self) -> Result<(), StoreError>;

    // --- user profiles ---
    async fn find_profile(&self, id: uuid::Uuid) -> Result<Option<UserProfile>, StoreError>;

    async fn find_profile_by_account(
        &self,
        account_id: &str,
    ) -> Result<Option<UserProfile>, StoreError>;

    async fn insert_profile(&self, profile: UserProfile) -> Result<UserProfile, StoreError>;

    async fn update_profile(&self, profile: UserProfile) -> Result<UserProfile, StoreError>;

    // --- organizations ---

    /// Insert an organization together with its initial owner membership.
    async fn insert_organization(
        &self,
        organization: Organization,
        owner: OrgMember,
    ) -> Result<Organization, StoreError>;

    async fn find_organization(&self, org_id: &str) -> Result<Option<Organization>, StoreError>;

    async fn find_organization_detail(
        &self,
        org_id: &str,
    ) -> Result<Option<OrganizationDetail>, StoreError>;

    /// All organizations where the account holds an *active* membership.
    async fn list_organizations_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<Organization>, StoreError>;

    /// Case-insensitive name lookup among organizations created by the same
    /// user. Backs the duplicate-name check at creation.
    async fn find_org_by_creator_and_name_ci(
        &self,
        created_by: &str,
        name: &str,
    ) -> Result<Option<Organization>, StoreError>;

    async fn update_organization(
        &self,
        organization: Organization,
    ) -> Result<Organization, StoreError>;

    async fn delete_organization(&self, org_id: &str) -> Result<bool, StoreError>;

    // --- memberships ---

    /// Role set of the *active* membership for `account_id` in `org_id`.
    /// `None` when the organization does not exist, the account has no
    /// membership row, or the membership is inactive. This is the strict
    /// equality/existence check all permission computation rests on.
    async fn member_roles(
        &self,
        org_id: &str,
        account_id: &str,
    ) -> Result<Option<RoleSet>, StoreError>;

    async fn find_member(
        &self,
        org_id: &str,
        account_id: &str,
    ) -> Result<Option<OrgMember>, StoreError>;

    async fn insert_member(&self, member: OrgMember) -> Result<OrgMember, StoreError>;

    // --- invitations ---
    async fn insert_invitation(
        &self,
        invitation: OrgInvitation,
    ) -> Result<OrgInvitation, StoreError>;

    async fn find_invitation_by_token(
        &self,
        token: &str,
    ) -> Result<Option<OrgInvitation>, StoreError>;

    async fn find_invitation(
        &self,
        org_id: &str,
        invitation_id: &str,
    ) -> Result<Option<OrgInvitation>, StoreError>;

    async fn list_invitations(&self, org_id: &str) -> Result<Vec<OrgInvitation>, StoreError>;

    async fn update_invitation(
        &self,
        invitation: OrgInvitation,
    ) -> Result<OrgInvitation, StoreError>;
}
