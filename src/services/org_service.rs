//! Organization CRUD business logic. Authorization is enforced by the
//! pipeline's membership/ownership predicates before these run; everything
//! here assumes the caller has already been gated.

use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::pipeline::RequestContext;
use crate::store::{OrgMember, OrgStore, Organization, OrganizationDetail};
use crate::types::Role;

fn validate_name(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation_field(
            "Invalid organization",
            "name",
            "Name is required",
        ));
    }
    if trimmed.len() > 100 {
        return Err(ApiError::validation_field(
            "Invalid organization",
            "name",
            "Name must be at most 100 characters",
        ));
    }
    Ok(trimmed)
}

/// Create an organization with the caller as its initial owner member.
/// Names are unique case-insensitively among organizations created by the
/// same user; the check runs before insertion so the conflict surfaces as a
/// 409 rather than a raw constraint error.
pub async fn create_organization(
    store: &dyn OrgStore,
    ctx: &RequestContext,
    name: &str,
) -> Result<Organization, ApiError> {
    let name = validate_name(name)?;
    let creator = ctx.profile_id.to_string();

    if store
        .find_org_by_creator_and_name_ci(&creator, name)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict(
            format!("An organization named '{}' already exists", name),
            "organizations_creator_name_key",
            Some("name".into()),
        ));
    }

    let now = Utc::now();
    let org_id = Uuid::new_v4().to_string();

    let organization = Organization {
        id: org_id.clone(),
        name: name.to_string(),
        created_at: now,
        updated_at: now,
        created_by: creator.clone(),
        updated_by: creator.clone(),
    };

    let owner = OrgMember {
        id: Uuid::new_v4().to_string(),
        organization_id: org_id,
        account_id: ctx.user.account_id.as_str().to_string(),
        roles: [Role::Owner].into_iter().collect(),
        active: true,
        created_at: now,
        updated_at: now,
        created_by: creator.clone(),
        updated_by: creator,
    };

    store
        .insert_organization(organization, owner)
        .await
        .map_err(Into::into)
}

pub async fn list_organizations(
    store: &dyn OrgStore,
    ctx: &RequestContext,
) -> Result<Vec<Organization>, ApiError> {
    store
        .list_organizations_for_account(ctx.user.account_id.as_str())
        .await
        .map_err(Into::into)
}

pub async fn get_organization_detail(
    store: &dyn OrgStore,
    org_id: &str,
) -> Result<Option<OrganizationDetail>, ApiError> {
    store.find_organization_detail(org_id).await.map_err(Into::into)
}

pub async fn update_organization(
    store: &dyn OrgStore,
    ctx: &RequestContext,
    org_id: &str,
    name: &str,
) -> Result<Option<Organization>, ApiError> {
    let name = validate_name(name)?;

    let Some(mut organization) = store.find_organization(org_id).await? else {
        return Ok(None);
    };

    organization.name = name.to_string();
    organization.updated_at = Utc::now();
    organization.updated_by = ctx.profile_id.to_string();

    store
        .update_organization(organization)
        .await
        .map(Some)
        .map_err(Into::into)
}

/// Delete an organization and its memberships/invitations. Returns whether
/// anything was deleted; deleting a missing organization is not an error.
pub async fn delete_organization(
    store: &dyn OrgStore,
    org_id: &str,
) -> Result<bool, ApiError> {
    store.delete_organization(org_id).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing;

    #[tokio::test]
    async fn creator_becomes_active_owner_member() {
        let store = MemoryStore::new();
        let ctx = testing::context_for(&store, "acct-1", "Alice").await;

        let org = create_organization(&store, &ctx, "Acme").await.unwrap();
        assert_eq!(org.created_by, ctx.profile_id.to_string());

        let member = store.find_member(&org.id, "acct-1").await.unwrap().unwrap();
        assert!(member.active);
        assert!(member.roles.contains(&Role::Owner));
    }

    #[tokio::test]
    async fn duplicate_names_conflict_case_insensitively_per_creator() {
        let store = MemoryStore::new();
        let ctx = testing::context_for(&store, "acct-1", "Alice").await;
        create_organization(&store, &ctx, "Acme").await.unwrap();

        let err = create_organization(&store, &ctx, "  ACME ").await.unwrap_err();
        assert_eq!(err.status_code(), 409);

        // A different creator may reuse the name.
        let other = testing::context_for(&store, "acct-2", "Bob").await;
        assert!(create_organization(&store, &other, "acme").await.is_ok());
    }

    #[tokio::test]
    async fn name_validation_rejects_blank_and_oversized() {
        let store = MemoryStore::new();
        let ctx = testing::context_for(&store, "acct-1", "Alice").await;

        let err = create_organization(&store, &ctx, "   ").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.field_errors().unwrap().contains_key("name"));

        let long = "x".repeat(101);
        let err = create_organization(&store, &ctx, &long).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
