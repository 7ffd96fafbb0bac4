//! Organization CRUD plus the profile bootstrap that backs every request.

use anyhow::Result;

use orgdesk_api::authz;
use orgdesk_api::services::{invitation_service, org_service};
use orgdesk_api::store::{MemoryStore, OrgStore};
use orgdesk_api::testing::{self, RecordingMailer};
use orgdesk_api::types::{Role, RoleSet};

#[tokio::test]
async fn creation_grants_ownership_usable_by_the_predicates() -> Result<()> {
    let store = MemoryStore::new();
    let ctx = testing::context_for(&store, "acct-1", "Alice").await;

    let org = org_service::create_organization(&store, &ctx, "Acme").await?;

    assert!(authz::is_member(&store, &org.id, "acct-1").await?);
    assert!(authz::is_owner(&store, &org.id, "acct-1").await?);

    let roles = store.member_roles(&org.id, "acct-1").await?.unwrap();
    assert!(roles.contains(&Role::Owner));
    Ok(())
}

#[tokio::test]
async fn list_returns_only_active_memberships() -> Result<()> {
    let store = MemoryStore::new();
    let ctx = testing::context_for(&store, "acct-1", "Alice").await;
    let org = org_service::create_organization(&store, &ctx, "Mine").await?;

    testing::seed_organization(&store, "org-other", "Theirs", "acct-other").await;
    testing::seed_member(&store, "org-other", "acct-1", &[], false).await;

    let listed = org_service::list_organizations(&store, &ctx).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, org.id);
    Ok(())
}

#[tokio::test]
async fn detail_includes_the_member_roster() -> Result<()> {
    let store = MemoryStore::new();
    let ctx = testing::context_for(&store, "acct-1", "Alice").await;
    let org = org_service::create_organization(&store, &ctx, "Acme").await?;
    testing::seed_member(&store, &org.id, "acct-2", &[], true).await;

    let detail = org_service::get_organization_detail(&store, &org.id)
        .await?
        .unwrap();
    assert_eq!(detail.organization.id, org.id);
    assert_eq!(detail.members.len(), 2);

    let missing = org_service::get_organization_detail(&store, "org-nope").await?;
    assert!(missing.is_none());
    Ok(())
}

#[tokio::test]
async fn rename_updates_audit_fields() -> Result<()> {
    let store = MemoryStore::new();
    let ctx = testing::context_for(&store, "acct-1", "Alice").await;
    let org = org_service::create_organization(&store, &ctx, "Acme").await?;

    let renamed = org_service::update_organization(&store, &ctx, &org.id, "Acme Industries")
        .await?
        .unwrap();
    assert_eq!(renamed.name, "Acme Industries");
    assert_eq!(renamed.updated_by, ctx.profile_id.to_string());

    let missing = org_service::update_organization(&store, &ctx, "org-nope", "Whatever").await?;
    assert!(missing.is_none());
    Ok(())
}

#[tokio::test]
async fn delete_cascades_members_and_invitations() -> Result<()> {
    let store = MemoryStore::new();
    let mailer = RecordingMailer::new();
    let ctx = testing::context_for(&store, "acct-1", "Alice").await;
    let org = org_service::create_organization(&store, &ctx, "Acme").await?;
    invitation_service::create_invitation(
        &store,
        &mailer,
        &ctx,
        &org.id,
        "new@example.com",
        RoleSet::new(),
    )
    .await?;

    assert!(org_service::delete_organization(&store, &org.id).await?);

    assert!(store.member_roles(&org.id, "acct-1").await?.is_none());
    assert!(store.list_invitations(&org.id).await?.is_empty());

    // Second delete reports nothing to remove.
    assert!(!org_service::delete_organization(&store, &org.id).await?);
    Ok(())
}

#[tokio::test]
async fn membership_predicates_ignore_blank_and_foreign_input() -> Result<()> {
    let store = MemoryStore::new();
    let ctx = testing::context_for(&store, "acct-1", "Alice").await;
    let org = org_service::create_organization(&store, &ctx, "Acme").await?;

    assert!(!authz::is_member(&store, "", "acct-1").await?);
    assert!(!authz::is_member(&store, &org.id, "").await?);
    assert!(!authz::is_member(&store, &org.id, "acct-stranger").await?);
    assert!(!authz::is_owner(&store, "../../x", "acct-1").await?);
    Ok(())
}
