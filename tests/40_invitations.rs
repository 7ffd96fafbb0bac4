//! Invitation lifecycle: single-use tokens, check-on-read expiry and the
//! two very different email failure modes (fatal invite, swallowed notify).

use std::sync::Arc;

use orgdesk_api::services::invitation_service;
use orgdesk_api::store::{InvitationStatus, MemoryStore, OrgStore};
use orgdesk_api::testing::{self, RecordingMailer};
use orgdesk_api::types::{Role, RoleSet};

fn owner_roles() -> RoleSet {
    [Role::Owner].into_iter().collect()
}

#[tokio::test]
async fn create_sends_email_and_persists_a_pending_invitation() {
    let store = MemoryStore::new();
    let mailer = RecordingMailer::new();
    let owner = testing::context_for(&store, "acct-owner", "Olive").await;
    testing::seed_organization(&store, "org-1", "Acme", "acct-owner").await;

    let invitation = invitation_service::create_invitation(
        &store,
        &mailer,
        &owner,
        "org-1",
        "new@example.com",
        RoleSet::new(),
    )
    .await
    .unwrap();

    assert_eq!(invitation.status, InvitationStatus::Pending);
    assert!(invitation.token.is_some());

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "new@example.com");
    assert!(sent[0].subject.contains("Acme"));
}

#[tokio::test]
async fn failed_invite_email_aborts_creation() {
    let store = MemoryStore::new();
    let mailer = RecordingMailer::failing();
    let owner = testing::context_for(&store, "acct-owner", "Olive").await;
    testing::seed_organization(&store, "org-1", "Acme", "acct-owner").await;

    let err = invitation_service::create_invitation(
        &store,
        &mailer,
        &owner,
        "org-1",
        "new@example.com",
        RoleSet::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status_code(), 500);
    assert_eq!(err.message(), "Failed to send invitation email");
    assert_eq!(mailer.failure_count(), 1);

    // Nothing was persisted: the email is part of the operation.
    let listed = invitation_service::list_invitations(&store, "org-1")
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn create_for_missing_organization_is_404() {
    let store = MemoryStore::new();
    let mailer = RecordingMailer::new();
    let owner = testing::context_for(&store, "acct-owner", "Olive").await;

    let err = invitation_service::create_invitation(
        &store,
        &mailer,
        &owner,
        "org-nope",
        "new@example.com",
        RoleSet::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status_code(), 404);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn accept_grants_the_invited_roles_and_consumes_the_token() {
    let store = MemoryStore::new();
    let mailer = RecordingMailer::new();
    let owner = testing::context_for(&store, "acct-owner", "Olive").await;
    testing::seed_organization(&store, "org-1", "Acme", "acct-owner").await;

    let invitation = invitation_service::create_invitation(
        &store,
        &mailer,
        &owner,
        "org-1",
        "new@example.com",
        owner_roles(),
    )
    .await
    .unwrap();
    let token = invitation.token.clone().unwrap();

    let joiner = testing::context_for(&store, "acct-new", "Nia").await;
    let member = invitation_service::accept_invitation(&store, &mailer, &joiner, &token)
        .await
        .unwrap();

    assert_eq!(member.organization_id, "org-1");
    assert_eq!(member.account_id, "acct-new");
    assert!(member.active);
    assert!(member.roles.contains(&Role::Owner));

    let stored = store
        .find_invitation("org-1", &invitation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Accepted);
    assert!(stored.token.is_none());

    // Token replay reads as not-found, never as a second join.
    let replayer = testing::context_for(&store, "acct-third", "Theo").await;
    let err = invitation_service::accept_invitation(&store, &mailer, &replayer, &token)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn accept_notifies_the_inviter_best_effort() {
    let store = MemoryStore::new();
    let mailer = RecordingMailer::new();
    let owner = testing::context_for(&store, "acct-owner", "Olive").await;
    testing::seed_organization(&store, "org-1", "Acme", "acct-owner").await;

    let invitation = invitation_service::create_invitation(
        &store,
        &mailer,
        &owner,
        "org-1",
        "new@example.com",
        RoleSet::new(),
    )
    .await
    .unwrap();
    let token = invitation.token.clone().unwrap();

    let joiner = testing::context_for(&store, "acct-new", "Nia").await;

    // The notification goes through a failing mailer; the join must still
    // succeed.
    let failing = RecordingMailer::failing();
    let member = invitation_service::accept_invitation(&store, &failing, &joiner, &token)
        .await
        .unwrap();
    assert!(member.active);
    assert_eq!(failing.failure_count(), 1);

    // With a working mailer the inviter gets the acceptance notice.
    let invitation = invitation_service::create_invitation(
        &store,
        &mailer,
        &owner,
        "org-1",
        "second@example.com",
        RoleSet::new(),
    )
    .await
    .unwrap();
    let token = invitation.token.clone().unwrap();
    let second = testing::context_for(&store, "acct-second", "Sam").await;
    invitation_service::accept_invitation(&store, &mailer, &second, &token)
        .await
        .unwrap();

    let sent = mailer.sent();
    let notice = sent.last().unwrap();
    assert_eq!(notice.to, "acct-owner@example.com");
    assert!(notice.subject.contains("accepted"));
}

#[tokio::test]
async fn accepting_while_already_a_member_conflicts_without_consuming() {
    let store = MemoryStore::new();
    let mailer = RecordingMailer::new();
    let owner = testing::context_for(&store, "acct-owner", "Olive").await;
    testing::seed_organization(&store, "org-1", "Acme", "acct-owner").await;
    testing::seed_member(&store, "org-1", "acct-new", &[], true).await;

    let invitation = invitation_service::create_invitation(
        &store,
        &mailer,
        &owner,
        "org-1",
        "new@example.com",
        RoleSet::new(),
    )
    .await
    .unwrap();
    let token = invitation.token.clone().unwrap();

    let joiner = testing::context_for(&store, "acct-new", "Nia").await;
    let err = invitation_service::accept_invitation(&store, &mailer, &joiner, &token)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    // The invitation survives untouched for someone else.
    let stored = store
        .find_invitation("org-1", &invitation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Pending);
    assert!(stored.token.is_some());
}

#[tokio::test]
async fn decline_consumes_the_token() {
    let store = MemoryStore::new();
    let mailer = RecordingMailer::new();
    let owner = testing::context_for(&store, "acct-owner", "Olive").await;
    testing::seed_organization(&store, "org-1", "Acme", "acct-owner").await;

    let invitation = invitation_service::create_invitation(
        &store,
        &mailer,
        &owner,
        "org-1",
        "new@example.com",
        RoleSet::new(),
    )
    .await
    .unwrap();
    let token = invitation.token.clone().unwrap();

    let declined = invitation_service::decline_invitation(&store, &token)
        .await
        .unwrap();
    assert_eq!(declined.status, InvitationStatus::Declined);
    assert!(declined.token.is_none());

    let err = invitation_service::decline_invitation(&store, &token)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn expiry_happens_on_read_and_nulls_the_token() {
    let store = MemoryStore::new();
    let owner = testing::context_for(&store, "acct-owner", "Olive").await;
    testing::seed_organization(&store, "org-1", "Acme", "acct-owner").await;

    let invitation = testing::seed_invitation(
        &store,
        "org-1",
        "expired-token",
        "late@example.com",
        RoleSet::new(),
        owner.profile_id.0,
        -1,
    )
    .await;

    let mailer = RecordingMailer::new();
    let joiner = testing::context_for(&store, "acct-late", "Lena").await;
    let err = invitation_service::accept_invitation(&store, &mailer, &joiner, "expired-token")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.message(), "Invitation has expired");

    let stored = store
        .find_invitation("org-1", &invitation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Expired);
    assert!(stored.token.is_none());
}

#[tokio::test]
async fn listing_sweeps_expired_invitations() {
    let store = MemoryStore::new();
    let owner = testing::context_for(&store, "acct-owner", "Olive").await;
    testing::seed_organization(&store, "org-1", "Acme", "acct-owner").await;

    testing::seed_invitation(
        &store,
        "org-1",
        "stale-token",
        "late@example.com",
        RoleSet::new(),
        owner.profile_id.0,
        -1,
    )
    .await;
    testing::seed_invitation(
        &store,
        "org-1",
        "fresh-token",
        "soon@example.com",
        RoleSet::new(),
        owner.profile_id.0,
        24,
    )
    .await;

    let listed = invitation_service::list_invitations(&store, "org-1")
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);

    let stale = listed.iter().find(|i| i.invitee_email == "late@example.com").unwrap();
    assert_eq!(stale.status, InvitationStatus::Expired);
    assert!(stale.token.is_none());

    let fresh = listed.iter().find(|i| i.invitee_email == "soon@example.com").unwrap();
    assert_eq!(fresh.status, InvitationStatus::Pending);
}

#[tokio::test]
async fn revoke_is_terminal_and_conflicts_when_repeated() {
    let store = MemoryStore::new();
    let mailer = RecordingMailer::new();
    let owner = testing::context_for(&store, "acct-owner", "Olive").await;
    testing::seed_organization(&store, "org-1", "Acme", "acct-owner").await;

    let invitation = invitation_service::create_invitation(
        &store,
        &mailer,
        &owner,
        "org-1",
        "new@example.com",
        RoleSet::new(),
    )
    .await
    .unwrap();

    let revoked = invitation_service::revoke_invitation(&store, &owner, "org-1", &invitation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(revoked.status, InvitationStatus::Revoked);
    assert!(revoked.token.is_none());

    let err = invitation_service::revoke_invitation(&store, &owner, "org-1", &invitation.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    // Unknown invitation id maps to a plain missing result.
    let missing = invitation_service::revoke_invitation(&store, &owner, "org-1", "nope")
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn invalid_email_is_rejected_before_any_side_effect() {
    let store = MemoryStore::new();
    let mailer = RecordingMailer::new();
    let owner = testing::context_for(&store, "acct-owner", "Olive").await;
    testing::seed_organization(&store, "org-1", "Acme", "acct-owner").await;

    for email in ["", "   ", "not-an-email"] {
        let err = invitation_service::create_invitation(
            &store,
            &mailer,
            &owner,
            "org-1",
            email,
            RoleSet::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
    assert!(mailer.sent().is_empty());
}
