//! Invitation lifecycle: created by an owner, consumed (accepted/declined)
//! or expired by a timed check-on-read, revoked by an owner. Every terminal
//! transition nulls the single-use token.

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config;
use crate::error::ApiError;
use crate::mailer::{invitation_idempotency_key, EmailRequest, Mailer};
use crate::pipeline::RequestContext;
use crate::store::{InvitationStatus, OrgInvitation, OrgMember, OrgStore};
use crate::types::{Role, RoleSet};

fn generate_token(org_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(org_id.as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn validate_email(email: &str) -> Result<&str, ApiError> {
    let trimmed = email.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return Err(ApiError::validation_field(
            "Invalid invitation",
            "email",
            "A valid email address is required",
        ));
    }
    Ok(trimmed)
}

/// Transition a pending invitation to expired if its deadline passed,
/// persisting the change. Expiry is never a background job; it happens on
/// read.
async fn expire_on_read(
    store: &dyn OrgStore,
    mut invitation: OrgInvitation,
) -> Result<OrgInvitation, ApiError> {
    if invitation.status == InvitationStatus::Pending && invitation.is_expired_at(Utc::now()) {
        invitation.status = InvitationStatus::Expired;
        invitation.token = None;
        invitation.updated_at = Utc::now();
        invitation = store.update_invitation(invitation).await?;
    }
    Ok(invitation)
}

/// Create an invitation and send the invite email. The email is part of the
/// operation: if it cannot be sent, the invitation is not created.
pub async fn create_invitation(
    store: &dyn OrgStore,
    mailer: &dyn Mailer,
    ctx: &RequestContext,
    org_id: &str,
    invitee_email: &str,
    roles: RoleSet,
) -> Result<OrgInvitation, ApiError> {
    let invitee_email = validate_email(invitee_email)?;

    let organization = store
        .find_organization(org_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization not found"))?;

    let now = Utc::now();
    let token = generate_token(org_id);
    let expiry_days = config::config().invitations.expiry_days;

    let request = EmailRequest {
        to: invitee_email.to_string(),
        subject: format!("You have been invited to join {}", organization.name),
        body: format!(
            "{} invited you to join {}. Use token {} to accept.",
            ctx.user.name, organization.name, token
        ),
        idempotency_key: invitation_idempotency_key(&token),
    };
    if let Err(e) = mailer.send(request).await {
        tracing::error!("Invitation email failed for {}: {}", invitee_email, e);
        return Err(ApiError::internal("Failed to send invitation email"));
    }

    let invitation = OrgInvitation {
        id: Uuid::new_v4().to_string(),
        organization_id: org_id.to_string(),
        token: Some(token),
        expires: now + Duration::days(expiry_days),
        status: InvitationStatus::Pending,
        inviter_profile_id: ctx.profile_id.0,
        invitee_email: invitee_email.to_string(),
        roles,
        created_at: now,
        updated_at: now,
        created_by: ctx.profile_id.to_string(),
        updated_by: ctx.profile_id.to_string(),
    };

    store.insert_invitation(invitation).await.map_err(Into::into)
}

/// List invitations for an organization, sweeping expired ones on the way.
pub async fn list_invitations(
    store: &dyn OrgStore,
    org_id: &str,
) -> Result<Vec<OrgInvitation>, ApiError> {
    let mut out = Vec::new();
    for invitation in store.list_invitations(org_id).await? {
        out.push(expire_on_read(store, invitation).await?);
    }
    Ok(out)
}

/// Accept an invitation by token. The caller's identity has already been
/// resolved manually by the public handler.
pub async fn accept_invitation(
    store: &dyn OrgStore,
    mailer: &dyn Mailer,
    ctx: &RequestContext,
    token: &str,
) -> Result<OrgMember, ApiError> {
    let invitation = find_consumable(store, token).await?;

    // At most one membership row per (organization, user); checked here
    // rather than relying on the schema alone.
    if store
        .find_member(&invitation.organization_id, ctx.user.account_id.as_str())
        .await?
        .is_some()
    {
        return Err(ApiError::conflict(
            "You are already a member of this organization",
            "org_members_org_account_key",
            Some("account_id".into()),
        ));
    }

    let now = Utc::now();
    let member = OrgMember {
        id: Uuid::new_v4().to_string(),
        organization_id: invitation.organization_id.clone(),
        account_id: ctx.user.account_id.as_str().to_string(),
        roles: invitation.roles.clone(),
        active: true,
        created_at: now,
        updated_at: now,
        created_by: ctx.profile_id.to_string(),
        updated_by: ctx.profile_id.to_string(),
    };
    let member = store.insert_member(member).await?;

    let mut consumed = invitation;
    let token_for_email = consumed.token.clone();
    consumed.status = InvitationStatus::Accepted;
    consumed.token = None;
    consumed.updated_at = now;
    consumed.updated_by = ctx.profile_id.to_string();
    let consumed = store.update_invitation(consumed).await?;

    notify_inviter(store, mailer, &consumed, &ctx.user.name, token_for_email).await;

    Ok(member)
}

/// Decline an invitation by token.
pub async fn decline_invitation(
    store: &dyn OrgStore,
    token: &str,
) -> Result<OrgInvitation, ApiError> {
    let mut invitation = find_consumable(store, token).await?;
    invitation.status = InvitationStatus::Declined;
    invitation.token = None;
    invitation.updated_at = Utc::now();
    store.update_invitation(invitation).await.map_err(Into::into)
}

/// Revoke a pending invitation (owner action).
pub async fn revoke_invitation(
    store: &dyn OrgStore,
    ctx: &RequestContext,
    org_id: &str,
    invitation_id: &str,
) -> Result<Option<OrgInvitation>, ApiError> {
    let Some(invitation) = store.find_invitation(org_id, invitation_id).await? else {
        return Ok(None);
    };
    let invitation = expire_on_read(store, invitation).await?;
    if invitation.status.is_terminal() {
        return Err(ApiError::conflict(
            "Invitation is no longer pending",
            "invitation_status",
            Some("status".into()),
        ));
    }

    let mut revoked = invitation;
    revoked.status = InvitationStatus::Revoked;
    revoked.token = None;
    revoked.updated_at = Utc::now();
    revoked.updated_by = ctx.profile_id.to_string();
    store
        .update_invitation(revoked)
        .await
        .map(Some)
        .map_err(Into::into)
}

/// Look up a pending, unexpired invitation by token. Terminal invitations
/// have no token, so a replayed token reads as not-found.
async fn find_consumable(store: &dyn OrgStore, token: &str) -> Result<OrgInvitation, ApiError> {
    if token.trim().is_empty() {
        return Err(ApiError::not_found("Invitation not found"));
    }
    let Some(invitation) = store.find_invitation_by_token(token).await? else {
        return Err(ApiError::not_found("Invitation not found"));
    };

    let invitation = expire_on_read(store, invitation).await?;
    match invitation.status {
        InvitationStatus::Pending => Ok(invitation),
        InvitationStatus::Expired => Err(ApiError::not_found("Invitation has expired")),
        _ => Err(ApiError::not_found("Invitation not found")),
    }
}

/// Tell the inviter their invite was accepted. This notification is
/// best-effort: failures are logged and swallowed, never failing the join.
async fn notify_inviter(
    store: &dyn OrgStore,
    mailer: &dyn Mailer,
    invitation: &OrgInvitation,
    joiner_name: &str,
    token: Option<String>,
) {
    let inviter = match store.find_profile(invitation.inviter_profile_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            tracing::warn!(
                "Inviter profile {} not found for invitation {}",
                invitation.inviter_profile_id,
                invitation.id
            );
            return;
        }
        Err(e) => {
            tracing::warn!("Inviter lookup failed for invitation {}: {}", invitation.id, e);
            return;
        }
    };
    let Some(to) = inviter.email else {
        return;
    };

    let idempotency_key = match token {
        Some(token) => invitation_idempotency_key(&token),
        None => invitation_idempotency_key(&invitation.id),
    };

    let request = EmailRequest {
        to,
        subject: format!("{} accepted your invitation", joiner_name),
        body: format!(
            "{} has joined the organization you invited them to.",
            joiner_name
        ),
        idempotency_key,
    };
    if let Err(e) = mailer.send(request).await {
        tracing::warn!(
            "Accepted-invitation notification failed for invitation {}: {}",
            invitation.id,
            e
        );
    }
}
