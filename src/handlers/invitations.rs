use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::authz;
use crate::error::ApiError;
use crate::pipeline::HandlerOptions;
use crate::services::invitation_service;
use crate::types::{Role, RoleSet};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateInvitationBody {
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

fn parse_roles(raw: &[String]) -> Result<RoleSet, ApiError> {
    let mut roles = RoleSet::new();
    for name in raw {
        match Role::parse(name) {
            Some(role) => {
                roles.insert(role);
            }
            None => {
                return Err(ApiError::validation_field(
                    "Invalid invitation",
                    "roles",
                    format!("Unknown role '{}'", name),
                ));
            }
        }
    }
    Ok(roles)
}

/// POST /api/orgs/:org_id/invitations - owner only
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(org_id): Path<String>,
    Json(body): Json<CreateInvitationBody>,
) -> impl IntoResponse {
    let store = state.store.clone();
    let mailer = state.mailer.clone();
    let authz_store = state.store.clone();
    let authz_org = org_id.clone();
    state
        .pipeline()
        .run_authorized(
            &headers,
            HandlerOptions::created().with_success_message("Invitation sent"),
            |ctx| async move {
                authz::is_owner(
                    authz_store.as_ref(),
                    &authz_org,
                    ctx.user.account_id.as_str(),
                )
                .await
                .map_err(ApiError::from)
            },
            |ctx| async move {
                let roles = parse_roles(&body.roles)?;
                invitation_service::create_invitation(
                    store.as_ref(),
                    mailer.as_ref(),
                    &ctx,
                    &org_id,
                    &body.email,
                    roles,
                )
                .await
                .map(Some)
            },
        )
        .await
}

/// GET /api/orgs/:org_id/invitations - owner only
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(org_id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.clone();
    let authz_store = state.store.clone();
    let authz_org = org_id.clone();
    state
        .pipeline()
        .run_authorized(
            &headers,
            HandlerOptions::query(),
            |ctx| async move {
                authz::is_owner(
                    authz_store.as_ref(),
                    &authz_org,
                    ctx.user.account_id.as_str(),
                )
                .await
                .map_err(ApiError::from)
            },
            |_ctx| async move {
                invitation_service::list_invitations(store.as_ref(), &org_id)
                    .await
                    .map(Some)
            },
        )
        .await
}

/// POST /api/invitations/:token/accept - token-addressed, but joining still
/// needs an identity; the check is manual rather than pipeline-enforced
pub async fn accept(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> impl IntoResponse {
    let store = state.store.clone();
    let mailer = state.mailer.clone();
    state
        .pipeline()
        .run_public(
            &headers,
            HandlerOptions::mutation().with_success_message("Invitation accepted"),
            |ctx| async move {
                let ctx = ctx.ok_or_else(|| {
                    ApiError::unauthorized("Sign in to accept this invitation")
                })?;
                invitation_service::accept_invitation(store.as_ref(), mailer.as_ref(), &ctx, &token)
                    .await
                    .map(Some)
            },
        )
        .await
}

/// POST /api/invitations/:token/decline - token-addressed, no login required
pub async fn decline(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> impl IntoResponse {
    let store = state.store.clone();
    state
        .pipeline()
        .run_public(
            &headers,
            HandlerOptions::mutation().with_success_message("Invitation declined"),
            |_ctx| async move {
                invitation_service::decline_invitation(store.as_ref(), &token)
                    .await
                    .map(Some)
            },
        )
        .await
}

/// DELETE /api/orgs/:org_id/invitations/:invitation_id - owner only
pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((org_id, invitation_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store.clone();
    let authz_store = state.store.clone();
    let authz_org = org_id.clone();
    state
        .pipeline()
        .run_authorized(
            &headers,
            HandlerOptions::query()
                .with_success_message("Invitation revoked")
                .with_not_found_message("Invitation not found"),
            |ctx| async move {
                authz::is_owner(
                    authz_store.as_ref(),
                    &authz_org,
                    ctx.user.account_id.as_str(),
                )
                .await
                .map_err(ApiError::from)
            },
            |ctx| async move {
                invitation_service::revoke_invitation(store.as_ref(), &ctx, &org_id, &invitation_id)
                    .await
            },
        )
        .await
}
