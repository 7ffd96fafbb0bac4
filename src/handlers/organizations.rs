use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::authz;
use crate::error::ApiError;
use crate::pipeline::HandlerOptions;
use crate::services::org_service;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct OrganizationBody {
    pub name: String,
}

/// POST /api/orgs - create an organization owned by the caller
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OrganizationBody>,
) -> impl IntoResponse {
    let store = state.store.clone();
    state
        .pipeline()
        .run(
            &headers,
            HandlerOptions::created().with_success_message("Organization created"),
            |ctx| async move {
                org_service::create_organization(store.as_ref(), &ctx, &body.name)
                    .await
                    .map(Some)
            },
        )
        .await
}

/// GET /api/orgs - all organizations the caller is an active member of
pub async fn list(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let store = state.store.clone();
    state
        .pipeline()
        .run(&headers, HandlerOptions::query(), |ctx| async move {
            org_service::list_organizations(store.as_ref(), &ctx)
                .await
                .map(Some)
        })
        .await
}

/// GET /api/orgs/:org_id - single organization with member roster
pub async fn detail(
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
            HandlerOptions::query().with_not_found_message("Organization not found"),
            |ctx| async move {
                authz::is_member(
                    authz_store.as_ref(),
                    &authz_org,
                    ctx.user.account_id.as_str(),
                )
                .await
                .map_err(ApiError::from)
            },
            |_ctx| async move { org_service::get_organization_detail(store.as_ref(), &org_id).await },
        )
        .await
}

/// PUT /api/orgs/:org_id - rename, owner only
pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(org_id): Path<String>,
    Json(body): Json<OrganizationBody>,
) -> impl IntoResponse {
    let store = state.store.clone();
    let authz_store = state.store.clone();
    let authz_org = org_id.clone();
    state
        .pipeline()
        .run_authorized(
            &headers,
            HandlerOptions::query()
                .with_success_message("Organization updated")
                .with_not_found_message("Organization not found"),
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
                org_service::update_organization(store.as_ref(), &ctx, &org_id, &body.name).await
            },
        )
        .await
}

/// DELETE /api/orgs/:org_id - owner only; cascades members and invitations
pub async fn delete(
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
            HandlerOptions::query()
                .with_success_message("Organization deleted")
                .with_not_found_message("Organization not found"),
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
                let deleted = org_service::delete_organization(store.as_ref(), &org_id).await?;
                Ok(deleted.then(|| json!({ "id": org_id })))
            },
        )
        .await
}
