use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::permissions::PermissionSet;
use crate::pipeline::HandlerOptions;
use crate::types::Action;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub organization_id: String,
    pub actions: Vec<Action>,
}

/// GET /api/orgs/:org_id/permissions - the caller's capabilities in an
/// explicitly named organization. Non-members get an empty set, not an
/// error; possession of the id proves nothing.
pub async fn for_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(org_id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.clone();
    state
        .pipeline()
        .run(&headers, HandlerOptions::query(), |ctx| async move {
            let set = if org_id.trim().is_empty() {
                PermissionSet::empty()
            } else {
                match store
                    .member_roles(&org_id, ctx.user.account_id.as_str())
                    .await?
                {
                    Some(roles) => PermissionSet::from_roles(&roles),
                    None => PermissionSet::empty(),
                }
            };
            Ok(Some(PermissionResponse {
                organization_id: org_id,
                actions: set.actions().collect(),
            }))
        })
        .await
}
