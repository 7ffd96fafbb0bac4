use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::pipeline::{HandlerOptions, RequestContext};
use crate::session::OrgSession;
use crate::store::Organization;
use crate::types::Action;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Absent when nothing was ever persisted; empty string when the user
    /// explicitly cleared the selection.
    pub active_org_id: Option<String>,
    pub organizations: Vec<Organization>,
    pub selected_organization: Option<Organization>,
    pub permissions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchBody {
    pub organization_id: String,
}

async fn load_session(state: &AppState, ctx: &RequestContext) -> Result<OrgSession, ApiError> {
    let mut session = OrgSession::new(
        ctx.user.account_id.as_str(),
        state.store.clone(),
        state.settings.clone(),
    );
    session.load(None).await?;
    Ok(session)
}

async fn session_response(session: &OrgSession) -> SessionResponse {
    let view = session.active_permissions().await;
    let permissions = Action::ALL.iter().copied().filter(|a| view.can(*a)).collect();
    SessionResponse {
        active_org_id: session.active_org_id().map(str::to_string),
        organizations: session.organizations().to_vec(),
        selected_organization: session.selected_organization(),
        permissions,
    }
}

/// GET /api/session - the caller's organization context: membership list,
/// reconciled active selection and permissions for it
pub async fn get(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let app = state.clone();
    state
        .pipeline()
        .run(&headers, HandlerOptions::query(), |ctx| async move {
            let session = load_session(&app, &ctx).await?;
            Ok(Some(session_response(&session).await))
        })
        .await
}

/// PUT /api/session/active-org - switch the active organization
pub async fn switch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SwitchBody>,
) -> impl IntoResponse {
    let app = state.clone();
    state
        .pipeline()
        .run(
            &headers,
            HandlerOptions::mutation().with_success_message("Active organization updated"),
            |ctx| async move {
                let mut session = load_session(&app, &ctx).await?;
                session.switch_organization(&body.organization_id).await?;
                Ok(Some(session_response(&session).await))
            },
        )
        .await
}

/// POST /api/session/permissions/refresh - re-resolve permissions for the
/// active organization; a no-op when there is none
pub async fn refresh_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let app = state.clone();
    state
        .pipeline()
        .run(
            &headers,
            HandlerOptions::mutation().with_success_message("Permissions refreshed"),
            |ctx| async move {
                let session = load_session(&app, &ctx).await?;
                session.refresh_permissions().await?;
                Ok(Some(session_response(&session).await))
            },
        )
        .await
}
