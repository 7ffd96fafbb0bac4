use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::pipeline::HandlerOptions;
use crate::services::profile_service;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileBody {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// GET /api/profile - the caller's own profile
pub async fn get(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let store = state.store.clone();
    state
        .pipeline()
        .run(
            &headers,
            HandlerOptions::query().with_not_found_message("Profile not found"),
            |ctx| async move { profile_service::get_profile(store.as_ref(), ctx.profile_id).await },
        )
        .await
}

/// PUT /api/profile - update name or email
pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UpdateProfileBody>,
) -> impl IntoResponse {
    let store = state.store.clone();
    state
        .pipeline()
        .run(
            &headers,
            HandlerOptions::mutation().with_success_message("Profile updated"),
            |ctx| async move {
                profile_service::update_profile(store.as_ref(), ctx.profile_id, body.name, body.email)
                    .await
                    .map(Some)
            },
        )
        .await
}
