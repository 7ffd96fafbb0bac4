pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod permissions;
pub mod pipeline;
pub mod services;
pub mod session;
pub mod store;
pub mod testing;
pub mod types;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// Build the full router over the given state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(org_routes())
        .merge(invitation_routes())
        .merge(profile_routes())
        .merge(session_routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn org_routes() -> Router<AppState> {
    use handlers::{organizations, permissions};

    Router::new()
        .route(
            "/api/orgs",
            get(organizations::list).post(organizations::create),
        )
        .route(
            "/api/orgs/:org_id",
            get(organizations::detail)
                .put(organizations::update)
                .delete(organizations::delete),
        )
        .route(
            "/api/orgs/:org_id/permissions",
            get(permissions::for_organization),
        )
}

fn invitation_routes() -> Router<AppState> {
    use handlers::invitations;

    Router::new()
        .route(
            "/api/orgs/:org_id/invitations",
            get(invitations::list).post(invitations::create),
        )
        .route(
            "/api/orgs/:org_id/invitations/:invitation_id",
            delete(invitations::revoke),
        )
        .route("/api/invitations/:token/accept", post(invitations::accept))
        .route("/api/invitations/:token/decline", post(invitations::decline))
}

fn profile_routes() -> Router<AppState> {
    use handlers::profile;

    Router::new().route("/api/profile", get(profile::get).put(profile::update))
}

fn session_routes() -> Router<AppState> {
    use handlers::session;

    Router::new()
        .route("/api/session", get(session::get))
        .route("/api/session/active-org", put(session::switch))
        .route(
            "/api/session/permissions/refresh",
            post(session::refresh_permissions),
        )
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "orgdesk-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
