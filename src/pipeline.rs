//! Request handling pipeline. Every operation in the system goes through
//! here: authentication resolution, profile-id resolution, optional
//! authorization check, execution, null-result mapping and typed-error to
//! status translation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::auth::{AuthProvider, AuthUser};
use crate::error::ApiError;
use crate::services::profile_service;
use crate::store::OrgStore;
use crate::types::InternalProfileId;

/// Resolved identity context handed to business functions. `profile_id` is
/// the internal id; the external account id never flows into audit fields
/// from here.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub user: AuthUser,
    pub profile_id: InternalProfileId,
}

/// Per-handler configuration.
#[derive(Clone, Debug)]
pub struct HandlerOptions {
    /// Mutations may legitimately return no data; only non-mutations map a
    /// missing result to 404.
    pub is_mutation: bool,
    pub success_status: u16,
    pub success_message: Option<String>,
    pub not_found_message: Option<String>,
}

impl HandlerOptions {
    pub fn query() -> Self {
        Self {
            is_mutation: false,
            success_status: 200,
            success_message: None,
            not_found_message: None,
        }
    }

    pub fn mutation() -> Self {
        Self {
            is_mutation: true,
            success_status: 200,
            success_message: None,
            not_found_message: None,
        }
    }

    pub fn created() -> Self {
        Self {
            success_status: 201,
            ..Self::mutation()
        }
    }

    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    pub fn with_not_found_message(mut self, message: impl Into<String>) -> Self {
        self.not_found_message = Some(message.into());
        self
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, String>>,
}

/// Uniform handler result envelope: `{ status, data, error?, message }`.
#[derive(Debug, Serialize)]
pub struct HandlerOutcome<T> {
    pub status: u16,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub message: String,
}

impl<T> HandlerOutcome<T> {
    fn success(status: u16, data: Option<T>, message: String) -> Self {
        Self {
            status,
            data,
            error: None,
            message,
        }
    }

    fn failure(err: &ApiError) -> Self {
        Self {
            status: err.status_code(),
            data: None,
            error: Some(ErrorBody {
                code: err.error_code(),
                message: err.message().to_string(),
                details: err.field_errors().cloned(),
            }),
            message: err.message().to_string(),
        }
    }
}

impl<T: Serialize> IntoResponse for HandlerOutcome<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// The pipeline itself: an auth provider plus the store needed for
/// account-id to profile-id resolution.
#[derive(Clone)]
pub struct Pipeline {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn OrgStore>,
}

impl Pipeline {
    pub fn new(auth: Arc<dyn AuthProvider>, store: Arc<dyn OrgStore>) -> Self {
        Self { auth, store }
    }

    /// Run an authenticated handler with no extra authorization predicate.
    pub async fn run<T, BF, BFut>(
        &self,
        headers: &HeaderMap,
        options: HandlerOptions,
        business: BF,
    ) -> HandlerOutcome<T>
    where
        BF: FnOnce(RequestContext) -> BFut,
        BFut: Future<Output = Result<Option<T>, ApiError>>,
    {
        let ctx = match self.resolve_context(headers).await {
            Ok(ctx) => ctx,
            Err(err) => return Self::error_outcome(err),
        };
        self.execute(ctx, options, business).await
    }

    /// Run an authenticated handler behind an authorization predicate. The
    /// predicate runs after authentication and before the business function;
    /// a predicate error is masked to a generic failure so nothing about the
    /// underlying problem leaks. This is a deliberate fail-closed boundary.
    pub async fn run_authorized<T, AF, AFut, BF, BFut>(
        &self,
        headers: &HeaderMap,
        options: HandlerOptions,
        authorize: AF,
        business: BF,
    ) -> HandlerOutcome<T>
    where
        AF: FnOnce(RequestContext) -> AFut,
        AFut: Future<Output = Result<bool, ApiError>>,
        BF: FnOnce(RequestContext) -> BFut,
        BFut: Future<Output = Result<Option<T>, ApiError>>,
    {
        let ctx = match self.resolve_context(headers).await {
            Ok(ctx) => ctx,
            Err(err) => return Self::error_outcome(err),
        };

        match authorize(ctx.clone()).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    "Authorization denied for account '{}'",
                    ctx.user.account_id
                );
                return Self::error_outcome(ApiError::forbidden("Not authorized"));
            }
            Err(err) => {
                tracing::error!("Authorization check failed: {}", err);
                return Self::error_outcome(ApiError::internal("Authorization check failed"));
            }
        }

        self.execute(ctx, options, business).await
    }

    /// Run a public handler. Authentication is still resolved when
    /// credentials are present, but its absence is not an error; the
    /// business function receives `None` and must do its own identity
    /// checks. Reserved for token-addressed endpoints such as invitation
    /// acceptance.
    pub async fn run_public<T, BF, BFut>(
        &self,
        headers: &HeaderMap,
        options: HandlerOptions,
        business: BF,
    ) -> HandlerOutcome<T>
    where
        BF: FnOnce(Option<RequestContext>) -> BFut,
        BFut: Future<Output = Result<Option<T>, ApiError>>,
    {
        let ctx = match self.resolve_context(headers).await {
            Ok(ctx) => Some(ctx),
            Err(ApiError::Unauthorized(_)) => None,
            Err(err) => return Self::error_outcome(err),
        };

        match business(ctx).await {
            Ok(None) if !options.is_mutation => {
                let message = options
                    .not_found_message
                    .unwrap_or_else(|| "Record not found".to_string());
                Self::error_outcome(ApiError::not_found(message))
            }
            Ok(data) => Self::success_outcome(data, options),
            Err(err) => Self::error_outcome(err),
        }
    }

    async fn resolve_context(&self, headers: &HeaderMap) -> Result<RequestContext, ApiError> {
        let state = self.auth.is_authenticated(headers).await;
        let user = match (state.allowed, state.user) {
            (true, Some(user)) => user,
            _ => return Err(ApiError::unauthorized("Not authenticated")),
        };

        // Single conversion point from external account id to internal
        // profile id; bootstraps the profile on first contact.
        let profile = profile_service::ensure_profile(self.store.as_ref(), &user).await?;
        Ok(RequestContext {
            user,
            profile_id: InternalProfileId(profile.id),
        })
    }

    async fn execute<T, BF, BFut>(
        &self,
        ctx: RequestContext,
        options: HandlerOptions,
        business: BF,
    ) -> HandlerOutcome<T>
    where
        BF: FnOnce(RequestContext) -> BFut,
        BFut: Future<Output = Result<Option<T>, ApiError>>,
    {
        match business(ctx).await {
            Ok(None) if !options.is_mutation => {
                let message = options
                    .not_found_message
                    .unwrap_or_else(|| "Record not found".to_string());
                Self::error_outcome(ApiError::not_found(message))
            }
            Ok(data) => Self::success_outcome(data, options),
            Err(err) => Self::error_outcome(err),
        }
    }

    fn success_outcome<T>(data: Option<T>, options: HandlerOptions) -> HandlerOutcome<T> {
        let message = options.success_message.unwrap_or_else(|| "OK".to_string());
        HandlerOutcome::success(options.success_status, data, message)
    }

    fn error_outcome<T>(err: ApiError) -> HandlerOutcome<T> {
        // Every error path is logged before conversion; logging never
        // changes the classification.
        tracing::warn!(
            "Request failed: {} {} - {}",
            err.status_code(),
            err.error_code(),
            err.message()
        );
        HandlerOutcome::failure(&err)
    }
}
