// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::store::StoreError;

/// Closed error taxonomy with appropriate status codes and client-friendly
/// messages. Business logic returns these; the request pipeline is the single
/// point of translation to HTTP status/code.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    Validation {
        message: String,
        field_errors: HashMap<String, String>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (unique/constraint violations)
    Conflict {
        message: String,
        constraint: String,
        field: Option<String>,
    },

    // 503 Service Unavailable (store connection failures)
    ServiceUnavailable(String),

    // 500 Internal Server Error (catch-all)
    Internal(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict { .. } => 409,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Internal(_) => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict { message, .. } => message,
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Internal(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict { .. } => "CONFLICT",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Structured per-field details. Present only for validation errors.
    pub fn field_errors(&self) -> Option<&HashMap<String, String>> {
        match self {
            ApiError::Validation { field_errors, .. } if !field_errors.is_empty() => {
                Some(field_errors)
            }
            _ => None,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code(),
        });

        if let Some(field_errors) = self.field_errors() {
            body["details"] = json!(field_errors);
        }
        if let ApiError::Conflict { constraint, field, .. } = self {
            body["constraint"] = json!(constraint);
            if let Some(field) = field {
                body["field"] = json!(field);
            }
        }

        body
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation(message: impl Into<String>, field_errors: HashMap<String, String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            field_errors,
        }
    }

    pub fn validation_field(
        message: impl Into<String>,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.into(), detail.into());
        ApiError::Validation {
            message: message.into(),
            field_errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(
        message: impl Into<String>,
        constraint: impl Into<String>,
        field: Option<String>,
    ) -> Self {
        ApiError::Conflict {
            message: message.into(),
            constraint: constraint.into(),
            field,
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

/// Remap store errors into the closed taxonomy so the client-facing error
/// vocabulary stays store-agnostic. Unrecognized store errors fall back to a
/// generic 500 with the raw message.
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::not_found(msg),
            StoreError::UniqueViolation { constraint, field } => ApiError::conflict(
                format!("A record already exists for {}", field.as_deref().unwrap_or(&constraint)),
                constraint,
                field,
            ),
            StoreError::ForeignKeyViolation { constraint, field } => ApiError::conflict(
                "Referenced record does not exist",
                constraint,
                field,
            ),
            StoreError::Connection(msg) => {
                tracing::error!("Store connection error: {}", msg);
                ApiError::service_unavailable("Data store temporarily unavailable")
            }
            StoreError::Query(msg) => {
                // Don't expose internal store errors to clients
                tracing::error!("Store query error: {}", msg);
                ApiError::internal("An error occurred while processing your request")
            }
            StoreError::Other(msg) => {
                tracing::error!("Unrecognized store error: {}", msg);
                ApiError::internal(msg)
            }
        }
    }
}

impl From<crate::session::SettingsError> for ApiError {
    fn from(err: crate::session::SettingsError) -> Self {
        tracing::error!("Settings store error: {}", err);
        ApiError::internal("An error occurred while processing your request")
    }
}

impl From<crate::session::SessionError> for ApiError {
    fn from(err: crate::session::SessionError) -> Self {
        match err {
            crate::session::SessionError::Settings(e) => e.into(),
            crate::session::SessionError::Store(e) => e.into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ApiError::validation("bad", HashMap::new()).status_code(), 400);
        assert_eq!(ApiError::unauthorized("no").status_code(), 401);
        assert_eq!(ApiError::forbidden("no").status_code(), 403);
        assert_eq!(ApiError::not_found("gone").status_code(), 404);
        assert_eq!(ApiError::conflict("dup", "unique", None).status_code(), 409);
        assert_eq!(ApiError::service_unavailable("down").status_code(), 503);
        assert_eq!(ApiError::internal("boom").status_code(), 500);
    }

    #[test]
    fn details_present_only_for_validation() {
        let err = ApiError::validation_field("Invalid input", "name", "Name is required");
        let body = err.to_json();
        assert_eq!(body["details"]["name"], "Name is required");

        let err = ApiError::not_found("Organization not found");
        assert!(err.to_json().get("details").is_none());
    }

    #[test]
    fn conflict_carries_constraint_and_field() {
        let err = ApiError::conflict("dup", "organizations_name_key", Some("name".into()));
        let body = err.to_json();
        assert_eq!(body["code"], "CONFLICT");
        assert_eq!(body["constraint"], "organizations_name_key");
        assert_eq!(body["field"], "name");
    }

    #[test]
    fn store_errors_remap_to_taxonomy() {
        let err: ApiError = StoreError::NotFound("missing".into()).into();
        assert_eq!(err.status_code(), 404);

        let err: ApiError = StoreError::UniqueViolation {
            constraint: "org_members_org_account_key".into(),
            field: Some("account_id".into()),
        }
        .into();
        assert_eq!(err.status_code(), 409);

        let err: ApiError = StoreError::Connection("refused".into()).into();
        assert_eq!(err.status_code(), 503);

        let err: ApiError = StoreError::Other("weird".into()).into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.message(), "weird");
    }

    #[test]
    fn query_errors_are_not_exposed() {
        let err: ApiError = StoreError::Query("SELECT blew up at line 3".into()).into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.message().contains("SELECT"));
    }
}
