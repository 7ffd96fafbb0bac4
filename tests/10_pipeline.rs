//! Request pipeline behavior: authentication gating, authorization masking,
//! null-result mapping and the error-to-status taxonomy.

use std::sync::Arc;

use axum::http::HeaderMap;
use serde_json::{json, Value};

use orgdesk_api::auth::StaticAuthProvider;
use orgdesk_api::error::ApiError;
use orgdesk_api::pipeline::{HandlerOptions, Pipeline};
use orgdesk_api::store::{MemoryStore, StoreError};

fn pipeline_for(auth: StaticAuthProvider) -> Pipeline {
    Pipeline::new(Arc::new(auth), Arc::new(MemoryStore::new()))
}

#[tokio::test]
async fn anonymous_requests_are_rejected_with_401() {
    let pipeline = pipeline_for(StaticAuthProvider::anonymous());

    let outcome = pipeline
        .run::<Value, _, _>(&HeaderMap::new(), HandlerOptions::query(), |_ctx| async {
            panic!("business function must not run for anonymous callers");
        })
        .await;

    assert_eq!(outcome.status, 401);
    let error = outcome.error.unwrap();
    assert_eq!(error.code, "UNAUTHORIZED");
    assert_eq!(error.message, "Not authenticated");
}

#[tokio::test]
async fn successful_query_wraps_data_in_envelope() {
    let pipeline = pipeline_for(StaticAuthProvider::for_account("acct-1", "Alice"));

    let outcome = pipeline
        .run(&HeaderMap::new(), HandlerOptions::query(), |ctx| async move {
            Ok(Some(json!({ "account": ctx.user.account_id.as_str() })))
        })
        .await;

    assert_eq!(outcome.status, 200);
    assert!(outcome.error.is_none());
    assert_eq!(outcome.message, "OK");
    assert_eq!(outcome.data.unwrap()["account"], "acct-1");
}

#[tokio::test]
async fn missing_result_maps_to_404_for_queries_only() {
    let pipeline = pipeline_for(StaticAuthProvider::for_account("acct-1", "Alice"));

    let outcome = pipeline
        .run::<Value, _, _>(
            &HeaderMap::new(),
            HandlerOptions::query().with_not_found_message("Organization not found"),
            |_ctx| async { Ok(None) },
        )
        .await;
    assert_eq!(outcome.status, 404);
    assert_eq!(outcome.error.unwrap().message, "Organization not found");

    // Mutations may legitimately produce no data.
    let outcome = pipeline
        .run::<Value, _, _>(&HeaderMap::new(), HandlerOptions::mutation(), |_ctx| async {
            Ok(None)
        })
        .await;
    assert_eq!(outcome.status, 200);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn denied_authorization_is_403() {
    let pipeline = pipeline_for(StaticAuthProvider::for_account("acct-1", "Alice"));

    let outcome = pipeline
        .run_authorized::<Value, _, _, _, _>(
            &HeaderMap::new(),
            HandlerOptions::query(),
            |_ctx| async { Ok(false) },
            |_ctx| async { panic!("business function must not run when denied") },
        )
        .await;

    assert_eq!(outcome.status, 403);
    let error = outcome.error.unwrap();
    assert_eq!(error.code, "FORBIDDEN");
    assert_eq!(error.message, "Not authorized");
}

#[tokio::test]
async fn failed_authorization_check_is_masked_to_generic_500() {
    let pipeline = pipeline_for(StaticAuthProvider::for_account("acct-1", "Alice"));

    let outcome = pipeline
        .run_authorized::<Value, _, _, _, _>(
            &HeaderMap::new(),
            HandlerOptions::query(),
            |_ctx| async {
                Err(ApiError::from(StoreError::Connection(
                    "connection refused to db.internal:5432".into(),
                )))
            },
            |_ctx| async { panic!("business function must not run when the check errors") },
        )
        .await;

    // The underlying failure never leaks; denial and failure are
    // distinguishable by status but not by detail.
    assert_eq!(outcome.status, 500);
    let error = outcome.error.unwrap();
    assert_eq!(error.message, "Authorization check failed");
    assert!(!error.message.contains("db.internal"));
}

#[tokio::test]
async fn business_errors_keep_their_taxonomy_status() {
    let pipeline = pipeline_for(StaticAuthProvider::for_account("acct-1", "Alice"));

    let outcome = pipeline
        .run::<Value, _, _>(&HeaderMap::new(), HandlerOptions::mutation(), |_ctx| async {
            Err(ApiError::validation_field(
                "Invalid organization",
                "name",
                "Name cannot be empty",
            ))
        })
        .await;
    assert_eq!(outcome.status, 400);
    let error = outcome.error.unwrap();
    assert_eq!(error.code, "VALIDATION_ERROR");
    assert_eq!(error.details.unwrap()["name"], "Name cannot be empty");

    let outcome = pipeline
        .run::<Value, _, _>(&HeaderMap::new(), HandlerOptions::mutation(), |_ctx| async {
            Err(ApiError::from(StoreError::UniqueViolation {
                constraint: "organizations_creator_name_key".into(),
                field: Some("name".into()),
            }))
        })
        .await;
    assert_eq!(outcome.status, 409);
    assert_eq!(outcome.error.unwrap().code, "CONFLICT");
}

#[tokio::test]
async fn store_query_failures_are_masked() {
    let pipeline = pipeline_for(StaticAuthProvider::for_account("acct-1", "Alice"));

    let outcome = pipeline
        .run::<Value, _, _>(&HeaderMap::new(), HandlerOptions::query(), |_ctx| async {
            Err(ApiError::from(StoreError::Query(
                "syntax error at line 3 of secret_query.sql".into(),
            )))
        })
        .await;

    assert_eq!(outcome.status, 500);
    let error = outcome.error.unwrap();
    assert_eq!(error.message, "An error occurred while processing your request");
    assert!(!error.message.contains("secret_query"));
}

#[tokio::test]
async fn public_handlers_run_without_identity() {
    let pipeline = pipeline_for(StaticAuthProvider::anonymous());

    let outcome = pipeline
        .run_public(&HeaderMap::new(), HandlerOptions::mutation(), |ctx| async move {
            assert!(ctx.is_none());
            Ok(Some(json!({ "ok": true })))
        })
        .await;

    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.data.unwrap()["ok"], true);
}

#[tokio::test]
async fn public_handlers_still_resolve_identity_when_present() {
    let pipeline = pipeline_for(StaticAuthProvider::for_account("acct-1", "Alice"));

    let outcome = pipeline
        .run_public(&HeaderMap::new(), HandlerOptions::query(), |ctx| async move {
            let ctx = ctx.unwrap();
            Ok(Some(json!({ "account": ctx.user.account_id.as_str() })))
        })
        .await;

    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.data.unwrap()["account"], "acct-1");
}
