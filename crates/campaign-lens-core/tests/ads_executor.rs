// crates/campaign-lens-core/tests/ads_executor.rs
// ============================================================================
// Module: Query Executor Tests
// Description: REST query executor against a stub search endpoint.
// Purpose: Validate headers, pagination and backend error mapping.
// Dependencies: campaign-lens-core, tiny_http, tokio
// ============================================================================

//! ## Overview
//! Runs [`AdsApiExecutor`] against a loopback stub.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

mod common;

use campaign_lens_core::AdsApiConfig;
use campaign_lens_core::AdsApiExecutor;
use campaign_lens_core::QueryError;
use campaign_lens_core::QueryExecutor;
use campaign_lens_core::QueryRequest;
use campaign_lens_core::gaql::campaigns_query;
use common::StubServer;

/// Executor pointed at `base`.
fn executor(base: &str, login: Option<&str>) -> AdsApiExecutor {
    AdsApiExecutor::new(AdsApiConfig {
        developer_token: Some("dev-token".to_string()),
        login_customer_id: login.map(str::to_string),
        api_base: base.to_string(),
        api_version: "v17".to_string(),
        max_pages: 3,
    })
}

/// Listing request for account 1234567890.
fn request() -> QueryRequest {
    QueryRequest {
        access_token: "a1".to_string(),
        customer_id: "1234567890".to_string(),
        query: campaigns_query(),
    }
}

#[tokio::test]
async fn search_sends_auth_headers_and_follows_pages() {
    let stub = StubServer::start(vec![
        (200, r#"{"results":[{"campaign":{"id":"1"}}],"nextPageToken":"p2"}"#.to_string()),
        (200, r#"{"results":[{"campaign":{"id":"2"}}]}"#.to_string()),
    ]);
    let rows = executor(&stub.base_url, Some("999")).execute(&request()).await.unwrap();
    assert_eq!(rows.len(), 2);

    let requests = stub.finish();
    assert_eq!(requests[0].url, "/v17/customers/1234567890/googleAds:search");
    assert_eq!(requests[0].header("authorization"), Some("Bearer a1"));
    assert_eq!(requests[0].header("developer-token"), Some("dev-token"));
    assert_eq!(requests[0].header("login-customer-id"), Some("999"));
    let second: serde_json::Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(second["pageToken"], "p2");
}

#[tokio::test]
async fn empty_result_set_is_ok() {
    let stub = StubServer::start(vec![(200, "{}".to_string())]);
    let rows = executor(&stub.base_url, None).execute(&request()).await.unwrap();
    assert!(rows.is_empty());
    assert!(stub.finish()[0].header("login-customer-id").is_none());
}

#[tokio::test]
async fn api_error_message_is_surfaced() {
    let stub = StubServer::start(vec![(
        403,
        r#"{"error":{"code":403,"message":"The caller does not have permission","status":"PERMISSION_DENIED"}}"#
            .to_string(),
    )]);
    let err = executor(&stub.base_url, None).execute(&request()).await.unwrap_err();
    assert_eq!(
        err,
        QueryError::Api {
            status: 403,
            message: "The caller does not have permission".to_string(),
        }
    );
    stub.finish();
}

#[tokio::test]
async fn missing_developer_token_is_unconfigured() {
    let executor = AdsApiExecutor::new(AdsApiConfig::default());
    let err = executor.execute(&request()).await.unwrap_err();
    assert!(matches!(err, QueryError::Unconfigured(_)));
}

#[tokio::test]
async fn result_beyond_page_limit_is_an_error() {
    let page = r#"{"results":[{"campaign":{"id":"1"}}],"nextPageToken":"more"}"#.to_string();
    let stub = StubServer::start(vec![(200, page.clone()), (200, page.clone()), (200, page)]);
    let err = executor(&stub.base_url, None).execute(&request()).await.unwrap_err();
    assert_eq!(err, QueryError::TooManyPages { max_pages: 3 });
    assert_eq!(stub.finish().len(), 3);
}
