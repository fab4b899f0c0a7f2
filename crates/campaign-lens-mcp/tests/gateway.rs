// crates/campaign-lens-mcp/tests/gateway.rs
// ============================================================================
// Module: Gateway Integration Tests
// Description: Catalog and dispatch contracts across the public gateway API.
// Purpose: Pin catalog stability and the tool error-convention asymmetry.
// Dependencies: campaign-lens-mcp, tokio
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

mod common;

use std::collections::BTreeSet;
use std::io::BufRead;

use campaign_lens_mcp::FileAuditSink;
use campaign_lens_mcp::Gateway;
use campaign_lens_mcp::JsonRpcResponse;
use campaign_lens_mcp::ToolRouter;
use campaign_lens_mcp::audit::RequestTransport;
use serde_json::Value;
use serde_json::json;

use crate::common::StubExecutor;
use crate::common::manager;
use crate::common::stack;
use crate::common::stack_with;

/// Sends one request over the stream transport and returns its response.
async fn call(gateway: &Gateway, request: &Value) -> JsonRpcResponse {
    let bytes = serde_json::to_vec(request).unwrap();
    gateway.handle_bytes(RequestTransport::Stdio, &bytes, None).await.response.unwrap()
}

/// Decodes the tool payload from a `tools/call` result.
fn payload(response: &JsonRpcResponse) -> Value {
    let text = response.result.as_ref().unwrap()["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn tools_list_is_idempotent_and_exact() {
    let gateway = stack(StubExecutor::rows(Vec::new()));
    let request = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
    let first = call(&gateway, &request).await;
    let second = call(&gateway, &request).await;
    assert_eq!(first, second);

    let names: BTreeSet<String> = first.result.unwrap()["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["name"].as_str().unwrap().to_string())
        .collect();
    let expected: BTreeSet<String> = ["get_campaigns", "get_campaign_metrics", "test_connection"]
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn stream_and_http_advertise_the_same_catalog() {
    let gateway = stack(StubExecutor::rows(Vec::new()));
    let body = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
    let stdio = gateway.handle_bytes(RequestTransport::Stdio, body, None).await;
    let http = gateway.handle_bytes(RequestTransport::Http, body, None).await;
    assert_eq!(stdio.response, http.response);
}

#[tokio::test]
async fn nonexistent_tool_yields_error_envelope() {
    let gateway = stack(StubExecutor::rows(Vec::new()));
    let response = call(
        &gateway,
        &json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "nonexistent", "arguments": {}}}),
    )
    .await;
    assert!(response.result.is_none());
    assert_eq!(response.error.unwrap().code, -32601);
    assert_eq!(response.id, json!(5));
}

#[tokio::test]
async fn forced_downstream_failure_is_data_for_test_connection_only() {
    let executor = StubExecutor::failing("backend unavailable");
    let gateway = stack(executor.clone());

    let test = call(
        &gateway,
        &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "test_connection", "arguments": {}}}),
    )
    .await;
    assert!(test.error.is_none());
    let data = payload(&test);
    assert_eq!(data["status"], "error");
    assert!(data["message"].as_str().unwrap().contains("backend unavailable"));

    let campaigns = call(
        &gateway,
        &json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "get_campaigns", "arguments": {}}}),
    )
    .await;
    assert!(campaigns.result.is_none());
    let error = campaigns.error.unwrap();
    assert_eq!(error.code, -32603);
    assert!(error.data.unwrap()["message"].as_str().unwrap().contains("backend unavailable"));
    assert_eq!(executor.query_count(), 2);
}

#[tokio::test]
async fn missing_credential_fails_tools_but_not_the_gateway() {
    let gateway = stack_with(StubExecutor::rows(Vec::new()), false);
    let campaigns = call(
        &gateway,
        &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "get_campaigns"}}),
    )
    .await;
    assert_eq!(campaigns.error.unwrap().code, -32603);

    let ping = call(&gateway, &json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})).await;
    assert_eq!(ping.result, Some(json!({})));
}

#[tokio::test]
async fn unknown_method_carries_method_name() {
    let gateway = stack(StubExecutor::rows(Vec::new()));
    let response = call(&gateway, &json!({"jsonrpc": "2.0", "id": 3, "method": "prompts/list"})).await;
    let error = response.error.unwrap();
    assert_eq!(error.code, -32603);
    assert_eq!(error.data.unwrap()["method"], "prompts/list");
}

#[tokio::test]
async fn file_audit_sink_records_one_line_per_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let router = ToolRouter::new(manager(true), StubExecutor::rows(Vec::new()), None);
    let gateway = Gateway::new(router, std::sync::Arc::new(FileAuditSink::new(&path).unwrap()));

    call(&gateway, &json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).await;
    gateway
        .handle_bytes(RequestTransport::Http, br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, None)
        .await;

    let file = std::fs::File::open(&path).unwrap();
    let events: Vec<Value> = std::io::BufReader::new(file)
        .lines()
        .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"], "mcp_request");
    assert_eq!(events[0]["method"], "ping");
    assert_eq!(events[0]["outcome"], "ok");
    assert_eq!(events[1]["transport"], "http");
    assert_eq!(events[1]["outcome"], "notification");
}
