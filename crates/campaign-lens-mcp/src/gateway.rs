// crates/campaign-lens-mcp/src/gateway.rs
// ============================================================================
// Module: Protocol Gateway
// Description: JSON-RPC 2.0 envelope parsing, dispatch, and error mapping.
// Purpose: Single conversion point from any failure into a structured reply.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The gateway is transport-agnostic: it takes raw request bytes, returns an
//! optional response envelope plus the session id issued for the request, and
//! records one audit event. Nothing below it may terminate the process.
//!
//! Methods: `initialize`, `tools/list`, `tools/call`, `ping`, and
//! notifications (requests without an `id`), which get no response.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::audit::AuditSink;
use crate::audit::RequestAuditEvent;
use crate::audit::RequestOutcome;
use crate::audit::RequestTransport;
use crate::session::SessionIdGenerator;
use crate::tools::ToolDefinition;
use crate::tools::ToolError;
use crate::tools::ToolRouter;

// ============================================================================
// SECTION: Protocol Constants
// ============================================================================

/// Protocol revision advertised by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
/// Server name advertised by `initialize`.
pub const SERVER_NAME: &str = "campaign-lens";
/// Server version advertised by `initialize`.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;
/// The JSON is not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// Method or tool does not exist.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal error.
pub const INTERNAL_ERROR: i64 = -32603;

// ============================================================================
// SECTION: Envelopes
// ============================================================================

/// Incoming JSON-RPC request payload.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version; optional, must be `2.0` when present.
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Request identifier; absent for notifications, may be `null`.
    #[serde(default, deserialize_with = "present_value")]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Optional parameters payload.
    #[serde(default)]
    pub params: Option<Value>,
}

/// Distinguishes an explicit `null` from an absent field.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier.
    pub id: Value,
    /// Successful result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success envelope.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error envelope.
    #[must_use]
    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Original failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Builds an error with a detail message attached as `data`.
    #[must_use]
    pub fn new(code: i64, message: &str, detail: impl Into<String>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: Some(json!({ "message": detail.into() })),
        }
    }
}

impl From<ToolError> for JsonRpcError {
    fn from(error: ToolError) -> Self {
        match &error {
            ToolError::UnknownTool(_) => Self::new(METHOD_NOT_FOUND, "Method not found", error.to_string()),
            ToolError::InvalidParams(_) => Self::new(INVALID_PARAMS, "Invalid params", error.to_string()),
            ToolError::Authentication(_)
            | ToolError::Query(_)
            | ToolError::Serialization
            | ToolError::Internal(_) => Self::new(INTERNAL_ERROR, "Internal error", error.to_string()),
        }
    }
}

/// Tool call parameters.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
}

/// Tool list response payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<ToolDefinition>,
}

/// Tool call response payload.
#[derive(Debug, Serialize)]
struct ToolCallResult {
    /// Tool output content.
    content: Vec<ToolContent>,
}

/// Tool output content item.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolContent {
    /// Text content carrying pretty-printed JSON.
    Text {
        /// Rendered payload.
        text: String,
    },
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Result of handling one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReply {
    /// Response envelope; `None` for notifications.
    pub response: Option<JsonRpcResponse>,
    /// Session id issued by `initialize`.
    pub session_id: Option<String>,
    /// Whether the inbound bytes were rejected before dispatch.
    pub rejected: bool,
}

impl GatewayReply {
    /// Reply for input rejected before dispatch.
    fn rejected(response: JsonRpcResponse) -> Self {
        Self {
            response: Some(response),
            session_id: None,
            rejected: true,
        }
    }
}

/// Per-request audit context accumulated during dispatch.
#[derive(Default)]
struct DispatchTrace {
    /// Method name.
    method: Option<String>,
    /// Tool name.
    tool: Option<String>,
    /// Rendered request id.
    request_id: Option<String>,
}

/// Protocol gateway shared by every transport.
#[derive(Clone)]
pub struct Gateway {
    /// Tool router.
    router: ToolRouter,
    /// Session id issuer.
    sessions: Arc<SessionIdGenerator>,
    /// Request audit sink.
    audit: Arc<dyn AuditSink>,
}

impl Gateway {
    /// Creates a gateway.
    #[must_use]
    pub fn new(router: ToolRouter, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            router,
            sessions: Arc::new(SessionIdGenerator::new()),
            audit,
        }
    }

    /// Returns the tool router.
    #[must_use]
    pub const fn router(&self) -> &ToolRouter {
        &self.router
    }

    /// Parses and dispatches one raw message.
    pub async fn handle_bytes(
        &self,
        transport: RequestTransport,
        bytes: &[u8],
        client_session: Option<String>,
    ) -> GatewayReply {
        let mut trace = DispatchTrace::default();
        let reply = match parse_request(bytes) {
            Ok(request) => {
                trace.method = Some(request.method.clone());
                trace.request_id = request.id.as_ref().map(Value::to_string);
                self.dispatch(transport, request, &mut trace).await
            }
            Err(response) => GatewayReply::rejected(response),
        };
        self.record(transport, bytes.len(), &reply, trace, client_session);
        reply
    }

    /// Rejects an oversized message without parsing it.
    pub fn reject_oversized(&self, transport: RequestTransport, size: usize, limit: usize) -> GatewayReply {
        let reply = GatewayReply::rejected(JsonRpcResponse::failure(
            Value::Null,
            JsonRpcError::new(
                INVALID_REQUEST,
                "Invalid Request",
                format!("request body of {size} bytes exceeds limit of {limit} bytes"),
            ),
        ));
        self.record(transport, size, &reply, DispatchTrace::default(), None);
        reply
    }

    /// Dispatches a parsed request.
    async fn dispatch(
        &self,
        transport: RequestTransport,
        request: JsonRpcRequest,
        trace: &mut DispatchTrace,
    ) -> GatewayReply {
        let Some(id) = request.id else {
            return GatewayReply {
                response: None,
                session_id: None,
                rejected: false,
            };
        };
        if let Some(version) = request.jsonrpc.as_deref()
            && version != "2.0"
        {
            return GatewayReply::rejected(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(
                    INVALID_REQUEST,
                    "Invalid Request",
                    format!("unsupported jsonrpc version: {version}"),
                ),
            ));
        }

        let mut session_id = None;
        let outcome = match request.method.as_str() {
            "initialize" => {
                let issued = self.sessions.issue();
                let mut result = json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
                });
                if transport == RequestTransport::Stdio {
                    result["sessionId"] = Value::String(issued.clone());
                }
                session_id = Some(issued);
                Ok(result)
            }
            "ping" => Ok(json!({})),
            "tools/list" => serde_json::to_value(ToolListResult {
                tools: self.router.list_tools(),
            })
            .map_err(|_| JsonRpcError::from(ToolError::Serialization)),
            "tools/call" => self.call_tool(request.params, trace).await,
            other => Err(JsonRpcError {
                code: INTERNAL_ERROR,
                message: "Internal error".to_string(),
                data: Some(json!({
                    "message": format!("unknown method: {other}"),
                    "method": other,
                })),
            }),
        };

        let response = match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        };
        GatewayReply {
            response: Some(response),
            session_id,
            rejected: false,
        }
    }

    /// Runs `tools/call` and wraps the payload in a text content envelope.
    async fn call_tool(
        &self,
        params: Option<Value>,
        trace: &mut DispatchTrace,
    ) -> Result<Value, JsonRpcError> {
        let params: ToolCallParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|err| JsonRpcError::new(INVALID_PARAMS, "Invalid params", err.to_string()))?;
        trace.tool = Some(params.name.clone());
        let payload = self.router.handle_tool_call(&params.name, params.arguments).await?;
        let text = serde_json::to_string_pretty(&payload)
            .map_err(|_| JsonRpcError::from(ToolError::Serialization))?;
        serde_json::to_value(ToolCallResult {
            content: vec![ToolContent::Text {
                text,
            }],
        })
        .map_err(|_| JsonRpcError::from(ToolError::Serialization))
    }

    /// Records the audit event for a handled message.
    fn record(
        &self,
        transport: RequestTransport,
        request_bytes: usize,
        reply: &GatewayReply,
        trace: DispatchTrace,
        client_session: Option<String>,
    ) {
        let (outcome, error_code, response_bytes) = match &reply.response {
            None => (RequestOutcome::Notification, None, 0),
            Some(response) => {
                let size = serde_json::to_vec(response).map(|bytes| bytes.len()).unwrap_or(0);
                match &response.error {
                    Some(error) => (RequestOutcome::Error, Some(error.code), size),
                    None => (RequestOutcome::Ok, None, size),
                }
            }
        };
        let mut event = RequestAuditEvent::new(transport, outcome);
        event.method = trace.method;
        event.tool = trace.tool;
        event.request_id = trace.request_id;
        event.session_id = reply.session_id.clone().or(client_session);
        event.error_code = error_code;
        event.request_bytes = request_bytes;
        event.response_bytes = response_bytes;
        self.audit.record(&event);
    }
}

/// Parses raw bytes into a request or a ready-made error envelope.
fn parse_request(bytes: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_slice(bytes).map_err(|err| {
        JsonRpcResponse::failure(Value::Null, JsonRpcError::new(PARSE_ERROR, "Parse error", err.to_string()))
    })?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    if !value.is_object() {
        return Err(JsonRpcResponse::failure(
            Value::Null,
            JsonRpcError::new(INVALID_REQUEST, "Invalid Request", "request must be a json object"),
        ));
    }
    serde_json::from_value(value).map_err(|err| {
        JsonRpcResponse::failure(id, JsonRpcError::new(INVALID_REQUEST, "Invalid Request", err.to_string()))
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
