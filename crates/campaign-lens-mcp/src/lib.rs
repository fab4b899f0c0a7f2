// crates/campaign-lens-mcp/src/lib.rs
// ============================================================================
// Module: Campaign Lens MCP
// Description: MCP server exposing read-only campaign reporting tools.
// Purpose: Serve the tool catalog over stdin/stdout and HTTP transports.
// Dependencies: campaign-lens-core, campaign-lens-config, axum, tokio
// ============================================================================

//! ## Overview
//! Campaign Lens MCP exposes three reporting tools through one protocol
//! [`Gateway`]. Transports only move bytes; every failure below the gateway
//! becomes a structured JSON-RPC response and never ends the process.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod gateway;
pub mod server;
pub mod session;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::RequestAuditEvent;
pub use audit::StderrAuditSink;
pub use gateway::Gateway;
pub use gateway::GatewayReply;
pub use gateway::JsonRpcError;
pub use gateway::JsonRpcResponse;
pub use server::HttpState;
pub use server::McpServer;
pub use server::McpServerError;
pub use server::build_credential_manager;
pub use server::http_router;
pub use server::serve_stream;
pub use session::SESSION_HEADER;
pub use tools::ToolError;
pub use tools::ToolName;
pub use tools::ToolRouter;
