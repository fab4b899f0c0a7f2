// crates/campaign-lens-mcp/src/audit.rs
// ============================================================================
// Module: Request Audit Logging
// Description: Structured audit events for protocol request handling.
// Purpose: Emit one JSON line per handled request without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every request the gateway handles produces one `mcp_request` event. Events
//! never carry arguments, results, or tokens; only classification and sizes.
//! Stdout belongs to the stream transport, so the default sink is stderr.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Transport a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestTransport {
    /// Newline-delimited stdin/stdout.
    Stdio,
    /// HTTP endpoint.
    Http,
}

/// Request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// A result envelope was returned.
    Ok,
    /// An error envelope was returned.
    Error,
    /// Notification accepted with no response.
    Notification,
}

/// Request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Transport used for the request.
    pub transport: RequestTransport,
    /// JSON-RPC method, when one could be parsed.
    pub method: Option<String>,
    /// Tool name for `tools/call`.
    pub tool: Option<String>,
    /// Request identifier rendered as JSON.
    pub request_id: Option<String>,
    /// Session id issued or echoed for this request.
    pub session_id: Option<String>,
    /// Request outcome.
    pub outcome: RequestOutcome,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

impl RequestAuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(transport: RequestTransport, outcome: RequestOutcome) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
        Self {
            event: "mcp_request",
            timestamp_ms,
            transport,
            method: None,
            tool: None,
            request_id: None,
            session_id: None,
            outcome,
            error_code: None,
            request_bytes: 0,
            response_bytes: 0,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for request events.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &RequestAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &RequestAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &RequestAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &RequestAuditEvent) {}
}
