// crates/campaign-lens-core/src/operator.rs
// ============================================================================
// Module: Operator Channel
// Description: Operator-visible credential lifecycle events.
// Purpose: Surface authorization URLs and issued refresh tokens for capture.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A running process cannot persist values into its own future environment.
//! Credential values that must survive restarts are therefore surfaced to the
//! operator as `credential_event` JSON lines; capturing them into durable
//! configuration is an operator action. Access tokens are never emitted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Credential event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialEventKind {
    /// Bootstrap needs an authorization code; the URL to visit is attached.
    AuthorizationRequired,
    /// The authorization code was exchanged for an initial credential.
    BootstrapCompleted,
    /// The access token was refreshed.
    Refreshed,
    /// A refresh exchange failed.
    RefreshFailed,
    /// A refresh token is available for capture into configuration.
    RefreshTokenIssued,
    /// The durable credential file could not be read or written.
    StoreFailed,
    /// Startup initialization failed; the next tool call retries.
    InitializationFailed,
}

/// Credential lifecycle event payload.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Event classification.
    pub kind: CredentialEventKind,
    /// Human-readable detail.
    pub message: String,
    /// Authorization URL for the operator to visit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    /// Refresh token for capture into durable configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access token expiry (milliseconds since epoch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl CredentialEvent {
    /// Creates an event with only a message attached.
    #[must_use]
    pub fn new(kind: CredentialEventKind, timestamp_ms: i64, message: impl Into<String>) -> Self {
        Self {
            event: "credential_event",
            timestamp_ms,
            kind,
            message: message.into(),
            authorization_url: None,
            refresh_token: None,
            expiry_date: None,
        }
    }

    /// Attaches the authorization URL.
    #[must_use]
    pub fn with_authorization_url(mut self, url: impl Into<String>) -> Self {
        self.authorization_url = Some(url.into());
        self
    }

    /// Attaches the refresh token for operator capture.
    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    /// Attaches the access token expiry.
    #[must_use]
    pub const fn with_expiry(mut self, expiry_date: Option<i64>) -> Self {
        self.expiry_date = expiry_date;
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for operator-visible credential events.
pub trait OperatorChannel: Send + Sync {
    /// Record a credential event.
    fn record(&self, event: &CredentialEvent);
}

/// Operator channel that logs JSON lines to stderr.
pub struct StderrOperatorChannel;

impl OperatorChannel for StderrOperatorChannel {
    fn record(&self, event: &CredentialEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// No-op operator channel.
pub struct NoopOperatorChannel;

impl OperatorChannel for NoopOperatorChannel {
    fn record(&self, _event: &CredentialEvent) {}
}
