// crates/campaign-lens-mcp/src/session.rs
// ============================================================================
// Module: Session Identity
// Description: Issuance and header sanitization for protocol session ids.
// Purpose: Provide advisory session correlation without server-side state.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! Every `initialize` issues a fresh session id. Ids are advisory correlation
//! only: no table backs them and no later call is authorized by one. Client
//! echoes of the id arrive in the `mcp-session-id` header and are untrusted,
//! so they are sanitized before being logged or acknowledged.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rand::RngCore;
use rand::rngs::OsRng;

/// Header carrying the session id over HTTP.
pub const SESSION_HEADER: &str = "mcp-session-id";
/// Maximum accepted length for client-echoed session ids.
pub const MAX_SESSION_ID_LENGTH: usize = 128;

/// Reason a client-supplied session id was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIdRejection {
    /// Input was empty after trimming.
    EmptyAfterTrim,
    /// Input exceeded [`MAX_SESSION_ID_LENGTH`].
    TooLong,
    /// Input contained characters outside the HTTP token set.
    DisallowedChar,
}

impl SessionIdRejection {
    /// Returns a stable label for this rejection reason.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::EmptyAfterTrim => "empty_after_trim",
            Self::TooLong => "too_long",
            Self::DisallowedChar => "disallowed_char",
        }
    }
}

impl fmt::Display for SessionIdRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Process-scoped session id generator.
///
/// # Invariants
/// - Issued ids are unique within the process lifetime.
#[derive(Debug)]
pub struct SessionIdGenerator {
    /// Random identifier fixed at startup.
    boot_id: u64,
    /// Monotonic issue counter.
    counter: AtomicU64,
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIdGenerator {
    /// Creates a generator with a fresh boot id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            boot_id: OsRng.next_u64(),
            counter: AtomicU64::new(1),
        }
    }

    /// Issues a new session id.
    #[must_use]
    pub fn issue(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let nonce = OsRng.next_u64();
        format!("{:016x}-{nonce:016x}-{seq:08x}", self.boot_id)
    }
}

/// Sanitizes a client-echoed session id.
///
/// Returns `Ok(None)` when no header was sent.
///
/// # Errors
///
/// Returns [`SessionIdRejection`] when the value is empty, too long, or not
/// an HTTP token.
pub fn sanitize_session_id(value: Option<&str>) -> Result<Option<String>, SessionIdRejection> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SessionIdRejection::EmptyAfterTrim);
    }
    if trimmed.len() > MAX_SESSION_ID_LENGTH {
        return Err(SessionIdRejection::TooLong);
    }
    if !trimmed.chars().all(is_tchar) {
        return Err(SessionIdRejection::DisallowedChar);
    }
    Ok(Some(trimmed.to_string()))
}

/// Returns true when the character is a valid HTTP token character.
const fn is_tchar(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
        )
}

#[cfg(test)]
mod tests;
