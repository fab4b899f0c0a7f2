// crates/campaign-lens-mcp/src/session/tests.rs
// ============================================================================
// Module: Session Identity Tests
// Description: Unit tests for session id issuance and sanitization.
// Purpose: Validate uniqueness and rejection of malformed header values.
// Dependencies: campaign-lens-mcp
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::collections::HashSet;

use super::MAX_SESSION_ID_LENGTH;
use super::SessionIdGenerator;
use super::SessionIdRejection;
use super::sanitize_session_id;

#[test]
fn issued_ids_are_unique_and_header_safe() {
    let generator = SessionIdGenerator::new();
    let ids: HashSet<String> = (0 .. 64).map(|_| generator.issue()).collect();
    assert_eq!(ids.len(), 64);
    for id in &ids {
        assert_eq!(sanitize_session_id(Some(id)).unwrap().as_deref(), Some(id.as_str()));
    }
}

#[test]
fn absent_header_is_none() {
    assert_eq!(sanitize_session_id(None).unwrap(), None);
}

#[test]
fn blank_header_is_rejected() {
    assert_eq!(sanitize_session_id(Some("  ")).unwrap_err(), SessionIdRejection::EmptyAfterTrim);
}

#[test]
fn oversized_header_is_rejected() {
    let value = "a".repeat(MAX_SESSION_ID_LENGTH + 1);
    assert_eq!(sanitize_session_id(Some(&value)).unwrap_err(), SessionIdRejection::TooLong);
}

#[test]
fn separators_are_rejected() {
    for value in ["a b", "a;b", "a\u{7}", "caf\u{e9}"] {
        assert_eq!(
            sanitize_session_id(Some(value)).unwrap_err(),
            SessionIdRejection::DisallowedChar,
            "{value}"
        );
    }
}
