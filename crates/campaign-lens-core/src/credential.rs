// crates/campaign-lens-core/src/credential.rs
// ============================================================================
// Module: Credential Model
// Description: OAuth2 token triple and token endpoint grant payloads.
// Purpose: Define the durable credential shape and its merge/expiry rules.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Credential`] is the token triple persisted to the durable token file:
//! `refresh_token`, nullable `access_token`, nullable `expiry_date` (epoch
//! millis). A [`TokenGrant`] is the token endpoint response for either the
//! authorization-code or refresh grant.
//!
//! ## Invariants
//! - A refresh token, once known, is never discarded by a merge.
//! - A credential without an access token or without an expiry is always
//!   treated as expiring.

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Remaining lifetime below which an access token is treated as expiring.
pub const EXPIRY_MARGIN_MS: i64 = 5 * 60 * 1000;

// ============================================================================
// SECTION: Types
// ============================================================================

/// OAuth2 credential for the advertising backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Short-lived access token, when one has been issued.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Access token expiry as epoch milliseconds.
    #[serde(default)]
    pub expiry_date: Option<i64>,
}

impl Credential {
    /// Creates a credential holding only a refresh token.
    #[must_use]
    pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            access_token: None,
            expiry_date: None,
        }
    }

    /// Builds a credential from an authorization-code grant.
    ///
    /// Returns `None` when the grant carries no refresh token.
    #[must_use]
    pub fn from_grant(grant: TokenGrant, now_ms: i64) -> Option<Self> {
        let expiry_date = grant.expiry_from(now_ms);
        let refresh_token = grant.refresh_token.filter(|token| !token.trim().is_empty())?;
        Some(Self {
            refresh_token,
            access_token: Some(grant.access_token),
            expiry_date,
        })
    }

    /// Returns true when the access token is absent, has no expiry, or
    /// expires within [`EXPIRY_MARGIN_MS`] of `now_ms`.
    #[must_use]
    pub fn is_expiring(&self, now_ms: i64) -> bool {
        if self.access_token.is_none() {
            return true;
        }
        self.expiry_date
            .is_none_or(|expiry| expiry.saturating_sub(now_ms) < EXPIRY_MARGIN_MS)
    }

    /// Merges a refresh grant into this credential.
    ///
    /// The refresh token is replaced only when the grant carries a non-empty one.
    pub fn apply_grant(&mut self, grant: TokenGrant, now_ms: i64) {
        self.expiry_date = grant.expiry_from(now_ms);
        self.access_token = Some(grant.access_token);
        if let Some(refresh_token) = grant.refresh_token.filter(|token| !token.trim().is_empty()) {
            self.refresh_token = refresh_token;
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("refresh_token", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

/// Token endpoint response for the authorization-code and refresh grants.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    /// Newly issued access token.
    pub access_token: String,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Refresh token, present on bootstrap and on rotation.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenGrant {
    /// Returns the absolute expiry for this grant relative to `now_ms`.
    #[must_use]
    pub fn expiry_from(&self, now_ms: i64) -> Option<i64> {
        self.expires_in.map(|seconds| {
            let millis = i64::try_from(seconds).unwrap_or(i64::MAX / 1000).saturating_mul(1000);
            now_ms.saturating_add(millis)
        })
    }
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
