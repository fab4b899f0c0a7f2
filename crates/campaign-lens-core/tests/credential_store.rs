// crates/campaign-lens-core/tests/credential_store.rs
// ============================================================================
// Module: Credential Store Tests
// Description: File-backed credential persistence and reload.
// Purpose: Validate the durable file shape and restart round-trips.
// Dependencies: campaign-lens-core, tempfile, tokio
// ============================================================================

//! ## Overview
//! Exercises [`FileCredentialStore`] against a temporary directory and checks
//! that a credential written by one manager is picked up by the next.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::sync::Arc;

use async_trait::async_trait;
use campaign_lens_core::Clock;
use campaign_lens_core::Credential;
use campaign_lens_core::CredentialManager;
use campaign_lens_core::CredentialManagerConfig;
use campaign_lens_core::CredentialStore;
use campaign_lens_core::FileCredentialStore;
use campaign_lens_core::NoopOperatorChannel;
use campaign_lens_core::OAuthClientConfig;
use campaign_lens_core::StoreError;
use campaign_lens_core::TokenEndpoint;
use campaign_lens_core::TokenEndpointError;
use campaign_lens_core::TokenGrant;

/// Fixed evaluation instant.
const NOW: i64 = 1_700_000_000_000;

/// Clock pinned to [`NOW`].
struct FixedClock;

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        NOW
    }
}

/// Endpoint that always issues the same refresh grant.
struct StaticEndpoint;

#[async_trait]
impl TokenEndpoint for StaticEndpoint {
    async fn exchange_code(&self, _code: &str) -> Result<TokenGrant, TokenEndpointError> {
        Err(TokenEndpointError::Unconfigured("no bootstrap in this test".to_string()))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, TokenEndpointError> {
        Ok(TokenGrant {
            access_token: "fresh-access".to_string(),
            expires_in: Some(3600),
            refresh_token: None,
        })
    }
}

/// Builds a manager over `store` with an optional environment seed.
fn manager(store: Arc<dyn CredentialStore>, seed: Option<Credential>) -> CredentialManager {
    CredentialManager::new(CredentialManagerConfig {
        oauth: OAuthClientConfig::default(),
        token_endpoint: Arc::new(StaticEndpoint),
        store,
        operator: Arc::new(NoopOperatorChannel),
        clock: Arc::new(FixedClock),
        seed,
        authorization_code: None,
    })
}

#[tokio::test]
async fn missing_file_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCredentialStore::new(dir.path().join("tokens.json"));
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn save_creates_parent_and_writes_flat_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("tokens.json");
    let store = FileCredentialStore::new(&path);
    let credential = Credential {
        refresh_token: "r1".to_string(),
        access_token: Some("a1".to_string()),
        expiry_date: Some(NOW),
    };
    store.save(&credential).await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(
        raw,
        serde_json::json!({"refresh_token": "r1", "access_token": "a1", "expiry_date": NOW})
    );
    assert_eq!(store.load().await.unwrap(), Some(credential));
}

#[tokio::test]
async fn corrupt_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");
    std::fs::write(&path, b"{not json").unwrap();
    let err = FileCredentialStore::new(&path).load().await.unwrap_err();
    assert!(matches!(err, StoreError::Parse(_)));
}

#[tokio::test]
async fn refreshed_credential_survives_restart_through_seed() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(dir.path().join("tokens.json")));

    let first = manager(Arc::clone(&store), Some(Credential::from_refresh_token("r1")));
    let written = first.ensure_valid().await.unwrap();
    assert_eq!(written.access_token.as_deref(), Some("fresh-access"));

    let reloaded = store.load().await.unwrap().unwrap();
    assert_eq!(reloaded, written);

    let second = manager(Arc::clone(&store), Some(reloaded.clone()));
    let restored = second.ensure_valid().await.unwrap();
    assert_eq!(restored, reloaded);
}

#[tokio::test]
async fn unreadable_file_falls_through_to_bootstrap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");
    std::fs::write(&path, b"[]").unwrap();
    let manager = manager(Arc::new(FileCredentialStore::new(&path)), None);
    let err = manager.initialize().await.unwrap_err();
    assert!(matches!(err, campaign_lens_core::CredentialError::AuthenticationRequired(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn saved_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");
    std::fs::write(dir.path().join("tokens.json.tmp"), "stale").unwrap();
    std::fs::set_permissions(dir.path().join("tokens.json.tmp"), std::fs::Permissions::from_mode(0o644))
        .unwrap();
    let store = FileCredentialStore::new(&path);
    store.save(&Credential::from_refresh_token("r1")).await.unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
