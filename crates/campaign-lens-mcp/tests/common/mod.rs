// crates/campaign-lens-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: In-process gateway stack with a scripted query executor.
// Purpose: Exercise transports without network access.
// Dependencies: campaign-lens-core, campaign-lens-mcp
// ============================================================================

//! ## Overview
//! [`stack`] assembles a [`Gateway`] over a [`StubExecutor`] and a credential
//! manager that either holds a fresh access token or has nothing at all.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use campaign_lens_core::Credential;
use campaign_lens_core::CredentialManager;
use campaign_lens_core::CredentialManagerConfig;
use campaign_lens_core::HttpTokenEndpoint;
use campaign_lens_core::InMemoryCredentialStore;
use campaign_lens_core::NoopOperatorChannel;
use campaign_lens_core::OAuthClientConfig;
use campaign_lens_core::QueryError;
use campaign_lens_core::QueryExecutor;
use campaign_lens_core::QueryRequest;
use campaign_lens_core::SystemClock;
use campaign_lens_mcp::Gateway;
use campaign_lens_mcp::NoopAuditSink;
use campaign_lens_mcp::ToolRouter;
use serde_json::Value;

// ============================================================================
// SECTION: Stub Executor
// ============================================================================

/// Query executor replaying one scripted outcome.
pub struct StubExecutor {
    /// Rows or error returned for every query.
    outcome: Result<Vec<Value>, QueryError>,
    /// Queries received.
    queries: Mutex<Vec<QueryRequest>>,
}

impl StubExecutor {
    /// Executor returning `rows`.
    pub fn rows(rows: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(rows),
            queries: Mutex::new(Vec::new()),
        })
    }

    /// Executor failing every query.
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(QueryError::Api {
                status: 500,
                message: message.to_string(),
            }),
            queries: Mutex::new(Vec::new()),
        })
    }

    /// Number of queries executed.
    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl QueryExecutor for StubExecutor {
    async fn execute(&self, request: &QueryRequest) -> Result<Vec<Value>, QueryError> {
        self.queries.lock().unwrap().push(request.clone());
        self.outcome.clone()
    }
}

// ============================================================================
// SECTION: Stack
// ============================================================================

/// Default account id used by the stack.
pub const CUSTOMER_ID: &str = "1234567890";

/// Credential manager holding a fresh token, or none when `fresh` is false.
pub fn manager(fresh: bool) -> Arc<CredentialManager> {
    let now = i64::try_from(SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis()).unwrap();
    let seed = fresh.then(|| Credential {
        refresh_token: "refresh".to_string(),
        access_token: Some("access".to_string()),
        expiry_date: Some(now + 3_600_000),
    });
    let oauth = OAuthClientConfig::default();
    Arc::new(CredentialManager::new(CredentialManagerConfig {
        oauth: oauth.clone(),
        token_endpoint: Arc::new(HttpTokenEndpoint::new(oauth)),
        store: Arc::new(InMemoryCredentialStore::default()),
        operator: Arc::new(NoopOperatorChannel),
        clock: Arc::new(SystemClock),
        seed,
        authorization_code: None,
    }))
}

/// Gateway over `executor` with a fresh credential.
pub fn stack(executor: Arc<StubExecutor>) -> Gateway {
    stack_with(executor, true)
}

/// Gateway over `executor`, with or without a usable credential.
pub fn stack_with(executor: Arc<StubExecutor>, fresh: bool) -> Gateway {
    let router = ToolRouter::new(manager(fresh), executor, Some(CUSTOMER_ID.to_string()));
    Gateway::new(router, Arc::new(NoopAuditSink))
}
