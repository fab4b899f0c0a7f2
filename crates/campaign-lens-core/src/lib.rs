// crates/campaign-lens-core/src/lib.rs
// ============================================================================
// Module: Campaign Lens Core
// Description: Credential lifecycle and read-only query capability for Campaign Lens.
// Purpose: Keep one OAuth2 credential valid and expose the backend query seam.
// Dependencies: reqwest, serde, thiserror, time, tokio, url
// ============================================================================

//! ## Overview
//! Campaign Lens Core owns the single OAuth2 credential used against the
//! advertising backend and the narrow [`QueryExecutor`] capability that tool
//! handlers call with a valid access token. The [`CredentialManager`] is the
//! only component allowed to mutate the credential; every consumer obtains a
//! token through it.
//!
//! ## Layer Responsibilities
//! - Load the credential from the environment seed or the durable token file.
//! - Bootstrap once from an operator-supplied authorization code.
//! - Refresh access tokens that expire within five minutes.
//! - Emit operator-visible events for capture into durable configuration.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod clock;
pub mod credential;
pub mod gaql;
pub mod lifecycle;
pub mod oauth;
pub mod operator;
pub mod query;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::Clock;
pub use clock::SystemClock;
pub use credential::Credential;
pub use credential::EXPIRY_MARGIN_MS;
pub use credential::TokenGrant;
pub use lifecycle::CredentialError;
pub use lifecycle::CredentialManager;
pub use lifecycle::CredentialManagerConfig;
pub use lifecycle::CredentialStatus;
pub use lifecycle::LifecycleState;
pub use oauth::ADWORDS_SCOPE;
pub use oauth::HttpTokenEndpoint;
pub use oauth::OAuthClientConfig;
pub use oauth::TokenEndpoint;
pub use oauth::TokenEndpointError;
pub use operator::CredentialEvent;
pub use operator::CredentialEventKind;
pub use operator::NoopOperatorChannel;
pub use operator::OperatorChannel;
pub use operator::StderrOperatorChannel;
pub use query::AdsApiConfig;
pub use query::AdsApiExecutor;
pub use query::QueryError;
pub use query::QueryExecutor;
pub use query::QueryRequest;
pub use store::CredentialStore;
pub use store::FileCredentialStore;
pub use store::InMemoryCredentialStore;
pub use store::StoreError;
