// crates/campaign-lens-core/src/lifecycle.rs
// ============================================================================
// Module: Credential Lifecycle
// Description: Owner of the single OAuth2 credential and its state machine.
// Purpose: Load, bootstrap and refresh the credential on behalf of callers.
// Dependencies: serde, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`CredentialManager`] is the only component that mutates the credential.
//! Consumers obtain access tokens through [`CredentialManager::get_valid_access_token`];
//! nothing reads token fields directly.
//!
//! ## State Machine
//! `Uninitialized -> Bootstrapping -> Ready <-> Refreshing`. A failed
//! bootstrap returns to `Uninitialized`. A failed refresh returns to `Ready`
//! with the stale credential, so every later call is an independent attempt.
//!
//! ## Concurrency
//! Credential state sits behind one async mutex held across the token
//! exchange. Concurrent callers that observe an expiring token queue on the
//! mutex and reuse the refreshed credential instead of exchanging again.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::clock::Clock;
use crate::credential::Credential;
use crate::oauth::OAuthClientConfig;
use crate::oauth::TokenEndpoint;
use crate::oauth::TokenEndpointError;
use crate::operator::CredentialEvent;
use crate::operator::CredentialEventKind;
use crate::operator::OperatorChannel;
use crate::store::CredentialStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Credential lifecycle failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No credential and no bootstrap material; operator action required.
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),
    /// A token exchange was rejected or failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    /// The durable store could not be read.
    #[error("credential store error: {0}")]
    Store(String),
    /// OAuth client settings are incomplete.
    #[error("credential configuration error: {0}")]
    Config(String),
}

impl From<TokenEndpointError> for CredentialError {
    fn from(err: TokenEndpointError) -> Self {
        match err {
            TokenEndpointError::Unconfigured(message) => Self::AuthenticationRequired(message),
            other => Self::AuthenticationFailed(other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Status
// ============================================================================

/// Lifecycle state of the managed credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No credential loaded yet.
    #[default]
    Uninitialized,
    /// Running the one-time authorization-code exchange.
    Bootstrapping,
    /// Credential loaded; the access token may still be stale.
    Ready,
    /// Refresh exchange in flight.
    Refreshing,
}

/// Secret-free snapshot of the managed credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    /// Current lifecycle state.
    pub state: LifecycleState,
    /// Whether a refresh token is held.
    pub has_refresh_token: bool,
    /// Whether an access token is held.
    pub has_access_token: bool,
    /// Access token expiry (milliseconds since epoch).
    pub expiry_date: Option<i64>,
}

impl CredentialStatus {
    /// Builds a snapshot for `state` and `credential`.
    fn capture(state: LifecycleState, credential: Option<&Credential>) -> Self {
        Self {
            state,
            has_refresh_token: credential.is_some_and(|c| !c.refresh_token.is_empty()),
            has_access_token: credential.is_some_and(|c| c.access_token.is_some()),
            expiry_date: credential.and_then(|c| c.expiry_date),
        }
    }
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// Collaborators and bootstrap material for a [`CredentialManager`].
pub struct CredentialManagerConfig {
    /// OAuth client settings used to build the authorization URL.
    pub oauth: OAuthClientConfig,
    /// Token endpoint for code and refresh grants.
    pub token_endpoint: Arc<dyn TokenEndpoint>,
    /// Durable credential file.
    pub store: Arc<dyn CredentialStore>,
    /// Operator-visible event channel.
    pub operator: Arc<dyn OperatorChannel>,
    /// Time source for expiry decisions.
    pub clock: Arc<dyn Clock>,
    /// Credential seeded from the process environment.
    pub seed: Option<Credential>,
    /// One-time authorization code for bootstrap.
    pub authorization_code: Option<String>,
}

/// Mutable state guarded by the single-flight mutex.
struct ManagerState {
    /// Current credential.
    credential: Option<Credential>,
    /// Bootstrap code, taken by the first exchange attempt.
    authorization_code: Option<String>,
}

/// Owner of the OAuth2 credential.
pub struct CredentialManager {
    /// OAuth client settings.
    oauth: OAuthClientConfig,
    /// Token endpoint.
    token_endpoint: Arc<dyn TokenEndpoint>,
    /// Durable store.
    store: Arc<dyn CredentialStore>,
    /// Operator channel.
    operator: Arc<dyn OperatorChannel>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Environment seed, preferred over the store.
    seed: Option<Credential>,
    /// Single-flight credential state.
    state: AsyncMutex<ManagerState>,
    /// Last published status snapshot.
    status: Mutex<CredentialStatus>,
}

impl CredentialManager {
    /// Creates a manager in the `Uninitialized` state.
    #[must_use]
    pub fn new(config: CredentialManagerConfig) -> Self {
        let authorization_code =
            config.authorization_code.filter(|code| !code.trim().is_empty());
        Self {
            oauth: config.oauth,
            token_endpoint: config.token_endpoint,
            store: config.store,
            operator: config.operator,
            clock: config.clock,
            seed: config.seed,
            state: AsyncMutex::new(ManagerState {
                credential: None,
                authorization_code,
            }),
            status: Mutex::new(CredentialStatus::default()),
        }
    }

    /// Loads the credential and makes sure it is usable.
    ///
    /// Order: environment seed, then durable file, then bootstrap.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::AuthenticationRequired`] when bootstrap is
    /// needed but no authorization code is available, and
    /// [`CredentialError::AuthenticationFailed`] when an exchange fails.
    pub async fn initialize(&self) -> Result<(), CredentialError> {
        let mut state = self.state.lock().await;
        self.initialize_locked(&mut state).await.map(|_| ())
    }

    /// Returns a credential whose access token is not expiring.
    ///
    /// Initializes lazily when no credential is loaded.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when no credential can be obtained or the
    /// refresh exchange fails. Failures are not retried.
    pub async fn ensure_valid(&self) -> Result<Credential, CredentialError> {
        let mut state = self.state.lock().await;
        if state.credential.is_none() {
            return self.initialize_locked(&mut state).await;
        }
        self.ensure_valid_locked(&mut state).await
    }

    /// Returns a valid access token.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] under the same conditions as
    /// [`CredentialManager::ensure_valid`].
    pub async fn get_valid_access_token(&self) -> Result<String, CredentialError> {
        let credential = self.ensure_valid().await?;
        credential.access_token.ok_or_else(|| {
            CredentialError::AuthenticationFailed("token endpoint issued no access token".to_string())
        })
    }

    /// Loads an existing credential without contacting the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Store`] when the durable file is unreadable.
    pub async fn load_existing(&self) -> Result<CredentialStatus, CredentialError> {
        let mut state = self.state.lock().await;
        if state.credential.is_none() {
            let loaded = match self.seed.clone() {
                Some(seed) => Some(seed),
                None => {
                    self.store.load().await.map_err(|err| CredentialError::Store(err.to_string()))?
                }
            };
            if let Some(credential) = loaded {
                state.credential = Some(credential);
                self.publish(LifecycleState::Ready, state.credential.as_ref());
            }
        }
        Ok(self.status())
    }

    /// Returns the bootstrap authorization URL.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Config`] when the OAuth client id or the
    /// authorization endpoint is not usable.
    pub fn authorization_url(&self) -> Result<String, CredentialError> {
        self.oauth.authorization_url().map_err(|err| CredentialError::Config(err.to_string()))
    }

    /// Returns the last published status snapshot.
    #[must_use]
    pub fn status(&self) -> CredentialStatus {
        self.status.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    /// Loads from the seed or the store, falling back to bootstrap.
    async fn initialize_locked(
        &self,
        state: &mut ManagerState,
    ) -> Result<Credential, CredentialError> {
        let loaded = match self.seed.clone() {
            Some(seed) => Some(seed),
            None => self.load_from_store().await,
        };
        match loaded {
            Some(credential) => {
                state.credential = Some(credential);
                self.publish(LifecycleState::Ready, state.credential.as_ref());
                self.ensure_valid_locked(state).await
            }
            None => self.bootstrap_locked(state).await,
        }
    }

    /// Reads the durable store, treating unreadable content as absent.
    async fn load_from_store(&self) -> Option<Credential> {
        match self.store.load().await {
            Ok(credential) => credential,
            Err(err) => {
                self.emit(CredentialEvent::new(
                    CredentialEventKind::StoreFailed,
                    self.clock.now_millis(),
                    format!("ignoring unreadable credential file: {err}"),
                ));
                None
            }
        }
    }

    /// Runs the one-time authorization-code exchange.
    async fn bootstrap_locked(
        &self,
        state: &mut ManagerState,
    ) -> Result<Credential, CredentialError> {
        self.publish(LifecycleState::Bootstrapping, None);
        let code = state.authorization_code.take();

        match self.oauth.authorization_url() {
            Ok(url) => {
                let message = if code.is_some() {
                    "exchanging configured authorization code"
                } else {
                    "no refresh token stored; visit the authorization url and restart with the returned code"
                };
                self.emit(
                    CredentialEvent::new(
                        CredentialEventKind::AuthorizationRequired,
                        self.clock.now_millis(),
                        message,
                    )
                    .with_authorization_url(url),
                );
            }
            Err(err) => self.emit(CredentialEvent::new(
                CredentialEventKind::AuthorizationRequired,
                self.clock.now_millis(),
                format!("cannot build authorization url: {err}"),
            )),
        }

        let Some(code) = code else {
            self.publish(LifecycleState::Uninitialized, None);
            return Err(CredentialError::AuthenticationRequired(
                "no refresh token is stored and no unused authorization code is configured"
                    .to_string(),
            ));
        };

        let grant = match self.token_endpoint.exchange_code(&code).await {
            Ok(grant) => grant,
            Err(err) => {
                self.publish(LifecycleState::Uninitialized, None);
                return Err(err.into());
            }
        };
        let Some(credential) = Credential::from_grant(grant, self.clock.now_millis()) else {
            self.publish(LifecycleState::Uninitialized, None);
            return Err(CredentialError::AuthenticationFailed(
                "authorization code exchange returned no refresh token".to_string(),
            ));
        };

        self.persist(&credential).await;
        self.emit(
            CredentialEvent::new(
                CredentialEventKind::BootstrapCompleted,
                self.clock.now_millis(),
                "authorization code exchanged for initial credential",
            )
            .with_expiry(credential.expiry_date),
        );
        self.emit_refresh_token(&credential);
        state.credential = Some(credential.clone());
        self.publish(LifecycleState::Ready, Some(&credential));
        Ok(credential)
    }

    /// Refreshes the loaded credential when it is expiring.
    async fn ensure_valid_locked(
        &self,
        state: &mut ManagerState,
    ) -> Result<Credential, CredentialError> {
        let Some(credential) = state.credential.as_mut() else {
            return Err(CredentialError::AuthenticationRequired(
                "no credential is loaded".to_string(),
            ));
        };
        if !credential.is_expiring(self.clock.now_millis()) {
            return Ok(credential.clone());
        }

        self.publish(LifecycleState::Refreshing, Some(&*credential));
        let grant = match self.token_endpoint.refresh(&credential.refresh_token).await {
            Ok(grant) => grant,
            Err(err) => {
                self.publish(LifecycleState::Ready, Some(&*credential));
                self.emit(CredentialEvent::new(
                    CredentialEventKind::RefreshFailed,
                    self.clock.now_millis(),
                    err.to_string(),
                ));
                return Err(err.into());
            }
        };
        credential.apply_grant(grant, self.clock.now_millis());
        let refreshed = credential.clone();

        self.persist(&refreshed).await;
        self.emit(
            CredentialEvent::new(
                CredentialEventKind::Refreshed,
                self.clock.now_millis(),
                "access token refreshed",
            )
            .with_expiry(refreshed.expiry_date),
        );
        self.emit_refresh_token(&refreshed);
        self.publish(LifecycleState::Ready, Some(&refreshed));
        Ok(refreshed)
    }

    /// Writes the credential to the store; failures are reported, not raised.
    async fn persist(&self, credential: &Credential) {
        if let Err(err) = self.store.save(credential).await {
            self.emit(CredentialEvent::new(
                CredentialEventKind::StoreFailed,
                self.clock.now_millis(),
                format!("credential file not updated: {err}"),
            ));
        }
    }

    /// Surfaces the refresh token for capture into durable configuration.
    fn emit_refresh_token(&self, credential: &Credential) {
        if credential.refresh_token.is_empty() {
            return;
        }
        self.emit(
            CredentialEvent::new(
                CredentialEventKind::RefreshTokenIssued,
                self.clock.now_millis(),
                "set GOOGLE_ADS_REFRESH_TOKEN to this value to survive restarts",
            )
            .with_refresh_token(credential.refresh_token.clone()),
        );
    }

    /// Records an operator event.
    fn emit(&self, event: CredentialEvent) {
        self.operator.record(&event);
    }

    /// Publishes a status snapshot.
    fn publish(&self, state: LifecycleState, credential: Option<&Credential>) {
        if let Ok(mut guard) = self.status.lock() {
            *guard = CredentialStatus::capture(state, credential);
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
