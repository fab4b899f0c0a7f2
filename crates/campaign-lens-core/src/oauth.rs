// crates/campaign-lens-core/src/oauth.rs
// ============================================================================
// Module: OAuth Token Endpoint
// Description: OAuth2 client configuration and token endpoint exchanges.
// Purpose: Build the bootstrap authorization URL and run code/refresh grants.
// Dependencies: async-trait, reqwest, serde, serde_json, thiserror, url
// ============================================================================

//! ## Overview
//! [`OAuthClientConfig`] carries the installed-app OAuth2 client settings for
//! the advertising backend. [`TokenEndpoint`] is the seam the credential
//! manager uses for the two grants it ever performs: the one-time
//! authorization-code exchange and the refresh exchange.
//! [`HttpTokenEndpoint`] sends both as form-encoded POSTs.
//!
//! No timeout is imposed on the exchange; a hung token endpoint hangs the
//! request that triggered it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use thiserror::Error;
use url::Url;
use url::form_urlencoded;

use crate::credential::TokenGrant;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Single read-only scope requested during bootstrap.
pub const ADWORDS_SCOPE: &str = "https://www.googleapis.com/auth/adwords";
/// Default authorization endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Default out-of-band redirect URI for installed applications.
pub const DEFAULT_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Form content type for token requests.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

// ============================================================================
// SECTION: Client Configuration
// ============================================================================

/// OAuth2 client settings.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    /// OAuth client identifier.
    pub client_id: Option<String>,
    /// OAuth client secret.
    pub client_secret: Option<String>,
    /// Redirect URI registered for the client.
    pub redirect_uri: String,
    /// Authorization endpoint.
    pub auth_url: String,
    /// Token endpoint.
    pub token_url: String,
}

impl Default for OAuthClientConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl OAuthClientConfig {
    /// Builds the URL the operator visits to obtain an authorization code.
    ///
    /// # Errors
    ///
    /// Returns [`TokenEndpointError::Unconfigured`] when the client id is
    /// missing or the authorization endpoint is not a valid URL.
    pub fn authorization_url(&self) -> Result<String, TokenEndpointError> {
        let client_id = self.client_id()?;
        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", client_id),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", ADWORDS_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|err| {
            TokenEndpointError::Unconfigured(format!("invalid authorization url: {err}"))
        })?;
        Ok(url.into())
    }

    /// Returns the client id or an unconfigured error.
    fn client_id(&self) -> Result<&str, TokenEndpointError> {
        self.client_id
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| TokenEndpointError::Unconfigured("oauth client_id is not set".to_string()))
    }

    /// Returns the client secret or an unconfigured error.
    fn client_secret(&self) -> Result<&str, TokenEndpointError> {
        self.client_secret.as_deref().filter(|value| !value.trim().is_empty()).ok_or_else(|| {
            TokenEndpointError::Unconfigured("oauth client_secret is not set".to_string())
        })
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Token endpoint failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenEndpointError {
    /// Client settings are missing or invalid.
    #[error("oauth client not configured: {0}")]
    Unconfigured(String),
    /// The HTTP exchange failed before a response was received.
    #[error("token endpoint transport error: {0}")]
    Transport(String),
    /// The endpoint rejected the grant.
    #[error("token endpoint rejected grant ({status}): {error}{}", description_suffix(.description.as_deref()))]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// OAuth error code, or the raw body when not an OAuth error.
        error: String,
        /// Optional OAuth error description.
        description: Option<String>,
    },
    /// The response body could not be decoded.
    #[error("token endpoint response parse error: {0}")]
    Parse(String),
}

/// Formats an optional error description for display.
fn description_suffix(description: Option<&str>) -> String {
    description.map(|text| format!(" ({text})")).unwrap_or_default()
}

// ============================================================================
// SECTION: Endpoint Trait
// ============================================================================

/// OAuth2 token endpoint seam.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchanges a one-time authorization code for an initial grant.
    ///
    /// # Errors
    ///
    /// Returns [`TokenEndpointError`] when the exchange fails.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, TokenEndpointError>;

    /// Exchanges a refresh token for a fresh access token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenEndpointError`] when the exchange fails.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TokenEndpointError>;
}

// ============================================================================
// SECTION: HTTP Endpoint
// ============================================================================

/// OAuth error response body.
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    /// OAuth error code.
    error: String,
    /// Optional human-readable description.
    #[serde(default)]
    error_description: Option<String>,
}

/// Token endpoint reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTokenEndpoint {
    /// Client settings.
    config: OAuthClientConfig,
    /// Shared HTTP client.
    client: reqwest::Client,
}

impl HttpTokenEndpoint {
    /// Creates an endpoint for `config`.
    #[must_use]
    pub fn new(config: OAuthClientConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Returns the client settings.
    #[must_use]
    pub const fn config(&self) -> &OAuthClientConfig {
        &self.config
    }

    /// Posts a form-encoded grant and decodes the token response.
    async fn post_grant(&self, fields: &[(&str, &str)]) -> Result<TokenGrant, TokenEndpointError> {
        let client_id = self.config.client_id()?;
        let client_secret = self.config.client_secret()?;
        let body = {
            let mut form = form_urlencoded::Serializer::new(String::new());
            form.append_pair("client_id", client_id);
            form.append_pair("client_secret", client_secret);
            for (key, value) in fields {
                form.append_pair(key, value);
            }
            form.finish()
        };

        let response = self
            .client
            .post(&self.config.token_url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|err| TokenEndpointError::Transport(err.to_string()))?;
        let status = response.status();
        let text =
            response.text().await.map_err(|err| TokenEndpointError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<TokenErrorBody>(&text) {
                Ok(body) => TokenEndpointError::Rejected {
                    status: status.as_u16(),
                    error: body.error,
                    description: body.error_description,
                },
                Err(_) => TokenEndpointError::Rejected {
                    status: status.as_u16(),
                    error: text,
                    description: None,
                },
            });
        }

        serde_json::from_str(&text).map_err(|err| TokenEndpointError::Parse(err.to_string()))
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, TokenEndpointError> {
        let redirect_uri = self.config.redirect_uri.clone();
        self.post_grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &redirect_uri),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TokenEndpointError> {
        self.post_grant(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)]).await
    }
}
