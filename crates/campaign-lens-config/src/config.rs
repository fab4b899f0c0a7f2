// crates/campaign-lens-config/src/config.rs
// ============================================================================
// Module: Campaign Lens Configuration
// Description: Configuration loading, environment overlay, and validation.
// Purpose: Provide strict config parsing with hard limits and env precedence.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration resolves in three layers: built-in defaults, an optional TOML
//! file, then process environment variables. The environment always wins, since
//! it is the durable home of the refresh token across restarts.
//!
//! File resolution: explicit path, else `CAMPAIGN_LENS_CONFIG`, else
//! `campaign-lens.toml` when present, else defaults only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::net::SocketAddr;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "campaign-lens.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CAMPAIGN_LENS_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default HTTP bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
/// Default request body limit.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Default delay before the push stream closes.
const DEFAULT_SSE_CLOSE_MS: u64 = 1000;
/// Default durable token file.
const DEFAULT_TOKEN_PATH: &str = ".campaign-lens/tokens.json";
/// Default out-of-band redirect URI.
const DEFAULT_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
/// Default authorization endpoint.
const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Default token endpoint.
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Default advertising API base URL.
const DEFAULT_API_BASE: &str = "https://googleads.googleapis.com";
/// Default advertising API version.
const DEFAULT_API_VERSION: &str = "v17";

// ============================================================================
// SECTION: Environment Keys
// ============================================================================

/// Environment variable names recognized by the overlay.
pub mod env_keys {
    /// OAuth client id.
    pub const CLIENT_ID: &str = "GOOGLE_ADS_CLIENT_ID";
    /// OAuth client secret.
    pub const CLIENT_SECRET: &str = "GOOGLE_ADS_CLIENT_SECRET";
    /// OAuth redirect URI.
    pub const REDIRECT_URI: &str = "GOOGLE_ADS_REDIRECT_URI";
    /// One-time bootstrap authorization code.
    pub const AUTH_CODE: &str = "GOOGLE_ADS_AUTH_CODE";
    /// API developer token.
    pub const DEVELOPER_TOKEN: &str = "GOOGLE_ADS_DEVELOPER_TOKEN";
    /// Default target account.
    pub const CUSTOMER_ID: &str = "GOOGLE_ADS_CUSTOMER_ID";
    /// Manager account.
    pub const LOGIN_CUSTOMER_ID: &str = "GOOGLE_ADS_LOGIN_CUSTOMER_ID";
    /// Durable refresh token.
    pub const REFRESH_TOKEN: &str = "GOOGLE_ADS_REFRESH_TOKEN";
    /// Pre-seeded access token.
    pub const ACCESS_TOKEN: &str = "GOOGLE_ADS_ACCESS_TOKEN";
    /// Pre-seeded access token expiry (epoch millis).
    pub const TOKEN_EXPIRY: &str = "GOOGLE_ADS_TOKEN_EXPIRY";
    /// Durable token file path.
    pub const TOKEN_PATH: &str = "CAMPAIGN_LENS_TOKEN_PATH";
    /// Transport selection.
    pub const TRANSPORT: &str = "CAMPAIGN_LENS_TRANSPORT";
    /// HTTP bind address.
    pub const BIND: &str = "CAMPAIGN_LENS_BIND";
    /// HTTP port, bound on all interfaces.
    pub const PORT: &str = "PORT";
}

// ============================================================================
// SECTION: Configuration Model
// ============================================================================

/// Top-level Campaign Lens configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CampaignLensConfig {
    /// Server transport configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// OAuth client configuration.
    #[serde(default)]
    pub oauth: OAuthConfig,
    /// Advertising API configuration.
    #[serde(default)]
    pub ads: AdsConfig,
    /// Credential seed and storage configuration.
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

impl CampaignLensConfig {
    /// Loads configuration using the default resolution rules and the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Loads configuration resolving environment values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match resolve_path(path, &lookup)? {
            Some(resolved) => Self::read_file(&resolved)?,
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds configuration from defaults and `lookup` alone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an environment value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses TOML content without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the content is not valid config TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Reads and parses a config file with size and encoding limits.
    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Overlays environment values onto the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when an environment value cannot be
    /// interpreted.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(value) = get(env_keys::TRANSPORT) {
            self.server.transport = ServerTransport::parse(&value).ok_or_else(|| {
                ConfigError::Invalid(format!("{} must be stdio, http or both", env_keys::TRANSPORT))
            })?;
        }
        if let Some(port) = get(env_keys::PORT) {
            let port: u16 = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{} must be a port number", env_keys::PORT)))?;
            self.server.bind = Some(format!("0.0.0.0:{port}"));
        }
        if let Some(bind) = get(env_keys::BIND) {
            self.server.bind = Some(bind);
        }

        overlay(&mut self.oauth.client_id, get(env_keys::CLIENT_ID));
        overlay(&mut self.oauth.client_secret, get(env_keys::CLIENT_SECRET));
        overlay(&mut self.oauth.authorization_code, get(env_keys::AUTH_CODE));
        if let Some(uri) = get(env_keys::REDIRECT_URI) {
            self.oauth.redirect_uri = uri;
        }

        overlay(&mut self.ads.developer_token, get(env_keys::DEVELOPER_TOKEN));
        overlay(&mut self.ads.customer_id, get(env_keys::CUSTOMER_ID));
        overlay(&mut self.ads.login_customer_id, get(env_keys::LOGIN_CUSTOMER_ID));

        overlay(&mut self.credentials.refresh_token, get(env_keys::REFRESH_TOKEN));
        overlay(&mut self.credentials.access_token, get(env_keys::ACCESS_TOKEN));
        if let Some(expiry) = get(env_keys::TOKEN_EXPIRY) {
            let expiry: i64 = expiry.parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be epoch milliseconds", env_keys::TOKEN_EXPIRY))
            })?;
            self.credentials.expiry_date = Some(expiry);
        }
        if let Some(path) = get(env_keys::TOKEN_PATH) {
            self.credentials.token_path = path;
        }
        Ok(())
    }

    /// Validates the configuration and normalizes account ids.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.oauth.validate()?;
        self.ads.validate()?;
        self.credentials.validate()?;
        Ok(())
    }
}

/// Replaces `slot` when the environment supplies a value.
fn overlay(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Deployment transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// Newline-delimited JSON over stdin/stdout.
    #[default]
    Stdio,
    /// HTTP endpoint with server-push stream.
    Http,
    /// HTTP in the background plus stdin/stdout.
    Both,
}

impl ServerTransport {
    /// Parses a transport label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdio" => Some(Self::Stdio),
            "http" => Some(Self::Http),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    /// Returns the stable label for this transport.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Both => "both",
        }
    }

    /// Returns true when this profile serves HTTP.
    #[must_use]
    pub const fn serves_http(self) -> bool {
        matches!(self, Self::Http | Self::Both)
    }

    /// Returns true when this profile serves stdin/stdout.
    #[must_use]
    pub const fn serves_stdio(self) -> bool {
        matches!(self, Self::Stdio | Self::Both)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Transport profile.
    #[serde(default)]
    pub transport: ServerTransport,
    /// Bind address for HTTP.
    #[serde(default)]
    pub bind: Option<String>,
    /// Maximum request body (and stdio line) size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Delay before the GET push stream closes.
    #[serde(default = "default_sse_close_ms")]
    pub sse_close_ms: u64,
    /// Optional append-only audit log path; stderr when absent.
    #[serde(default)]
    pub audit_log: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: ServerTransport::Stdio,
            bind: None,
            max_body_bytes: default_max_body_bytes(),
            sse_close_ms: default_sse_close_ms(),
            audit_log: None,
        }
    }
}

impl ServerConfig {
    /// Returns the HTTP bind address, falling back to [`DEFAULT_BIND`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self.bind.as_deref().map_or(DEFAULT_BIND, str::trim);
        bind.parse().map_err(|_| ConfigError::Invalid(format!("invalid bind address: {bind}")))
    }

    /// Validates server settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.transport.serves_http() {
            self.bind_addr()?;
        }
        if let Some(path) = &self.audit_log {
            validate_path_string("server.audit_log", path)?;
        }
        Ok(())
    }
}

/// Default request body limit.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default push stream lifetime.
const fn default_sse_close_ms() -> u64 {
    DEFAULT_SSE_CLOSE_MS
}

// ============================================================================
// SECTION: OAuth
// ============================================================================

/// OAuth client configuration.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OAuthConfig {
    /// OAuth client id.
    #[serde(default)]
    pub client_id: Option<String>,
    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Redirect URI registered for the client.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Authorization endpoint.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Token endpoint.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// One-time bootstrap authorization code.
    #[serde(default)]
    pub authorization_code: Option<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: default_redirect_uri(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            authorization_code: None,
        }
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("authorization_code", &self.authorization_code.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl OAuthConfig {
    /// Validates OAuth endpoints.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("oauth.auth_url", &self.auth_url), ("oauth.token_url", &self.token_url)]
        {
            if !(value.starts_with("https://") || value.starts_with("http://")) {
                return Err(ConfigError::Invalid(format!("{field} must be an http(s) url")));
            }
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(ConfigError::Invalid("oauth.redirect_uri must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Default redirect URI.
fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

/// Default authorization endpoint.
fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

/// Default token endpoint.
fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

// ============================================================================
// SECTION: Advertising API
// ============================================================================

/// Advertising API configuration.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AdsConfig {
    /// Developer token.
    #[serde(default)]
    pub developer_token: Option<String>,
    /// Default target account id.
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Manager account id.
    #[serde(default)]
    pub login_customer_id: Option<String>,
    /// API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// API version path segment.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            developer_token: None,
            customer_id: None,
            login_customer_id: None,
            api_base: default_api_base(),
            api_version: default_api_version(),
        }
    }
}

impl std::fmt::Debug for AdsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdsConfig")
            .field("developer_token", &self.developer_token.as_ref().map(|_| "<redacted>"))
            .field("customer_id", &self.customer_id)
            .field("login_customer_id", &self.login_customer_id)
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl AdsConfig {
    /// Validates and normalizes account ids.
    fn validate(&mut self) -> Result<(), ConfigError> {
        normalize_account_id("ads.customer_id", &mut self.customer_id)?;
        normalize_account_id("ads.login_customer_id", &mut self.login_customer_id)?;
        if !(self.api_base.starts_with("https://") || self.api_base.starts_with("http://")) {
            return Err(ConfigError::Invalid("ads.api_base must be an http(s) url".to_string()));
        }
        let version = self.api_version.trim();
        if version.is_empty() || !version.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid("ads.api_version must be alphanumeric".to_string()));
        }
        Ok(())
    }
}

/// Strips dashes from an account id and requires digits.
fn normalize_account_id(field: &str, slot: &mut Option<String>) -> Result<(), ConfigError> {
    let Some(value) = slot.as_ref() else {
        return Ok(());
    };
    let stripped: String = value.trim().chars().filter(|c| *c != '-').collect();
    if stripped.is_empty() || !stripped.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigError::Invalid(format!("{field} must be digits (dashes allowed)")));
    }
    *slot = Some(stripped);
    Ok(())
}

/// Default API base URL.
fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

/// Default API version.
fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Credential seed and durable storage configuration.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Durable token file path.
    #[serde(default = "default_token_path")]
    pub token_path: String,
    /// Seeded refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seeded access token.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Seeded access token expiry (epoch millis).
    #[serde(default)]
    pub expiry_date: Option<i64>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
            refresh_token: None,
            access_token: None,
            expiry_date: None,
        }
    }
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("token_path", &self.token_path)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

impl CredentialsConfig {
    /// Validates the token path and seed consistency.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("credentials.token_path", &self.token_path)?;
        if self.refresh_token.is_none() && self.access_token.is_some() {
            return Err(ConfigError::Invalid(
                "credentials.access_token requires credentials.refresh_token".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default token path.
fn default_token_path() -> String {
    DEFAULT_TOKEN_PATH.to_string()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Validation error.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Path Helpers
// ============================================================================

/// Resolves the config file path, if any.
fn resolve_path<F>(path: Option<&Path>, lookup: &F) -> Result<Option<PathBuf>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = path {
        return Ok(Some(path.to_path_buf()));
    }
    if let Some(env_path) = lookup(CONFIG_ENV_VAR).filter(|value| !value.trim().is_empty()) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(Some(PathBuf::from(env_path)));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_NAME);
    Ok(default.is_file().then_some(default))
}

/// Validates a config path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if let Component::Normal(value) = component
            && value.len() > MAX_PATH_COMPONENT_LENGTH
        {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if let Component::Normal(value) = component
            && value.len() > MAX_PATH_COMPONENT_LENGTH
        {
            return Err(ConfigError::Invalid(format!("{field} component too long")));
        }
    }
    Ok(())
}
