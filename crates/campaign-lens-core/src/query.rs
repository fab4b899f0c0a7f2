// crates/campaign-lens-core/src/query.rs
// ============================================================================
// Module: Query Executor
// Description: Read-only query capability against the advertising backend.
// Purpose: Run a caller-built query with a valid access token and return rows.
// Dependencies: async-trait, reqwest, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`QueryExecutor`] is the narrow capability tool handlers call once they
//! hold a valid access token. [`AdsApiExecutor`] implements it over the REST
//! search endpoint, following page tokens until the result set is complete.
//!
//! Credentials never flow the other way: the executor receives a token per
//! request and has no access to the credential manager.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://googleads.googleapis.com";
/// Default REST API version segment.
pub const DEFAULT_API_VERSION: &str = "v17";
/// Default upper bound on followed result pages.
pub const MAX_RESULT_PAGES: usize = 50;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One read-only query execution.
#[derive(Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Bearer access token.
    pub access_token: String,
    /// Target account id, digits only.
    pub customer_id: String,
    /// Query statement.
    pub query: String,
}

impl std::fmt::Debug for QueryRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRequest")
            .field("access_token", &"<redacted>")
            .field("customer_id", &self.customer_id)
            .field("query", &self.query)
            .finish()
    }
}

/// Query execution failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Backend settings are missing.
    #[error("query backend not configured: {0}")]
    Unconfigured(String),
    /// Request input was rejected before execution.
    #[error("invalid query input: {0}")]
    InvalidInput(String),
    /// The HTTP exchange failed.
    #[error("query transport error: {0}")]
    Transport(String),
    /// The backend returned an error status.
    #[error("query failed ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Backend error message.
        message: String,
    },
    /// The result set spans more pages than the executor follows.
    #[error("query result exceeds {max_pages} pages")]
    TooManyPages {
        /// Page limit that was reached.
        max_pages: usize,
    },
    /// The backend response could not be decoded.
    #[error("query response parse error: {0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Executor Trait
// ============================================================================

/// Read-only query capability.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes `request` and returns the result rows.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the query cannot be executed.
    async fn execute(&self, request: &QueryRequest) -> Result<Vec<Value>, QueryError>;
}

// ============================================================================
// SECTION: REST Executor
// ============================================================================

/// Settings for [`AdsApiExecutor`].
#[derive(Clone, PartialEq, Eq)]
pub struct AdsApiConfig {
    /// Developer token header value.
    pub developer_token: Option<String>,
    /// Manager account id sent as `login-customer-id`.
    pub login_customer_id: Option<String>,
    /// API base URL.
    pub api_base: String,
    /// API version path segment.
    pub api_version: String,
    /// Result pages followed before the query fails.
    pub max_pages: usize,
}

impl Default for AdsApiConfig {
    fn default() -> Self {
        Self {
            developer_token: None,
            login_customer_id: None,
            api_base: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            max_pages: MAX_RESULT_PAGES,
        }
    }
}

impl std::fmt::Debug for AdsApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdsApiConfig")
            .field("developer_token", &self.developer_token.as_ref().map(|_| "<redacted>"))
            .field("login_customer_id", &self.login_customer_id)
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

/// One page of search results.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    /// Result rows.
    #[serde(default)]
    results: Vec<Value>,
    /// Token for the next page.
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Backend error envelope.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    /// Error detail.
    error: ApiErrorDetail,
}

/// Backend error detail.
#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    /// Human-readable message.
    #[serde(default)]
    message: String,
}

/// Query executor backed by the REST search endpoint.
#[derive(Debug, Clone)]
pub struct AdsApiExecutor {
    /// Executor settings.
    config: AdsApiConfig,
    /// Shared HTTP client.
    client: reqwest::Client,
}

impl AdsApiExecutor {
    /// Creates an executor for `config`.
    #[must_use]
    pub fn new(config: AdsApiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Returns the search endpoint URL for `customer_id`.
    fn search_url(&self, customer_id: &str) -> String {
        format!(
            "{}/{}/customers/{customer_id}/googleAds:search",
            self.config.api_base.trim_end_matches('/'),
            self.config.api_version
        )
    }

    /// Fetches one result page.
    async fn fetch_page(
        &self,
        request: &QueryRequest,
        developer_token: &str,
        page_token: Option<&str>,
    ) -> Result<SearchPage, QueryError> {
        let mut body = json!({ "query": request.query });
        if let Some(token) = page_token {
            body["pageToken"] = Value::String(token.to_string());
        }
        let mut builder = self
            .client
            .post(self.search_url(&request.customer_id))
            .header(AUTHORIZATION, format!("Bearer {}", request.access_token))
            .header("developer-token", developer_token)
            .json(&body);
        if let Some(login) = self.config.login_customer_id.as_deref() {
            builder = builder.header("login-customer-id", login);
        }

        let response =
            builder.send().await.map_err(|err| QueryError::Transport(err.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|err| QueryError::Transport(err.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error.message)
                .ok()
                .filter(|message| !message.is_empty())
                .unwrap_or(text);
            return Err(QueryError::Api {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&text).map_err(|err| QueryError::Parse(err.to_string()))
    }
}

#[async_trait]
impl QueryExecutor for AdsApiExecutor {
    async fn execute(&self, request: &QueryRequest) -> Result<Vec<Value>, QueryError> {
        let developer_token = self
            .config
            .developer_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| QueryError::Unconfigured("developer token is not set".to_string()))?;
        if request.customer_id.is_empty() {
            return Err(QueryError::InvalidInput("customer id is not set".to_string()));
        }

        let mut rows = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0 .. self.config.max_pages {
            let page = self.fetch_page(request, developer_token, page_token.as_deref()).await?;
            rows.extend(page.results);
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(rows),
            }
        }
        Err(QueryError::TooManyPages {
            max_pages: self.config.max_pages,
        })
    }
}
