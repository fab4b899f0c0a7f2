// crates/campaign-lens-mcp/src/tools.rs
// ============================================================================
// Module: Tool Catalog and Router
// Description: Static tool catalog and the handlers behind each tool.
// Purpose: Validate arguments, obtain a token, query, and shape payloads.
// Dependencies: campaign-lens-core, serde, serde_json
// ============================================================================

//! ## Overview
//! The catalog is fixed at startup and identical on every transport. Each
//! handler validates its arguments, asks the [`CredentialManager`] for a valid
//! access token, calls the [`QueryExecutor`], and returns a JSON payload.
//!
//! ## Error Convention
//! `test_connection` reports every failure as data (`status: "error"`) so an
//! agent can reason about connectivity. The listing and metrics tools raise
//! failures as [`ToolError`]s, which the gateway turns into error envelopes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use campaign_lens_core::CredentialError;
use campaign_lens_core::CredentialManager;
use campaign_lens_core::CredentialStatus;
use campaign_lens_core::QueryError;
use campaign_lens_core::QueryExecutor;
use campaign_lens_core::QueryRequest;
use campaign_lens_core::gaql;
use campaign_lens_core::gaql::QueryInputError;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Canonical tool names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// List campaigns for an account.
    GetCampaigns,
    /// Daily metrics for one campaign.
    GetCampaignMetrics,
    /// Connectivity check.
    TestConnection,
}

impl ToolName {
    /// Returns the canonical string name for the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetCampaigns => "get_campaigns",
            Self::GetCampaignMetrics => "get_campaign_metrics",
            Self::TestConnection => "test_connection",
        }
    }

    /// Returns all tool names in catalog order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::GetCampaigns, Self::GetCampaignMetrics, Self::TestConnection]
    }

    /// Parses a tool name from its string representation.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "get_campaigns" => Some(Self::GetCampaigns),
            "get_campaign_metrics" => Some(Self::GetCampaignMetrics),
            "test_connection" => Some(Self::TestConnection),
            _ => None,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Tool Definitions
// ============================================================================

/// Tool descriptor advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: ToolName,
    /// Tool description for clients.
    pub description: String,
    /// JSON schema for tool input.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Returns the static tool catalog.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::all().iter().copied().map(tool_definition).collect()
}

/// Returns the descriptor for one tool.
fn tool_definition(name: ToolName) -> ToolDefinition {
    let (description, input_schema) = match name {
        ToolName::GetCampaigns => (
            "Get all campaigns for a Google Ads account, ordered by name.",
            json!({
                "type": "object",
                "properties": {
                    "customer_id": {
                        "type": "string",
                        "description": "Account id (digits, dashes allowed). Defaults to the configured account."
                    }
                },
                "required": []
            }),
        ),
        ToolName::GetCampaignMetrics => (
            "Get daily performance metrics for a campaign over an inclusive date range, newest first.",
            json!({
                "type": "object",
                "properties": {
                    "campaign_id": { "type": "string", "description": "Numeric campaign id." },
                    "start_date": { "type": "string", "description": "Start date (YYYY-MM-DD)." },
                    "end_date": { "type": "string", "description": "End date (YYYY-MM-DD)." }
                },
                "required": ["campaign_id", "start_date", "end_date"]
            }),
        ),
        ToolName::TestConnection => (
            "Test the connection to the Google Ads API.",
            json!({ "type": "object", "properties": {}, "required": [] }),
        ),
    };
    ToolDefinition {
        name,
        description: description.to_string(),
        input_schema,
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool dispatch failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Tool name not in the catalog.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// Arguments failed validation.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    /// No valid access token could be obtained.
    #[error("{0}")]
    Authentication(String),
    /// The backend query failed.
    #[error("{0}")]
    Query(String),
    /// Payload serialization failed.
    #[error("serialization failure")]
    Serialization,
    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CredentialError> for ToolError {
    fn from(err: CredentialError) -> Self {
        Self::Authentication(err.to_string())
    }
}

impl From<QueryError> for ToolError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidInput(message) => Self::InvalidParams(message),
            other => Self::Query(other.to_string()),
        }
    }
}

impl From<QueryInputError> for ToolError {
    fn from(err: QueryInputError) -> Self {
        Self::InvalidParams(err.to_string())
    }
}

// ============================================================================
// SECTION: Arguments
// ============================================================================

/// Arguments for `get_campaigns`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetCampaignsArgs {
    /// Optional account override.
    #[serde(default)]
    customer_id: Option<String>,
}

/// Arguments for `get_campaign_metrics`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetCampaignMetricsArgs {
    /// Campaign id.
    campaign_id: String,
    /// Inclusive start date.
    start_date: String,
    /// Inclusive end date.
    end_date: String,
}

/// Decodes tool arguments, treating `null` as an empty object.
fn decode_args<T>(arguments: Value) -> Result<T, ToolError>
where
    T: for<'de> Deserialize<'de>,
{
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|err| ToolError::InvalidParams(err.to_string()))
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Tool router shared by every transport.
#[derive(Clone)]
pub struct ToolRouter {
    /// Credential owner.
    credentials: Arc<CredentialManager>,
    /// Backend query capability.
    executor: Arc<dyn QueryExecutor>,
    /// Default account id, digits only.
    default_customer_id: Option<String>,
}

impl ToolRouter {
    /// Creates a router.
    #[must_use]
    pub fn new(
        credentials: Arc<CredentialManager>,
        executor: Arc<dyn QueryExecutor>,
        default_customer_id: Option<String>,
    ) -> Self {
        Self {
            credentials,
            executor,
            default_customer_id,
        }
    }

    /// Returns the static tool catalog.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Returns the credential manager.
    #[must_use]
    pub const fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// Returns the secret-free credential status.
    #[must_use]
    pub fn credential_status(&self) -> CredentialStatus {
        self.credentials.status()
    }

    /// Dispatches a tool call by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for names outside the catalog, and
    /// the handler's error otherwise.
    pub async fn handle_tool_call(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let tool = ToolName::parse(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        match tool {
            ToolName::TestConnection => Ok(self.test_connection().await),
            ToolName::GetCampaigns => {
                let args: GetCampaignsArgs = decode_args(arguments)?;
                self.get_campaigns(args.customer_id.as_deref()).await
            }
            ToolName::GetCampaignMetrics => {
                let args: GetCampaignMetricsArgs = decode_args(arguments)?;
                self.get_campaign_metrics(&args.campaign_id, &args.start_date, &args.end_date)
                    .await
            }
        }
    }

    /// Runs the identity query; every failure is reported as data.
    pub async fn test_connection(&self) -> Value {
        match self.try_test_connection().await {
            Ok(payload) => payload,
            Err(err) => json!({
                "status": "error",
                "message": format!("Connection failed: {err}"),
            }),
        }
    }

    /// Identity query with failures propagated.
    async fn try_test_connection(&self) -> Result<Value, ToolError> {
        let customer_id = self.resolve_customer_id(None)?;
        let rows = self.run(&customer_id, gaql::identity_query()).await?;
        Ok(json!({
            "status": "success",
            "message": "Successfully connected to Google Ads API",
            "customer_id": customer_id,
            "customer": rows.into_iter().next().unwrap_or(Value::Null),
        }))
    }

    /// Lists campaigns for `customer_id` or the default account.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when the account id is invalid, no token can be
    /// obtained, or the query fails.
    pub async fn get_campaigns(&self, customer_id: Option<&str>) -> Result<Value, ToolError> {
        let customer_id = self.resolve_customer_id(customer_id)?;
        let campaigns = self.run(&customer_id, gaql::campaigns_query()).await?;
        Ok(json!({
            "status": "success",
            "customer_id": customer_id,
            "count": campaigns.len(),
            "campaigns": campaigns,
        }))
    }

    /// Returns daily metrics for one campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when arguments are invalid, no token can be
    /// obtained, or the query fails.
    pub async fn get_campaign_metrics(
        &self,
        campaign_id: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<Value, ToolError> {
        let query = gaql::campaign_metrics_query(campaign_id, start_date, end_date)?;
        let customer_id = self.resolve_customer_id(None)?;
        let metrics = self.run(&customer_id, query).await?;
        Ok(json!({
            "status": "success",
            "campaign_id": campaign_id,
            "start_date": start_date,
            "end_date": end_date,
            "count": metrics.len(),
            "metrics": metrics,
        }))
    }

    /// Picks the requested or default account id.
    fn resolve_customer_id(&self, requested: Option<&str>) -> Result<String, ToolError> {
        match requested.filter(|value| !value.trim().is_empty()) {
            Some(value) => Ok(gaql::normalize_customer_id(value)?),
            None => self.default_customer_id.clone().ok_or_else(|| {
                ToolError::InvalidParams(
                    "customer_id is required when no default account is configured".to_string(),
                )
            }),
        }
    }

    /// Obtains a token and executes `query`.
    async fn run(&self, customer_id: &str, query: String) -> Result<Vec<Value>, ToolError> {
        let access_token = self.credentials.get_valid_access_token().await?;
        let request = QueryRequest {
            access_token,
            customer_id: customer_id.to_string(),
            query,
        };
        Ok(self.executor.execute(&request).await?)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
