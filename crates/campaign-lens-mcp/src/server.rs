// crates/campaign-lens-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: Stream and HTTP transports over one shared protocol gateway.
// Purpose: Build the stack from configuration and serve the chosen profile.
// Dependencies: campaign-lens-core, campaign-lens-config, axum, tokio, tower-http
// ============================================================================

//! ## Overview
//! [`McpServer`] assembles the credential manager, query executor, tool router
//! and [`Gateway`] from a [`CampaignLensConfig`], then serves one of three
//! deployment profiles: newline-delimited JSON over stdin/stdout, HTTP, or
//! both at once sharing the same gateway.
//!
//! Startup initialization failures are reported to the operator channel and
//! never stop the server; the first tool call retries lazily.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::body::to_bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONTENT_LENGTH;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::routing::get;
use campaign_lens_config::CampaignLensConfig;
use campaign_lens_config::ServerTransport;
use campaign_lens_core::AdsApiConfig;
use campaign_lens_core::AdsApiExecutor;
use campaign_lens_core::Clock;
use campaign_lens_core::Credential;
use campaign_lens_core::CredentialEvent;
use campaign_lens_core::CredentialEventKind;
use campaign_lens_core::CredentialManager;
use campaign_lens_core::CredentialManagerConfig;
use campaign_lens_core::FileCredentialStore;
use campaign_lens_core::HttpTokenEndpoint;
use campaign_lens_core::OAuthClientConfig;
use campaign_lens_core::OperatorChannel;
use campaign_lens_core::StderrOperatorChannel;
use campaign_lens_core::SystemClock;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors;
use tower_http::cors::CorsLayer;

use crate::audit::AuditSink;
use crate::audit::FileAuditSink;
use crate::audit::RequestTransport;
use crate::audit::StderrAuditSink;
use crate::gateway::Gateway;
use crate::gateway::GatewayReply;
use crate::gateway::SERVER_NAME;
use crate::gateway::SERVER_VERSION;
use crate::session::SESSION_HEADER;
use crate::session::sanitize_session_id;
use crate::tools::ToolName;
use crate::tools::ToolRouter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol endpoint path.
pub const MCP_PATH: &str = "/mcp";

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: CampaignLensConfig,
    /// Shared protocol gateway.
    gateway: Gateway,
    /// Operator channel for startup reporting.
    operator: Arc<dyn OperatorChannel>,
}

impl McpServer {
    /// Builds a new MCP server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the configuration is invalid or the
    /// audit log cannot be opened.
    pub fn from_config(mut config: CampaignLensConfig) -> Result<Self, McpServerError> {
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;
        let operator: Arc<dyn OperatorChannel> = Arc::new(StderrOperatorChannel);
        let credentials = Arc::new(build_credential_manager(&config, Arc::clone(&operator)));
        let executor = Arc::new(AdsApiExecutor::new(AdsApiConfig {
            developer_token: config.ads.developer_token.clone(),
            login_customer_id: config.ads.login_customer_id.clone(),
            api_base: config.ads.api_base.clone(),
            api_version: config.ads.api_version.clone(),
            ..AdsApiConfig::default()
        }));
        let router = ToolRouter::new(credentials, executor, config.ads.customer_id.clone());
        let audit = build_audit_sink(config.server.audit_log.as_deref())?;
        Ok(Self {
            config,
            gateway: Gateway::new(router, audit),
            operator,
        })
    }

    /// Returns the shared gateway.
    #[must_use]
    pub const fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Initializes credentials, then serves the configured transport profile.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when a transport fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        if let Err(err) = self.gateway.router().credentials().initialize().await {
            self.operator.record(&CredentialEvent::new(
                CredentialEventKind::InitializationFailed,
                SystemClock.now_millis(),
                format!("startup initialization failed; retrying on first tool call: {err}"),
            ));
        }

        let server = &self.config.server;
        let max_body_bytes = server.max_body_bytes;
        let http_state = HttpState::new(
            self.gateway.clone(),
            max_body_bytes,
            Duration::from_millis(server.sse_close_ms),
        );
        match server.transport {
            ServerTransport::Stdio => serve_stdio(&self.gateway, max_body_bytes).await,
            ServerTransport::Http => {
                let addr = server.bind_addr().map_err(|err| McpServerError::Config(err.to_string()))?;
                serve_http(bind_http(addr).await?, http_state).await
            }
            ServerTransport::Both => {
                let addr = server.bind_addr().map_err(|err| McpServerError::Config(err.to_string()))?;
                serve_both(
                    &self.gateway,
                    addr,
                    http_state,
                    BufReader::new(tokio::io::stdin()),
                    tokio::io::stdout(),
                )
                .await
            }
        }
    }
}

/// Builds the credential manager from configuration.
#[must_use]
pub fn build_credential_manager(
    config: &CampaignLensConfig,
    operator: Arc<dyn OperatorChannel>,
) -> CredentialManager {
    let oauth = OAuthClientConfig {
        client_id: config.oauth.client_id.clone(),
        client_secret: config.oauth.client_secret.clone(),
        redirect_uri: config.oauth.redirect_uri.clone(),
        auth_url: config.oauth.auth_url.clone(),
        token_url: config.oauth.token_url.clone(),
    };
    let seed = config.credentials.refresh_token.clone().map(|refresh_token| Credential {
        refresh_token,
        access_token: config.credentials.access_token.clone(),
        expiry_date: config.credentials.expiry_date,
    });
    CredentialManager::new(CredentialManagerConfig {
        token_endpoint: Arc::new(HttpTokenEndpoint::new(oauth.clone())),
        oauth,
        store: Arc::new(FileCredentialStore::new(&config.credentials.token_path)),
        operator,
        clock: Arc::new(SystemClock),
        seed,
        authorization_code: config.oauth.authorization_code.clone(),
    })
}

/// Selects the audit sink: append-only file when configured, stderr otherwise.
fn build_audit_sink(path: Option<&str>) -> Result<Arc<dyn AuditSink>, McpServerError> {
    match path {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| McpServerError::Init(format!("audit log {path}: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Stream Transport
// ============================================================================

/// Serves newline-delimited JSON-RPC over stdin/stdout.
async fn serve_stdio(gateway: &Gateway, max_line_bytes: usize) -> Result<(), McpServerError> {
    let reader = BufReader::new(tokio::io::stdin());
    serve_stream(gateway, reader, tokio::io::stdout(), max_line_bytes).await
}

/// Serves HTTP and the stream transport together.
///
/// The listener is bound before either transport starts. A failure on either
/// side ends both; the HTTP side keeps serving after the stream reaches end of
/// input.
async fn serve_both<R, W>(
    gateway: &Gateway,
    addr: SocketAddr,
    state: HttpState,
    reader: R,
    writer: W,
) -> Result<(), McpServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let max_line_bytes = state.max_body_bytes;
    let http = serve_http(bind_http(addr).await?, state);
    tokio::pin!(http);
    tokio::select! {
        result = &mut http => result,
        result = serve_stream(gateway, reader, writer, max_line_bytes) => {
            result?;
            http.await
        }
    }
}

/// One inbound line from the stream transport.
#[derive(Debug, PartialEq, Eq)]
enum StreamLine {
    /// Complete message without the line terminator.
    Message(Vec<u8>),
    /// Line longer than the limit; its size in bytes.
    Oversized(usize),
}

/// Serves newline-delimited JSON-RPC until `reader` reaches end of input.
///
/// Blank lines are skipped; oversized lines are answered with an error and
/// discarded without being buffered.
///
/// # Errors
///
/// Returns [`McpServerError::Transport`] when reading or writing fails.
pub async fn serve_stream<R, W>(
    gateway: &Gateway,
    mut reader: R,
    mut writer: W,
    max_line_bytes: usize,
) -> Result<(), McpServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(line) = read_line_limited(&mut reader, max_line_bytes).await? {
        let reply = match line {
            StreamLine::Message(bytes) => {
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                gateway.handle_bytes(RequestTransport::Stdio, &bytes, None).await
            }
            StreamLine::Oversized(size) => {
                gateway.reject_oversized(RequestTransport::Stdio, size, max_line_bytes)
            }
        };
        if let Some(response) = reply.response {
            let mut payload = serde_json::to_vec(&response)
                .map_err(|_| McpServerError::Transport("json-rpc serialization failed".to_string()))?;
            payload.push(b'\n');
            writer
                .write_all(&payload)
                .await
                .map_err(|_| McpServerError::Transport("stdio write failed".to_string()))?;
            writer.flush().await.map_err(|_| McpServerError::Transport("stdio write failed".to_string()))?;
        }
    }
    Ok(())
}

/// Reads one line, keeping at most `limit` bytes of it in memory.
async fn read_line_limited<R>(reader: &mut R, limit: usize) -> Result<Option<StreamLine>, McpServerError>
where
    R: AsyncBufRead + Unpin,
{
    // One extra byte leaves room for a trailing carriage return.
    let capacity = limit.saturating_add(1);
    let mut buffer = Vec::new();
    let mut size = 0usize;
    let mut overflow = false;
    loop {
        let available = reader
            .fill_buf()
            .await
            .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
        if available.is_empty() {
            if size == 0 {
                return Ok(None);
            }
            break;
        }
        let newline = available.iter().position(|byte| *byte == b'\n');
        let chunk = &available[.. newline.unwrap_or(available.len())];
        size = size.saturating_add(chunk.len());
        if !overflow {
            if buffer.len() + chunk.len() > capacity {
                overflow = true;
                buffer = Vec::new();
            } else {
                buffer.extend_from_slice(chunk);
            }
        }
        let used = chunk.len() + usize::from(newline.is_some());
        reader.consume(used);
        if newline.is_some() {
            // Count the terminator so an empty line is not mistaken for EOF.
            size = size.saturating_add(1);
            break;
        }
    }
    if !overflow && buffer.last() == Some(&b'\r') {
        buffer.pop();
    }
    if overflow || buffer.len() > limit {
        return Ok(Some(StreamLine::Oversized(size)));
    }
    Ok(Some(StreamLine::Message(buffer)))
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Shared protocol gateway.
    gateway: Gateway,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
    /// Lifetime of the GET push stream.
    sse_close: Duration,
}

impl HttpState {
    /// Creates handler state.
    #[must_use]
    pub const fn new(gateway: Gateway, max_body_bytes: usize, sse_close: Duration) -> Self {
        Self {
            gateway,
            max_body_bytes,
            sse_close,
        }
    }
}

/// Binds the HTTP listener.
async fn bind_http(addr: SocketAddr) -> Result<TcpListener, McpServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|err| McpServerError::Transport(format!("http bind {addr} failed: {err}")))
}

/// Serves the HTTP surface on `listener` until it fails.
async fn serve_http(listener: TcpListener, state: HttpState) -> Result<(), McpServerError> {
    axum::serve(listener, http_router(state))
        .await
        .map_err(|_| McpServerError::Transport("http server failed".to_string()))
}

/// Builds the HTTP router with permissive CORS and panic recovery.
pub fn http_router(state: HttpState) -> Router {
    let routes = Router::new()
        .route("/", get(handle_discovery))
        .route("/health", get(handle_health))
        .route("/api/test", get(handle_api_test))
        .route("/api/campaigns", get(handle_api_campaigns))
        .route(
            MCP_PATH,
            get(handle_mcp_stream).post(handle_mcp_post).delete(handle_mcp_delete).fallback(not_found),
        );
    with_http_layers(routes).with_state(state)
}

/// Adds the not-found fallback, panic recovery and CORS to `routes`.
fn with_http_layers(routes: Router<HttpState>) -> Router<HttpState> {
    let cors = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods(cors::Any)
        .allow_headers(cors::Any)
        .expose_headers([HeaderName::from_static(SESSION_HEADER)]);
    routes
        .fallback(not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(CatchPanicLayer::custom(render_panic))
        .layer(cors)
}

/// Handles `POST /mcp`.
async fn handle_mcp_post(State(state): State<HttpState>, headers: HeaderMap, body: Body) -> Response {
    let bytes: Bytes = match to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            let size = headers
                .get(CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or_else(|| state.max_body_bytes.saturating_add(1));
            let reply = state.gateway.reject_oversized(RequestTransport::Http, size, state.max_body_bytes);
            return (StatusCode::PAYLOAD_TOO_LARGE, Json(reply.response)).into_response();
        }
    };
    let client_session = header_str(&headers, SESSION_HEADER)
        .and_then(|value| sanitize_session_id(Some(value)).ok().flatten());
    let reply = state.gateway.handle_bytes(RequestTransport::Http, &bytes, client_session).await;
    render_reply(reply)
}

/// Maps a gateway reply onto an HTTP response.
fn render_reply(reply: GatewayReply) -> Response {
    let Some(response) = reply.response else {
        return StatusCode::ACCEPTED.into_response();
    };
    let status = if reply.rejected { StatusCode::BAD_REQUEST } else { StatusCode::OK };
    let mut rendered = (status, Json(response)).into_response();
    if let Some(session_id) = reply.session_id
        && let Ok(value) = HeaderValue::from_str(&session_id)
    {
        rendered.headers_mut().insert(HeaderName::from_static(SESSION_HEADER), value);
    }
    rendered
}

/// Handles `GET /mcp`: one placeholder event, closed after a fixed delay.
async fn handle_mcp_stream(State(state): State<HttpState>) -> impl IntoResponse {
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Event, Infallible>>(1);
    let close_after = state.sse_close;
    tokio::spawn(async move {
        let event = Event::default().event("connected").data(r#"{"status":"connected"}"#);
        if tx.send(Ok(event)).await.is_ok() {
            tokio::time::sleep(close_after).await;
        }
    });
    Sse::new(ReceiverStream::new(rx))
}

/// Handles `DELETE /mcp`.
async fn handle_mcp_delete(headers: HeaderMap) -> Response {
    match sanitize_session_id(header_str(&headers, SESSION_HEADER)) {
        Ok(Some(_)) => StatusCode::NO_CONTENT.into_response(),
        Ok(None) => error_response(StatusCode::BAD_REQUEST, "missing mcp-session-id header"),
        Err(rejection) => error_response(
            StatusCode::BAD_REQUEST,
            &format!("invalid mcp-session-id header: {}", rejection.label()),
        ),
    }
}

/// Handles `GET /`.
async fn handle_discovery() -> Json<Value> {
    let tools: Vec<&str> = ToolName::all().iter().map(|tool| tool.as_str()).collect();
    Json(json!({
        "service": SERVER_NAME,
        "version": SERVER_VERSION,
        "status": "running",
        "transports": ["stdio", "http"],
        "endpoints": {
            "mcp": MCP_PATH,
            "health": "/health",
            "test": "/api/test",
            "campaigns": "/api/campaigns",
        },
        "tools": tools,
    }))
}

/// Handles `GET /health`.
async fn handle_health(State(state): State<HttpState>) -> Json<Value> {
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    Json(json!({
        "status": "healthy",
        "timestamp": timestamp,
        "credential": state.gateway.router().credential_status(),
    }))
}

/// Handles `GET /api/test`.
async fn handle_api_test(State(state): State<HttpState>) -> Json<Value> {
    Json(state.gateway.router().test_connection().await)
}

/// Query parameters for `GET /api/campaigns`.
#[derive(Debug, Default, Deserialize)]
struct CampaignsQuery {
    /// Optional account override.
    customer_id: Option<String>,
}

/// Handles `GET /api/campaigns`.
async fn handle_api_campaigns(
    State(state): State<HttpState>,
    Query(query): Query<CampaignsQuery>,
) -> Response {
    match state.gateway.router().get_campaigns(query.customer_id.as_deref()).await {
        Ok(payload) => Json(payload).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

/// Fallback for unknown paths and methods.
async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found")
}

/// Renders a caught handler panic.
fn render_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|text| (*text).to_string()))
        .unwrap_or_else(|| "internal server error".to_string());
    error_response(StatusCode::INTERNAL_SERVER_ERROR, &message)
}

/// Builds a `{ error }` JSON response.
fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Returns a header value as text when it is valid visible ASCII.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
