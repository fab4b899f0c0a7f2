// crates/campaign-lens-cli/src/main.rs
// ============================================================================
// Module: Campaign Lens CLI Entry Point
// Description: Command dispatcher for the Campaign Lens MCP server.
// Purpose: Start the server and inspect configuration and credentials.
// Dependencies: clap, campaign-lens-config, campaign-lens-mcp, thiserror, tokio
// ============================================================================

//! ## Overview
//! `campaign-lens serve` runs the MCP server with the configured transport
//! profile. The `auth` and `config` commands help an operator bootstrap the
//! OAuth credential and check configuration without contacting the backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use campaign_lens_config::CampaignLensConfig;
use campaign_lens_config::ServerTransport;
use campaign_lens_core::NoopOperatorChannel;
use campaign_lens_mcp::McpServer;
use campaign_lens_mcp::build_credential_manager;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "campaign-lens", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the MCP server.
    Serve(ServeCommand),
    /// OAuth credential utilities.
    Auth {
        /// Selected auth subcommand.
        #[command(subcommand)]
        command: AuthCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Shared `--config` option.
#[derive(Args, Debug)]
struct ConfigArg {
    /// Optional config file path (defaults to campaign-lens.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArg,
    /// Transport profile override.
    #[arg(long, value_enum)]
    transport: Option<TransportArg>,
    /// HTTP bind address override.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

/// Transport profile names accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum TransportArg {
    /// Newline-delimited JSON over stdin/stdout.
    Stdio,
    /// HTTP endpoint.
    Http,
    /// HTTP plus stdin/stdout.
    Both,
}

impl From<TransportArg> for ServerTransport {
    fn from(value: TransportArg) -> Self {
        match value {
            TransportArg::Stdio => Self::Stdio,
            TransportArg::Http => Self::Http,
            TransportArg::Both => Self::Both,
        }
    }
}

/// Auth subcommands.
#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Print the authorization URL used to obtain a bootstrap code.
    Url(ConfigArg),
    /// Load the stored credential without network access and print its status.
    Status(ConfigArg),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate configuration and print a secret-free summary.
    Check(ConfigArg),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing failures.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Auth {
            command: AuthCommand::Url(args),
        } => command_auth_url(&args),
        Commands::Auth {
            command: AuthCommand::Status(args),
        } => command_auth_status(&args).await,
        Commands::Config {
            command: ConfigCommand::Check(args),
        } => command_config_check(&args),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs the MCP server.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let mut config = load_config(command.config.config.as_deref())?;
    if let Some(transport) = command.transport {
        config.server.transport = transport.into();
    }
    if let Some(bind) = command.bind {
        config.server.bind = Some(bind);
    }
    if config.server.transport.serves_http() {
        let addr = config.server.bind_addr().map_err(|err| CliError::new(err.to_string()))?;
        write_stderr_line(&format!("campaign-lens: serving http on {addr}"))?;
    }
    let server = McpServer::from_config(config).map_err(|err| CliError::new(err.to_string()))?;
    server.serve().await.map_err(|err| CliError::new(err.to_string()))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints the bootstrap authorization URL.
fn command_auth_url(args: &ConfigArg) -> CliResult<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let manager = build_credential_manager(&config, Arc::new(NoopOperatorChannel));
    let url = manager.authorization_url().map_err(|err| CliError::new(err.to_string()))?;
    write_stdout_line(&url)?;
    Ok(ExitCode::SUCCESS)
}

/// Prints credential status without contacting the token endpoint.
async fn command_auth_status(args: &ConfigArg) -> CliResult<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let manager = build_credential_manager(&config, Arc::new(NoopOperatorChannel));
    let status = manager.load_existing().await.map_err(|err| CliError::new(err.to_string()))?;
    let rendered = serde_json::to_string_pretty(&json!({
        "token_path": config.credentials.token_path,
        "credential": status,
    }))
    .map_err(|err| CliError::new(err.to_string()))?;
    write_stdout_line(&rendered)?;
    Ok(if status.has_refresh_token { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Validates configuration and prints a secret-free summary.
fn command_config_check(args: &ConfigArg) -> CliResult<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let summary = json!({
        "transport": config.server.transport.as_str(),
        "bind": config.server.transport.serves_http().then(|| {
            config.server.bind_addr().map(|addr| addr.to_string()).unwrap_or_default()
        }),
        "max_body_bytes": config.server.max_body_bytes,
        "oauth": {
            "client_id": config.oauth.client_id.is_some(),
            "client_secret": config.oauth.client_secret.is_some(),
            "authorization_code": config.oauth.authorization_code.is_some(),
            "redirect_uri": config.oauth.redirect_uri,
        },
        "ads": {
            "developer_token": config.ads.developer_token.is_some(),
            "customer_id": config.ads.customer_id,
            "login_customer_id": config.ads.login_customer_id,
            "api_version": config.ads.api_version,
        },
        "credentials": {
            "token_path": config.credentials.token_path,
            "refresh_token": config.credentials.refresh_token.is_some(),
        },
    });
    let rendered =
        serde_json::to_string_pretty(&summary).map_err(|err| CliError::new(err.to_string()))?;
    write_stdout_line(&rendered)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<CampaignLensConfig> {
    CampaignLensConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write to stdout: {err}")))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> CliResult<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
        .map_err(|err| CliError::new(format!("failed to write to stderr: {err}")))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
