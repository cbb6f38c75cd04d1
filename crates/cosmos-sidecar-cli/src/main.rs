// crates/cosmos-sidecar-cli/src/main.rs
// ============================================================================
// Module: Cosmos Sidecar CLI Entry Point
// Description: Command dispatcher for the sidecar server and one-off queries.
// Purpose: Serve the HTTP API, inspect configuration, and run single queries.
// Dependencies: clap, cosmos-sidecar-server, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! `cosmos-sidecar` is the single binary for the sidecar:
//! - `serve` loads configuration and runs the HTTP server until Ctrl-C;
//! - `config check` validates configuration and prints a summary;
//! - `config example` prints a starter TOML file;
//! - `query` runs one page of a query and prints the envelope.
//!
//! Errors are written to stderr and reported through the exit code.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod logging;
#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use cosmos_sidecar_client::CosmosClient;
use cosmos_sidecar_config::SidecarConfig;
use cosmos_sidecar_config::config_toml_example;
use cosmos_sidecar_core::PageOptions;
use cosmos_sidecar_core::QueryRequest;
use cosmos_sidecar_server::QueryService;
use cosmos_sidecar_server::SidecarServer;
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::logging::init_logging;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Cosmos DB query sidecar.
#[derive(Parser, Debug)]
#[command(name = "cosmos-sidecar", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print the version and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Command to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Run one page of a query and print the envelope.
    Query(QueryCommand),
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Config file path (defaults to `cosmos-sidecar.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate configuration and print a summary.
    Check(ConfigCheckCommand),
    /// Print an example configuration file.
    Example,
}

/// Arguments for `config check`.
#[derive(Args, Debug)]
struct ConfigCheckCommand {
    /// Config file path (defaults to `cosmos-sidecar.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `query`.
#[derive(Args, Debug)]
struct QueryCommand {
    /// Container to query.
    #[arg(long, value_name = "CONTAINER")]
    container: String,
    /// SQL query text.
    #[arg(long, value_name = "SQL")]
    sql: String,
    /// Query parameter as `name=value`; values are parsed as JSON when possible.
    #[arg(long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,
    /// Partition key value.
    #[arg(long, value_name = "VALUE")]
    pk: Option<String>,
    /// Maximum items in the page.
    #[arg(long = "max-item-count", value_name = "N", allow_hyphen_values = true)]
    max_item_count: Option<i64>,
    /// Continuation token from a previous page.
    #[arg(long, value_name = "TOKEN")]
    continuation: Option<String>,
    /// Config file path (defaults to `cosmos-sidecar.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
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
    if cli.show_version {
        write_stdout_line(&format!("cosmos-sidecar {}", env!("CARGO_PKG_VERSION")))?;
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = cli.command else {
        Cli::command()
            .print_help()
            .map_err(|err| CliError::new(format!("failed to write help: {err}")))?;
        return Ok(ExitCode::SUCCESS);
    };
    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Query(command) => command_query(command).await,
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config)?;
    init_logging(&config.logging).map_err(CliError::new)?;
    if config.server.allow_non_loopback {
        warn!(bind = %config.server.bind, "non-loopback binding enabled");
    }
    let server = SidecarServer::from_config(config)
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    server
        .serve(shutdown_signal())
        .await
        .map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Check(command) => command_config_check(command),
        ConfigCommand::Example => {
            write_stdout_line(config_toml_example().trim_end())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Executes `config check`.
fn command_config_check(command: ConfigCheckCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config)?;
    write_stdout_line(&config_summary(&config))?;
    Ok(ExitCode::SUCCESS)
}

/// Renders the non-secret configuration summary.
fn config_summary(config: &SidecarConfig) -> String {
    let key_state = if config.cosmos.key.as_deref().is_some_and(|key| !key.trim().is_empty()) {
        "set"
    } else {
        "unset"
    };
    [
        "config ok".to_string(),
        format!("  bind: {}", config.server.bind),
        format!("  endpoint: {}", config.cosmos.endpoint.trim()),
        format!("  database: {}", config.cosmos.database),
        format!("  auth mode: {}", config.cosmos.auth.mode.as_str()),
        format!("  account key: {key_state}"),
        format!("  connection mode: {}", config.cosmos.connection.mode.as_str()),
        format!("  request timeout ms: {}", config.cosmos.connection.request_timeout_ms),
        format!("  log filter: {}", config.logging.filter),
    ]
    .join("\n")
}

// ============================================================================
// SECTION: Query Command
// ============================================================================

/// Executes the `query` command.
async fn command_query(command: QueryCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.clone())?;
    init_logging(&config.logging).map_err(CliError::new)?;
    let request = build_request(&command)?;
    let options =
        PageOptions::from_parts(command.pk, command.max_item_count, command.continuation);
    let client = CosmosClient::from_config(&config.cosmos)
        .map_err(|err| CliError::new(format!("cosmos client init failed: {err}")))?;
    let service = QueryService::new(Arc::new(client));
    let response = service.execute(&command.container, &request, &options, None).await;
    let rendered = serde_json::to_string_pretty(&response)
        .map_err(|err| CliError::new(format!("failed to render response: {err}")))?;
    write_stdout_line(&rendered)?;
    Ok(if response.ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Builds the query request from command-line arguments.
fn build_request(command: &QueryCommand) -> CliResult<QueryRequest> {
    let mut params = BTreeMap::new();
    for raw in &command.params {
        let (name, value) = parse_param(raw).map_err(CliError::new)?;
        if params.insert(name.clone(), value).is_some() {
            return Err(CliError::new(format!("duplicate --param {name}")));
        }
    }
    Ok(QueryRequest {
        sql: command.sql.clone(),
        params: if params.is_empty() { None } else { Some(params) },
    })
}

/// Parses a `name=value` parameter.
///
/// Values that are not valid JSON are taken as plain strings.
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (name, value) =
        raw.split_once('=').ok_or_else(|| format!("--param {raw} must be NAME=VALUE"))?;
    let name = name.trim();
    if name.is_empty() || name == "@" {
        return Err(format!("--param {raw} has an empty name"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<PathBuf>) -> CliResult<SidecarConfig> {
    SidecarConfig::load(path.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
