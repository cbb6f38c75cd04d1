// crates/cosmos-sidecar-cli/src/logging.rs
// ============================================================================
// Module: Logging Setup
// Description: tracing-subscriber initialization from logging config.
// Purpose: Route structured logs to stderr as text or JSON lines.
// Dependencies: tracing-subscriber
// ============================================================================

use cosmos_sidecar_config::LogFormat;
use cosmos_sidecar_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `logging.filter` when set.
pub(crate) fn init_logging(config: &LoggingConfig) -> Result<(), String> {
    let filter = build_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(), &config.filter)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
    installed.map_err(|err| format!("failed to initialize logging: {err}"))
}

/// Builds the filter from the environment override or configured directive.
pub(crate) fn build_filter(env_override: Option<&str>, configured: &str) -> Result<EnvFilter, String> {
    let directive = env_override.filter(|value| !value.trim().is_empty()).unwrap_or(configured);
    EnvFilter::try_new(directive).map_err(|err| format!("invalid log filter `{directive}`: {err}"))
}
