// crates/cosmos-sidecar-config/src/config.rs
// ============================================================================
// Module: Cosmos Sidecar Configuration
// Description: Configuration loading and validation for the query sidecar.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: base64, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits,
//! then environment overrides are applied so secrets such as the account key
//! can be injected at deploy time. Missing or invalid configuration fails
//! closed. When no path is given and the default file does not exist, the
//! sidecar starts from defaults and relies on environment overrides.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::de;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "cosmos-sidecar.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "COSMOS_SIDECAR_CONFIG";
/// Environment variable overriding `cosmos.endpoint`.
pub const ENDPOINT_ENV_VAR: &str = "COSMOS_ENDPOINT";
/// Environment variable overriding `cosmos.key`.
pub const KEY_ENV_VAR: &str = "COSMOS_KEY";
/// Environment variable overriding `cosmos.database`.
pub const DATABASE_ENV_VAR: &str = "COSMOS_DATABASE";
/// Environment variable overriding `cosmos.auth.mode`.
pub const AUTH_MODE_ENV_VAR: &str = "COSMOS_AUTH_MODE";
/// Environment variable overriding `server.bind`.
pub const BIND_ENV_VAR: &str = "COSMOS_SIDECAR_BIND";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default bind address.
pub(crate) const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum request body size.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Default maximum inflight requests.
pub(crate) const DEFAULT_MAX_INFLIGHT: usize = 256;
/// Default pooled connections per Cosmos DB host.
pub(crate) const DEFAULT_MAX_CONNECTIONS: usize = 100;
/// Default upstream request timeout in milliseconds.
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;
/// Minimum upstream request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
/// Maximum upstream request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 600_000;
/// Maximum pooled connections per host.
pub(crate) const MAX_CONNECTIONS_LIMIT: usize = 10_000;
/// Default tracing filter directive.
pub(crate) const DEFAULT_LOG_FILTER: &str = "info";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Cosmos Sidecar configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SidecarConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Cosmos DB account configuration.
    #[serde(default)]
    pub cosmos: CosmosConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SidecarConfig {
    /// Loads configuration from disk and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |name| env::var(name).ok())
    }

    /// Loads configuration using a caller-supplied environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with_env(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let explicit = path.is_some() || lookup(CONFIG_ENV_VAR).is_some();
        let resolved = resolve_path(path, &lookup)?;
        validate_path(&resolved)?;
        let mut config = if !explicit && !resolved.exists() {
            Self::default()
        } else {
            Self::parse_file(&resolved)?
        };
        config.apply_env_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a config file without validation.
    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses TOML content without validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the content is not valid config TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies environment overrides on top of file values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an override value is malformed.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(endpoint) = lookup(ENDPOINT_ENV_VAR) {
            self.cosmos.endpoint = endpoint;
        }
        if let Some(key) = lookup(KEY_ENV_VAR) {
            self.cosmos.key = Some(key);
        }
        if let Some(database) = lookup(DATABASE_ENV_VAR) {
            self.cosmos.database = database;
        }
        if let Some(mode) = lookup(AUTH_MODE_ENV_VAR) {
            self.cosmos.auth.mode = AuthMode::parse(&mode)?;
        }
        if let Some(bind) = lookup(BIND_ENV_VAR) {
            self.server.bind = bind;
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.cosmos.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Maximum concurrently executing queries.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
    /// Permit binding to non-loopback interfaces.
    #[serde(default)]
    pub allow_non_loopback: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            max_inflight: default_max_inflight(),
            allow_non_loopback: false,
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the bind address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid bind address: {}", self.bind)))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_inflight == 0 {
            return Err(ConfigError::Invalid(
                "server.max_inflight must be greater than zero".to_string(),
            ));
        }
        let addr = self.bind_addr()?;
        if !addr.ip().is_loopback() && !self.allow_non_loopback {
            return Err(ConfigError::Invalid(
                "non-loopback bind disallowed without server.allow_non_loopback".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cosmos DB account configuration.
#[derive(Clone, Default, Deserialize)]
pub struct CosmosConfig {
    /// Account endpoint, e.g. `https://account.documents.azure.com:443/`.
    #[serde(default)]
    pub endpoint: String,
    /// Base64 account key (key auth only).
    #[serde(default)]
    pub key: Option<String>,
    /// Database queried by the sidecar.
    #[serde(default)]
    pub database: String,
    /// Allow plain `http://` endpoints (emulators only).
    #[serde(default)]
    pub allow_http: bool,
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl fmt::Debug for CosmosConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosmosConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("allow_http", &self.allow_http)
            .field("auth", &self.auth)
            .field("connection", &self.connection)
            .finish()
    }
}

impl CosmosConfig {
    /// Returns the parsed endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the endpoint is not a valid URL.
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        Url::parse(self.endpoint.trim())
            .map_err(|err| ConfigError::Invalid(format!("cosmos.endpoint is not a valid url: {err}")))
    }

    /// Returns the upstream request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.request_timeout_ms)
    }

    /// Validates Cosmos DB configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("cosmos.endpoint must be set".to_string()));
        }
        let url = self.endpoint_url()?;
        match url.scheme() {
            "https" => {}
            "http" if self.allow_http => {}
            "http" => {
                return Err(ConfigError::Invalid(
                    "cosmos.endpoint uses http:// without cosmos.allow_http".to_string(),
                ));
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "cosmos.endpoint scheme must be https, got {other}"
                )));
            }
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::Invalid("cosmos.endpoint must include a host".to_string()));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::Invalid("cosmos.database must be set".to_string()));
        }
        if self.auth.mode == AuthMode::Key {
            let key = self.key.as_deref().map(str::trim).unwrap_or_default();
            if key.is_empty() {
                return Err(ConfigError::Invalid(
                    "cosmos.key must be set when auth.mode is key".to_string(),
                ));
            }
            BASE64
                .decode(key)
                .map_err(|_| ConfigError::Invalid("cosmos.key must be base64".to_string()))?;
        }
        self.connection.validate()
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Selected authentication mode.
    #[serde(default)]
    pub mode: AuthMode,
}

/// Supported authentication modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Shared account key (HMAC-signed requests).
    #[default]
    Key,
    /// Entra ID bearer tokens resolved from the environment.
    DefaultAzureCredential,
}

impl AuthMode {
    /// Parses a mode name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing valid values.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "key" => Ok(Self::Key),
            "default_azure_credential" => Ok(Self::DefaultAzureCredential),
            other => Err(ConfigError::Invalid(format!(
                "invalid auth mode: {other}; valid values are: key, default_azure_credential"
            ))),
        }
    }

    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::DefaultAzureCredential => "default_azure_credential",
        }
    }
}

impl<'de> Deserialize<'de> for AuthMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(de::Error::custom)
    }
}

/// Connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Requested connection mode.
    #[serde(default)]
    pub mode: ConnectionMode,
    /// Maximum pooled connections per host.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Upstream request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            mode: ConnectionMode::default(),
            max_connections: default_max_connections(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ConnectionConfig {
    /// Validates connection settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 || self.max_connections > MAX_CONNECTIONS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "cosmos.connection.max_connections must be between 1 and {MAX_CONNECTIONS_LIMIT}"
            )));
        }
        if !(MIN_REQUEST_TIMEOUT_MS ..= MAX_REQUEST_TIMEOUT_MS).contains(&self.request_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "cosmos.connection.request_timeout_ms must be between {MIN_REQUEST_TIMEOUT_MS} and \
                 {MAX_REQUEST_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Connection modes.
///
/// The REST client always speaks to the gateway; `direct` is accepted so
/// existing deployments keep loading and is reported at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// HTTPS gateway.
    #[default]
    Gateway,
    /// Direct TCP to replicas (served through the gateway).
    Direct,
}

impl ConnectionMode {
    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Direct => "direct",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Tracing filter directive (`RUST_LOG` takes precedence).
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Validates logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Some(env_path) = lookup(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

pub(crate) fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

pub(crate) const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

pub(crate) const fn default_max_inflight() -> usize {
    DEFAULT_MAX_INFLIGHT
}

pub(crate) const fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

pub(crate) const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

pub(crate) fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
