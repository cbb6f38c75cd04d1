//! Cosmos section validation tests for cosmos-sidecar-config.
// crates/cosmos-sidecar-config/tests/cosmos_validation.rs
// =============================================================================
// Module: Cosmos Config Validation Tests
// Description: Validate endpoint, database, auth, connection, and bind rules.
// Purpose: Ensure invalid deployments fail closed before startup.
// =============================================================================

mod common;

use cosmos_sidecar_config::AuthMode;
use cosmos_sidecar_config::ConnectionMode;
use cosmos_sidecar_config::LogFormat;

use crate::common::assert_invalid;
use crate::common::config_from_toml;
use crate::common::valid_config;

type TestResult = Result<(), String>;

#[test]
fn valid_config_uses_documented_defaults() -> TestResult {
    let config = valid_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.server.bind != "127.0.0.1:8080" {
        return Err(format!("unexpected bind {}", config.server.bind));
    }
    if config.cosmos.auth.mode != AuthMode::Key {
        return Err("default auth mode should be key".to_string());
    }
    if config.cosmos.connection.mode != ConnectionMode::Gateway {
        return Err("default connection mode should be gateway".to_string());
    }
    if config.cosmos.connection.max_connections != 100 {
        return Err("default max_connections should be 100".to_string());
    }
    if config.cosmos.connection.request_timeout_ms != 60_000 {
        return Err("default request timeout should be 60s".to_string());
    }
    if config.logging.format != LogFormat::Text {
        return Err("default log format should be text".to_string());
    }
    Ok(())
}

#[test]
fn key_mode_requires_key() -> TestResult {
    let mut config = valid_config().map_err(|err| err.to_string())?;
    config.cosmos.key = None;
    assert_invalid(config.validate(), "cosmos.key must be set when auth.mode is key")
}

#[test]
fn key_must_be_base64() -> TestResult {
    let mut config = valid_config().map_err(|err| err.to_string())?;
    config.cosmos.key = Some("not base64!".to_string());
    assert_invalid(config.validate(), "cosmos.key must be base64")
}

#[test]
fn credential_mode_does_not_need_key() -> TestResult {
    let mut config = valid_config().map_err(|err| err.to_string())?;
    config.cosmos.key = None;
    config.cosmos.auth.mode = AuthMode::DefaultAzureCredential;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn unknown_auth_mode_fails_to_parse() -> TestResult {
    assert_invalid(
        config_from_toml(
            r#"
[cosmos.auth]
mode = "certificate"
"#,
        ),
        "valid values are: key, default_azure_credential",
    )
}

#[test]
fn auth_mode_in_file_ignores_case() -> TestResult {
    let config = config_from_toml(
        r#"
[cosmos.auth]
mode = "Default_Azure_Credential"
"#,
    )
    .map_err(|err| err.to_string())?;
    if config.cosmos.auth.mode != AuthMode::DefaultAzureCredential {
        return Err(format!("unexpected auth mode {}", config.cosmos.auth.mode.as_str()));
    }
    let config = config_from_toml("[cosmos.auth]\nmode = \"KEY\"\n").map_err(|err| err.to_string())?;
    if config.cosmos.auth.mode != AuthMode::Key {
        return Err(format!("unexpected auth mode {}", config.cosmos.auth.mode.as_str()));
    }
    Ok(())
}

#[test]
fn endpoint_is_required() -> TestResult {
    let mut config = valid_config().map_err(|err| err.to_string())?;
    config.cosmos.endpoint = String::new();
    assert_invalid(config.validate(), "cosmos.endpoint must be set")
}

#[test]
fn plain_http_endpoint_requires_opt_in() -> TestResult {
    let mut config = valid_config().map_err(|err| err.to_string())?;
    config.cosmos.endpoint = "http://localhost:8081/".to_string();
    assert_invalid(config.validate(), "without cosmos.allow_http")?;
    config.cosmos.allow_http = true;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn endpoint_rejects_other_schemes() -> TestResult {
    let mut config = valid_config().map_err(|err| err.to_string())?;
    config.cosmos.endpoint = "ftp://account.example.com/".to_string();
    assert_invalid(config.validate(), "scheme must be https")
}

#[test]
fn database_is_required() -> TestResult {
    let mut config = valid_config().map_err(|err| err.to_string())?;
    config.cosmos.database = "  ".to_string();
    assert_invalid(config.validate(), "cosmos.database must be set")
}

#[test]
fn connection_limits_are_bounded() -> TestResult {
    let mut config = valid_config().map_err(|err| err.to_string())?;
    config.cosmos.connection.max_connections = 0;
    assert_invalid(config.validate(), "max_connections")?;
    config.cosmos.connection.max_connections = 10;
    config.cosmos.connection.request_timeout_ms = 50;
    assert_invalid(config.validate(), "request_timeout_ms")?;
    config.cosmos.connection.request_timeout_ms = 600_001;
    assert_invalid(config.validate(), "request_timeout_ms")
}

#[test]
fn direct_mode_is_accepted() -> TestResult {
    let config = config_from_toml(&format!(
        r#"
[cosmos]
endpoint = "https://account.documents.azure.com:443/"
database = "app"
key = "{}"

[cosmos.connection]
mode = "direct"
"#,
        crate::common::EMULATOR_KEY
    ))
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.cosmos.connection.mode == ConnectionMode::Direct {
        Ok(())
    } else {
        Err("direct mode not parsed".to_string())
    }
}

#[test]
fn non_loopback_bind_requires_opt_in() -> TestResult {
    let mut config = valid_config().map_err(|err| err.to_string())?;
    config.server.bind = "0.0.0.0:8080".to_string();
    assert_invalid(config.validate(), "non-loopback")?;
    config.server.allow_non_loopback = true;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn invalid_bind_is_rejected() -> TestResult {
    let mut config = valid_config().map_err(|err| err.to_string())?;
    config.server.bind = "localhost".to_string();
    assert_invalid(config.validate(), "invalid bind address")
}

#[test]
fn debug_output_redacts_key() -> TestResult {
    let config = valid_config().map_err(|err| err.to_string())?;
    let rendered = format!("{:?}", config.cosmos);
    if rendered.contains(crate::common::EMULATOR_KEY) {
        return Err("key leaked into debug output".to_string());
    }
    if !rendered.contains("<redacted>") {
        return Err("expected redaction marker".to_string());
    }
    Ok(())
}
