//! Config load validation tests for cosmos-sidecar-config.
// crates/cosmos-sidecar-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding, env).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

mod common;

use std::io::Write;
use std::path::Path;

use cosmos_sidecar_config::SidecarConfig;
use cosmos_sidecar_config::config_toml_example;
use tempfile::NamedTempFile;

use crate::common::EMULATOR_KEY;
use crate::common::assert_invalid;
use crate::common::env_from;

type TestResult = Result<(), String>;

fn write_config(content: &str) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(content.as_bytes()).map_err(|err| err.to_string())?;
    Ok(file)
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(
        SidecarConfig::load_with_env(Some(path), env_from(&[])),
        "config path exceeds max length",
    )
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(
        SidecarConfig::load_with_env(Some(path), env_from(&[])),
        "config path component too long",
    )
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'a'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(
        SidecarConfig::load_with_env(Some(file.path()), env_from(&[])),
        "config file exceeds size limit",
    )
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(
        SidecarConfig::load_with_env(Some(file.path()), env_from(&[])),
        "config file must be utf-8",
    )
}

#[test]
fn load_rejects_missing_explicit_file() -> TestResult {
    let path = Path::new("/nonexistent/cosmos-sidecar-test.toml");
    assert_invalid(SidecarConfig::load_with_env(Some(path), env_from(&[])), "config io error")
}

#[test]
fn load_accepts_example_config() -> TestResult {
    let file = write_config(&config_toml_example())?;
    let config = SidecarConfig::load_with_env(Some(file.path()), env_from(&[]))
        .map_err(|err| err.to_string())?;
    if config.cosmos.database != "app" {
        return Err(format!("unexpected database {}", config.cosmos.database));
    }
    Ok(())
}

#[test]
fn env_overrides_take_precedence_over_file() -> TestResult {
    let file = write_config(&config_toml_example())?;
    let env = env_from(&[
        ("COSMOS_ENDPOINT", "https://prod.documents.azure.com:443/"),
        ("COSMOS_DATABASE", "orders"),
        ("COSMOS_SIDECAR_BIND", "127.0.0.1:9090"),
    ]);
    let config =
        SidecarConfig::load_with_env(Some(file.path()), env).map_err(|err| err.to_string())?;
    if config.cosmos.endpoint != "https://prod.documents.azure.com:443/" {
        return Err(format!("endpoint not overridden: {}", config.cosmos.endpoint));
    }
    if config.cosmos.database != "orders" {
        return Err(format!("database not overridden: {}", config.cosmos.database));
    }
    if config.server.bind != "127.0.0.1:9090" {
        return Err(format!("bind not overridden: {}", config.server.bind));
    }
    Ok(())
}

#[test]
fn env_config_path_must_exist() -> TestResult {
    let env = env_from(&[("COSMOS_SIDECAR_CONFIG", "/nonexistent/from-env.toml")]);
    assert_invalid(SidecarConfig::load_with_env(None, env), "config io error")
}

#[test]
fn env_only_config_loads_without_file() -> TestResult {
    // Integration tests run from the crate root, which has no cosmos-sidecar.toml.
    let env = env_from(&[
        ("COSMOS_ENDPOINT", "https://account.documents.azure.com:443/"),
        ("COSMOS_DATABASE", "app"),
        ("COSMOS_KEY", EMULATOR_KEY),
    ]);
    let config = SidecarConfig::load_with_env(None, env).map_err(|err| err.to_string())?;
    if config.cosmos.database != "app" || config.server.bind != "127.0.0.1:8080" {
        return Err("expected defaults plus environment values".to_string());
    }
    Ok(())
}

#[test]
fn env_auth_mode_rejects_unknown_values() -> TestResult {
    let file = write_config(&config_toml_example())?;
    let env = env_from(&[("COSMOS_AUTH_MODE", "certificate")]);
    assert_invalid(SidecarConfig::load_with_env(Some(file.path()), env), "invalid auth mode")
}
