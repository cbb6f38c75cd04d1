// crates/cosmos-sidecar-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Unit Tests
// Description: Argument parsing and request building for the CLI.
// Purpose: Keep command-line input handling predictable.
// Dependencies: clap, serde_json
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use clap::Parser;
use serde_json::json;

use super::Cli;
use super::Commands;
use super::build_request;
use super::config_summary;
use super::parse_param;
use crate::logging::build_filter;

fn parse_query(args: &[&str]) -> super::QueryCommand {
    let mut argv = vec!["cosmos-sidecar", "query"];
    argv.extend_from_slice(args);
    match Cli::try_parse_from(argv).expect("parse").command {
        Some(Commands::Query(command)) => command,
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn param_values_parse_as_json_or_fall_back_to_strings() {
    assert_eq!(parse_param("age=30").unwrap(), ("age".to_string(), json!(30)));
    assert_eq!(parse_param("@flag=true").unwrap(), ("@flag".to_string(), json!(true)));
    assert_eq!(parse_param("userId=\"u-001\"").unwrap(), ("userId".to_string(), json!("u-001")));
    assert_eq!(parse_param("userId=u-001").unwrap(), ("userId".to_string(), json!("u-001")));
    assert_eq!(parse_param("expr=a=b").unwrap(), ("expr".to_string(), json!("a=b")));
}

#[test]
fn param_requires_separator_and_name() {
    assert!(parse_param("userId").is_err());
    assert!(parse_param("=1").is_err());
    assert!(parse_param("@=1").is_err());
}

#[test]
fn query_command_builds_request_and_options() {
    let command = parse_query(&[
        "--container",
        "orders",
        "--sql",
        "SELECT * FROM c WHERE c.age > @age",
        "--param",
        "age=30",
        "--max-item-count",
        "-1",
        "--pk",
        "u-001",
    ]);
    assert_eq!(command.container, "orders");
    assert_eq!(command.max_item_count, Some(-1));
    let request = build_request(&command).unwrap();
    assert_eq!(request.params.unwrap()["age"], json!(30));
}

#[test]
fn duplicate_params_are_rejected() {
    let command = parse_query(&[
        "--container",
        "orders",
        "--sql",
        "SELECT 1",
        "--param",
        "a=1",
        "--param",
        "a=2",
    ]);
    assert!(build_request(&command).is_err());
}

#[test]
fn summary_never_prints_the_key() {
    let mut config = cosmos_sidecar_config::SidecarConfig::default();
    config.cosmos.key = Some("c2VjcmV0".to_string());
    let summary = config_summary(&config);
    assert!(summary.contains("account key: set"));
    assert!(!summary.contains("c2VjcmV0"));
}

#[test]
fn log_filter_prefers_environment_override() {
    assert_eq!(build_filter(Some("debug"), "info").unwrap().to_string(), "debug");
    assert_eq!(build_filter(Some("  "), "warn").unwrap().to_string(), "warn");
    assert_eq!(build_filter(None, "cosmos_sidecar_server=trace").unwrap().to_string(), "cosmos_sidecar_server=trace");
    assert!(build_filter(None, "cosmos_sidecar_server=loud").is_err());
}
