// crates/cosmos-sidecar-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for cosmos-sidecar-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::collections::HashMap;

use cosmos_sidecar_config::ConfigError;
use cosmos_sidecar_config::SidecarConfig;

/// Well-known emulator key, valid base64.
pub const EMULATOR_KEY: &str =
    "C2y6yDjf5/R+ob0N8A7Cgv30VRDJIWEHLM+4QDU5DE2nQ9nDuVTqobD4b8mGGyPMbIZnqyMsEcaGQy67XIw/Jw==";

/// Parses a TOML string into a `SidecarConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<SidecarConfig, ConfigError> {
    SidecarConfig::from_toml_str(toml_str)
}

/// Returns a config that passes validation.
pub fn valid_config() -> Result<SidecarConfig, ConfigError> {
    config_from_toml(&format!(
        r#"
[cosmos]
endpoint = "https://account.documents.azure.com:443/"
database = "app"
key = "{EMULATOR_KEY}"
"#
    ))
}

/// Builds an environment lookup backed by a fixed map.
pub fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> =
        pairs.iter().map(|(key, value)| ((*key).to_string(), (*value).to_string())).collect();
    move |name: &str| map.get(name).cloned()
}

/// Asserts that a result failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
