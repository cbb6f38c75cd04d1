// crates/cosmos-sidecar-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for sidecar configuration. The output is static and is
//! kept valid by the config test suite.

/// Returns a canonical example `cosmos-sidecar.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8080"
max_body_bytes = 1048576
max_inflight = 256
allow_non_loopback = false

[cosmos]
endpoint = "https://localhost:8081/"
database = "app"
# Prefer the COSMOS_KEY environment variable over storing the key here.
key = "C2y6yDjf5/R+ob0N8A7Cgv30VRDJIWEHLM+4QDU5DE2nQ9nDuVTqobD4b8mGGyPMbIZnqyMsEcaGQy67XIw/Jw=="

[cosmos.auth]
# "key" or "default_azure_credential"
mode = "key"

[cosmos.connection]
mode = "gateway"
max_connections = 100
request_timeout_ms = 60000

[logging]
filter = "info"
format = "text"
"#,
    )
}
