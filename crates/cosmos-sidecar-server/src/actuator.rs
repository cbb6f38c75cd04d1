// crates/cosmos-sidecar-server/src/actuator.rs
// ============================================================================
// Module: Actuator Endpoints
// Description: Health, info, and metrics endpoints for operators.
// Purpose: Expose liveness and non-secret runtime facts over HTTP.
// Dependencies: axum, cosmos-sidecar-config, serde
// ============================================================================

//! ## Overview
//! - `GET /actuator/health` reports `{"status":"UP"}` while the process serves.
//! - `GET /actuator/info` reports the application version and the Cosmos DB
//!   target without any credential material.
//! - `GET /actuator/metrics` reports the in-process query counters.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use cosmos_sidecar_config::CosmosConfig;
use serde::Serialize;

use crate::server::ServerState;
use crate::telemetry::MetricsSnapshot;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Application name reported by `/actuator/info`.
pub const APP_NAME: &str = "cosmos-sidecar";
/// Application version reported by `/actuator/info`.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Health status reported while serving.
pub const STATUS_UP: &str = "UP";

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Health response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Liveness label.
    pub status: &'static str,
}

/// Info response body.
#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
    /// Application identity.
    pub app: AppIdentity,
    /// Cosmos DB target.
    pub cosmos: CosmosTarget,
}

/// Application identity.
#[derive(Debug, Clone, Serialize)]
pub struct AppIdentity {
    /// Application name.
    pub name: &'static str,
    /// Application version.
    pub version: &'static str,
}

/// Non-secret Cosmos DB target description.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosTarget {
    /// Account endpoint.
    pub endpoint: String,
    /// Database identifier.
    pub database: String,
    /// Authentication mode label.
    pub auth_mode: &'static str,
    /// Connection mode label.
    pub connection_mode: &'static str,
}

impl AppInfo {
    /// Builds the info payload from Cosmos DB configuration.
    #[must_use]
    pub fn from_config(config: &CosmosConfig) -> Self {
        Self {
            app: AppIdentity {
                name: APP_NAME,
                version: APP_VERSION,
            },
            cosmos: CosmosTarget {
                endpoint: config.endpoint.trim().to_string(),
                database: config.database.clone(),
                auth_mode: config.auth.mode.as_str(),
                connection_mode: config.connection.mode.as_str(),
            },
        }
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles `GET /actuator/health`.
pub(crate) async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: STATUS_UP,
    })
}

/// Handles `GET /actuator/info`.
pub(crate) async fn info(State(state): State<Arc<ServerState>>) -> Json<AppInfo> {
    Json(state.info.clone())
}

/// Handles `GET /actuator/metrics`.
pub(crate) async fn metrics(State(state): State<Arc<ServerState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
