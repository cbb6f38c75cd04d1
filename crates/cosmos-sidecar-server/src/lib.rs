// crates/cosmos-sidecar-server/src/lib.rs
// ============================================================================
// Module: Cosmos Sidecar Server Library
// Description: HTTP surface and query execution service for the sidecar.
// Purpose: Expose single-page Cosmos DB queries over HTTP with diagnostics.
// Dependencies: axum, tokio, cosmos-sidecar-client, cosmos-sidecar-core
// ============================================================================

//! ## Overview
//! The server crate wires a [`QueryService`] to an axum router:
//! - [`service`]: validation, execution, and envelope mapping;
//! - [`server`]: the query endpoint plus actuator and OpenAPI routes;
//! - [`correlation`]: request ID sanitization and server correlation IDs;
//! - [`telemetry`]: metric events and the in-process counters.
//!
//! Security posture: request bodies, headers, and query strings are untrusted
//! and bounded or sanitized before use.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod actuator;
pub mod correlation;
pub mod openapi;
pub mod server;
pub mod service;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use actuator::AppInfo;
pub use server::ServerError;
pub use server::SidecarServer;
pub use service::QueryService;
pub use telemetry::InMemoryMetrics;
pub use telemetry::MetricsSnapshot;
pub use telemetry::NoopMetrics;
pub use telemetry::QueryMetricEvent;
pub use telemetry::QueryMetrics;
pub use telemetry::QueryOutcome;
