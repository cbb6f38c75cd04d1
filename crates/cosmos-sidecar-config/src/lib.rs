// crates/cosmos-sidecar-config/src/lib.rs
// ============================================================================
// Module: Cosmos Sidecar Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for cosmos-sidecar.toml semantics.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! `cosmos-sidecar-config` defines the canonical configuration model for the
//! sidecar. It provides strict, fail-closed validation, environment variable
//! overrides for deployment secrets, and a canonical example file.
//!
//! Security posture: config inputs are untrusted and account keys are secrets;
//! `Debug` output redacts them.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
