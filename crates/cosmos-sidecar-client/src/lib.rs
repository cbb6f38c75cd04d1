// crates/cosmos-sidecar-client/src/lib.rs
// ============================================================================
// Module: Cosmos Sidecar Client Library
// Description: Cosmos DB REST gateway client for single-page queries.
// Purpose: Sign, send, and decode query requests against a Cosmos DB account.
// Dependencies: cosmos-sidecar-core, cosmos-sidecar-config, reqwest, hmac, sha2
// ============================================================================

//! ## Overview
//! The client speaks the Cosmos DB REST protocol through the account gateway.
//! It signs each request with the account key or attaches an Entra ID token,
//! executes exactly one page of a query, and decodes the documents plus the
//! diagnostic headers (request charge, activity id, continuation, sub-status).
//! Callers depend on the [`QueryBackend`] trait so the HTTP layer can be
//! exercised without a live account.
//!
//! Security posture: keys and tokens are never logged or rendered by `Debug`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod client;
pub mod error;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::Credential;
pub use auth::TokenCredential;
pub use client::CosmosClient;
pub use client::QueryBackend;
pub use client::QueryPage;
pub use error::CosmosError;
