// crates/cosmos-sidecar-core/src/lib.rs
// ============================================================================
// Module: Cosmos Sidecar Core Library
// Description: Public API surface for the Cosmos Sidecar core.
// Purpose: Expose the query envelope model, query-spec building, and status rules.
// Dependencies: crate::{model, query, status}
// ============================================================================

//! ## Overview
//! Cosmos Sidecar core holds the transport-neutral pieces of the query
//! sidecar: the JSON envelope returned to callers, the translation of a
//! caller's SQL and named parameters into a Cosmos DB query spec, and the
//! classification of upstream status codes into stable error codes and HTTP
//! statuses. Nothing here performs I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod model;
pub mod query;
pub mod status;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use model::CosmosMetadata;
pub use model::ErrorInfo;
pub use model::QueryData;
pub use model::QueryRequest;
pub use model::QueryResponse;
pub use query::PageOptions;
pub use query::QueryValidationError;
pub use query::SqlParameter;
pub use query::SqlQuerySpec;
pub use query::build_query_spec;
pub use query::normalize_param_name;
pub use query::validate_container_name;
pub use status::ErrorCode;
pub use status::http_status_for;
