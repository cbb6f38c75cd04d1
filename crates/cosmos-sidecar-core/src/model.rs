// crates/cosmos-sidecar-core/src/model.rs
// ============================================================================
// Module: Query Envelope Model
// Description: Request and response payloads for the query endpoint.
// Purpose: Define the stable JSON contract between callers and the sidecar.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every query, successful or not, is answered with a [`QueryResponse`]
//! envelope. Successful envelopes carry [`QueryData`]; failed envelopes carry
//! [`ErrorInfo`]. Both carry [`CosmosMetadata`] with request-unit and
//! diagnostic details. Absent optional fields are omitted from the JSON.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::status::ErrorCode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Activity identifier used when no upstream diagnostics exist.
pub const UNAVAILABLE_ACTIVITY_ID: &str = "N/A";

// ============================================================================
// SECTION: Request
// ============================================================================

/// Query request body containing SQL and named parameters.
///
/// # Invariants
/// - `sql` must be non-blank before it is sent upstream; see
///   [`crate::query::build_query_spec`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// SQL query using `@name` parameter placeholders.
    #[serde(default)]
    pub sql: String,
    /// Parameter values keyed by name, with or without the `@` prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, Value>>,
}

impl QueryRequest {
    /// Creates a request with no parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: None,
        }
    }

    /// Adds a named parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.get_or_insert_with(BTreeMap::new).insert(name.into(), value);
        self
    }
}

// ============================================================================
// SECTION: Response
// ============================================================================

/// One page of query results.
///
/// # Invariants
/// - `count` equals `results.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    /// Number of items in this page.
    pub count: usize,
    /// Result documents.
    pub results: Vec<Value>,
    /// Token for fetching the next page, when more results exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

impl QueryData {
    /// Builds page data, deriving `count` from the results.
    #[must_use]
    pub fn new(results: Vec<Value>, continuation_token: Option<String>) -> Self {
        Self {
            count: results.len(),
            results,
            continuation_token,
        }
    }
}

/// Error details for failed queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code label (see [`ErrorCode`]).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Additional diagnostic details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, Value>>,
}

impl ErrorInfo {
    /// Builds error info without details.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_str().to_string(),
            message: message.into(),
            details: None,
        }
    }

    /// Attaches diagnostic details.
    #[must_use]
    pub fn with_details(mut self, details: BTreeMap<String, Value>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Cosmos DB request diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosMetadata {
    /// Request units consumed.
    pub ru: f64,
    /// HTTP status reported by Cosmos DB (or synthesized locally).
    pub status_code: u16,
    /// Cosmos DB activity identifier.
    pub activity_id: String,
    /// Cosmos DB sub-status code.
    pub sub_status: u32,
    /// Suggested retry delay, present on throttling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl CosmosMetadata {
    /// Metadata for a failure that never produced upstream diagnostics.
    #[must_use]
    pub fn unavailable(status_code: u16) -> Self {
        Self {
            ru: 0.0,
            status_code,
            activity_id: UNAVAILABLE_ACTIVITY_ID.to_string(),
            sub_status: 0,
            retry_after_ms: None,
        }
    }
}

/// Envelope returned for every query.
///
/// # Invariants
/// - `ok` is true exactly when `data` is present and `error` is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Whether the query succeeded.
    pub ok: bool,
    /// Result page, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<QueryData>,
    /// Error details, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Upstream diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosmos: Option<CosmosMetadata>,
}

impl QueryResponse {
    /// Builds a successful envelope.
    #[must_use]
    pub const fn success(data: QueryData, cosmos: CosmosMetadata) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            cosmos: Some(cosmos),
        }
    }

    /// Builds a failed envelope.
    #[must_use]
    pub const fn failure(error: ErrorInfo, cosmos: CosmosMetadata) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error),
            cosmos: Some(cosmos),
        }
    }

    /// Builds a failed envelope for a request rejected before reaching Cosmos DB.
    #[must_use]
    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::failure(ErrorInfo::new(code, message), CosmosMetadata::unavailable(code.http_status()))
    }
}
