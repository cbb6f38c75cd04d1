// crates/cosmos-sidecar-core/src/query.rs
// ============================================================================
// Module: Query Spec Building
// Description: Converts caller requests into Cosmos DB query specs.
// Purpose: Validate SQL, parameters, container names, and paging options.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`QueryRequest`] is validated and turned into a [`SqlQuerySpec`] whose
//! serialized form is exactly the body Cosmos DB expects for a query:
//! `{"query": "...", "parameters": [{"name": "@x", "value": ...}]}`.
//! Parameter names are normalized to carry a single `@` prefix and are emitted
//! in sorted order so identical requests produce identical bodies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::QueryRequest;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Parameter name prefix required by Cosmos DB.
pub const PARAM_PREFIX: char = '@';
/// Maximum length of a container identifier.
pub const MAX_CONTAINER_NAME_LENGTH: usize = 255;
/// Characters Cosmos DB forbids in resource identifiers.
const FORBIDDEN_ID_CHARS: [char; 4] = ['/', '\\', '?', '#'];

// ============================================================================
// SECTION: Types
// ============================================================================

/// A named query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlParameter {
    /// Parameter name including the `@` prefix.
    pub name: String,
    /// Parameter value.
    pub value: Value,
}

/// Query body sent to Cosmos DB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQuerySpec {
    /// SQL text.
    pub query: String,
    /// Bound parameters.
    pub parameters: Vec<SqlParameter>,
}

/// Paging and routing options for a single query page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOptions {
    /// Partition key value scoping the query to one logical partition.
    pub partition_key: Option<String>,
    /// Maximum number of items per page.
    pub max_item_count: Option<u32>,
    /// Continuation token from a previous page.
    pub continuation: Option<String>,
}

impl PageOptions {
    /// Builds options from raw caller input.
    ///
    /// Non-positive item counts are treated as unset so Cosmos DB applies its
    /// own default page size. Empty continuation tokens are ignored.
    #[must_use]
    pub fn from_parts(
        partition_key: Option<String>,
        max_item_count: Option<i64>,
        continuation: Option<String>,
    ) -> Self {
        let max_item_count =
            max_item_count.filter(|count| *count > 0).map(|count| u32::try_from(count).unwrap_or(u32::MAX));
        Self {
            partition_key,
            max_item_count,
            continuation: continuation.filter(|token| !token.is_empty()),
        }
    }
}

// ============================================================================
// SECTION: Building
// ============================================================================

/// Returns the parameter name with exactly one leading `@`.
#[must_use]
pub fn normalize_param_name(name: &str) -> String {
    if name.starts_with(PARAM_PREFIX) {
        name.to_string()
    } else {
        format!("{PARAM_PREFIX}{name}")
    }
}

/// Builds the Cosmos DB query spec for a request.
///
/// # Errors
///
/// Returns [`QueryValidationError`] when the SQL is blank or a parameter name
/// is empty.
pub fn build_query_spec(request: &QueryRequest) -> Result<SqlQuerySpec, QueryValidationError> {
    if request.sql.trim().is_empty() {
        return Err(QueryValidationError::MissingSql);
    }
    let mut parameters = Vec::new();
    if let Some(params) = &request.params {
        for (name, value) in params {
            let normalized = normalize_param_name(name.trim());
            if normalized.len() <= 1 {
                return Err(QueryValidationError::EmptyParamName);
            }
            parameters.push(SqlParameter {
                name: normalized,
                value: value.clone(),
            });
        }
    }
    parameters.sort_by(|left, right| left.name.cmp(&right.name));
    if let Some(pair) = parameters.windows(2).find(|pair| pair[0].name == pair[1].name) {
        return Err(QueryValidationError::DuplicateParam(pair[0].name.clone()));
    }
    Ok(SqlQuerySpec {
        query: request.sql.clone(),
        parameters,
    })
}

/// Validates a container identifier before it is placed in a resource path.
///
/// # Errors
///
/// Returns [`QueryValidationError::InvalidContainer`] when the name is empty,
/// too long, ends with a space, or contains a forbidden character.
pub fn validate_container_name(name: &str) -> Result<(), QueryValidationError> {
    if name.is_empty() {
        return Err(QueryValidationError::InvalidContainer("container name is empty".to_string()));
    }
    if name.chars().count() > MAX_CONTAINER_NAME_LENGTH {
        return Err(QueryValidationError::InvalidContainer(format!(
            "container name exceeds {MAX_CONTAINER_NAME_LENGTH} characters"
        )));
    }
    if name.ends_with(' ') {
        return Err(QueryValidationError::InvalidContainer(
            "container name must not end with a space".to_string(),
        ));
    }
    if let Some(ch) = name.chars().find(|ch| FORBIDDEN_ID_CHARS.contains(ch) || ch.is_control()) {
        return Err(QueryValidationError::InvalidContainer(format!(
            "container name contains forbidden character '{ch}'"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Query validation failures detected before contacting Cosmos DB.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryValidationError {
    /// The request carried no SQL text.
    #[error("sql is required")]
    MissingSql,
    /// A parameter had an empty name.
    #[error("parameter names must be non-empty")]
    EmptyParamName,
    /// Two parameters normalized to the same name.
    #[error("duplicate parameter: {0}")]
    DuplicateParam(String),
    /// The container name is not a valid Cosmos DB identifier.
    #[error("invalid container: {0}")]
    InvalidContainer(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
