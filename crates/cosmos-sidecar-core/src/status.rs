// crates/cosmos-sidecar-core/src/status.rs
// ============================================================================
// Module: Status Classification
// Description: Maps upstream status codes to error codes and HTTP statuses.
// Purpose: Keep error labels and response statuses stable for callers.
// Dependencies: crate::model
// ============================================================================

//! ## Overview
//! Cosmos DB failures are reduced to a small, stable set of [`ErrorCode`]
//! labels. The HTTP status returned by the sidecar is derived from the
//! upstream status carried in the envelope metadata, collapsing everything
//! outside the recognized set to `500`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::model::QueryResponse;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// HTTP 200.
pub const STATUS_OK: u16 = 200;
/// HTTP 400.
pub const STATUS_BAD_REQUEST: u16 = 400;
/// HTTP 404.
pub const STATUS_NOT_FOUND: u16 = 404;
/// HTTP 408.
pub const STATUS_REQUEST_TIMEOUT: u16 = 408;
/// HTTP 429.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;
/// HTTP 500.
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Stable error code labels reported in [`crate::ErrorInfo::code`].
///
/// # Invariants
/// - Labels are part of the public wire contract and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Invalid query syntax or parameters.
    BadRequest,
    /// Database or container missing.
    NotFound,
    /// Upstream or local timeout.
    Timeout,
    /// Request rate too large.
    Throttled,
    /// Any other failure.
    UpstreamError,
}

impl ErrorCode {
    /// All codes, in label order.
    pub const ALL: [Self; 5] =
        [Self::BadRequest, Self::NotFound, Self::Timeout, Self::Throttled, Self::UpstreamError];

    /// Classifies an upstream HTTP status.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            STATUS_BAD_REQUEST => Self::BadRequest,
            STATUS_NOT_FOUND => Self::NotFound,
            STATUS_TOO_MANY_REQUESTS => Self::Throttled,
            STATUS_REQUEST_TIMEOUT => Self::Timeout,
            _ => Self::UpstreamError,
        }
    }

    /// HTTP status the sidecar answers with for this code.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::BadRequest => STATUS_BAD_REQUEST,
            Self::NotFound => STATUS_NOT_FOUND,
            Self::Timeout => STATUS_REQUEST_TIMEOUT,
            Self::Throttled => STATUS_TOO_MANY_REQUESTS,
            Self::UpstreamError => STATUS_INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BadRequest",
            Self::NotFound => "NotFound",
            Self::Timeout => "Timeout",
            Self::Throttled => "Throttled",
            Self::UpstreamError => "UpstreamError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: HTTP Status
// ============================================================================

/// Returns the HTTP status for a response envelope.
#[must_use]
pub fn http_status_for(response: &QueryResponse) -> u16 {
    if response.ok {
        return STATUS_OK;
    }
    response.cosmos.as_ref().map_or(STATUS_INTERNAL_SERVER_ERROR, |cosmos| {
        ErrorCode::from_status(cosmos.status_code).http_status()
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
