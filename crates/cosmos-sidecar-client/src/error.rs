// crates/cosmos-sidecar-client/src/error.rs
// ============================================================================
// Module: Cosmos Client Errors
// Description: Failure taxonomy for Cosmos DB gateway calls.
// Purpose: Separate service-reported failures from local transport failures.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`CosmosError::Service`] carries the diagnostics Cosmos DB reported; every
//! other variant is a local failure with no upstream status.

use std::time::Duration;

use thiserror::Error;

/// Cosmos DB client errors.
#[derive(Debug, Error)]
pub enum CosmosError {
    /// Cosmos DB answered with a non-success status.
    #[error("cosmos status {status} (sub-status {sub_status}): {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Cosmos DB sub-status code.
        sub_status: u32,
        /// Activity identifier.
        activity_id: String,
        /// Request units charged for the failed call.
        request_charge: f64,
        /// Suggested retry delay.
        retry_after: Option<Duration>,
        /// Message from the error body.
        message: String,
    },
    /// The request did not complete within its deadline.
    #[error("cosmos request timed out: {0}")]
    Timeout(String),
    /// Connection or protocol failure before a response was received.
    #[error("cosmos transport error: {0}")]
    Transport(String),
    /// The response could not be decoded.
    #[error("cosmos decode error: {0}")]
    Decode(String),
    /// No usable credential could be produced.
    #[error("cosmos credential error: {0}")]
    Credential(String),
    /// The client was misconfigured.
    #[error("cosmos client config error: {0}")]
    Config(String),
}

impl CosmosError {
    /// Maps a reqwest failure onto the timeout or transport variants.
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
