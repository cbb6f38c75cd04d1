// crates/cosmos-sidecar-server/src/correlation.rs
// ============================================================================
// Module: Request Correlation
// Description: Sanitization of caller request IDs and server ID issuance.
// Purpose: Tie sidecar log lines and responses to a stable request identity.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! Callers may send `X-Request-Id`. The value is untrusted: it is echoed back
//! only when it is a short ASCII HTTP token, and dropped otherwise. Every
//! request additionally receives a server correlation ID built from a
//! boot-scoped random seed plus a monotonic counter, returned in
//! `X-Server-Correlation-Id`.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rand::RngCore;
use rand::rngs::OsRng;

/// Header carrying the caller's request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Header carrying the server-issued correlation identifier.
pub const SERVER_CORRELATION_HEADER: &str = "x-server-correlation-id";
/// Maximum accepted length of a caller request identifier.
pub const MAX_REQUEST_ID_LENGTH: usize = 128;
/// Prefix of server correlation identifiers.
pub const SERVER_CORRELATION_PREFIX: &str = "cqs";

/// Reason a caller request identifier was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestIdRejection {
    /// Empty after trimming.
    Empty,
    /// Longer than [`MAX_REQUEST_ID_LENGTH`].
    TooLong,
    /// Contained a non-ASCII character.
    NonAscii,
    /// Contained whitespace, control, or separator characters.
    DisallowedChar,
}

impl RequestIdRejection {
    /// Returns a stable label for logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooLong => "too_long",
            Self::NonAscii => "non_ascii",
            Self::DisallowedChar => "disallowed_char",
        }
    }
}

impl fmt::Display for RequestIdRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Boot-scoped generator of server correlation IDs.
///
/// # Invariants
/// - Issued identifiers are unique within the process lifetime.
#[derive(Debug)]
pub struct CorrelationIdGenerator {
    /// Prefix of every issued identifier.
    prefix: &'static str,
    /// Random per-process seed.
    boot_id: u64,
    /// Monotonic sequence.
    counter: AtomicU64,
}

impl CorrelationIdGenerator {
    /// Creates a generator with the given prefix.
    #[must_use]
    pub fn new(prefix: &'static str) -> Self {
        let mut bytes = [0u8; 8];
        OsRng.fill_bytes(&mut bytes);
        Self {
            prefix,
            boot_id: u64::from_be_bytes(bytes),
            counter: AtomicU64::new(1),
        }
    }

    /// Issues the next correlation ID.
    #[must_use]
    pub fn issue(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:016x}-{:016x}", self.prefix, self.boot_id, seq)
    }
}

impl Default for CorrelationIdGenerator {
    fn default() -> Self {
        Self::new(SERVER_CORRELATION_PREFIX)
    }
}

/// Sanitizes a caller request ID.
///
/// Returns `Ok(None)` when no value was sent.
///
/// # Errors
///
/// Returns [`RequestIdRejection`] when the value must not be echoed.
pub fn sanitize_request_id(value: Option<&str>) -> Result<Option<String>, RequestIdRejection> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RequestIdRejection::Empty);
    }
    if trimmed.len() > MAX_REQUEST_ID_LENGTH {
        return Err(RequestIdRejection::TooLong);
    }
    for ch in trimmed.chars() {
        if !ch.is_ascii() {
            return Err(RequestIdRejection::NonAscii);
        }
        if !is_tchar(ch) {
            return Err(RequestIdRejection::DisallowedChar);
        }
    }
    Ok(Some(trimmed.to_string()))
}

/// Returns true for RFC 9110 token characters.
const fn is_tchar(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '!' | '#'
                | '$'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | '-'
                | '.'
                | '^'
                | '_'
                | '`'
                | '|'
                | '~'
        )
}

// ============================================================================
// SECTION: Tests
// ============================================================================
