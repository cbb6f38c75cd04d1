// crates/cosmos-sidecar-server/src/telemetry.rs
// ============================================================================
// Module: Query Telemetry
// Description: Metric events, sinks, and latency buckets for query traffic.
// Purpose: Count outcomes and request charge without a metrics backend.
// Dependencies: cosmos-sidecar-core, serde
// ============================================================================

//! ## Overview
//! Every query execution produces one [`QueryMetricEvent`]. Sinks implement
//! [`QueryMetrics`]; [`InMemoryMetrics`] keeps atomic counters that back the
//! `/actuator/metrics` endpoint, and [`NoopMetrics`] discards events.
//! Labels come from caller input and are never used as unbounded keys.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use cosmos_sidecar_core::ErrorCode;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Latency histogram upper bounds in milliseconds.
pub const QUERY_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Query outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryOutcome {
    /// The envelope reported `ok = true`.
    Ok,
    /// The envelope reported a failure.
    Error,
}

impl QueryOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// One completed query.
#[derive(Debug, Clone)]
pub struct QueryMetricEvent {
    /// Target container.
    pub container: String,
    /// Outcome classification.
    pub outcome: QueryOutcome,
    /// Error code for failures.
    pub error_code: Option<ErrorCode>,
    /// Upstream or synthesized status code.
    pub status: u16,
    /// Request units charged.
    pub request_charge: f64,
    /// Wall-clock latency.
    pub latency: Duration,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for query executions.
pub trait QueryMetrics: Send + Sync {
    /// Records a completed query.
    fn record_query(&self, event: QueryMetricEvent);
}

/// No-op metrics sink.
pub struct NoopMetrics;

impl QueryMetrics for NoopMetrics {
    fn record_query(&self, _event: QueryMetricEvent) {}
}

// ============================================================================
// SECTION: In-Memory Metrics
// ============================================================================

/// Process-local counters.
///
/// # Invariants
/// - `latency_buckets` has one slot per bound plus a trailing overflow slot.
#[derive(Debug)]
pub struct InMemoryMetrics {
    /// Total queries.
    total: AtomicU64,
    /// Successful queries.
    ok: AtomicU64,
    /// Failed queries.
    error: AtomicU64,
    /// Failures per error code, indexed like [`ErrorCode::ALL`].
    by_code: [AtomicU64; ErrorCode::ALL.len()],
    /// Sum of request charge stored as `f64` bits.
    request_charge_bits: AtomicU64,
    /// Latency histogram counts.
    latency_buckets: Vec<AtomicU64>,
}

impl Default for InMemoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            ok: AtomicU64::new(0),
            error: AtomicU64::new(0),
            by_code: std::array::from_fn(|_| AtomicU64::new(0)),
            request_charge_bits: AtomicU64::new(0.0_f64.to_bits()),
            latency_buckets: (0 ..= QUERY_LATENCY_BUCKETS_MS.len())
                .map(|_| AtomicU64::new(0))
                .collect(),
        }
    }

    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let by_error_code = ErrorCode::ALL
            .iter()
            .zip(&self.by_code)
            .map(|(code, count)| (code.as_str().to_string(), count.load(Ordering::Relaxed)))
            .collect();
        let mut buckets: Vec<LatencyBucket> = QUERY_LATENCY_BUCKETS_MS
            .iter()
            .zip(&self.latency_buckets)
            .map(|(bound, count)| LatencyBucket {
                le: bound.to_string(),
                count: count.load(Ordering::Relaxed),
            })
            .collect();
        if let Some(overflow) = self.latency_buckets.last() {
            buckets.push(LatencyBucket {
                le: "+Inf".to_string(),
                count: overflow.load(Ordering::Relaxed),
            });
        }
        MetricsSnapshot {
            queries: QueryCounts {
                total: self.total.load(Ordering::Relaxed),
                ok: self.ok.load(Ordering::Relaxed),
                error: self.error.load(Ordering::Relaxed),
                by_error_code,
            },
            request_charge_total: f64::from_bits(self.request_charge_bits.load(Ordering::Relaxed)),
            latency_ms: buckets,
        }
    }

    /// Adds a request charge to the running total.
    fn add_request_charge(&self, charge: f64) {
        if !charge.is_finite() || charge <= 0.0 {
            return;
        }
        let _ = self.request_charge_bits.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            Some((f64::from_bits(bits) + charge).to_bits())
        });
    }
}

impl QueryMetrics for InMemoryMetrics {
    fn record_query(&self, event: QueryMetricEvent) {
        self.total.fetch_add(1, Ordering::Relaxed);
        match event.outcome {
            QueryOutcome::Ok => self.ok.fetch_add(1, Ordering::Relaxed),
            QueryOutcome::Error => self.error.fetch_add(1, Ordering::Relaxed),
        };
        if let Some(code) = event.error_code
            && let Some(index) = ErrorCode::ALL.iter().position(|known| *known == code)
            && let Some(counter) = self.by_code.get(index)
        {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        self.add_request_charge(event.request_charge);
        let millis = u64::try_from(event.latency.as_millis()).unwrap_or(u64::MAX);
        let slot = QUERY_LATENCY_BUCKETS_MS
            .iter()
            .position(|bound| millis <= *bound)
            .unwrap_or(QUERY_LATENCY_BUCKETS_MS.len());
        if let Some(bucket) = self.latency_buckets.get(slot) {
            bucket.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Serialized view of [`InMemoryMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Query counters.
    pub queries: QueryCounts,
    /// Total request units consumed.
    pub request_charge_total: f64,
    /// Latency histogram, one entry per bucket bound.
    pub latency_ms: Vec<LatencyBucket>,
}

/// Query outcome counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCounts {
    /// Total queries.
    pub total: u64,
    /// Successful queries.
    pub ok: u64,
    /// Failed queries.
    pub error: u64,
    /// Failures per error code label.
    pub by_error_code: BTreeMap<String, u64>,
}

/// Non-cumulative histogram bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencyBucket {
    /// Inclusive upper bound in milliseconds, or `+Inf`.
    pub le: String,
    /// Observations in this bucket.
    pub count: u64,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

    use std::time::Duration;

    use cosmos_sidecar_core::ErrorCode;

    use super::InMemoryMetrics;
    use super::QueryMetricEvent;
    use super::QueryMetrics;
    use super::QueryOutcome;

    fn event(outcome: QueryOutcome, code: Option<ErrorCode>, ru: f64, ms: u64) -> QueryMetricEvent {
        QueryMetricEvent {
            container: "orders".to_string(),
            outcome,
            error_code: code,
            status: 200,
            request_charge: ru,
            latency: Duration::from_millis(ms),
        }
    }

    #[test]
    fn counts_outcomes_codes_and_request_charge() {
        let metrics = InMemoryMetrics::new();
        metrics.record_query(event(QueryOutcome::Ok, None, 2.5, 3));
        metrics.record_query(event(QueryOutcome::Ok, None, 1.5, 3));
        metrics.record_query(event(QueryOutcome::Error, Some(ErrorCode::Throttled), 0.0, 3));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.queries.total, 3);
        assert_eq!(snapshot.queries.ok, 2);
        assert_eq!(snapshot.queries.error, 1);
        assert_eq!(snapshot.queries.by_error_code["Throttled"], 1);
        assert_eq!(snapshot.queries.by_error_code["NotFound"], 0);
        assert!((snapshot.request_charge_total - 4.0).abs() < 1e-9);
    }

    #[test]
    fn latency_lands_in_inclusive_bucket_or_overflow() {
        let metrics = InMemoryMetrics::new();
        metrics.record_query(event(QueryOutcome::Ok, None, 0.0, 5));
        metrics.record_query(event(QueryOutcome::Ok, None, 0.0, 6));
        metrics.record_query(event(QueryOutcome::Ok, None, 0.0, 60_000));
        let snapshot = metrics.snapshot();
        let count = |le: &str| {
            snapshot.latency_ms.iter().find(|bucket| bucket.le == le).map(|b| b.count).unwrap()
        };
        assert_eq!(count("5"), 1);
        assert_eq!(count("10"), 1);
        assert_eq!(count("+Inf"), 1);
        assert_eq!(snapshot.latency_ms.len(), 15);
    }
}
