// crates/cosmos-sidecar-server/src/service.rs
// ============================================================================
// Module: Query Service
// Description: Executes one query page and folds the outcome into an envelope.
// Purpose: Give every caller the same success/failure contract.
// Dependencies: cosmos-sidecar-client, cosmos-sidecar-core, tracing
// ============================================================================

//! ## Overview
//! [`QueryService::execute`] never fails. Validation problems, upstream
//! rejections, timeouts, and transport failures all become a
//! [`QueryResponse`] with `ok = false`, an [`ErrorCode`], and whatever Cosmos
//! DB diagnostics are available. Each execution emits one metric event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use cosmos_sidecar_client::CosmosError;
use cosmos_sidecar_client::QueryBackend;
use cosmos_sidecar_client::QueryPage;
use cosmos_sidecar_core::CosmosMetadata;
use cosmos_sidecar_core::ErrorCode;
use cosmos_sidecar_core::ErrorInfo;
use cosmos_sidecar_core::PageOptions;
use cosmos_sidecar_core::QueryData;
use cosmos_sidecar_core::QueryRequest;
use cosmos_sidecar_core::QueryResponse;
use cosmos_sidecar_core::build_query_spec;
use cosmos_sidecar_core::status::STATUS_INTERNAL_SERVER_ERROR;
use cosmos_sidecar_core::status::STATUS_OK;
use cosmos_sidecar_core::status::STATUS_REQUEST_TIMEOUT;
use cosmos_sidecar_core::validate_container_name;
use serde_json::Value;
use serde_json::json;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::telemetry::NoopMetrics;
use crate::telemetry::QueryMetricEvent;
use crate::telemetry::QueryMetrics;
use crate::telemetry::QueryOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Message used when an upstream failure carries no text.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

// ============================================================================
// SECTION: Service
// ============================================================================

/// Query execution service shared by the HTTP layer and the CLI.
#[derive(Clone)]
pub struct QueryService {
    /// Cosmos DB page executor.
    backend: Arc<dyn QueryBackend>,
    /// Metrics sink.
    metrics: Arc<dyn QueryMetrics>,
}

impl QueryService {
    /// Creates a service that discards metrics.
    #[must_use]
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self::with_metrics(backend, Arc::new(NoopMetrics))
    }

    /// Creates a service reporting to the given metrics sink.
    #[must_use]
    pub fn with_metrics(backend: Arc<dyn QueryBackend>, metrics: Arc<dyn QueryMetrics>) -> Self {
        Self {
            backend,
            metrics,
        }
    }

    /// Executes one page of `request` against `container`.
    pub async fn execute(
        &self,
        container: &str,
        request: &QueryRequest,
        options: &PageOptions,
        timeout: Option<Duration>,
    ) -> QueryResponse {
        let started = Instant::now();
        let (response, code) = self.run(container, request, options, timeout).await;
        self.record(container, &response, code, started.elapsed());
        response
    }

    /// Records a response produced outside [`Self::execute`], such as an
    /// HTTP-level rejection.
    pub fn record_rejection(&self, container: &str, response: &QueryResponse, code: ErrorCode) {
        self.record(container, response, Some(code), Duration::ZERO);
    }

    /// Validates, executes, and maps the result.
    async fn run(
        &self,
        container: &str,
        request: &QueryRequest,
        options: &PageOptions,
        timeout: Option<Duration>,
    ) -> (QueryResponse, Option<ErrorCode>) {
        let spec = match validate_container_name(container).and_then(|()| build_query_spec(request))
        {
            Ok(spec) => spec,
            Err(err) => {
                warn!(container = container, error = %err, "query rejected");
                return (
                    QueryResponse::rejected(ErrorCode::BadRequest, err.to_string()),
                    Some(ErrorCode::BadRequest),
                );
            }
        };
        debug!(
            container = container,
            sql = %spec.query,
            params = ?spec.parameters.iter().map(|param| param.name.as_str()).collect::<Vec<_>>(),
            partition_key = ?options.partition_key,
            max_item_count = ?options.max_item_count,
            "executing query"
        );
        match self.backend.query_page(container, &spec, options, timeout).await {
            Ok(page) => (success_response(container, page), None),
            Err(err) => {
                let (response, code) = failure_response(container, err);
                (response, Some(code))
            }
        }
    }

    /// Emits the metric event for one response.
    fn record(
        &self,
        container: &str,
        response: &QueryResponse,
        code: Option<ErrorCode>,
        latency: Duration,
    ) {
        let (status, request_charge) = response
            .cosmos
            .as_ref()
            .map_or((STATUS_INTERNAL_SERVER_ERROR, 0.0), |cosmos| (cosmos.status_code, cosmos.ru));
        self.metrics.record_query(QueryMetricEvent {
            container: container.to_string(),
            outcome: if response.ok { QueryOutcome::Ok } else { QueryOutcome::Error },
            error_code: code,
            status,
            request_charge,
            latency,
        });
    }
}

// ============================================================================
// SECTION: Envelope Mapping
// ============================================================================

/// Builds the success envelope for a page.
fn success_response(container: &str, page: QueryPage) -> QueryResponse {
    let data = QueryData::new(page.documents, page.continuation);
    info!(
        container = container,
        count = data.count,
        request_charge = page.request_charge,
        activity_id = %page.activity_id,
        has_more = data.continuation_token.is_some(),
        "query succeeded"
    );
    QueryResponse::success(
        data,
        CosmosMetadata {
            ru: page.request_charge,
            status_code: STATUS_OK,
            activity_id: page.activity_id,
            sub_status: 0,
            retry_after_ms: None,
        },
    )
}

/// Builds the failure envelope for a client error.
fn failure_response(container: &str, err: CosmosError) -> (QueryResponse, ErrorCode) {
    match err {
        CosmosError::Service {
            status,
            sub_status,
            activity_id,
            request_charge,
            retry_after,
            message,
        } => {
            let code = ErrorCode::from_status(status);
            let retry_after_ms =
                retry_after.map(|delay| u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
            error!(
                container = container,
                status = status,
                sub_status = sub_status,
                activity_id = %activity_id,
                error_code = code.as_str(),
                "query failed: {message}"
            );
            let mut details = BTreeMap::<String, Value>::new();
            details.insert("activityId".to_string(), json!(activity_id));
            details.insert("subStatus".to_string(), json!(sub_status));
            if let Some(ms) = retry_after_ms {
                details.insert("retryAfterMs".to_string(), json!(ms));
            }
            let response = QueryResponse::failure(
                ErrorInfo::new(code, message).with_details(details),
                CosmosMetadata {
                    ru: request_charge,
                    status_code: status,
                    activity_id,
                    sub_status,
                    retry_after_ms,
                },
            );
            (response, code)
        }
        CosmosError::Timeout(message) => {
            error!(container = container, error = %message, "query timed out");
            let response = QueryResponse::failure(
                ErrorInfo::new(ErrorCode::Timeout, format!("request timed out: {message}")),
                CosmosMetadata::unavailable(STATUS_REQUEST_TIMEOUT),
            );
            (response, ErrorCode::Timeout)
        }
        CosmosError::Transport(message)
        | CosmosError::Decode(message)
        | CosmosError::Credential(message)
        | CosmosError::Config(message) => {
            error!(container = container, error = %message, "query failed before reaching cosmos");
            let message =
                if message.trim().is_empty() { INTERNAL_ERROR_MESSAGE.to_string() } else { message };
            let response = QueryResponse::failure(
                ErrorInfo::new(ErrorCode::UpstreamError, message),
                CosmosMetadata::unavailable(STATUS_INTERNAL_SERVER_ERROR),
            );
            (response, ErrorCode::UpstreamError)
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
