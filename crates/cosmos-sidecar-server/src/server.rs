// crates/cosmos-sidecar-server/src/server.rs
// ============================================================================
// Module: HTTP Server
// Description: axum router for the query, actuator, and OpenAPI endpoints.
// Purpose: Translate HTTP requests into query executions and back.
// Dependencies: axum, tokio, tracing, url
// ============================================================================

//! ## Overview
//! `POST /cosmos/v1/query/{container}` reads paging options from the query
//! string (`pk`, `maxItemCount`, `ct`), an optional upstream deadline from
//! `X-Timeout-Ms`, and a [`QueryRequest`] body. Every response is a
//! [`QueryResponse`] envelope; Cosmos DB diagnostics are mirrored into
//! `X-Cosmos-*` headers and each response carries `X-Server-Correlation-Id`.
//!
//! Security posture: bodies are bounded by `server.max_body_bytes`, in-flight
//! requests by `server.max_inflight`, and caller request IDs are sanitized
//! before being echoed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::Path;
use axum::extract::RawQuery;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONTENT_LENGTH;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use cosmos_sidecar_client::CosmosClient;
use cosmos_sidecar_client::QueryBackend;
use cosmos_sidecar_config::SidecarConfig;
use cosmos_sidecar_core::CosmosMetadata;
use cosmos_sidecar_core::ErrorCode;
use cosmos_sidecar_core::ErrorInfo;
use cosmos_sidecar_core::PageOptions;
use cosmos_sidecar_core::QueryRequest;
use cosmos_sidecar_core::QueryResponse;
use cosmos_sidecar_core::http_status_for;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::Instrument;
use tracing::debug;
use tracing::info;
use tracing::info_span;
use tracing::warn;
use url::form_urlencoded;

use crate::actuator;
use crate::actuator::AppInfo;
use crate::correlation::CorrelationIdGenerator;
use crate::correlation::REQUEST_ID_HEADER;
use crate::correlation::SERVER_CORRELATION_HEADER;
use crate::correlation::sanitize_request_id;
use crate::openapi::openapi_document;
use crate::service::QueryService;
use crate::telemetry::InMemoryMetrics;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Query endpoint route.
pub const QUERY_ROUTE: &str = "/cosmos/v1/query/{container}";
/// OpenAPI document route.
pub const API_DOCS_ROUTE: &str = "/v3/api-docs";
/// Header bounding the upstream call in milliseconds.
pub const TIMEOUT_HEADER: &str = "x-timeout-ms";
/// Response header carrying the request charge.
pub const RU_HEADER: &str = "x-cosmos-ru";
/// Response header carrying the activity identifier.
pub const ACTIVITY_ID_HEADER: &str = "x-cosmos-activity-id";
/// Response header carrying the sub-status code.
pub const SUB_STATUS_HEADER: &str = "x-cosmos-substatus";
/// Response header carrying the suggested retry delay.
pub const RETRY_AFTER_HEADER: &str = "x-cosmos-retry-after-ms";

/// Query string parameter names.
const PARAM_PARTITION_KEY: &str = "pk";
const PARAM_MAX_ITEM_COUNT: &str = "maxItemCount";
const PARAM_CONTINUATION: &str = "ct";

// ============================================================================
// SECTION: Server
// ============================================================================

/// Sidecar HTTP server.
pub struct SidecarServer {
    /// Validated configuration.
    config: SidecarConfig,
    /// Shared handler state.
    state: Arc<ServerState>,
}

/// Shared state for request handlers.
pub(crate) struct ServerState {
    /// Query execution service.
    pub(crate) service: QueryService,
    /// Counters backing `/actuator/metrics`.
    pub(crate) metrics: Arc<InMemoryMetrics>,
    /// Server correlation ID generator.
    pub(crate) correlation: CorrelationIdGenerator,
    /// In-flight query permits.
    pub(crate) inflight: Arc<Semaphore>,
    /// Maximum request body size in bytes.
    pub(crate) max_body_bytes: usize,
    /// Payload for `/actuator/info`.
    pub(crate) info: AppInfo,
    /// Payload for `/v3/api-docs`.
    pub(crate) openapi: Value,
}

impl SidecarServer {
    /// Builds a server backed by the Cosmos DB gateway client.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the configuration is invalid or the client
    /// cannot be constructed.
    pub fn from_config(config: SidecarConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let client =
            CosmosClient::from_config(&config.cosmos).map_err(|err| ServerError::Init(err.to_string()))?;
        Ok(Self::with_backend(config, Arc::new(client)))
    }

    /// Builds a server around an arbitrary query backend.
    #[must_use]
    pub fn with_backend(config: SidecarConfig, backend: Arc<dyn QueryBackend>) -> Self {
        let metrics = Arc::new(InMemoryMetrics::new());
        let state = Arc::new(ServerState {
            service: QueryService::with_metrics(backend, metrics.clone()),
            metrics,
            correlation: CorrelationIdGenerator::default(),
            inflight: Arc::new(Semaphore::new(config.server.max_inflight.max(1))),
            max_body_bytes: config.server.max_body_bytes,
            info: AppInfo::from_config(&config.cosmos),
            openapi: openapi_document(&config.server.bind),
        });
        Self {
            config,
            state,
        }
    }

    /// Returns the axum router for this server.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route(QUERY_ROUTE, post(handle_query))
            .route("/actuator/health", get(actuator::health))
            .route("/actuator/info", get(actuator::info))
            .route("/actuator/metrics", get(actuator::metrics))
            .route(API_DOCS_ROUTE, get(api_docs))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr =
            self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when serving fails.
    pub async fn serve_listener(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let local = listener
            .local_addr()
            .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
        info!(
            addr = %local,
            endpoint = %self.state.info.cosmos.endpoint,
            database = %self.state.info.cosmos.database,
            "cosmos sidecar listening"
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))?;
        info!("cosmos sidecar stopped");
        Ok(())
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles `GET /v3/api-docs`.
async fn api_docs(State(state): State<Arc<ServerState>>) -> Json<Value> {
    Json(state.openapi.clone())
}

/// Handles `POST /cosmos/v1/query/{container}`.
async fn handle_query(
    State(state): State<Arc<ServerState>>,
    Path(container): Path<String>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let server_id = state.correlation.issue();
    let request_id = match sanitize_request_id(header_str(&headers, REQUEST_ID_HEADER)) {
        Ok(request_id) => request_id,
        Err(reason) => {
            debug!(reason = reason.label(), "dropping invalid request id");
            None
        }
    };
    let span = info_span!(
        "query",
        correlation_id = %server_id,
        request_id = request_id.as_deref().unwrap_or_default(),
        container = %container
    );
    let (status, response) =
        process_query(&state, &container, raw_query.as_deref(), &headers, body)
            .instrument(span)
            .await;
    render_response(status, &response, &server_id, request_id.as_deref())
}

/// Runs the request pipeline and picks the HTTP status.
async fn process_query(
    state: &ServerState,
    container: &str,
    raw_query: Option<&str>,
    headers: &HeaderMap,
    body: Body,
) -> (StatusCode, QueryResponse) {
    let Ok(_permit) = Arc::clone(&state.inflight).try_acquire_owned() else {
        warn!("in-flight limit reached");
        return reject(
            state,
            container,
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::UpstreamError,
            "too many in-flight requests".to_string(),
        );
    };
    let options = match parse_page_options(raw_query) {
        Ok(options) => options,
        Err(message) => {
            return reject(state, container, StatusCode::BAD_REQUEST, ErrorCode::BadRequest, message);
        }
    };
    let timeout = match parse_timeout(headers) {
        Ok(timeout) => timeout,
        Err(message) => {
            return reject(state, container, StatusCode::BAD_REQUEST, ErrorCode::BadRequest, message);
        }
    };
    let bytes = match read_body(headers, body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err((status, message)) => {
            return reject(state, container, status, ErrorCode::BadRequest, message);
        }
    };
    let request: QueryRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(err) => {
            return reject(
                state,
                container,
                StatusCode::BAD_REQUEST,
                ErrorCode::BadRequest,
                format!("invalid request body: {err}"),
            );
        }
    };
    let response = state.service.execute(container, &request, &options, timeout).await;
    let status =
        StatusCode::from_u16(http_status_for(&response)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, response)
}

/// Builds and records an HTTP-level rejection.
fn reject(
    state: &ServerState,
    container: &str,
    status: StatusCode,
    code: ErrorCode,
    message: String,
) -> (StatusCode, QueryResponse) {
    debug!(status = status.as_u16(), error_code = code.as_str(), "request rejected: {message}");
    let response = QueryResponse::failure(
        ErrorInfo::new(code, message),
        CosmosMetadata::unavailable(status.as_u16()),
    );
    state.service.record_rejection(container, &response, code);
    (status, response)
}

// ============================================================================
// SECTION: Request Parsing
// ============================================================================

/// Returns a header as text when present and visible ASCII.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Parses `pk`, `maxItemCount`, and `ct` from the query string.
fn parse_page_options(raw_query: Option<&str>) -> Result<PageOptions, String> {
    let mut partition_key = None;
    let mut max_item_count = None;
    let mut continuation = None;
    for (name, value) in form_urlencoded::parse(raw_query.unwrap_or_default().as_bytes()) {
        match name.as_ref() {
            PARAM_PARTITION_KEY if !value.is_empty() => partition_key = Some(value.into_owned()),
            PARAM_MAX_ITEM_COUNT if !value.trim().is_empty() => {
                let count = value
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| format!("{PARAM_MAX_ITEM_COUNT} must be an integer"))?;
                max_item_count = Some(count);
            }
            PARAM_CONTINUATION => continuation = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(PageOptions::from_parts(partition_key, max_item_count, continuation))
}

/// Parses the optional `X-Timeout-Ms` header.
fn parse_timeout(headers: &HeaderMap) -> Result<Option<Duration>, String> {
    let Some(value) = headers.get(TIMEOUT_HEADER) else {
        return Ok(None);
    };
    let millis = value
        .to_str()
        .ok()
        .and_then(|text| text.trim().parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .ok_or_else(|| "X-Timeout-Ms must be a positive integer".to_string())?;
    Ok(Some(Duration::from_millis(millis)))
}

/// Reads the request body under the configured byte limit.
async fn read_body(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<axum::body::Bytes, (StatusCode, String)> {
    let too_large =
        || (StatusCode::PAYLOAD_TOO_LARGE, format!("request body exceeds {limit} bytes"));
    let declared = header_str(headers, CONTENT_LENGTH.as_str())
        .and_then(|value| value.trim().parse::<u64>().ok());
    if declared.is_some_and(|length| length > u64::try_from(limit).unwrap_or(u64::MAX)) {
        return Err(too_large());
    }
    axum::body::to_bytes(body, limit).await.map_err(|_| too_large())
}

// ============================================================================
// SECTION: Response Rendering
// ============================================================================

/// Renders the envelope with diagnostic and correlation headers.
fn render_response(
    status: StatusCode,
    response: &QueryResponse,
    server_id: &str,
    request_id: Option<&str>,
) -> Response {
    let mut http = (status, Json(response)).into_response();
    let headers = http.headers_mut();
    if let Some(cosmos) = &response.cosmos {
        insert_header(headers, RU_HEADER, &cosmos.ru.to_string());
        insert_header(headers, ACTIVITY_ID_HEADER, &cosmos.activity_id);
        insert_header(headers, SUB_STATUS_HEADER, &cosmos.sub_status.to_string());
        if let Some(retry_after_ms) = cosmos.retry_after_ms {
            insert_header(headers, RETRY_AFTER_HEADER, &retry_after_ms.to_string());
        }
    }
    insert_header(headers, SERVER_CORRELATION_HEADER, server_id);
    if let Some(request_id) = request_id {
        insert_header(headers, REQUEST_ID_HEADER, request_id);
    }
    http
}

/// Inserts a header, skipping values that are not legal header text.
fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Sidecar server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
