// crates/cosmos-sidecar-client/src/client.rs
// ============================================================================
// Module: Cosmos Gateway Client
// Description: Executes one page of a SQL query over the REST gateway.
// Purpose: Build signed query requests and decode documents plus diagnostics.
// Dependencies: reqwest, serde_json, time, tracing
// ============================================================================

//! ## Overview
//! [`CosmosClient`] posts a [`SqlQuerySpec`] to
//! `{endpoint}/dbs/{database}/colls/{container}/docs` and returns the single
//! page Cosmos DB answers with. Paging is driven by the caller through the
//! continuation token; the client never follows continuations on its own.
//! Queries scoped by partition key send `x-ms-documentdb-partitionkey`;
//! all other queries opt into cross-partition execution.
//!
//! Security posture: response bodies are read with a hard byte limit and
//! redirects are never followed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use cosmos_sidecar_config::ConnectionMode;
use cosmos_sidecar_config::CosmosConfig;
use cosmos_sidecar_core::PageOptions;
use cosmos_sidecar_core::SqlQuerySpec;
use cosmos_sidecar_core::model::UNAVAILABLE_ACTIVITY_ID;
use reqwest::Client;
use reqwest::header::ACCEPT;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;
use tracing::warn;
use url::Url;

use crate::auth::Credential;
use crate::auth::rfc1123_date;
use crate::error::CosmosError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// REST API version sent with every request.
pub const API_VERSION: &str = "2018-12-31";
/// Maximum accepted response body size in bytes.
pub const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;
/// Content type for query bodies.
const QUERY_CONTENT_TYPE: &str = "application/query+json";
/// Resource type for document queries.
const RESOURCE_TYPE_DOCS: &str = "docs";

/// Request header names.
const HEADER_DATE: &str = "x-ms-date";
const HEADER_VERSION: &str = "x-ms-version";
const HEADER_IS_QUERY: &str = "x-ms-documentdb-isquery";
const HEADER_MAX_ITEM_COUNT: &str = "x-ms-max-item-count";
const HEADER_CONTINUATION: &str = "x-ms-continuation";
const HEADER_PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
const HEADER_CROSS_PARTITION: &str = "x-ms-documentdb-query-enablecrosspartition";

/// Response header names.
const HEADER_REQUEST_CHARGE: &str = "x-ms-request-charge";
const HEADER_ACTIVITY_ID: &str = "x-ms-activity-id";
const HEADER_SUB_STATUS: &str = "x-ms-substatus";
const HEADER_RETRY_AFTER_MS: &str = "x-ms-retry-after-ms";

// ============================================================================
// SECTION: Types
// ============================================================================

/// One page of query results with its diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    /// Documents returned in this page.
    pub documents: Vec<Value>,
    /// Request units charged.
    pub request_charge: f64,
    /// Activity identifier for support correlation.
    pub activity_id: String,
    /// Continuation token for the next page, if any.
    pub continuation: Option<String>,
    /// HTTP status code.
    pub status: u16,
    /// Cosmos DB sub-status code.
    pub sub_status: u32,
}

/// Executes single query pages against a container.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Runs one page of `spec` against `container`.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError`] when the request fails or Cosmos DB rejects it.
    async fn query_page(
        &self,
        container: &str,
        spec: &SqlQuerySpec,
        options: &PageOptions,
        timeout: Option<Duration>,
    ) -> Result<QueryPage, CosmosError>;
}

/// Successful query response body.
#[derive(Deserialize)]
struct DocumentsBody {
    /// Returned documents.
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

/// Error response body.
#[derive(Deserialize)]
struct ErrorBody {
    /// Service error message.
    #[serde(default)]
    message: Option<String>,
}

/// Diagnostic headers common to every response.
struct ResponseDiagnostics {
    /// Request units charged.
    request_charge: f64,
    /// Activity identifier.
    activity_id: String,
    /// Continuation token.
    continuation: Option<String>,
    /// Sub-status code.
    sub_status: u32,
    /// Suggested retry delay.
    retry_after: Option<Duration>,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Cosmos DB REST gateway client.
#[derive(Debug, Clone)]
pub struct CosmosClient {
    /// Shared HTTP client.
    http: Client,
    /// Account endpoint.
    endpoint: Url,
    /// Database identifier.
    database: String,
    /// Request credential.
    credential: Credential,
}

impl CosmosClient {
    /// Builds a client and credential from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError`] when the endpoint, key, or token source is
    /// unusable.
    pub fn from_config(config: &CosmosConfig) -> Result<Self, CosmosError> {
        let http = build_http_client(config)?;
        let credential = Credential::from_config(config, &http)?;
        Self::assemble(config, http, credential)
    }

    /// Builds a client that uses an explicit credential.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError`] when the endpoint is unusable.
    pub fn with_credential(
        config: &CosmosConfig,
        credential: Credential,
    ) -> Result<Self, CosmosError> {
        let http = build_http_client(config)?;
        Self::assemble(config, http, credential)
    }

    /// Finishes construction once the HTTP client and credential exist.
    fn assemble(
        config: &CosmosConfig,
        http: Client,
        credential: Credential,
    ) -> Result<Self, CosmosError> {
        let endpoint = config.endpoint_url().map_err(|err| CosmosError::Config(err.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(CosmosError::Config("endpoint cannot be a base url".to_string()));
        }
        if config.connection.mode == ConnectionMode::Direct {
            warn!(
                connection_mode = config.connection.mode.as_str(),
                "direct connectivity is not supported; using gateway mode"
            );
        }
        Ok(Self {
            http,
            endpoint,
            database: config.database.clone(),
            credential,
        })
    }

    /// Returns the configured database identifier.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the configured account endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the document feed URL for a container.
    fn docs_url(&self, container: &str) -> Result<Url, CosmosError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| CosmosError::Config("endpoint cannot be a base url".to_string()))?
            .pop_if_empty()
            .extend(["dbs", self.database.as_str(), "colls", container, RESOURCE_TYPE_DOCS]);
        Ok(url)
    }

    /// Builds the signed header set for one query page.
    async fn query_headers(
        &self,
        resource_link: &str,
        options: &PageOptions,
    ) -> Result<HeaderMap, CosmosError> {
        let date = rfc1123_date(OffsetDateTime::now_utc());
        let authorization = self
            .credential
            .authorization("post", RESOURCE_TYPE_DOCS, resource_link, &date)
            .await?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&authorization, "authorization")?);
        headers.insert(HeaderName::from_static(HEADER_DATE), header_value(&date, HEADER_DATE)?);
        headers.insert(HeaderName::from_static(HEADER_VERSION), HeaderValue::from_static(API_VERSION));
        headers.insert(HeaderName::from_static(HEADER_IS_QUERY), HeaderValue::from_static("True"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(QUERY_CONTENT_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(count) = options.max_item_count {
            headers.insert(HeaderName::from_static(HEADER_MAX_ITEM_COUNT), HeaderValue::from(count));
        }
        if let Some(token) = &options.continuation {
            headers.insert(
                HeaderName::from_static(HEADER_CONTINUATION),
                header_value(token, HEADER_CONTINUATION)?,
            );
        }
        match &options.partition_key {
            Some(key) => {
                headers.insert(
                    HeaderName::from_static(HEADER_PARTITION_KEY),
                    header_value(&partition_key_header(key), HEADER_PARTITION_KEY)?,
                );
            }
            None => {
                headers.insert(
                    HeaderName::from_static(HEADER_CROSS_PARTITION),
                    HeaderValue::from_static("True"),
                );
            }
        }
        Ok(headers)
    }
}

#[async_trait]
impl QueryBackend for CosmosClient {
    async fn query_page(
        &self,
        container: &str,
        spec: &SqlQuerySpec,
        options: &PageOptions,
        timeout: Option<Duration>,
    ) -> Result<QueryPage, CosmosError> {
        let resource_link = format!("dbs/{}/colls/{container}", self.database);
        let url = self.docs_url(container)?;
        let headers = self.query_headers(&resource_link, options).await?;
        let body = serde_json::to_vec(spec).map_err(|err| CosmosError::Decode(err.to_string()))?;
        let mut request = self.http.post(url).headers(headers).body(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(|err| CosmosError::from_reqwest(&err))?;
        let status = response.status().as_u16();
        let diagnostics = read_diagnostics(response.headers());
        let success = (200 ..= 299).contains(&status);
        let body = match read_response_body_with_limit(response, MAX_RESPONSE_BYTES).await {
            Ok(body) => body,
            Err(err) if !success => {
                warn!(status = status, error = %err, "cosmos error body unreadable");
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        debug!(
            container = container,
            status = status,
            request_charge = diagnostics.request_charge,
            activity_id = %diagnostics.activity_id,
            "cosmos query page completed"
        );
        if !success {
            return Err(CosmosError::Service {
                status,
                sub_status: diagnostics.sub_status,
                activity_id: diagnostics.activity_id,
                request_charge: diagnostics.request_charge,
                retry_after: diagnostics.retry_after,
                message: error_message(status, &body),
            });
        }
        let page: DocumentsBody = serde_json::from_slice(&body)
            .map_err(|err| CosmosError::Decode(format!("invalid query response: {err}")))?;
        Ok(QueryPage {
            documents: page.documents,
            request_charge: diagnostics.request_charge,
            activity_id: diagnostics.activity_id,
            continuation: diagnostics.continuation,
            status,
            sub_status: diagnostics.sub_status,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the pooled HTTP client for the account.
fn build_http_client(config: &CosmosConfig) -> Result<Client, CosmosError> {
    Client::builder()
        .timeout(config.request_timeout())
        .pool_max_idle_per_host(config.connection.max_connections)
        .redirect(Policy::none())
        .build()
        .map_err(|err| CosmosError::Config(err.to_string()))
}

/// Converts a string into a header value.
fn header_value(value: &str, name: &str) -> Result<HeaderValue, CosmosError> {
    HeaderValue::from_str(value).map_err(|_| CosmosError::Config(format!("invalid {name} header")))
}

/// Renders a partition key as the JSON array header value.
///
/// Non-ASCII characters are escaped as `\uXXXX` so the value stays a legal
/// header.
pub(crate) fn partition_key_header(key: &str) -> String {
    let json = serde_json::to_string(&[key]).unwrap_or_else(|_| "[]".to_string());
    let mut escaped = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() {
            escaped.push(ch);
        } else {
            let mut units = [0_u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                let _ = write!(escaped, "\\u{unit:04x}");
            }
        }
    }
    escaped
}

/// Extracts diagnostic headers, defaulting absent values.
fn read_diagnostics(headers: &HeaderMap) -> ResponseDiagnostics {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    ResponseDiagnostics {
        request_charge: text(HEADER_REQUEST_CHARGE)
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .unwrap_or(0.0),
        activity_id: text(HEADER_ACTIVITY_ID).unwrap_or(UNAVAILABLE_ACTIVITY_ID).to_string(),
        continuation: text(HEADER_CONTINUATION).map(str::to_string),
        sub_status: text(HEADER_SUB_STATUS).and_then(|value| value.parse().ok()).unwrap_or(0),
        retry_after: text(HEADER_RETRY_AFTER_MS)
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite() && *value >= 0.0)
            .and_then(|value| Duration::try_from_secs_f64(value / 1000.0).ok()),
    }
}

/// Picks the message reported for a failed response.
fn error_message(status: u16, body: &[u8]) -> String {
    if let Ok(ErrorBody {
        message: Some(message),
    }) = serde_json::from_slice::<ErrorBody>(body)
        && !message.trim().is_empty()
    {
        return message;
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown status");
        reason.to_string()
    } else {
        text.to_string()
    }
}

/// Reads a response body while enforcing a hard byte limit.
pub(crate) async fn read_response_body_with_limit(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, CosmosError> {
    let mut body = Vec::new();
    let mut total: usize = 0;
    while let Some(chunk) = response.chunk().await.map_err(|err| CosmosError::from_reqwest(&err))? {
        let next_total = total
            .checked_add(chunk.len())
            .ok_or_else(|| CosmosError::Decode("response size overflow".to_string()))?;
        if next_total > limit {
            return Err(CosmosError::Decode(format!(
                "response exceeds {limit} bytes (read {next_total})"
            )));
        }
        body.extend_from_slice(&chunk);
        total = next_total;
    }
    Ok(body)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
