// crates/cosmos-sidecar-client/tests/gateway_client.rs
// ============================================================================
// Module: Gateway Client Tests
// Description: Exercises the REST client against an in-process fake gateway.
// Purpose: Verify request headers, body shape, and response decoding.
// Dependencies: cosmos-sidecar-client, axum, tokio
// ============================================================================

//! ## Overview
//! A small axum router stands in for the Cosmos DB gateway. It records every
//! request it sees and replies with a canned status, headers, and body.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use cosmos_sidecar_client::CosmosClient;
use cosmos_sidecar_client::CosmosError;
use cosmos_sidecar_client::Credential;
use cosmos_sidecar_client::QueryBackend;
use cosmos_sidecar_client::client::MAX_RESPONSE_BYTES;
use cosmos_sidecar_config::CosmosConfig;
use cosmos_sidecar_core::PageOptions;
use cosmos_sidecar_core::QueryRequest;
use cosmos_sidecar_core::build_query_spec;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;

// ============================================================================
// SECTION: Fake Gateway
// ============================================================================

const EMULATOR_KEY: &str =
    "C2y6yDjf5/R+ob0N8A7Cgv30VRDJIWEHLM+4QDU5DE2nQ9nDuVTqobD4b8mGGyPMbIZnqyMsEcaGQy67XIw/Jw==";

/// Request observed by the fake gateway.
#[derive(Clone)]
struct Captured {
    database: String,
    container: String,
    headers: HeaderMap,
    body: Value,
}

/// Canned reply and request log.
struct Gateway {
    status: StatusCode,
    headers: Vec<(&'static str, &'static str)>,
    body: String,
    delay: Option<Duration>,
    seen: Mutex<Vec<Captured>>,
}

impl Gateway {
    fn replying(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
            delay: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    fn with_raw_body(mut self, body: String) -> Self {
        self.body = body;
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn last(&self) -> Captured {
        self.seen.lock().unwrap().last().cloned().expect("request captured")
    }
}

async fn docs(
    State(gateway): State<Arc<Gateway>>,
    Path((database, container)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    gateway.seen.lock().unwrap().push(Captured {
        database,
        container,
        headers,
        body,
    });
    if let Some(delay) = gateway.delay {
        tokio::time::sleep(delay).await;
    }
    let mut response = (gateway.status, gateway.body.clone()).into_response();
    for (name, value) in &gateway.headers {
        response.headers_mut().insert(*name, value.parse().unwrap());
    }
    response
}

async fn spawn_gateway(gateway: Gateway) -> (Arc<Gateway>, CosmosClient) {
    let gateway = Arc::new(gateway);
    let router =
        Router::new().route("/dbs/{db}/colls/{container}/docs", post(docs)).with_state(gateway.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    let config = CosmosConfig {
        endpoint: format!("http://{addr}/"),
        key: Some(EMULATOR_KEY.to_string()),
        database: "app".to_string(),
        allow_http: true,
        ..CosmosConfig::default()
    };
    let client = CosmosClient::from_config(&config).expect("client");
    (gateway, client)
}

fn header<'a>(captured: &'a Captured, name: &str) -> Option<&'a str> {
    captured.headers.get(name).and_then(|value| value.to_str().ok())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn query_page_sends_signed_cross_partition_query() {
    let (gateway, client) = spawn_gateway(
        Gateway::replying(StatusCode::OK, json!({"Documents": [{"id": "1"}], "_count": 1}))
            .with_header("x-ms-request-charge", "2.5")
            .with_header("x-ms-activity-id", "act-1")
            .with_header("x-ms-continuation", "next-page"),
    )
    .await;
    let request = QueryRequest::new("SELECT * FROM c WHERE c.userId = @userId")
        .with_param("userId", json!("u-001"));
    let spec = build_query_spec(&request).unwrap();
    let page = client
        .query_page("orders", &spec, &PageOptions::from_parts(None, Some(10), None), None)
        .await
        .expect("page");

    assert_eq!(page.documents, vec![json!({"id": "1"})]);
    assert!((page.request_charge - 2.5).abs() < 1e-9);
    assert_eq!(page.activity_id, "act-1");
    assert_eq!(page.continuation.as_deref(), Some("next-page"));
    assert_eq!(page.status, 200);

    let captured = gateway.last();
    assert_eq!(captured.database, "app");
    assert_eq!(captured.container, "orders");
    assert_eq!(
        captured.body,
        json!({
            "query": "SELECT * FROM c WHERE c.userId = @userId",
            "parameters": [{"name": "@userId", "value": "u-001"}]
        })
    );
    assert_eq!(header(&captured, "x-ms-documentdb-isquery"), Some("True"));
    assert_eq!(header(&captured, "content-type"), Some("application/query+json"));
    assert_eq!(header(&captured, "x-ms-version"), Some("2018-12-31"));
    assert_eq!(header(&captured, "x-ms-max-item-count"), Some("10"));
    assert_eq!(header(&captured, "x-ms-documentdb-query-enablecrosspartition"), Some("True"));
    assert!(header(&captured, "x-ms-documentdb-partitionkey").is_none());
    assert!(header(&captured, "x-ms-date").is_some_and(|date| date.ends_with(" GMT")));
    assert!(
        header(&captured, "authorization")
            .is_some_and(|auth| auth.starts_with("type%3Dmaster%26ver%3D1.0%26sig%3D"))
    );
}

#[tokio::test]
async fn query_page_scopes_partition_and_forwards_continuation() {
    let (gateway, client) =
        spawn_gateway(Gateway::replying(StatusCode::OK, json!({"Documents": []}))).await;
    let spec = build_query_spec(&QueryRequest::new("SELECT * FROM c")).unwrap();
    let options =
        PageOptions::from_parts(Some("u-001".to_string()), None, Some("tok-1".to_string()));
    let page = client.query_page("orders", &spec, &options, None).await.expect("page");

    assert!(page.documents.is_empty());
    assert!(page.continuation.is_none());
    assert_eq!(page.activity_id, "N/A");
    let captured = gateway.last();
    assert_eq!(header(&captured, "x-ms-documentdb-partitionkey"), Some(r#"["u-001"]"#));
    assert_eq!(header(&captured, "x-ms-continuation"), Some("tok-1"));
    assert!(header(&captured, "x-ms-documentdb-query-enablecrosspartition").is_none());
    assert!(header(&captured, "x-ms-max-item-count").is_none());
}

#[tokio::test]
async fn query_page_maps_service_errors() {
    let (_gateway, client) = spawn_gateway(
        Gateway::replying(
            StatusCode::TOO_MANY_REQUESTS,
            json!({"code": "TooManyRequests", "message": "Request rate is large"}),
        )
        .with_header("x-ms-request-charge", "0.4")
        .with_header("x-ms-activity-id", "act-429")
        .with_header("x-ms-substatus", "3200")
        .with_header("x-ms-retry-after-ms", "250"),
    )
    .await;
    let spec = build_query_spec(&QueryRequest::new("SELECT * FROM c")).unwrap();
    let err = client
        .query_page("orders", &spec, &PageOptions::default(), None)
        .await
        .expect_err("throttled");
    let CosmosError::Service {
        status,
        sub_status,
        activity_id,
        request_charge,
        retry_after,
        message,
    } = err
    else {
        panic!("expected service error, got {err:?}");
    };
    assert_eq!(status, 429);
    assert_eq!(sub_status, 3200);
    assert_eq!(activity_id, "act-429");
    assert!((request_charge - 0.4).abs() < 1e-9);
    assert_eq!(retry_after, Some(Duration::from_millis(250)));
    assert_eq!(message, "Request rate is large");
}

#[tokio::test]
async fn oversized_error_body_keeps_service_diagnostics() {
    let (_gateway, client) = spawn_gateway(
        Gateway::replying(StatusCode::TOO_MANY_REQUESTS, Value::Null)
            .with_raw_body("x".repeat(MAX_RESPONSE_BYTES + 1024))
            .with_header("x-ms-activity-id", "act-big")
            .with_header("x-ms-substatus", "3200")
            .with_header("x-ms-retry-after-ms", "5000"),
    )
    .await;
    let spec = build_query_spec(&QueryRequest::new("SELECT * FROM c")).unwrap();
    let err = client
        .query_page("orders", &spec, &PageOptions::default(), None)
        .await
        .expect_err("throttled");
    let CosmosError::Service {
        status,
        sub_status,
        activity_id,
        retry_after,
        message,
        ..
    } = err
    else {
        panic!("expected service error, got {err:?}");
    };
    assert_eq!(status, 429);
    assert_eq!(sub_status, 3200);
    assert_eq!(activity_id, "act-big");
    assert_eq!(retry_after, Some(Duration::from_millis(5000)));
    assert_eq!(message, "Too Many Requests");
}

#[tokio::test]
async fn query_page_honours_per_request_timeout() {
    let (_gateway, client) = spawn_gateway(
        Gateway::replying(StatusCode::OK, json!({"Documents": []}))
            .with_delay(Duration::from_secs(2)),
    )
    .await;
    let spec = build_query_spec(&QueryRequest::new("SELECT * FROM c")).unwrap();
    let err = client
        .query_page("orders", &spec, &PageOptions::default(), Some(Duration::from_millis(100)))
        .await
        .expect_err("timeout");
    assert!(matches!(err, CosmosError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn query_page_rejects_malformed_success_body() {
    let (_gateway, client) =
        spawn_gateway(Gateway::replying(StatusCode::OK, json!(["not", "an", "object"]))).await;
    let spec = build_query_spec(&QueryRequest::new("SELECT * FROM c")).unwrap();
    let err = client
        .query_page("orders", &spec, &PageOptions::default(), None)
        .await
        .expect_err("decode");
    assert!(matches!(err, CosmosError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn explicit_credential_is_used_for_signing() {
    let (gateway, default_client) =
        spawn_gateway(Gateway::replying(StatusCode::OK, json!({"Documents": []}))).await;
    let config = CosmosConfig {
        endpoint: default_client.endpoint().to_string(),
        database: "app".to_string(),
        allow_http: true,
        ..CosmosConfig::default()
    };
    let client =
        CosmosClient::with_credential(&config, Credential::master_key(EMULATOR_KEY).unwrap())
            .expect("client");
    assert_eq!(client.database(), "app");
    let spec = build_query_spec(&QueryRequest::new("SELECT * FROM c")).unwrap();
    client.query_page("orders", &spec, &PageOptions::default(), None).await.expect("page");
    let captured = gateway.last();
    assert!(
        header(&captured, "authorization")
            .is_some_and(|auth| auth.starts_with("type%3Dmaster%26ver%3D1.0%26sig%3D"))
    );
}
