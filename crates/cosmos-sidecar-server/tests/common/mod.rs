// crates/cosmos-sidecar-server/tests/common/mod.rs
// ============================================================================
// Module: Server Test Helpers
// Description: Fake query backends and an in-process server launcher.
// Purpose: Drive the HTTP surface without a Cosmos DB account.
// Dependencies: cosmos-sidecar-server, async-trait, tokio
// ============================================================================

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Shared test helpers; not every suite uses every helper."
)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cosmos_sidecar_client::CosmosError;
use cosmos_sidecar_client::QueryBackend;
use cosmos_sidecar_client::QueryPage;
use cosmos_sidecar_config::SidecarConfig;
use cosmos_sidecar_core::PageOptions;
use cosmos_sidecar_core::SqlQuerySpec;
use cosmos_sidecar_server::SidecarServer;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Reply produced by a [`FakeBackend`].
pub type Reply = Box<dyn Fn() -> Result<QueryPage, CosmosError> + Send + Sync>;

/// Call observed by a [`FakeBackend`].
#[derive(Debug, Clone)]
pub struct SeenCall {
    pub container: String,
    pub spec: SqlQuerySpec,
    pub options: PageOptions,
    pub timeout: Option<Duration>,
}

/// Backend returning a canned reply, optionally gated on a release signal.
pub struct FakeBackend {
    reply: Reply,
    pub seen: Mutex<Vec<SeenCall>>,
    pub gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeBackend {
    pub fn new(reply: impl Fn() -> Result<QueryPage, CosmosError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            seen: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    /// Backend that signals `entered` and then waits for `release`.
    pub fn gated(
        reply: impl Fn() -> Result<QueryPage, CosmosError> + Send + Sync + 'static,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    ) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            seen: Mutex::new(Vec::new()),
            gate: Some((entered, release)),
        })
    }

    pub fn calls(&self) -> Vec<SeenCall> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryBackend for FakeBackend {
    async fn query_page(
        &self,
        container: &str,
        spec: &SqlQuerySpec,
        options: &PageOptions,
        timeout: Option<Duration>,
    ) -> Result<QueryPage, CosmosError> {
        self.seen.lock().unwrap().push(SeenCall {
            container: container.to_string(),
            spec: spec.clone(),
            options: options.clone(),
            timeout,
        });
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        (self.reply)()
    }
}

/// Page with the given documents and fixed diagnostics.
pub fn page(documents: Vec<Value>, continuation: Option<&str>) -> QueryPage {
    QueryPage {
        documents,
        request_charge: 2.83,
        activity_id: "act-1".to_string(),
        continuation: continuation.map(str::to_string),
        status: 200,
        sub_status: 0,
    }
}

/// Test configuration pointing at a fictitious account.
pub fn test_config() -> SidecarConfig {
    let mut config = SidecarConfig::default();
    config.cosmos.endpoint = "https://acct.documents.azure.com:443/".to_string();
    config.cosmos.database = "app".to_string();
    config.cosmos.key = Some("c2VjcmV0".to_string());
    config
}

/// Running test server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

/// Spawns a server on an ephemeral loopback port.
pub async fn spawn_server(config: SidecarConfig, backend: Arc<dyn QueryBackend>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = SidecarServer::with_backend(config, backend);
    tokio::spawn(async move {
        server.serve_listener(listener, std::future::pending()).await.expect("serve");
    });
    TestServer {
        addr,
        client: reqwest::Client::new(),
    }
}
