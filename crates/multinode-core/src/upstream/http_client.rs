use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use super::{
    errors::{NodeCallError, ProbeError},
    transport::{Head, NodeTransport, SyncStatus, TransportFactory},
};
use crate::types::{JsonRpcRequest, JsonRpcResponse, Node, PoolConfig};

/// Longest response body kept in an HTTP error message.
const MAX_ERROR_BODY: usize = 256;

/// Configuration for HTTP transport concurrency and connection behavior.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Maximum number of concurrent requests to one node
    pub concurrent_limit: usize,
    /// How long a request may wait for a free slot before failing with a timeout
    pub permit_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 256,
            permit_timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// JSON-RPC 2.0 over HTTP to a single node.
///
/// Probes run with the pool's probe timeout, dispatched calls with its call timeout. Requests
/// are never retried here: a failed call is reported to the pool and the caller decides what
/// to do next.
pub struct HttpTransport {
    client: Client,
    node: Arc<str>,
    url: Url,
    probe_timeout: Duration,
    call_timeout: Duration,
    concurrent_limit: Arc<Semaphore>,
    config: HttpTransportConfig,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// RAII guard ensuring semaphore permits are always released.
struct PermitGuard {
    _permit: OwnedSemaphorePermit,
    semaphore: Arc<Semaphore>,
}

impl PermitGuard {
    fn new(permit: OwnedSemaphorePermit, semaphore: Arc<Semaphore>) -> Self {
        Self { _permit: permit, semaphore }
    }
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        tracing::trace!(available_permits = self.semaphore.available_permits(), "permit released");
    }
}

impl HttpTransport {
    /// Creates a transport for `node` with default connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new(node: &Node, pool: &PoolConfig) -> Result<Self, NodeCallError> {
        Self::with_config(node, pool, HttpTransportConfig::default())
    }

    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn with_config(
        node: &Node,
        pool: &PoolConfig,
        config: HttpTransportConfig,
    ) -> Result<Self, NodeCallError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(config.connect_timeout)
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("multinode/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(node = %node.name(), error = %e, "failed to build http client");
                NodeCallError::ConnectionFailed(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            node: Arc::from(node.name()),
            url: node.http_url().url().clone(),
            probe_timeout: pool.probe_timeout(),
            call_timeout: pool.call_timeout(),
            concurrent_limit: Arc::new(Semaphore::new(config.concurrent_limit)),
            config,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Sanitizes network errors to prevent leaking endpoint details into logs and callers.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else if error.is_body() {
            "response body error".to_string()
        } else if error.is_decode() {
            "response decode error".to_string()
        } else if error.is_redirect() {
            "unexpected redirect".to_string()
        } else {
            "network error".to_string()
        }
    }

    /// Sends one JSON-RPC request and returns its `result`.
    ///
    /// # Errors
    ///
    /// - [`NodeCallError::Timeout`] if no slot frees up in time or the request times out
    /// - [`NodeCallError::ConnectionFailed`] for network failures or a closed transport
    /// - [`NodeCallError::HttpError`] for non-success HTTP status codes
    /// - [`NodeCallError::RpcError`] when the node answers with a JSON-RPC error object
    /// - [`NodeCallError::InvalidResponse`] when the body is not a JSON-RPC response
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, NodeCallError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(NodeCallError::ConnectionFailed("transport closed".to_string()));
        }

        let permit = tokio::time::timeout(
            self.config.permit_timeout,
            Arc::clone(&self.concurrent_limit).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                node = %self.node,
                available_permits = self.concurrent_limit.available_permits(),
                "http transport permit acquisition timeout"
            );
            NodeCallError::Timeout
        })?
        .map_err(|_| NodeCallError::ConnectionFailed("transport closed".to_string()))?;
        let _guard = PermitGuard::new(permit, self.concurrent_limit.clone());

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, params, json!(id));

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::trace!(node = %self.node, method, "http request error");
                if e.is_timeout() {
                    NodeCallError::Timeout
                } else {
                    NodeCallError::ConnectionFailed(Self::sanitize_network_error(&e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw_text = response.text().await.unwrap_or_default();
            let truncated = if raw_text.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| raw_text.is_char_boundary(*i))
                    .unwrap_or(0);
                format!("{}... (truncated)", &raw_text[..cut])
            } else {
                raw_text
            };
            tracing::trace!(node = %self.node, status = status.as_u16(), "http request failed");
            return Err(NodeCallError::HttpError(status.as_u16(), truncated));
        }

        let body: JsonRpcResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                NodeCallError::Timeout
            } else {
                NodeCallError::InvalidResponse(Self::sanitize_network_error(&e))
            }
        })?;

        if let Some(error) = body.error {
            return Err(NodeCallError::RpcError(error.code, error.message));
        }

        Ok(body.result.unwrap_or(Value::Null))
    }

    fn probe_error(&self, error: NodeCallError) -> ProbeError {
        match error {
            NodeCallError::Timeout => ProbeError::Timeout(self.probe_timeout),
            NodeCallError::InvalidResponse(msg) => ProbeError::InvalidResponse(msg),
            other => ProbeError::Transport(other.to_string()),
        }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[cfg(test)]
    fn available_permits(&self) -> usize {
        self.concurrent_limit.available_permits()
    }
}

/// Parses a `0x`-prefixed hex quantity.
fn parse_quantity(value: &Value) -> Option<u128> {
    let text = value.as_str()?;
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    u128::from_str_radix(digits, 16).ok()
}

fn parse_block_number(value: &Value) -> Option<u64> {
    parse_quantity(value).and_then(|n| u64::try_from(n).ok())
}

fn parse_head(block: &Value) -> Result<Head, ProbeError> {
    if block.is_null() {
        return Err(ProbeError::InvalidResponse("latest block is null".to_string()));
    }
    let number = block
        .get("number")
        .and_then(parse_block_number)
        .ok_or_else(|| ProbeError::InvalidResponse("block without valid number".to_string()))?;
    let total_difficulty = block.get("totalDifficulty").and_then(parse_quantity);
    Ok(Head { number, total_difficulty })
}

fn parse_sync_status(value: &Value) -> Result<SyncStatus, ProbeError> {
    match value {
        Value::Bool(false) => Ok(SyncStatus::synced()),
        Value::Object(progress) => progress
            .get("currentBlock")
            .and_then(parse_block_number)
            .map(SyncStatus::syncing)
            .ok_or_else(|| {
                ProbeError::InvalidResponse("sync progress without currentBlock".to_string())
            }),
        other => Err(ProbeError::InvalidResponse(format!("unexpected eth_syncing result: {other}"))),
    }
}

#[async_trait]
impl NodeTransport for HttpTransport {
    async fn probe_head(&self) -> Result<Head, ProbeError> {
        let block = self
            .send_request("eth_getBlockByNumber", Some(json!(["latest", false])), self.probe_timeout)
            .await
            .map_err(|e| self.probe_error(e))?;
        parse_head(&block)
    }

    async fn probe_sync(&self) -> Result<SyncStatus, ProbeError> {
        let status = self
            .send_request("eth_syncing", None, self.probe_timeout)
            .await
            .map_err(|e| self.probe_error(e))?;
        parse_sync_status(&status)
    }

    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, NodeCallError> {
        if method.is_empty() {
            return Err(NodeCallError::InvalidRequest("empty method name".to_string()));
        }
        self.send_request(method, params, self.call_timeout).await
    }

    async fn close(&self) -> Result<(), NodeCallError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.concurrent_limit.close();
        tracing::debug!(node = %self.node, "http transport closed");
        Ok(())
    }
}

/// Builds an [`HttpTransport`] for every node of a pool.
#[derive(Debug, Clone, Default)]
pub struct HttpTransportFactory {
    config: HttpTransportConfig,
}

impl HttpTransportFactory {
    #[must_use]
    pub fn new(config: HttpTransportConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn create(
        &self,
        node: &Node,
        config: &PoolConfig,
    ) -> Result<Arc<dyn NodeTransport>, NodeCallError> {
        Ok(Arc::new(HttpTransport::with_config(node, config, self.config.clone())?))
    }
}
