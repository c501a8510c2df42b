//! Core type definitions for node configuration, pool policy and JSON-RPC.
//!
//! # Type Categories
//!
//! ## Configuration Types
//! - [`NodeConfig`]: raw endpoint descriptor as it appears in configuration, every field optional
//! - [`Node`]: validated, immutable endpoint produced by
//!   [`parse_node_configs`](crate::upstream::validation::parse_node_configs)
//! - [`PoolConfig`], [`SelectionMode`], [`ChainType`]: pool-wide policy produced by
//!   [`PoolConfigBuilder`](crate::upstream::builder::PoolConfigBuilder)
//!
//! ## JSON-RPC Protocol Types
//! - [`JsonRpcRequest`], [`JsonRpcResponse`], [`JsonRpcError`]: used by the HTTP transport
//!
//! # Immutability
//!
//! [`Node`] and [`PoolConfig`] expose read-only accessors. Once the validator and builder have
//! accepted a configuration the node set cannot change, which is what keeps the uniqueness
//! guarantees valid for the lifetime of a pool.

use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
    time::Duration,
};
use url::Url;

use crate::upstream::errors::ConfigError;

/// JSON-RPC protocol version constant to avoid repeated allocations.
pub const JSONRPC_VERSION: &str = "2.0";

/// Pre-allocated `Cow` for the JSON-RPC version.
pub const JSONRPC_VERSION_COW: Cow<'static, str> = Cow::Borrowed(JSONRPC_VERSION);

/// Smallest order an entry may set explicitly.
pub const MIN_NODE_ORDER: i32 = 1;

/// Largest order an entry may set explicitly.
pub const MAX_NODE_ORDER: i32 = 100;

/// Raw node entry, before validation.
///
/// Every field is an `Option` so that a missing value reaches the validator as "absent"
/// instead of being silently replaced by an empty default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node name.
    #[serde(default)]
    pub name: Option<String>,

    /// WebSocket endpoint, scheme `ws` or `wss`.
    #[serde(default)]
    pub ws_url: Option<String>,

    /// HTTP endpoint, scheme `http` or `https`.
    #[serde(default)]
    pub http_url: Option<String>,

    /// Explicit priority in `[1, 100]`. Lower is preferred.
    #[serde(default)]
    pub order: Option<i32>,
}

impl NodeConfig {
    /// Creates an entry with all three endpoint fields present and no explicit order.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        ws_url: impl Into<String>,
        http_url: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            ws_url: Some(ws_url.into()),
            http_url: Some(http_url.into()),
            order: None,
        }
    }

    /// Builder-style setter for the explicit order.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }
}

/// A parsed endpoint URL that remembers the exact text it was configured with.
///
/// Equality and hashing use the parsed form, so two spellings of the same URL collide
/// during duplicate detection, while `Display` returns the configured text unchanged.
#[derive(Debug, Clone)]
pub struct EndpointUrl {
    raw: Arc<str>,
    parsed: Url,
}

impl EndpointUrl {
    pub(crate) fn new(raw: &str, parsed: Url) -> Self {
        Self { raw: Arc::from(raw), parsed }
    }

    /// Returns the URL exactly as configured.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the parsed URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.parsed
    }

    /// Returns the lowercase scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.parsed.scheme()
    }
}

impl PartialEq for EndpointUrl {
    fn eq(&self, other: &Self) -> bool {
        self.parsed == other.parsed
    }
}

impl Eq for EndpointUrl {}

impl Hash for EndpointUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parsed.hash(state);
    }
}

impl fmt::Display for EndpointUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A validated RPC endpoint.
///
/// Only the validator constructs nodes. Name, WebSocket URL and HTTP URL are pairwise unique
/// across the node set they were validated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: Arc<str>,
    ws_url: EndpointUrl,
    http_url: EndpointUrl,
    order: i32,
}

impl Node {
    pub(crate) fn new(name: &str, ws_url: EndpointUrl, http_url: EndpointUrl, order: i32) -> Self {
        Self { name: Arc::from(name), ws_url, http_url, order }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn ws_url(&self) -> &EndpointUrl {
        &self.ws_url
    }

    #[must_use]
    pub fn http_url(&self) -> &EndpointUrl {
        &self.http_url
    }

    /// Priority used as a selection tie-break. Explicit values lie in `[1, 100]`; entries
    /// without one were numbered `0, 1, 2, ...` in input order.
    #[must_use]
    pub fn order(&self) -> i32 {
        self.order
    }
}

/// Policy used to pick among the currently alive nodes.
///
/// Parsed once from configuration; selection code only ever matches on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Node with the highest observed head.
    HighestHead,
    /// Cycle through alive nodes in order.
    RoundRobin,
    /// Node with the smallest order.
    PriorityLevel,
    /// Node with the highest reported total difficulty.
    TotalDifficulty,
}

impl SelectionMode {
    /// All supported modes, in documentation order.
    pub const ALL: [SelectionMode; 4] =
        [Self::HighestHead, Self::RoundRobin, Self::PriorityLevel, Self::TotalDifficulty];

    /// Returns the configuration spelling of this mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighestHead => "HighestHead",
            Self::RoundRobin => "RoundRobin",
            Self::PriorityLevel => "PriorityLevel",
            Self::TotalDifficulty => "TotalDifficulty",
        }
    }
}

impl FromStr for SelectionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownSelectionMode(s.to_string()))
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque chain-family tag. Its meaning belongs to the chain clients built on top of the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainType(String);

impl ChainType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ChainType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ChainType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated pool-wide policy.
///
/// Built by [`PoolConfigBuilder`](crate::upstream::builder::PoolConfigBuilder); the poll
/// interval is never below [`MIN_POLL_INTERVAL`](crate::upstream::builder::MIN_POLL_INTERVAL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub(crate) selection_mode: SelectionMode,
    pub(crate) lease_duration: Duration,
    pub(crate) poll_failure_threshold: u32,
    pub(crate) poll_interval: Duration,
    pub(crate) sync_threshold: u32,
    pub(crate) node_is_syncing_enabled: bool,
    pub(crate) shutdown_timeout: Duration,
    pub(crate) call_timeout: Duration,
}

impl PoolConfig {
    #[must_use]
    pub fn selection_mode(&self) -> SelectionMode {
        self.selection_mode
    }

    /// Zero disables leasing.
    #[must_use]
    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    #[must_use]
    pub fn lease_enabled(&self) -> bool {
        !self.lease_duration.is_zero()
    }

    /// Consecutive failures after which a node becomes unreachable. Zero disables the
    /// transition.
    #[must_use]
    pub fn poll_failure_threshold(&self) -> u32 {
        self.poll_failure_threshold
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn sync_threshold(&self) -> u32 {
        self.sync_threshold
    }

    #[must_use]
    pub fn node_is_syncing_enabled(&self) -> bool {
        self.node_is_syncing_enabled
    }

    /// Upper bound on how long `close` waits for monitors and transports.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Timeout applied to dispatched RPC calls.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Timeout for one probe round: four fifths of the poll interval.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        self.poll_interval.saturating_mul(4) / 5
    }
}

/// JSON-RPC 2.0 request structure.
///
/// # Example
///
/// ```
/// use multinode_core::types::JsonRpcRequest;
/// use serde_json::json;
///
/// let request = JsonRpcRequest::new("eth_blockNumber", None, json!(1));
///
/// assert_eq!(request.method, "eth_blockNumber");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    pub id: serde_json::Value,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        params: Option<serde_json::Value>,
        id: serde_json::Value,
    ) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, method: method.into(), params, id }
    }
}

/// JSON-RPC 2.0 response structure. Contains either `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default = "default_jsonrpc_version")]
    pub jsonrpc: Cow<'static, str>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: serde_json::Value,
}

fn default_jsonrpc_version() -> Cow<'static, str> {
    JSONRPC_VERSION_COW
}

/// JSON-RPC 2.0 error object.
///
/// Standard error codes:
///
/// - `-32700`: Parse error (invalid JSON)
/// - `-32600`: Invalid request (malformed JSON-RPC)
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
/// - `-32000` to `-32099`: Server-defined errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}
