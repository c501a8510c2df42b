//! Per-node transport abstraction.
//!
//! The pool never speaks a wire protocol itself. Each validated [`Node`] gets one
//! [`NodeTransport`] from a [`TransportFactory`]; monitors use it for probes and callers use it
//! for dispatch once the node has been selected.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use super::errors::{NodeCallError, ProbeError};
use crate::types::{Node, PoolConfig};

/// Result of a successful liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Head {
    pub number: u64,
    /// Cumulative chain difficulty, when the node reports one.
    pub total_difficulty: Option<u128>,
}

impl Head {
    #[must_use]
    pub fn new(number: u64) -> Self {
        Self { number, total_difficulty: None }
    }

    #[must_use]
    pub fn with_difficulty(mut self, total_difficulty: u128) -> Self {
        self.total_difficulty = Some(total_difficulty);
        self
    }
}

/// Result of a successful sync probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub is_syncing: bool,
    /// Height the node has processed so far. Only meaningful while syncing.
    pub height: u64,
}

impl SyncStatus {
    #[must_use]
    pub fn synced() -> Self {
        Self { is_syncing: false, height: 0 }
    }

    #[must_use]
    pub fn syncing(height: u64) -> Self {
        Self { is_syncing: true, height }
    }
}

/// Connection to a single node.
///
/// Implementations must be cheap to share: the monitor and every caller holding a selection
/// use the same instance concurrently.
#[async_trait]
pub trait NodeTransport: Send + Sync + 'static {
    /// Fetches the node's latest head.
    async fn probe_head(&self) -> Result<Head, ProbeError>;

    /// Asks whether the node is syncing and how far it has progressed.
    async fn probe_sync(&self) -> Result<SyncStatus, ProbeError>;

    /// Dispatches an arbitrary JSON-RPC call and returns its `result`.
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, NodeCallError>;

    /// Releases connections held by the transport. Called once by the pool on close.
    async fn close(&self) -> Result<(), NodeCallError>;
}

/// Creates one transport per node when a pool is constructed.
///
/// Any `Fn(&Node, &PoolConfig) -> Result<Arc<dyn NodeTransport>, NodeCallError>` closure is a
/// factory, which is how tests inject scripted transports.
pub trait TransportFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the transport cannot be initialised for `node`.
    fn create(&self, node: &Node, config: &PoolConfig)
        -> Result<Arc<dyn NodeTransport>, NodeCallError>;
}

impl<F> TransportFactory for F
where
    F: Fn(&Node, &PoolConfig) -> Result<Arc<dyn NodeTransport>, NodeCallError> + Send + Sync,
{
    fn create(
        &self,
        node: &Node,
        config: &PoolConfig,
    ) -> Result<Arc<dyn NodeTransport>, NodeCallError> {
        self(node, config)
    }
}

impl fmt::Debug for dyn NodeTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NodeTransport")
    }
}
