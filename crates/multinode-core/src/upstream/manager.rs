use super::{
    builder::ClientConfigs,
    errors::{NodeCallError, PoolError, ShutdownError, ShutdownFailure},
    health::{NodeMonitor, NodeState, PoolState},
    load_balancer::NodeSelector,
    transport::{NodeTransport, TransportFactory},
};
use crate::{
    metrics,
    types::{ChainType, Node, PoolConfig},
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::{
    fmt,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{timeout, timeout_at, Instant},
};
use tracing::{debug, error, info, warn};

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const CLOSED: u8 = 2;

/// Minimum time transports get to release resources, even when monitors used up the whole
/// shutdown bound.
const TRANSPORT_CLOSE_GRACE: Duration = Duration::from_millis(250);

/// A single logical client over a set of RPC nodes.
///
/// `NodePool` owns one health monitor per node, picks a node for every request according to
/// the configured selection mode, optionally pins callers to nodes with leases, and tears
/// everything down on [`close`](Self::close).
///
/// # Lifecycle
///
/// ```text
/// new ──► start ──► select / report_call_failure / call ... ──► close
/// ```
///
/// `start` may be called once. `close` is idempotent and bounded by the configured shutdown
/// timeout. Selection works before `start` (every node begins `Alive`) and returns
/// [`PoolError::Exhausted`] after `close`.
///
/// # Example
///
/// ```no_run
/// # use multinode_core::{
/// #     types::NodeConfig,
/// #     upstream::{HttpTransportFactory, NodePool, PoolConfigBuilder},
/// # };
/// # use std::time::Duration;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let configs = PoolConfigBuilder::new()
///     .selection_mode("HighestHead")
///     .poll_failure_threshold(5)
///     .poll_interval(Duration::from_secs(10))
///     .sync_threshold(5)
///     .node_is_syncing_enabled(false)
///     .node(NodeConfig::new("foo", "ws://foo.test", "http://foo.test"))
///     .build()?;
///
/// let pool = NodePool::new(configs, &HttpTransportFactory::default())?;
/// pool.start()?;
///
/// let selected = pool.select("job-42")?;
/// println!("using {}", selected.name());
///
/// pool.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct NodePool {
    state: Arc<PoolState>,
    chain_type: ChainType,
    selector: NodeSelector,
    transports: Box<[Arc<dyn NodeTransport>]>,
    lifecycle: AtomicU8,
    shutdown_tx: broadcast::Sender<()>,
    monitors: Mutex<Vec<JoinHandle<()>>>,
}

/// The node chosen for a request, with the transport to reach it.
#[derive(Clone)]
pub struct SelectedNode {
    index: usize,
    node: Arc<Node>,
    transport: Arc<dyn NodeTransport>,
    leased: bool,
}

impl SelectedNode {
    /// Position of the node in configuration order.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.node.name()
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn NodeTransport> {
        &self.transport
    }

    /// `true` if the node came from an existing lease rather than a fresh selection.
    #[must_use]
    pub fn is_leased(&self) -> bool {
        self.leased
    }

    /// Dispatches a call straight to this node's transport.
    ///
    /// No failure bookkeeping happens here; use [`NodePool::report_call_failure`] or
    /// [`NodePool::call`] for that.
    ///
    /// # Errors
    ///
    /// Returns whatever [`NodeCallError`] the transport produced.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, NodeCallError> {
        self.transport.call(method, params).await
    }
}

impl fmt::Debug for SelectedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedNode")
            .field("index", &self.index)
            .field("node", &self.node.name())
            .field("leased", &self.leased)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of one node, in the shape an operator listing would show it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub name: String,
    pub ws_url: String,
    pub http_url: String,
    pub order: i32,
    pub state: NodeState,
    pub consecutive_failures: u32,
    pub head: u64,
    pub total_difficulty: Option<u128>,
    pub last_observed_at: Option<DateTime<Utc>>,
}

impl NodeStatus {
    /// Seconds since the node last answered a head probe.
    #[must_use]
    pub fn seconds_since_observed(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_observed_at.map(|at| (now - at).num_seconds().max(0))
    }
}

impl NodePool {
    /// Creates a pool from validated configuration, building one transport per node.
    ///
    /// No background work starts until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::TransportInit`] if the factory fails for any node.
    pub fn new<F>(configs: ClientConfigs, factory: &F) -> Result<Self, PoolError>
    where
        F: TransportFactory + ?Sized,
    {
        let ClientConfigs { pool, nodes, chain_type } = configs;

        let transports = nodes
            .iter()
            .map(|node| {
                factory.create(node, &pool).map_err(|source| PoolError::TransportInit {
                    node: node.name().to_string(),
                    source,
                })
            })
            .collect::<Result<Box<[_]>, _>>()?;

        let state = Arc::new(PoolState::new(pool, nodes));
        let selector = NodeSelector::new(state.config.selection_mode(), &state.nodes);
        let (shutdown_tx, _) = broadcast::channel(1);

        info!(
            nodes = state.nodes.len(),
            mode = %state.config.selection_mode(),
            chain_type = %chain_type,
            lease_enabled = state.leases.is_enabled(),
            "node pool created"
        );

        Ok(Self {
            state,
            chain_type,
            selector,
            transports,
            lifecycle: AtomicU8::new(CREATED),
            shutdown_tx,
            monitors: Mutex::new(Vec::new()),
        })
    }

    /// Spawns one health monitor per node.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AlreadyStarted`] on a second call and [`PoolError::Closed`] after
    /// [`close`](Self::close).
    pub fn start(&self) -> Result<(), PoolError> {
        let mut monitors = self.monitors.lock();

        match self.lifecycle.compare_exchange(CREATED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {}
            Err(RUNNING) => return Err(PoolError::AlreadyStarted),
            Err(_) => return Err(PoolError::Closed),
        }

        for (index, transport) in self.transports.iter().enumerate() {
            let monitor = NodeMonitor::new(index, Arc::clone(&self.state), Arc::clone(transport));
            monitors.push(monitor.start_with_shutdown(self.shutdown_tx.subscribe()));
        }

        metrics::record_alive_nodes(self.state.alive_count());
        info!(
            nodes = monitors.len(),
            poll_interval = ?self.state.config.poll_interval(),
            "node pool started"
        );
        Ok(())
    }

    /// Returns the node to use for the next call made on behalf of `caller`.
    ///
    /// With leasing enabled, a caller holding a valid lease on an alive node gets that node
    /// again without running selection. Otherwise the selection policy runs over the alive
    /// nodes and, with leasing enabled, the result is leased to `caller`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Exhausted`] immediately when no node is alive.
    pub fn select(&self, caller: &str) -> Result<SelectedNode, PoolError> {
        let snapshots = self.state.snapshots();

        if let Some(index) = self.state.leases.get(caller) {
            if snapshots[index].state.is_alive() {
                return Ok(self.selected(index, true));
            }
            if self.state.leases.revoke(caller) {
                metrics::record_leases_revoked(self.state.nodes[index].name(), 1);
            }
        }

        let Some(index) = self.selector.select(&self.state.nodes, &snapshots) else {
            debug!(caller, mode = %self.selector.mode(), "no alive nodes to select from");
            return Err(PoolError::Exhausted);
        };

        let name = self.state.nodes[index].name();
        metrics::record_selection(name, self.selector.mode());
        if self.state.leases.grant(caller, index).is_some() {
            metrics::record_lease_granted(name);
        }

        Ok(self.selected(index, false))
    }

    fn selected(&self, index: usize, leased: bool) -> SelectedNode {
        SelectedNode {
            index,
            node: Arc::clone(&self.state.nodes[index]),
            transport: Arc::clone(&self.transports[index]),
            leased,
        }
    }

    /// Records that a real call against `node` failed.
    ///
    /// Counts exactly like a failed probe, so it can push the node to `Unreachable` before the
    /// next poll, and drops every lease pointing at the node. Returns `false` if `node` does
    /// not belong to this pool.
    pub fn report_call_failure(&self, node: &Node) -> bool {
        let Some(index) = self.state.nodes.iter().position(|n| n.name() == node.name()) else {
            warn!(node = %node.name(), "call failure reported for unknown node");
            return false;
        };

        metrics::record_call_failure(node.name());
        self.state.record_failure(index);

        let revoked = self.state.leases.revoke_node(index);
        metrics::record_leases_revoked(node.name(), revoked);

        let health = self.state.health[index].load();
        debug!(
            node = %node.name(),
            failures = health.consecutive_failures,
            state = %health.state,
            revoked,
            "call failure recorded"
        );
        true
    }

    /// Selects a node for `caller` and dispatches one call to it, bounded by the call timeout.
    ///
    /// A failure that is the node's fault is recorded through
    /// [`report_call_failure`](Self::report_call_failure). The call is never retried on
    /// another node.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Exhausted`] when no node is alive and [`PoolError::Call`] when the
    /// selected node fails the call.
    pub async fn call(
        &self,
        caller: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, PoolError> {
        let selected = self.select(caller)?;

        let result =
            match timeout(self.state.config.call_timeout(), selected.call(method, params)).await {
                Ok(result) => result,
                Err(_) => Err(NodeCallError::Timeout),
            };

        result.map_err(|source| {
            if source.should_penalize_node() {
                self.report_call_failure(selected.node());
            }
            debug!(node = %selected.name(), method, error = %source, "call failed");
            PoolError::Call { node: selected.name().to_string(), source }
        })
    }

    /// Status of every node in configuration order.
    #[must_use]
    pub fn node_states(&self) -> Vec<NodeStatus> {
        self.state
            .nodes
            .iter()
            .zip(self.state.snapshots())
            .map(|(node, health)| NodeStatus {
                name: node.name().to_string(),
                ws_url: node.ws_url().to_string(),
                http_url: node.http_url().to_string(),
                order: node.order(),
                state: health.state,
                consecutive_failures: health.consecutive_failures,
                head: health.last_head_height,
                total_difficulty: health.last_difficulty,
                last_observed_at: health.last_observed_at,
            })
            .collect()
    }

    #[must_use]
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.state.nodes
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.state.config
    }

    #[must_use]
    pub fn chain_type(&self) -> &ChainType {
        &self.chain_type
    }

    /// Highest head among the latest reports of the pool's nodes. Zero once the pool is closed.
    #[must_use]
    pub fn highest_head(&self) -> u64 {
        self.state.chain_head.highest()
    }

    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.state.alive_count()
    }

    #[must_use]
    pub fn active_leases(&self) -> usize {
        self.state.leases.active_leases()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lifecycle.load(Ordering::SeqCst) == RUNNING
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lifecycle.load(Ordering::SeqCst) == CLOSED
    }

    /// Stops every monitor, marks all nodes `Closed` and releases the transports.
    ///
    /// Waits at most the configured shutdown timeout for monitors; a monitor that does not
    /// stop in time is aborted. Transports are closed whatever happened to the monitors. A
    /// second call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a single [`ShutdownError`] listing every monitor or transport that failed to
    /// stop cleanly.
    pub async fn close(&self) -> Result<(), ShutdownError> {
        let handles = {
            let mut monitors = self.monitors.lock();
            if self.lifecycle.swap(CLOSED, Ordering::SeqCst) == CLOSED {
                warn!("node pool close already initiated, ignoring duplicate call");
                return Ok(());
            }
            if self.shutdown_tx.send(()).is_err() {
                debug!("no monitors were running");
            }
            std::mem::take(&mut *monitors)
        };

        info!(monitors = handles.len(), "closing node pool");
        let deadline = Instant::now() + self.state.config.shutdown_timeout();
        let mut failures = Vec::new();

        for (index, mut handle) in handles.into_iter().enumerate() {
            let node = self.state.nodes[index].name();
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => debug!(node = %node, "monitor cancelled"),
                Ok(Err(e)) => {
                    error!(node = %node, error = %e, "monitor task failed");
                    failures.push(ShutdownFailure::MonitorPanicked {
                        node: node.to_string(),
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    handle.abort();
                    error!(node = %node, "monitor did not stop in time, aborted");
                    failures.push(ShutdownFailure::MonitorTimeout { node: node.to_string() });
                }
            }
        }

        for index in 0..self.state.nodes.len() {
            self.state.close_node(index);
        }
        self.state.leases.clear();
        metrics::record_alive_nodes(0);

        let transport_deadline = deadline.max(Instant::now() + TRANSPORT_CLOSE_GRACE);
        let closes = self.transports.iter().enumerate().map(|(index, transport)| async move {
            let outcome = timeout_at(transport_deadline, transport.close()).await;
            (index, outcome)
        });
        for (index, outcome) in join_all(closes).await {
            let node = self.state.nodes[index].name();
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(_) => "close timed out".to_string(),
            };
            error!(node = %node, error = %message, "transport close failed");
            failures.push(ShutdownFailure::Transport { node: node.to_string(), message });
        }

        if failures.is_empty() {
            info!("node pool closed");
            Ok(())
        } else {
            Err(ShutdownError { failures })
        }
    }
}

impl fmt::Debug for NodePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePool")
            .field("nodes", &self.state.nodes.len())
            .field("mode", &self.selector.mode())
            .field("chain_type", &self.chain_type)
            .field("lifecycle", &self.lifecycle.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Drop for NodePool {
    fn drop(&mut self) {
        let monitors = std::mem::take(self.monitors.get_mut());
        if !monitors.is_empty() {
            let _ = self.shutdown_tx.send(());
            for handle in monitors {
                handle.abort();
            }
            debug!("node pool dropped without close, monitors aborted");
        }
    }
}
