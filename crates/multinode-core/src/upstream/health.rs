//! Per-node health tracking and monitoring.
//!
//! Every node owns one [`HealthCell`]: an `ArcSwap` snapshot that selection reads without
//! locking, plus a writer mutex that serialises the monitor's probe results with failures
//! reported by callers. A [`NodeMonitor`] task per node probes its transport on every poll
//! tick and folds the result into the cell.
//!
//! ```text
//!   Alive        ── failures >= threshold ─────────────► Unreachable
//!   Syncing      ── failures >= threshold ─────────────► Unreachable
//!   Unreachable  ── head probe ok (sync rules apply) ──► Alive
//!   Alive        ── syncing and lag > sync threshold ──► Syncing
//!   Syncing      ── caught up or done syncing ─────────► Alive
//!   any          ── pool close ────────────────────────► Closed (terminal)
//! ```

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::{fmt, sync::Arc};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{interval, timeout_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, trace, warn};

use super::{
    errors::ProbeError,
    lease::LeaseManager,
    transport::{Head, NodeTransport, SyncStatus},
};
use crate::{
    chain::ChainHead,
    metrics::{self, ProbeResult},
    types::{Node, PoolConfig},
};

/// Lifecycle state of a node. Only `Alive` nodes are eligible for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeState {
    Alive,
    Unreachable,
    Syncing,
    /// Terminal. Reached only through pool shutdown.
    Closed,
}

impl NodeState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alive => "Alive",
            Self::Unreachable => "Unreachable",
            Self::Syncing => "Syncing",
            Self::Closed => "Closed",
        }
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        matches!(self, Self::Alive)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published health of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeHealth {
    pub state: NodeState,
    pub consecutive_failures: u32,
    pub last_head_height: u64,
    pub last_observed_at: Option<DateTime<Utc>>,
    pub last_difficulty: Option<u128>,
}

impl Default for NodeHealth {
    fn default() -> Self {
        Self {
            state: NodeState::Alive,
            consecutive_failures: 0,
            last_head_height: 0,
            last_observed_at: None,
            last_difficulty: None,
        }
    }
}

impl NodeHealth {
    /// Counts one failed probe or call.
    ///
    /// A threshold of zero never marks the node unreachable.
    pub(crate) fn record_failure(&mut self, threshold: u32) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if threshold > 0 && self.consecutive_failures >= threshold {
            self.state = NodeState::Unreachable;
        }
    }

    /// Applies a successful head probe.
    pub(crate) fn record_head(&mut self, head: Head, observed_at: DateTime<Utc>) {
        self.consecutive_failures = 0;
        self.last_head_height = head.number;
        self.last_observed_at = Some(observed_at);
        self.last_difficulty = head.total_difficulty;
        if self.state == NodeState::Unreachable {
            self.state = NodeState::Alive;
        }
    }

    /// Applies a sync probe. `lag` is how far `status.height` trails the pool's highest head.
    pub(crate) fn record_sync(&mut self, status: SyncStatus, lag: u64, threshold: u32) {
        let lagging = status.is_syncing && lag > u64::from(threshold);
        match (self.state, lagging) {
            (NodeState::Alive, true) => self.state = NodeState::Syncing,
            (NodeState::Syncing, false) => self.state = NodeState::Alive,
            _ => {}
        }
    }
}

/// A state change produced by one health update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: NodeState,
    pub to: NodeState,
}

/// Atomically published [`NodeHealth`] with a single-writer guard.
#[derive(Debug)]
pub(crate) struct HealthCell {
    snapshot: ArcSwap<NodeHealth>,
    writer: Mutex<()>,
}

impl HealthCell {
    pub(crate) fn new() -> Self {
        Self { snapshot: ArcSwap::from_pointee(NodeHealth::default()), writer: Mutex::new(()) }
    }

    pub(crate) fn load(&self) -> Arc<NodeHealth> {
        self.snapshot.load_full()
    }

    /// Applies `f` to a copy of the current health and publishes the result.
    ///
    /// A closed node is never updated.
    pub(crate) fn update(
        &self,
        f: impl FnOnce(&mut NodeHealth),
    ) -> (Arc<NodeHealth>, Option<StateTransition>) {
        let _writer = self.writer.lock();
        let current = self.snapshot.load_full();
        if current.state == NodeState::Closed {
            return (current, None);
        }

        let mut next = (*current).clone();
        f(&mut next);
        let transition = (next.state != current.state)
            .then_some(StateTransition { from: current.state, to: next.state });

        let next = Arc::new(next);
        self.snapshot.store(Arc::clone(&next));
        (next, transition)
    }

    /// Moves the node to `Closed`, returning the transition if it was not closed already.
    pub(crate) fn close(&self) -> Option<StateTransition> {
        let _writer = self.writer.lock();
        let current = self.snapshot.load_full();
        if current.state == NodeState::Closed {
            return None;
        }
        let mut next = (*current).clone();
        next.state = NodeState::Closed;
        self.snapshot.store(Arc::new(next));
        Some(StateTransition { from: current.state, to: NodeState::Closed })
    }
}

/// State shared by the pool handle and every monitor.
#[derive(Debug)]
pub(crate) struct PoolState {
    pub(crate) config: PoolConfig,
    pub(crate) nodes: Box<[Arc<Node>]>,
    pub(crate) health: Box<[HealthCell]>,
    pub(crate) leases: LeaseManager,
    pub(crate) chain_head: ChainHead,
}

impl PoolState {
    pub(crate) fn new(config: PoolConfig, nodes: Vec<Node>) -> Self {
        let health = nodes.iter().map(|_| HealthCell::new()).collect();
        let leases = LeaseManager::new(config.lease_duration());
        let chain_head = ChainHead::new(nodes.len());
        Self {
            config,
            nodes: nodes.into_iter().map(Arc::new).collect(),
            health,
            leases,
            chain_head,
        }
    }

    pub(crate) fn snapshots(&self) -> Vec<Arc<NodeHealth>> {
        self.health.iter().map(HealthCell::load).collect()
    }

    pub(crate) fn alive_count(&self) -> usize {
        self.health.iter().filter(|cell| cell.load().state.is_alive()).count()
    }

    /// Applies `f` to node `index` and publishes any resulting transition.
    pub(crate) fn apply(
        &self,
        index: usize,
        f: impl FnOnce(&mut NodeHealth),
    ) -> Option<StateTransition> {
        let (health, transition) = self.health[index].update(f);
        let name = self.nodes[index].name();
        metrics::record_node_health(name, health.consecutive_failures, health.last_head_height);
        if let Some(transition) = transition {
            self.on_transition(index, transition, &health);
        }
        transition
    }

    /// Counts one failure against node `index`, exactly as a failed probe would.
    pub(crate) fn record_failure(&self, index: usize) -> Option<StateTransition> {
        let threshold = self.config.poll_failure_threshold();
        self.apply(index, |health| health.record_failure(threshold))
    }

    pub(crate) fn close_node(&self, index: usize) {
        self.chain_head.forget(index);
        if let Some(transition) = self.health[index].close() {
            let name = self.nodes[index].name();
            metrics::record_state_transition(name, transition.from, transition.to);
            debug!(node = %name, from = ?transition.from, "node closed");
        }
    }

    fn on_transition(&self, index: usize, transition: StateTransition, health: &NodeHealth) {
        let name = self.nodes[index].name();
        metrics::record_state_transition(name, transition.from, transition.to);

        match transition.to {
            NodeState::Alive => info!(
                node = %name,
                from = ?transition.from,
                head = health.last_head_height,
                "node is alive"
            ),
            NodeState::Unreachable => warn!(
                node = %name,
                from = ?transition.from,
                failures = health.consecutive_failures,
                "node marked unreachable"
            ),
            NodeState::Syncing => warn!(
                node = %name,
                from = ?transition.from,
                head = health.last_head_height,
                pool_head = self.chain_head.highest(),
                "node is syncing and too far behind"
            ),
            NodeState::Closed => debug!(node = %name, "node closed"),
        }

        if transition.from.is_alive() {
            let revoked = self.leases.revoke_node(index);
            metrics::record_leases_revoked(name, revoked);
            if revoked > 0 {
                debug!(node = %name, revoked, "leases revoked");
            }
        }

        metrics::record_alive_nodes(self.alive_count());
    }
}

enum TickOutcome {
    Head(Head, SyncOutcome),
    Failed(ProbeError),
}

enum SyncOutcome {
    Disabled,
    Status(SyncStatus),
    Failed(ProbeError),
}

fn probe_result(error: &ProbeError) -> ProbeResult {
    if matches!(error, ProbeError::Timeout(_)) {
        ProbeResult::Timeout
    } else {
        ProbeResult::Error
    }
}

/// Background task probing a single node on every poll tick.
pub(crate) struct NodeMonitor {
    index: usize,
    state: Arc<PoolState>,
    transport: Arc<dyn NodeTransport>,
}

impl NodeMonitor {
    pub(crate) fn new(
        index: usize,
        state: Arc<PoolState>,
        transport: Arc<dyn NodeTransport>,
    ) -> Self {
        Self { index, state, transport }
    }

    /// Spawns the monitor. The first probe runs immediately; the task exits as soon as a
    /// shutdown signal arrives, abandoning any in-flight probe.
    pub(crate) fn start_with_shutdown(
        self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.state.config.poll_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    () = async {
                        ticker.tick().await;
                        self.poll_once().await;
                    } => {}
                }
            }

            debug!(node = %self.node().name(), "node monitor stopped");
        })
    }

    fn node(&self) -> &Node {
        &self.state.nodes[self.index]
    }

    async fn probe(&self) -> TickOutcome {
        let timeout = self.state.config.probe_timeout();
        let deadline = Instant::now() + timeout;

        let head = match timeout_at(deadline, self.transport.probe_head()).await {
            Ok(Ok(head)) => head,
            Ok(Err(e)) => return TickOutcome::Failed(e),
            Err(_) => return TickOutcome::Failed(ProbeError::Timeout(timeout)),
        };
        self.state.chain_head.observe(self.index, head.number);

        if !self.state.config.node_is_syncing_enabled() {
            return TickOutcome::Head(head, SyncOutcome::Disabled);
        }

        let sync = match timeout_at(deadline, self.transport.probe_sync()).await {
            Ok(Ok(status)) => SyncOutcome::Status(status),
            Ok(Err(e)) => SyncOutcome::Failed(e),
            Err(_) => SyncOutcome::Failed(ProbeError::Timeout(timeout)),
        };
        TickOutcome::Head(head, sync)
    }

    async fn poll_once(&self) {
        let outcome = self.probe().await;
        let name = self.node().name();

        match outcome {
            TickOutcome::Failed(error) => {
                metrics::record_probe(name, probe_result(&error));
                self.state.record_failure(self.index);
                debug!(node = %name, error = %error, "probe failed");
            }
            TickOutcome::Head(head, SyncOutcome::Disabled) => {
                metrics::record_probe(name, ProbeResult::Success);
                self.state.apply(self.index, |health| health.record_head(head, Utc::now()));
                trace!(node = %name, head = head.number, "probe succeeded");
            }
            TickOutcome::Head(head, SyncOutcome::Failed(error)) => {
                // Sync state stays as the last successful sync probe left it.
                metrics::record_probe(name, probe_result(&error));
                self.state.apply(self.index, |health| health.record_head(head, Utc::now()));
                debug!(node = %name, head = head.number, error = %error, "sync probe failed");
            }
            TickOutcome::Head(head, SyncOutcome::Status(status)) => {
                metrics::record_probe(name, ProbeResult::Success);
                let lag = self.state.chain_head.lag_of(status.height);
                let threshold = self.state.config.sync_threshold();
                self.state.apply(self.index, |health| {
                    health.record_head(head, Utc::now());
                    health.record_sync(status, lag, threshold);
                });
                trace!(
                    node = %name,
                    head = head.number,
                    syncing = status.is_syncing,
                    lag,
                    "probe succeeded"
                );
            }
        }
    }
}
