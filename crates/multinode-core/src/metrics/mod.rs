//! # Pool Metrics
//!
//! Records node pool activity through the `metrics` facade. The library installs no exporter;
//! whatever recorder the host application sets up receives these series.
//!
//! | Series | Kind | Labels |
//! |--------|------|--------|
//! | `multinode_probe_total` | counter | `node`, `result` |
//! | `multinode_node_state_transitions_total` | counter | `node`, `from`, `to` |
//! | `multinode_node_state` | gauge | `node` |
//! | `multinode_node_consecutive_failures` | gauge | `node` |
//! | `multinode_node_head` | gauge | `node` |
//! | `multinode_selections_total` | counter | `node`, `mode` |
//! | `multinode_leases_granted_total` | counter | `node` |
//! | `multinode_leases_revoked_total` | counter | `node` |
//! | `multinode_call_failures_total` | counter | `node` |
//! | `multinode_alive_nodes` | gauge | |
//!
//! Node names are interned so the hot selection path does not allocate label strings. The
//! set of names is fixed by configuration, which bounds the interned memory.

use crate::{types::SelectionMode, upstream::health::NodeState};
use metrics::{counter, gauge};
use std::{borrow::Cow, sync::OnceLock};

static NODE_NAME_POOL: OnceLock<dashmap::DashMap<String, &'static str>> = OnceLock::new();

#[inline]
fn node_to_static(node: &str) -> Cow<'static, str> {
    let pool = NODE_NAME_POOL.get_or_init(dashmap::DashMap::new);

    if let Some(interned) = pool.get(node) {
        return Cow::Borrowed(*interned);
    }

    let owned = node.to_string();
    let leaked: &'static str = Box::leak(owned.clone().into_boxed_str());
    pool.insert(owned, leaked);
    Cow::Borrowed(leaked)
}

/// Label and gauge encoding for enum-like states.
pub trait MetricsState {
    fn as_metric_str(&self) -> &'static str;
    fn as_gauge_value(&self) -> f64;
}

impl MetricsState for NodeState {
    fn as_metric_str(&self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Unreachable => "unreachable",
            Self::Syncing => "syncing",
            Self::Closed => "closed",
        }
    }

    fn as_gauge_value(&self) -> f64 {
        match self {
            Self::Alive => 1.0,
            Self::Syncing => 0.5,
            Self::Unreachable => 0.0,
            Self::Closed => -1.0,
        }
    }
}

/// Outcome label for a single monitor tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    Success,
    Timeout,
    Error,
}

impl ProbeResult {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }
}

pub fn record_probe(node: &str, result: ProbeResult) {
    counter!("multinode_probe_total", "node" => node_to_static(node), "result" => result.as_str())
        .increment(1);
}

pub fn record_state_transition(node: &str, from: NodeState, to: NodeState) {
    let node = node_to_static(node);
    counter!(
        "multinode_node_state_transitions_total",
        "node" => node.clone(),
        "from" => from.as_metric_str(),
        "to" => to.as_metric_str()
    )
    .increment(1);
    gauge!("multinode_node_state", "node" => node).set(to.as_gauge_value());
}

/// Publishes the per-node gauges after a health update.
#[allow(clippy::cast_precision_loss)]
pub fn record_node_health(node: &str, consecutive_failures: u32, head: u64) {
    let node = node_to_static(node);
    gauge!("multinode_node_consecutive_failures", "node" => node.clone())
        .set(f64::from(consecutive_failures));
    gauge!("multinode_node_head", "node" => node).set(head as f64);
}

pub fn record_selection(node: &str, mode: SelectionMode) {
    counter!("multinode_selections_total", "node" => node_to_static(node), "mode" => mode.as_str())
        .increment(1);
}

pub fn record_lease_granted(node: &str) {
    counter!("multinode_leases_granted_total", "node" => node_to_static(node)).increment(1);
}

pub fn record_leases_revoked(node: &str, count: usize) {
    if count > 0 {
        counter!("multinode_leases_revoked_total", "node" => node_to_static(node))
            .increment(count as u64);
    }
}

pub fn record_call_failure(node: &str) {
    counter!("multinode_call_failures_total", "node" => node_to_static(node)).increment(1);
}

#[allow(clippy::cast_precision_loss)]
pub fn record_alive_nodes(count: usize) {
    gauge!("multinode_alive_nodes").set(count as f64);
}
