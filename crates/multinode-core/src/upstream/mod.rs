//! Node pool: validation, health monitoring, selection and leasing across RPC endpoints.
//!
//! # Data Flow
//!
//! ```text
//! NodeConfig[] ──► parse_node_configs ──┐
//!                                       ├──► PoolConfigBuilder::build ──► ClientConfigs
//! pool settings ────────────────────────┘                                     │
//!                                                                             ▼
//!                     TransportFactory ──────────────────────────────► NodePool::new
//!                                                                             │
//!                                                           start: one NodeMonitor per node
//!                                                                             │
//!               NodeMonitor ── probe_head / probe_sync ──► HealthCell (ArcSwap snapshot)
//!                                                                             │
//!   select(caller) ──► LeaseManager ──(miss)──► NodeSelector over alive snapshots
//! ```
//!
//! # Failure Handling
//!
//! Probe failures stay inside the monitor and only show up as state changes. Failed calls are
//! returned to the caller, who reports them with [`NodePool::report_call_failure`] (or uses
//! [`NodePool::call`], which does so for node-side faults). The pool never retries a call on
//! another node and never waits for a node to recover: with nothing alive, selection fails
//! with [`PoolError::Exhausted`].

pub mod builder;
pub mod errors;
pub mod health;
pub mod http_client;
pub mod lease;
pub mod load_balancer;
pub mod manager;
pub mod transport;
pub mod validation;

pub use builder::{
    ClientConfigs, PoolConfigBuilder, DEFAULT_CALL_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT,
    MIN_POLL_INTERVAL,
};
pub use errors::{
    ConfigError, NodeCallError, PoolError, ProbeError, RpcErrorCategory, ShutdownError,
    ShutdownFailure,
};
pub use health::{NodeHealth, NodeState, StateTransition};
pub use http_client::{HttpTransport, HttpTransportConfig, HttpTransportFactory};
pub use lease::{Lease, LeaseManager};
pub use load_balancer::NodeSelector;
pub use manager::{NodePool, NodeStatus, SelectedNode};
pub use transport::{Head, NodeTransport, SyncStatus, TransportFactory};
pub use validation::parse_node_configs;
