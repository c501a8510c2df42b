//! Builder for the pool-wide policy.
//!
//! Collects the pool knobs and the raw node entries, then validates both in one step.
//! Settings that have no sensible default (selection mode, thresholds, poll interval, the
//! syncing switch) are held as `Option` until [`PoolConfigBuilder::build`] so that a missing
//! value is reported instead of silently defaulted.

use std::time::Duration;

use super::{errors::ConfigError, validation::parse_node_configs};
use crate::types::{ChainType, Node, NodeConfig, PoolConfig, SelectionMode};

/// Default bound on how long `close` waits for monitors to stop.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for calls dispatched through the pool.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Everything needed to construct a [`NodePool`](super::manager::NodePool).
#[derive(Debug, Clone)]
pub struct ClientConfigs {
    pub pool: PoolConfig,
    pub nodes: Vec<Node>,
    pub chain_type: ChainType,
}

impl ClientConfigs {
    #[must_use]
    pub fn into_parts(self) -> (PoolConfig, Vec<Node>, ChainType) {
        (self.pool, self.nodes, self.chain_type)
    }
}

/// Builder for [`PoolConfig`] plus the validated node set.
///
/// # Examples
///
/// ```
/// # use multinode_core::{types::NodeConfig, upstream::PoolConfigBuilder};
/// # use std::time::Duration;
/// let configs = PoolConfigBuilder::new()
///     .selection_mode("HighestHead")
///     .poll_failure_threshold(5)
///     .poll_interval(Duration::from_secs(10))
///     .sync_threshold(5)
///     .node_is_syncing_enabled(false)
///     .nodes(vec![NodeConfig::new("foo", "ws://foo.test", "http://foo.test")])
///     .build()
///     .unwrap();
///
/// assert_eq!(configs.nodes[0].name(), "foo");
/// assert_eq!(configs.nodes[0].ws_url().to_string(), "ws://foo.test");
/// ```
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    selection_mode: Option<String>,
    lease_duration: Duration,
    poll_failure_threshold: Option<u32>,
    poll_interval: Option<Duration>,
    sync_threshold: Option<u32>,
    node_is_syncing_enabled: Option<bool>,
    chain_type: ChainType,
    shutdown_timeout: Option<Duration>,
    call_timeout: Option<Duration>,
    nodes: Vec<NodeConfig>,
}

impl PoolConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection mode in its configuration spelling, parsed on [`build`](Self::build).
    #[must_use]
    pub fn selection_mode(mut self, mode: impl Into<String>) -> Self {
        self.selection_mode = Some(mode.into());
        self
    }

    /// Lease duration (default: zero, leasing disabled).
    #[must_use]
    pub fn lease_duration(mut self, duration: Duration) -> Self {
        self.lease_duration = duration;
        self
    }

    #[must_use]
    pub fn poll_failure_threshold(mut self, threshold: u32) -> Self {
        self.poll_failure_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn sync_threshold(mut self, threshold: u32) -> Self {
        self.sync_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn node_is_syncing_enabled(mut self, enabled: bool) -> Self {
        self.node_is_syncing_enabled = Some(enabled);
        self
    }

    /// Opaque chain tag (default: empty).
    #[must_use]
    pub fn chain_type(mut self, chain_type: impl Into<ChainType>) -> Self {
        self.chain_type = chain_type.into();
        self
    }

    /// Bound on `close` (default: 5s).
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Timeout for dispatched calls (default: 30s).
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn nodes(mut self, nodes: Vec<NodeConfig>) -> Self {
        self.nodes = nodes;
        self
    }

    #[must_use]
    pub fn node(mut self, node: NodeConfig) -> Self {
        self.nodes.push(node);
        self
    }

    /// Validates the pool settings and node entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required setting was never supplied,
    /// [`ConfigError::UnknownSelectionMode`] for an unrecognised mode,
    /// [`ConfigError::PollIntervalTooShort`] for a poll interval under [`MIN_POLL_INTERVAL`], and any error produced by
    /// [`parse_node_configs`].
    pub fn build(self) -> Result<ClientConfigs, ConfigError> {
        let selection_mode: SelectionMode =
            self.selection_mode.ok_or(ConfigError::MissingField("selection_mode"))?.parse()?;
        let poll_failure_threshold =
            self.poll_failure_threshold.ok_or(ConfigError::MissingField("poll_failure_threshold"))?;
        let poll_interval = self.poll_interval.ok_or(ConfigError::MissingField("poll_interval"))?;
        let sync_threshold =
            self.sync_threshold.ok_or(ConfigError::MissingField("sync_threshold"))?;
        let node_is_syncing_enabled = self
            .node_is_syncing_enabled
            .ok_or(ConfigError::MissingField("node_is_syncing_enabled"))?;

        if poll_interval < MIN_POLL_INTERVAL {
            return Err(ConfigError::PollIntervalTooShort { min: MIN_POLL_INTERVAL });
        }

        let nodes = parse_node_configs(&self.nodes)?;

        let pool = PoolConfig {
            selection_mode,
            lease_duration: self.lease_duration,
            poll_failure_threshold,
            poll_interval,
            sync_threshold,
            node_is_syncing_enabled,
            shutdown_timeout: self.shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
            call_timeout: self.call_timeout.unwrap_or(DEFAULT_CALL_TIMEOUT),
        };

        Ok(ClientConfigs { pool, nodes, chain_type: self.chain_type })
    }
}
