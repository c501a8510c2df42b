//! # Multinode Core
//!
//! A health-checked pool of blockchain RPC nodes that behaves like one logical client.
//!
//! - **[`upstream`]**: node validation, pool configuration, per-node health monitors, selection
//!   policies, sticky leases and the [`upstream::NodePool`] orchestrator.
//!
//! - **[`chain`]**: latest head per node and the pool-wide maximum, shared by the monitors.
//!
//! - **[`config`]**: layered application configuration (defaults, TOML file, environment).
//!
//! - **[`metrics`]**: probe, transition, selection and lease series via the `metrics` facade.
//!
//! - **[`types`]**: node entries, validated nodes, selection modes and pool settings.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           NodePool                           │
//! │  ┌───────────────┐  ┌───────────────┐  ┌──────────────────┐  │
//! │  │ NodeSelector  │  │ LeaseManager  │  │ NodeMonitor × N  │  │
//! │  └───────┬───────┘  └───────┬───────┘  └────────┬─────────┘  │
//! │          │                  │                   │            │
//! │  ┌───────▼──────────────────▼───────┐  ┌────────▼─────────┐  │
//! │  │   HealthCell × N (snapshots)     │◄─┤ NodeTransport × N│  │
//! │  └──────────────────────────────────┘  └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use multinode_core::{
//!     types::NodeConfig,
//!     upstream::{HttpTransportFactory, NodePool, PoolConfigBuilder},
//! };
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let configs = PoolConfigBuilder::new()
//!     .selection_mode("HighestHead")
//!     .poll_failure_threshold(5)
//!     .poll_interval(Duration::from_secs(10))
//!     .sync_threshold(5)
//!     .node_is_syncing_enabled(false)
//!     .node(NodeConfig::new("primary", "wss://primary.example/ws", "https://primary.example"))
//!     .build()?;
//!
//! let pool = NodePool::new(configs, &HttpTransportFactory::default())?;
//! pool.start()?;
//! let block = pool.call("job-1", "eth_blockNumber", None).await?;
//! println!("{block}");
//! pool.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod metrics;
pub mod types;
pub mod upstream;
