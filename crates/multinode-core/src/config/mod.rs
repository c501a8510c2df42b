//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: lease duration, chain type, shutdown/call timeouts, logging
//! 2. **Config file**: TOML file specified by the `MULTINODE_CONFIG` env var
//! 3. **Environment variables**: `MULTINODE__*` env vars override specific fields
//!
//! Selection mode, thresholds, poll interval and the syncing switch have no compiled default.
//! Leaving one out is reported by [`AppConfig::client_configs`] instead of being papered over.
//!
//! # Example
//!
//! ```toml
//! [pool]
//! selection_mode = "HighestHead"
//! lease_duration = "0s"
//! poll_failure_threshold = 5
//! poll_interval = "10s"
//! sync_threshold = 5
//! node_is_syncing_enabled = false
//! chain_type = ""
//!
//! [[nodes]]
//! name = "primary"
//! ws_url = "wss://primary.example/ws"
//! http_url = "https://primary.example"
//! order = 1
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use crate::{
    types::NodeConfig,
    upstream::{builder::PoolConfigBuilder, ClientConfigs, ConfigError as PoolConfigError},
};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Pool-wide settings as written in configuration.
///
/// Durations are kept as strings (`"30s"`, `"1m30s"`, `"250ms"`) and parsed when the pool
/// configuration is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// One of `HighestHead`, `RoundRobin`, `PriorityLevel`, `TotalDifficulty`.
    pub selection_mode: Option<String>,

    /// Sticky lease length. `"0s"` disables leasing. Defaults to `"0s"`.
    pub lease_duration: String,

    pub poll_failure_threshold: Option<u32>,

    pub poll_interval: Option<String>,

    /// Blocks a syncing node may trail the pool head and still be selected.
    pub sync_threshold: Option<u32>,

    pub node_is_syncing_enabled: Option<bool>,

    /// Opaque chain tag, may be empty.
    pub chain_type: String,

    /// Bound on pool shutdown. Defaults to `"5s"`.
    pub shutdown_timeout: String,

    /// Timeout for calls dispatched through the pool. Defaults to `"30s"`.
    pub call_timeout: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            selection_mode: None,
            lease_duration: "0s".to_string(),
            poll_failure_threshold: None,
            poll_interval: None,
            sync_threshold: None,
            node_is_syncing_enabled: None,
            chain_type: String::new(),
            shutdown_timeout: "5s".to_string(),
            call_timeout: "30s".to_string(),
        }
    }
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Top-level configuration: pool settings, node entries and logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pool: PoolSettings,

    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `MULTINODE__` prefix can override any configuration
    /// value. Use `__` as a separator for nested fields (e.g.
    /// `MULTINODE__POOL__POLL_INTERVAL=5s`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("pool.lease_duration", "0s")?
            .set_default("pool.chain_type", "")?
            .set_default("pool.shutdown_timeout", "5s")?
            .set_default("pool.call_timeout", "30s")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("MULTINODE").separator("__").try_parsing(true))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/config.toml`.
    ///
    /// The config file path can be overridden using the `MULTINODE_CONFIG` environment
    /// variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("MULTINODE_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Checks the parts of the configuration that the pool builder does not cover.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if no node is configured or the logging format is
    /// not `"json"` or `"pretty"`.
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("No nodes configured".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }

    /// Feeds pool settings and node entries through [`PoolConfigBuilder`].
    ///
    /// # Errors
    ///
    /// Returns the first [`PoolConfigError`] from duration parsing, pool settings or node
    /// validation.
    pub fn client_configs(&self) -> Result<ClientConfigs, PoolConfigError> {
        let settings = &self.pool;

        let mut builder = PoolConfigBuilder::new()
            .lease_duration(parse_duration("lease_duration", &settings.lease_duration)?)
            .chain_type(settings.chain_type.as_str())
            .shutdown_timeout(parse_duration("shutdown_timeout", &settings.shutdown_timeout)?)
            .call_timeout(parse_duration("call_timeout", &settings.call_timeout)?)
            .nodes(self.nodes.clone());

        if let Some(mode) = &settings.selection_mode {
            builder = builder.selection_mode(mode.as_str());
        }
        if let Some(threshold) = settings.poll_failure_threshold {
            builder = builder.poll_failure_threshold(threshold);
        }
        if let Some(interval) = &settings.poll_interval {
            builder = builder.poll_interval(parse_duration("poll_interval", interval)?);
        }
        if let Some(threshold) = settings.sync_threshold {
            builder = builder.sync_threshold(threshold);
        }
        if let Some(enabled) = settings.node_is_syncing_enabled {
            builder = builder.node_is_syncing_enabled(enabled);
        }

        builder.build()
    }
}

/// Parses a duration such as `"30s"`, `"250ms"`, `"1m30s"` or `"2h"`. A bare `"0"` is zero.
///
/// # Errors
///
/// Returns [`PoolConfigError::InvalidDuration`] naming `field` if the value is empty, has a
/// number without a unit, uses an unknown unit, or overflows.
pub fn parse_duration(field: &'static str, value: &str) -> Result<Duration, PoolConfigError> {
    let invalid = || PoolConfigError::InvalidDuration { field, value: value.to_string() };

    let text = value.trim();
    if text == "0" {
        return Ok(Duration::ZERO);
    }
    if text.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits_end == 0 {
            return Err(invalid());
        }
        let amount: u64 = rest[..digits_end].parse().map_err(|_| invalid())?;
        rest = &rest[digits_end..];

        let unit_end = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_end] {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount.checked_mul(60).ok_or_else(invalid)?),
            "h" => Duration::from_secs(amount.checked_mul(3600).ok_or_else(invalid)?),
            _ => return Err(invalid()),
        };
        rest = &rest[unit_end..];

        total = total.checked_add(part).ok_or_else(invalid)?;
    }

    Ok(total)
}
