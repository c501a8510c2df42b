use clap::Subcommand;
use multinode_core::{config::AppConfig, upstream::ClientConfigs};
use std::path::Path;

use super::utils::{print_error, print_info, print_success, CliError, CliResult};

#[derive(Subcommand)]
pub(crate) enum ConfigCommands {
    /// Validate a configuration file and the pool it describes
    Validate {
        /// Path to config file (defaults to config/config.toml)
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,
    },

    /// Show the effective configuration
    Show {
        /// Path to config file (defaults to config/config.toml)
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,

        /// Print as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
}

pub(crate) fn handle_config_command(command: ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Validate { file } => validate_config(&file),
        ConfigCommands::Show { file, json } => show_config(&file, json),
    }
}

/// Loads, checks and builds the pool configuration from `file`.
pub(crate) fn load_client_configs(file: &str) -> CliResult<(AppConfig, ClientConfigs)> {
    let config = AppConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))?;
    config.validate().map_err(CliError::Config)?;
    let configs = config.client_configs().map_err(|e| CliError::Config(e.to_string()))?;
    Ok((config, configs))
}

fn validate_config(file: &str) -> CliResult<()> {
    if !Path::new(file).exists() {
        print_error(&format!("Configuration file not found: {file}"));
        return Err(CliError::Config(format!("File not found: {file}")));
    }

    print_info(&format!("Loading configuration from {file}..."));

    let (_, configs) = load_client_configs(file).inspect_err(|e| print_error(&e.to_string()))?;

    print_success("Configuration is valid!");

    println!("Configuration Summary:");
    println!("  Selection Mode: {}", configs.pool.selection_mode());
    println!("  Poll Interval: {:?}", configs.pool.poll_interval());
    println!(
        "  Leases: {}",
        if configs.pool.lease_enabled() {
            format!("{:?}", configs.pool.lease_duration())
        } else {
            "disabled".to_string()
        }
    );
    println!("  Nodes: {}", configs.nodes.len());

    Ok(())
}

fn show_config(file: &str, json: bool) -> CliResult<()> {
    let config = AppConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("Configuration from {file}:");
    print!("{}", render_config(&config));

    Ok(())
}

fn render_config(config: &AppConfig) -> String {
    let pool = &config.pool;
    let unset = "(unset)";
    let mut out = String::new();

    out.push_str("\n[Pool]\n");
    out.push_str(&format!("  Selection Mode: {}\n", pool.selection_mode.as_deref().unwrap_or(unset)));
    out.push_str(&format!("  Lease Duration: {}\n", pool.lease_duration));
    out.push_str(&format!(
        "  Poll Failure Threshold: {}\n",
        pool.poll_failure_threshold.map_or_else(|| unset.to_string(), |v| v.to_string())
    ));
    out.push_str(&format!("  Poll Interval: {}\n", pool.poll_interval.as_deref().unwrap_or(unset)));
    out.push_str(&format!(
        "  Sync Threshold: {}\n",
        pool.sync_threshold.map_or_else(|| unset.to_string(), |v| v.to_string())
    ));
    out.push_str(&format!(
        "  Syncing Check: {}\n",
        pool.node_is_syncing_enabled.map_or_else(|| unset.to_string(), |v| v.to_string())
    ));
    if !pool.chain_type.is_empty() {
        out.push_str(&format!("  Chain Type: {}\n", pool.chain_type));
    }

    out.push_str(&format!("\n[Nodes] ({} configured)\n", config.nodes.len()));
    for node in &config.nodes {
        let order = node.order.map_or_else(|| "implicit".to_string(), |o| o.to_string());
        out.push_str(&format!(
            "  {} (order {order})\n    ws: {}\n    http: {}\n",
            node.name.as_deref().unwrap_or(unset),
            node.ws_url.as_deref().unwrap_or(unset),
            node.http_url.as_deref().unwrap_or(unset),
        ));
    }

    out.push_str("\n[Logging]\n");
    out.push_str(&format!("  Level: {}\n", config.logging.level));
    out.push_str(&format!("  Format: {}\n", config.logging.format));

    out
}
