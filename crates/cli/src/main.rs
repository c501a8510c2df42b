use anyhow::Result;
use clap::{Parser, Subcommand};
use multinode_core::config::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
use commands::{handle_config_command, watch, ConfigCommands, WatchOptions};

#[derive(Parser)]
#[command(name = "multinode-cli")]
#[command(about = "Multinode CLI - inspect pool configuration and watch node health")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration Management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Start the pool and print node states until Ctrl+C
    Watch {
        /// Path to config file
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,

        /// Seconds between node state reports
        #[arg(long, default_value = "5")]
        refresh_secs: u64,

        /// Print each report as a JSON line
        #[arg(long)]
        json: bool,
    },
}

/// Initializes the tracing subscriber from the `[logging]` section.
///
/// `RUST_LOG` takes precedence over the configured level.
pub(crate) fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,multinode_core={level},multinode_cli={level}",
            level = logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config(config_command) => {
            handle_config_command(config_command)?;
        }

        Commands::Watch { file, refresh_secs, json } => {
            watch(WatchOptions { file, refresh_secs, json }).await?;
        }
    }

    Ok(())
}
