use chrono::{DateTime, Utc};
use multinode_core::upstream::{HttpTransportFactory, NodePool, NodeStatus};
use std::{fmt::Write as _, time::Duration};
use tokio::{
    signal,
    time::{interval, MissedTickBehavior},
};
use tracing::{error, info};

use super::{
    config::load_client_configs,
    utils::{print_error, print_info, print_success, CliResult},
};

pub(crate) struct WatchOptions {
    pub(crate) file: String,
    pub(crate) refresh_secs: u64,
    pub(crate) json: bool,
}

/// Runs a pool over HTTP transports and reports node states until a shutdown signal.
pub(crate) async fn watch(options: WatchOptions) -> CliResult<()> {
    let (config, configs) = load_client_configs(&options.file)?;
    crate::init_logging(&config.logging);

    let pool = NodePool::new(configs, &HttpTransportFactory::default())?;
    pool.start()?;
    print_info(&format!(
        "Watching {} node(s) with {} selection, Ctrl+C to stop",
        pool.nodes().len(),
        pool.config().selection_mode()
    ));

    let mut ticker = interval(Duration::from_secs(options.refresh_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => break,
            _ = ticker.tick() => {
                let states = pool.node_states();
                if options.json {
                    println!("{}", serde_json::to_string(&states)?);
                } else {
                    print!("{}", render_states(&states, pool.highest_head(), Utc::now()));
                }
            }
        }
    }

    print_info("Closing pool...");
    if let Err(e) = pool.close().await {
        print_error(&e.to_string());
        return Err(e.into());
    }
    print_success("Pool closed");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, closing node pool");
}

fn render_states(states: &[NodeStatus], highest_head: u64, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nhighest head: {highest_head}");
    let _ = writeln!(
        out,
        "{:<20} {:<12} {:>5} {:>12} {:>8} {:>8}",
        "NAME", "STATE", "ORDER", "HEAD", "FAILURES", "AGE"
    );

    for status in states {
        let age = status
            .seconds_since_observed(now)
            .map_or_else(|| "-".to_string(), |secs| format!("{secs}s"));
        let _ = writeln!(
            out,
            "{:<20} {:<12} {:>5} {:>12} {:>8} {:>8}",
            status.name,
            status.state.to_string(),
            status.order,
            status.head,
            status.consecutive_failures,
            age
        );
    }

    out
}
