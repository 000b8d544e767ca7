// Path: crates/cli/src/commands/run.rs

use crate::util::{self, StdoutSink};
use anyhow::{Context, Result};
use clap::Parser;
use eqwatch_reconciler::{LogSink, PollService};
use eqwatch_telemetry::{http, prometheus, sinks};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the watcher configuration file.
    #[clap(long)]
    pub config: PathBuf,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let cfg = util::load_config(&args.config)?;
    let engine = util::build_engine(&cfg)?;

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let metrics_server = match &cfg.metrics_listen_address {
        Some(raw) => {
            let addr: SocketAddr = raw
                .parse()
                .with_context(|| format!("Invalid metrics_listen_address '{raw}'"))?;
            let sink = prometheus::install().context("Failed to register metrics")?;
            if sinks::SINK.set(sink).is_err() {
                tracing::warn!(target: "cli", "metrics sink already installed");
            }
            Some(tokio::spawn(http::run_server(addr, async move {
                let _ = stop_rx.changed().await;
            })))
        }
        None => None,
    };

    let service = PollService::new(engine)
        .with_sink(Arc::new(LogSink))
        .with_sink(Arc::new(StdoutSink));

    tracing::info!(
        target: "cli",
        interval_secs = cfg.check_interval_secs,
        chains = cfg.monitored_chains().len(),
        "Starting evidence watcher. Press Ctrl+C to stop."
    );
    service
        .run(Duration::from_secs(cfg.check_interval_secs), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(target: "cli", error = %e, "failed to listen for Ctrl+C");
            }
        })
        .await;

    let _ = stop_tx.send(true);
    if let Some(handle) = metrics_server {
        if let Err(e) = handle.await {
            tracing::warn!(target: "cli", error = %e, "metrics server task ended abnormally");
        }
    }
    tracing::info!(target: "cli", "Evidence watcher stopped.");
    Ok(())
}
