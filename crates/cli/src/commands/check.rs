// Path: crates/cli/src/commands/check.rs

use crate::util::{self, StdoutSink};
use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Path to the watcher configuration file.
    #[clap(long)]
    pub config: PathBuf,
}

/// Runs one cycle. New evidence goes to stdout; chains that failed make the
/// command exit non-zero after everything else was reported.
pub async fn run(args: CheckArgs) -> Result<()> {
    let cfg = util::load_config(&args.config)?;
    let mut engine = util::build_engine(&cfg)?;

    let report = engine.poll().await;
    for update in &report.updates {
        StdoutSink.write(update)?;
    }
    if !report.failed_chains.is_empty() {
        bail!(
            "Reconciliation failed for: {}",
            report.failed_chains.join(", ")
        );
    }
    Ok(())
}
