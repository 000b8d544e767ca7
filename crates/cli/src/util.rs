// Path: crates/cli/src/util.rs
//! Wiring shared by the subcommands.

use anyhow::{Context, Result};
use async_trait::async_trait;
use eqwatch_reconciler::assignment::KeyAssignmentResolver;
use eqwatch_reconciler::codec::AddressCodec;
use eqwatch_reconciler::directory::ValidatorDirectoryCollector;
use eqwatch_reconciler::fetcher::EvidenceFetcher;
use eqwatch_reconciler::{
    CommandQueryPort, ExternalQueryPort, IdentityResolver, ReconciliationEngine, StateStore,
    UpdateSink,
};
use eqwatch_types::config::WatcherConfig;
use eqwatch_types::evidence::EvidenceUpdate;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub fn load_config(path: &Path) -> Result<WatcherConfig> {
    WatcherConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

pub fn build_port(cfg: &WatcherConfig) -> Arc<dyn ExternalQueryPort> {
    Arc::new(CommandQueryPort::new(
        cfg.evidence_binary.clone(),
        cfg.root.binary.clone(),
        cfg.root.rpc_url.clone(),
        Duration::from_secs(cfg.command_timeout_secs),
    ))
}

pub fn build_resolver(
    cfg: &WatcherConfig,
    port: Arc<dyn ExternalQueryPort>,
) -> Result<IdentityResolver> {
    let collector = ValidatorDirectoryCollector::new(
        Duration::from_secs(cfg.http_timeout_secs),
        cfg.rpc_page_size,
    )
    .context("Failed to build the validator directory client")?;
    Ok(IdentityResolver::new(
        AddressCodec::new(port.clone()),
        KeyAssignmentResolver::new(port),
        collector,
        cfg.root.clone(),
    ))
}

pub fn build_engine(cfg: &WatcherConfig) -> Result<ReconciliationEngine> {
    let port = build_port(cfg);
    let resolver = build_resolver(cfg, port.clone())?;
    let store = StateStore::new(&cfg.evidence_filename).reset_corrupt(cfg.reset_corrupt_state);
    ReconciliationEngine::new(
        cfg.monitored_chains(),
        store,
        EvidenceFetcher::new(port),
        resolver,
    )
    .with_context(|| {
        format!(
            "Failed to load evidence state from {}",
            cfg.evidence_filename.display()
        )
    })
}

/// Writes each update as one JSON line to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn write(&self, update: &EvidenceUpdate) -> Result<()> {
        let line = serde_json::to_string(update)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

#[async_trait]
impl UpdateSink for StdoutSink {
    async fn deliver(&self, update: &EvidenceUpdate) -> Result<()> {
        self.write(update)
    }
}
