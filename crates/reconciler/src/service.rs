// Path: crates/reconciler/src/service.rs
//! The timer-driven poll worker and the upward delivery seam.

use crate::engine::{PollReport, ReconciliationEngine};
use async_trait::async_trait;
use eqwatch_telemetry::{error_metrics, watcher_metrics};
use eqwatch_types::evidence::EvidenceUpdate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

/// Receives newly observed evidence. Delivery channels live outside this crate.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    async fn deliver(&self, update: &EvidenceUpdate) -> anyhow::Result<()>;
}

/// Logs every update at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl UpdateSink for LogSink {
    async fn deliver(&self, update: &EvidenceUpdate) -> anyhow::Result<()> {
        for record in &update.updates {
            tracing::info!(
                target: "service",
                chain_id = %update.chain_id,
                consensus_address = record.record.consensus_address().unwrap_or_default(),
                provider_address = %record.provider_address,
                moniker = %record.moniker,
                "new equivocation"
            );
        }
        Ok(())
    }
}

/// Runs the engine on a fixed interval, never more than one cycle at a time.
#[derive(Clone)]
pub struct PollService {
    engine: Arc<Mutex<ReconciliationEngine>>,
    sinks: Vec<Arc<dyn UpdateSink>>,
}

impl PollService {
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn UpdateSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn engine(&self) -> Arc<Mutex<ReconciliationEngine>> {
        self.engine.clone()
    }

    /// Runs one cycle and delivers its updates, unless a cycle is already in flight,
    /// in which case this returns `None` without waiting.
    pub async fn try_poll(&self) -> Option<PollReport> {
        let report = {
            let Ok(mut engine) = self.engine.try_lock() else {
                tracing::warn!(target: "service", "previous poll still running; skipping tick");
                watcher_metrics().inc_poll_skipped();
                return None;
            };
            engine.poll().await
        };
        for update in &report.updates {
            for sink in &self.sinks {
                if let Err(e) = sink.deliver(update).await {
                    tracing::error!(
                        target: "service",
                        chain_id = %update.chain_id,
                        error = %e,
                        "failed to deliver evidence update"
                    );
                    error_metrics().inc_error("delivery", "DELIVERY_FAILED");
                }
            }
        }
        Some(report)
    }

    /// Polls every `interval` until `shutdown` resolves. The first cycle runs
    /// immediately; ticks missed during a slow cycle are skipped, not replayed.
    pub async fn run<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(target: "service", "shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    if let Some(report) = self.try_poll().await {
                        tracing::debug!(
                            target: "service",
                            updates = report.updates.len(),
                            failed = report.failed_chains.len(),
                            "poll cycle finished"
                        );
                    }
                }
            }
        }
    }
}
