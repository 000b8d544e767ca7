// Path: crates/telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `MetricsSink` implementation.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns a static reference to the configured error metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn error_metrics() -> &'static dyn ErrorMetricsSink {
    match SINK.get() {
        Some(sink) => sink.as_error_sink(),
        None => &NOP_SINK,
    }
}

/// Returns a static reference to the configured watcher metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn watcher_metrics() -> &'static dyn WatcherMetricsSink {
    match SINK.get() {
        Some(sink) => sink.as_watcher_sink(),
        None => &NOP_SINK,
    }
}

// --- Trait Definitions ---

/// A sink for metrics related to the poll loop and reconciliation.
pub trait WatcherMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the counter of completed poll cycles.
    fn inc_poll_cycles(&self);
    /// Increments the counter of ticks skipped because a cycle was still running.
    fn inc_poll_skipped(&self);
    /// Observes the wall-clock duration of a single poll cycle.
    fn observe_poll_duration(&self, duration_secs: f64);
    /// Adds newly detected evidence records for a chain.
    fn inc_evidence_detected(&self, chain_id: &str, count: u64);
    /// Sets the gauge of evidence records currently known for a chain.
    fn set_known_evidence(&self, chain_id: &str, count: u64);
    /// Increments the counter of chain reconciliations that were aborted.
    fn inc_chain_failures(&self, chain_id: &str, reason: &'static str);
    /// Increments the counter of records whose identity could not be resolved.
    fn inc_unresolved_identities(&self, chain_id: &str);
}
impl WatcherMetricsSink for NopSink {
    fn inc_poll_cycles(&self) {}
    fn inc_poll_skipped(&self) {}
    fn observe_poll_duration(&self, _duration_secs: f64) {}
    fn inc_evidence_detected(&self, _chain_id: &str, _count: u64) {}
    fn set_known_evidence(&self, _chain_id: &str, _count: u64) {}
    fn inc_chain_failures(&self, _chain_id: &str, _reason: &'static str) {}
    fn inc_unresolved_identities(&self, _chain_id: &str) {}
}

/// A sink for recording structured error metrics.
pub trait ErrorMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for a specific error, categorized by its kind and variant.
    fn inc_error(&self, kind: &'static str, variant: &'static str);
}
impl ErrorMetricsSink for NopSink {
    fn inc_error(&self, _kind: &'static str, _variant: &'static str) {}
}

/// A unified sink that implements all domain-specific traits, providing a single
/// point of implementation for metrics backends like Prometheus.
pub trait MetricsSink: WatcherMetricsSink + ErrorMetricsSink {
    fn as_watcher_sink(&self) -> &dyn WatcherMetricsSink;
    fn as_error_sink(&self) -> &dyn ErrorMetricsSink;
}

impl<T> MetricsSink for T
where
    T: WatcherMetricsSink + ErrorMetricsSink,
{
    fn as_watcher_sink(&self) -> &dyn WatcherMetricsSink {
        self
    }
    fn as_error_sink(&self) -> &dyn ErrorMetricsSink {
        self
    }
}
