// Path: crates/telemetry/src/prometheus.rs
//! A concrete implementation of the metrics sinks using the Prometheus crate.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGaugeVec,
};

// --- Metric Statics ---
// Held in OnceCell so `install` initializes them exactly once.

static POLL_CYCLES_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static POLL_SKIPPED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static POLL_DURATION_SECONDS: OnceCell<Histogram> = OnceCell::new();
static EVIDENCE_DETECTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static EVIDENCE_KNOWN: OnceCell<IntGaugeVec> = OnceCell::new();
static CHAIN_FAILURES_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static UNRESOLVED_IDENTITIES_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static ERRORS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

// Metrics are only recorded once `install()` has run; before that the sink is
// unreachable through `SINK`, so a missing collector is silently skipped.
macro_rules! with_metric {
    ($metric:ident, |$m:ident| $body:expr) => {
        if let Some($m) = $metric.get() {
            $body;
        }
    };
}

impl WatcherMetricsSink for PrometheusSink {
    fn inc_poll_cycles(&self) {
        with_metric!(POLL_CYCLES_TOTAL, |m| m.inc());
    }
    fn inc_poll_skipped(&self) {
        with_metric!(POLL_SKIPPED_TOTAL, |m| m.inc());
    }
    fn observe_poll_duration(&self, duration_secs: f64) {
        with_metric!(POLL_DURATION_SECONDS, |m| m.observe(duration_secs));
    }
    fn inc_evidence_detected(&self, chain_id: &str, count: u64) {
        with_metric!(EVIDENCE_DETECTED_TOTAL, |m| m
            .with_label_values(&[chain_id])
            .inc_by(count));
    }
    fn set_known_evidence(&self, chain_id: &str, count: u64) {
        with_metric!(EVIDENCE_KNOWN, |m| m
            .with_label_values(&[chain_id])
            .set(i64::try_from(count).unwrap_or(i64::MAX)));
    }
    fn inc_chain_failures(&self, chain_id: &str, reason: &'static str) {
        with_metric!(CHAIN_FAILURES_TOTAL, |m| m
            .with_label_values(&[chain_id, reason])
            .inc());
    }
    fn inc_unresolved_identities(&self, chain_id: &str) {
        with_metric!(UNRESOLVED_IDENTITIES_TOTAL, |m| m
            .with_label_values(&[chain_id])
            .inc());
    }
}

impl ErrorMetricsSink for PrometheusSink {
    fn inc_error(&self, kind: &'static str, variant: &'static str) {
        with_metric!(ERRORS_TOTAL, |m| m.with_label_values(&[kind, variant]).inc());
    }
}

fn already_installed() -> prometheus::Error {
    prometheus::Error::Msg("metrics already installed".into())
}

/// Registers every collector in the default registry and returns the sink that
/// records into them. A second call fails with a registration error.
pub fn install() -> Result<&'static dyn MetricsSink, prometheus::Error> {
    POLL_CYCLES_TOTAL
        .set(register_int_counter!(
            "eqwatch_poll_cycles_total",
            "Total number of completed poll cycles."
        )?)
        .map_err(|_| already_installed())?;
    POLL_SKIPPED_TOTAL
        .set(register_int_counter!(
            "eqwatch_poll_skipped_total",
            "Ticks skipped because the previous cycle was still running."
        )?)
        .map_err(|_| already_installed())?;
    POLL_DURATION_SECONDS
        .set(register_histogram!(
            "eqwatch_poll_duration_seconds",
            "Wall-clock duration of a poll cycle across all chains.",
            exponential_buckets(0.05, 2.0, 14)?
        )?)
        .map_err(|_| already_installed())?;
    EVIDENCE_DETECTED_TOTAL
        .set(register_int_counter_vec!(
            "eqwatch_evidence_detected_total",
            "Evidence records reported as new, per chain.",
            &["chain_id"]
        )?)
        .map_err(|_| already_installed())?;
    EVIDENCE_KNOWN
        .set(register_int_gauge_vec!(
            "eqwatch_evidence_known",
            "Evidence records currently held in state, per chain.",
            &["chain_id"]
        )?)
        .map_err(|_| already_installed())?;
    CHAIN_FAILURES_TOTAL
        .set(register_int_counter_vec!(
            "eqwatch_chain_failures_total",
            "Chain reconciliations aborted for a cycle, by reason.",
            &["chain_id", "reason"]
        )?)
        .map_err(|_| already_installed())?;
    UNRESOLVED_IDENTITIES_TOTAL
        .set(register_int_counter_vec!(
            "eqwatch_unresolved_identities_total",
            "Evidence records whose validator identity could not be resolved.",
            &["chain_id"]
        )?)
        .map_err(|_| already_installed())?;
    ERRORS_TOTAL
        .set(register_int_counter_vec!(
            "eqwatch_errors_total",
            "Total number of errors, categorized by type and variant.",
            &["kind", "variant"]
        )?)
        .map_err(|_| already_installed())?;

    static SINK: PrometheusSink = PrometheusSink;
    Ok(&SINK)
}
