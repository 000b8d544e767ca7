// Path: crates/telemetry/src/time.rs
use crate::sinks::WatcherMetricsSink;
use std::time::Instant;

/// Observes the lifetime of the guard as a poll cycle duration.
pub struct Timer<'a> {
    sink: &'a dyn WatcherMetricsSink,
    start: Instant,
}

impl<'a> Timer<'a> {
    pub fn new(sink: &'a dyn WatcherMetricsSink) -> Self {
        Self {
            sink,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        self.sink
            .observe_poll_duration(self.start.elapsed().as_secs_f64());
    }
}
