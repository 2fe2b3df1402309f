//! Dispatch metrics.
//!
//! A [`TelemetrySink`] implementation that keeps thread-safe counters for
//! the dispatch pipeline and mirrors every event to tracing. Counter reads
//! are monotonic; snapshots are taken with relaxed ordering since the
//! counters are independent.

use std::sync::atomic::{AtomicU64, Ordering};

use minuteflow_core::telemetry::TelemetrySink;
use tracing::debug;

/// Counters for the outbox dispatch pipeline.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    recorded: AtomicU64,
    duplicates: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    dead_lettered: AtomicU64,
    short_circuits: AtomicU64,
    manual_retries: AtomicU64,
    sweeps: AtomicU64,
    other: AtomicU64,
}

/// Point-in-time view of [`DispatchMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DispatchMetricsSnapshot {
    pub recorded: u64,
    pub duplicates: u64,
    pub completed: u64,
    pub failed: u64,
    pub dead_lettered: u64,
    pub short_circuits: u64,
    pub manual_retries: u64,
    pub sweeps: u64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DispatchMetricsSnapshot {
        DispatchMetricsSnapshot {
            recorded: self.recorded.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            short_circuits: self.short_circuits.load(Ordering::Relaxed),
            manual_retries: self.manual_retries.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
        }
    }

    fn counter_for(&self, event: &str) -> &AtomicU64 {
        match event {
            "outbox.recorded" => &self.recorded,
            "outbox.duplicate" => &self.duplicates,
            "outbox.completed" => &self.completed,
            "outbox.failed" => &self.failed,
            "outbox.dead_letter" => &self.dead_lettered,
            "outbox.short_circuit" => &self.short_circuits,
            "outbox.manual_retry" => &self.manual_retries,
            "outbox.swept" => &self.sweeps,
            _ => &self.other,
        }
    }
}

impl TelemetrySink for DispatchMetrics {
    fn record(&self, event: &str, labels: &[(&str, &str)]) {
        debug!(event, ?labels, "telemetry event");
        self.counter_for(event).fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_increment_their_counters() {
        let metrics = DispatchMetrics::new();

        metrics.record("outbox.recorded", &[("topic", "document.create")]);
        metrics.record("outbox.completed", &[]);
        metrics.record("outbox.completed", &[]);
        metrics.record("outbox.dead_letter", &[]);
        metrics.record("outbox.swept", &[]);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.recorded, 1);
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.dead_lettered, 1);
        assert_eq!(snapshot.sweeps, 1);
        assert_eq!(snapshot.failed, 0);
    }

    #[test]
    fn unknown_events_do_not_pollute_known_counters() {
        let metrics = DispatchMetrics::new();
        metrics.record("outbox.unknown_event", &[]);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.recorded, 0);
        assert_eq!(snapshot.completed, 0);
    }
}
