//! Telemetry sink port.
//!
//! Telemetry export is an external collaborator: components record a named
//! event with labels and nothing more. `minuteflow-infra` provides the
//! production sink; tests use [`NoopTelemetry`] or a counting fake.

use std::sync::Arc;

/// Records named events with labels.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &str, labels: &[(&str, &str)]);
}

/// Sink that drops everything. Default for tests and minimal wiring.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record(&self, _event: &str, _labels: &[(&str, &str)]) {}
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Arc<T> {
    fn record(&self, event: &str, labels: &[(&str, &str)]) {
        (**self).record(event, labels);
    }
}
