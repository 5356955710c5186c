//! Prometheus metrics for the store service.
//!
//! The service only marks phase boundaries and request lifetimes; aggregation
//! and exposition belong to the Prometheus recorder owned by [`Metrics`].
//! Nothing is installed as the process-wide recorder, so independent services
//! in one process keep independent counts.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusRecorder};
use std::sync::Arc;
use std::time::Instant;

/// Metric names used throughout the application.
pub mod names {
    /// Number of requests currently being handled, labeled by operation.
    pub const REQUESTS_ACTIVE: &str = "webstore_requests_active";
    /// Total requests handled, labeled by operation and outcome.
    pub const REQUESTS_TOTAL: &str = "webstore_requests_total";
    /// Duration of a single request phase in seconds, labeled by operation and phase.
    pub const PHASE_DURATION_SECONDS: &str = "webstore_phase_duration_seconds";
    /// Total plaintext bytes accepted by uploads.
    pub const BYTES_UPLOADED_TOTAL: &str = "webstore_bytes_uploaded_total";
    /// Total plaintext bytes served by downloads.
    pub const BYTES_DOWNLOADED_TOTAL: &str = "webstore_bytes_downloaded_total";
}

/// Metrics collector, built once and handed to the store service.
#[derive(Clone, Default)]
pub struct Metrics {
    recorder: Option<Arc<PrometheusRecorder>>,
}

impl Metrics {
    /// Build a Prometheus collector.
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            recorder: Some(Arc::new(recorder)),
        }
    }

    /// Metrics are recorded into the void; `/metrics` renders nothing.
    pub fn disabled() -> Self {
        Self { recorder: None }
    }

    /// Render the Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.recorder
            .as_ref()
            .map(|r| r.handle().render())
            .unwrap_or_default()
    }

    /// Run `f` with this collector as the recorder for the `metrics` macros.
    fn with_recorder(&self, f: impl FnOnce()) {
        if let Some(recorder) = &self.recorder {
            metrics::with_local_recorder(&**recorder, f);
        }
    }
}

/// Keeps the active-request gauge raised for as long as it lives.
#[must_use]
pub struct ActiveRequest<'a> {
    metrics: &'a Metrics,
    op: &'static str,
}

impl<'a> ActiveRequest<'a> {
    pub fn start(metrics: &'a Metrics, op: &'static str) -> Self {
        metrics.with_recorder(|| {
            metrics::gauge!(names::REQUESTS_ACTIVE, "op" => op).increment(1);
        });
        Self { metrics, op }
    }
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        let op = self.op;
        self.metrics.with_recorder(|| {
            metrics::gauge!(names::REQUESTS_ACTIVE, "op" => op).decrement(1);
        });
    }
}

/// Marks the boundaries of consecutive phases within one request.
pub struct PhaseTimer<'a> {
    metrics: &'a Metrics,
    op: &'static str,
    last: Instant,
}

impl<'a> PhaseTimer<'a> {
    pub fn start(metrics: &'a Metrics, op: &'static str) -> Self {
        Self {
            metrics,
            op,
            last: Instant::now(),
        }
    }

    /// Close the current phase under `phase` and start the next one.
    pub fn mark(&mut self, phase: &'static str) {
        let now = Instant::now();
        record::phase_duration(
            self.metrics,
            self.op,
            phase,
            now.duration_since(self.last).as_secs_f64(),
        );
        self.last = now;
    }
}

/// Convenience functions for recording metrics.
pub mod record {
    use metrics::{counter, histogram};

    use super::{names, Metrics};

    /// Record the outcome of a request.
    pub fn request_finished(metrics: &Metrics, op: &'static str, outcome: &'static str) {
        metrics.with_recorder(|| {
            counter!(names::REQUESTS_TOTAL, "op" => op, "outcome" => outcome).increment(1);
        });
    }

    /// Record how long one phase of a request took.
    pub fn phase_duration(metrics: &Metrics, op: &'static str, phase: &'static str, duration_secs: f64) {
        metrics.with_recorder(|| {
            histogram!(names::PHASE_DURATION_SECONDS, "op" => op, "phase" => phase)
                .record(duration_secs);
        });
    }

    /// Record bytes accepted by an upload.
    pub fn bytes_uploaded(metrics: &Metrics, bytes: u64) {
        metrics.with_recorder(|| counter!(names::BYTES_UPLOADED_TOTAL).increment(bytes));
    }

    /// Record bytes served by a download.
    pub fn bytes_downloaded(metrics: &Metrics, bytes: u64) {
        metrics.with_recorder(|| counter!(names::BYTES_DOWNLOADED_TOTAL).increment(bytes));
    }
}
