//! Client metrics collection.
//!
//! Recording is a no-op until a recorder is installed, which the binary
//! does when `metrics.listen_addr` is configured.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Installs the global recorder and serves Prometheus text on `addr`.
///
/// Must be called from within the tokio runtime.
pub fn install_prometheus_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("backend_request_duration_seconds".to_string()),
            &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        )?
        .install()
}

/// Record the duration of one backend call.
pub fn record_request_duration(operation: &'static str, outcome: &'static str, duration_secs: f64) {
    histogram!(
        "backend_request_duration_seconds",
        "operation" => operation,
        "outcome" => outcome
    )
    .record(duration_secs);
}

/// Record the size of the alert working set after a refresh.
pub fn record_feed_size(size: usize) {
    gauge!("alert_feed_size").set(size as f64);
}

/// Count poll outcomes ("ok" or "error").
pub fn record_poll(outcome: &'static str) {
    counter!("alert_polls_total", "outcome" => outcome).increment(1);
}

/// Count stale poll entries discarded in favour of a newer local mutation.
pub fn record_stale_entries(count: usize) {
    if count > 0 {
        counter!("alert_feed_stale_entries_total").increment(count as u64);
    }
}

/// Times a backend call.
///
/// ```ignore
/// let timer = RequestTimer::new("list_alerts");
/// let result = client.get(url).send().await;
/// timer.record(if result.is_ok() { "ok" } else { "error" });
/// ```
pub struct RequestTimer {
    operation: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Record the elapsed duration under the given outcome.
    pub fn record(self, outcome: &'static str) -> f64 {
        let duration = self.start.elapsed().as_secs_f64();
        record_request_duration(self.operation, outcome, duration);
        duration
    }
}
