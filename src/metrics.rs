//! Prometheus metrics for the request pipeline.
//!
//! Metrics are exposed via a dedicated HTTP listener when `METRICS_PORT` is
//! non-zero. Without an installed exporter the recording functions are no-ops.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `senatron_requests_total` - Completed requests (label: status)
//! - `senatron_recovered_failures_total` - Failures converted by a recovery layer (labels: kind, layer)
//! - `senatron_log_flush_failures_total` - Request log blocks that could not be written
//!
//! ## Histograms
//! - `senatron_request_duration_seconds` - Time from logger attach to flush
//!
//! ## Gauges
//! - `senatron_active_requests` - Live entries in the request context store

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "senatron_requests_total";
    pub const RECOVERED_FAILURES_TOTAL: &str = "senatron_recovered_failures_total";
    pub const LOG_FLUSH_FAILURES_TOTAL: &str = "senatron_log_flush_failures_total";
    pub const REQUEST_DURATION_SECONDS: &str = "senatron_request_duration_seconds";
    pub const ACTIVE_REQUESTS: &str = "senatron_active_requests";
}

/// Install the Prometheus exporter and describe all metrics.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (port in use,
/// recorder already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(names::REQUESTS_TOTAL, "Total number of completed requests");
    describe_counter!(
        names::RECOVERED_FAILURES_TOTAL,
        "Failures converted into 404/500 responses by a recovery layer"
    );
    describe_counter!(
        names::LOG_FLUSH_FAILURES_TOTAL,
        "Request log blocks that failed to reach the log sink"
    );
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "Request handling time in seconds"
    );
    describe_gauge!(
        names::ACTIVE_REQUESTS,
        "Requests currently registered in the context store"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Initialize metrics, logging failures instead of returning them.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

pub fn record_request(status: u16, duration: Duration) {
    counter!(names::REQUESTS_TOTAL, "status" => status.to_string()).increment(1);
    histogram!(names::REQUEST_DURATION_SECONDS).record(duration.as_secs_f64());
}

pub fn record_recovered_failure(kind: &'static str, layer: &'static str) {
    counter!(names::RECOVERED_FAILURES_TOTAL, "kind" => kind, "layer" => layer).increment(1);
}

pub fn record_log_flush_failure() {
    counter!(names::LOG_FLUSH_FAILURES_TOTAL).increment(1);
}

pub fn set_active_requests(count: usize) {
    gauge!(names::ACTIVE_REQUESTS).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        record_request(200, Duration::from_millis(3));
        record_recovered_failure("not_found", "inner");
        record_log_flush_failure();
        set_active_requests(0);
    }

    #[test]
    fn test_metric_names_share_prefix() {
        for name in [
            names::REQUESTS_TOTAL,
            names::RECOVERED_FAILURES_TOTAL,
            names::LOG_FLUSH_FAILURES_TOTAL,
            names::REQUEST_DURATION_SECONDS,
            names::ACTIVE_REQUESTS,
        ] {
            assert!(name.starts_with("senatron_"));
        }
    }
}
