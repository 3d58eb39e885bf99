//! Prometheus metrics for the Rollcall server.
//!
//! Cache counters (`cache_hits_total`, `cache_misses_total`,
//! `cache_invalidations_total`, `cache_entries`) are emitted by the cache
//! crate itself; this module installs the recorder and adds the HTTP and
//! attendance metrics.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    // Cache metrics
    pub const CACHE_ENTRIES: &str = "cache_entries";

    // Attendance metrics
    pub const ATTENDANCE_MARKS_TOTAL: &str = "attendance_marks_total";
    pub const NOTIFICATIONS_FAILED_TOTAL: &str = "notifications_failed_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics is served by the app itself
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Record an HTTP request. `route` is the matched route template, not the raw path.
pub fn record_http_request(method: &str, route: &str, status: u16, duration: Duration) {
    let status_class = match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    };

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status_class" => status_class
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn record_attendance_marks(written: usize) {
    counter!(names::ATTENDANCE_MARKS_TOTAL).increment(written as u64);
}

pub fn record_notification_failure(dispatcher: &'static str) {
    counter!(names::NOTIFICATIONS_FAILED_TOTAL, "dispatcher" => dispatcher).increment(1);
}

/// Set the number of cache entries.
pub fn set_cache_entries(count: usize) {
    gauge!(names::CACHE_ENTRIES).set(count as f64);
}
