//! Prometheus metrics for the orderflow services.
//!
//! Covers HTTP traffic, the write-back cache, the acceptance path, the
//! persistence worker, record store latency and view refreshes.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
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
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_ERRORS_TOTAL: &str = "cache_errors_total";
    pub const CACHE_ENTRIES: &str = "cache_entries";

    // Order pipeline metrics
    pub const ORDERS_ACCEPTED_TOTAL: &str = "orders_accepted_total";
    pub const ORDERS_PUBLISH_FAILURES_TOTAL: &str = "orders_publish_failures_total";
    pub const WORKER_MESSAGES_TOTAL: &str = "worker_messages_total";

    // Record store metrics
    pub const DB_QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";
    pub const VIEW_REFRESH_TOTAL: &str = "view_refresh_total";
    pub const VIEW_REFRESH_DURATION_SECONDS: &str = "view_refresh_duration_seconds";
}

const DB_QUERY_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    let builder = match PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(names::DB_QUERY_DURATION_SECONDS.to_string()),
        DB_QUERY_BUCKETS,
    ) {
        Ok(builder) => builder,
        Err(e) => {
            tracing::error!(error = %e, "Invalid histogram buckets");
            return false;
        }
    };

    // Pull-based: /metrics renders from the handle
    match builder.install_recorder() {
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

// =============================================================================
// HTTP Metrics
// =============================================================================

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let status_class = match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    };

    // Order ids would explode label cardinality
    let normalized_path = normalize_path(path);

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => normalized_path.clone(),
        "status" => status.to_string(),
        "status_class" => status_class.to_string()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => normalized_path
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Cache Metrics
// =============================================================================

/// Record a cache hit.
pub fn record_cache_hit(tier: &str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier.to_string()).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

pub fn record_cache_error(operation: &'static str) {
    counter!(names::CACHE_ERRORS_TOTAL, "operation" => operation).increment(1);
}

/// Set the number of cache entries.
pub fn set_cache_entries(tier: &str, count: usize) {
    gauge!(names::CACHE_ENTRIES, "tier" => tier.to_string()).set(count as f64);
}

// =============================================================================
// Order pipeline
// =============================================================================

pub fn record_order_accepted() {
    counter!(names::ORDERS_ACCEPTED_TOTAL).increment(1);
}

pub fn record_publish_failure() {
    counter!(names::ORDERS_PUBLISH_FAILURES_TOTAL).increment(1);
}

/// Record the terminal outcome of one work item (`committed`, `retried`, `discarded`).
pub fn record_worker_outcome(outcome: &'static str) {
    counter!(names::WORKER_MESSAGES_TOTAL, "outcome" => outcome).increment(1);
}

// =============================================================================
// Record store
// =============================================================================

pub fn record_db_query(operation: &'static str, duration: Duration) {
    histogram!(names::DB_QUERY_DURATION_SECONDS, "operation" => operation)
        .record(duration.as_secs_f64());
}

pub fn record_view_refresh(trigger: &'static str, result: &'static str, duration: Duration) {
    counter!(
        names::VIEW_REFRESH_TOTAL,
        "trigger" => trigger,
        "result" => result
    )
    .increment(1);
    histogram!(names::VIEW_REFRESH_DURATION_SECONDS, "trigger" => trigger)
        .record(duration.as_secs_f64());
}

// =============================================================================
// Helpers
// =============================================================================

/// Replaces ids in a request path with `{id}`.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|part| if is_likely_id(part) { "{id}" } else { part })
        .collect::<Vec<_>>()
        .join("/")
}

/// Check if a string looks like an ID (UUID or numeric).
fn is_likely_id(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }

    if s.len() == 36 && s.chars().filter(|c| *c == '-').count() == 4 {
        return true;
    }
    if s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit()) {
        return true;
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    // Anything long and opaque under /api/orders/ is a (possibly malformed) id
    s.len() > 12 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
