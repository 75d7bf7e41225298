//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts and latency, plus error responses by code
//! - Active WebSocket connection gauge
//! - Quota rejections by limit
//! - Retention deletions, orphaned blobs, failed rooms and cycle duration

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "roomkeeper";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Error responses by application error code
pub static HTTP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_errors_total", "Error responses by application error code")
            .namespace(NAMESPACE),
        &["code"],
    )
    .expect("Failed to create HTTP_ERRORS_TOTAL metric")
});

/// Active WebSocket connections gauge
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<Gauge> = Lazy::new(|| {
    Gauge::with_opts(
        Opts::new(
            "websocket_connections_active",
            "Number of active WebSocket connections",
        )
        .namespace(NAMESPACE),
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Writes rejected by the quota guard
pub static QUOTA_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("quota_rejections_total", "Writes rejected by a room quota")
            .namespace(NAMESPACE),
        &["limit"],
    )
    .expect("Failed to create QUOTA_REJECTIONS_TOTAL metric")
});

/// Records removed by retention sweeps
pub static RETENTION_DELETED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("retention_deleted_total", "Records removed by retention sweeps")
            .namespace(NAMESPACE),
        &["class"],
    )
    .expect("Failed to create RETENTION_DELETED_TOTAL metric")
});

/// Blobs whose metadata is gone but whose delete failed
pub static RETENTION_ORPHAN_BLOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "retention_orphan_blobs_total",
            "Blob deletions that failed after their metadata was removed",
        )
        .namespace(NAMESPACE),
        &["source"],
    )
    .expect("Failed to create RETENTION_ORPHAN_BLOBS_TOTAL metric")
});

/// Rooms a sweep cycle gave up on
pub static RETENTION_ROOM_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "retention_room_failures_total",
            "Rooms skipped by a sweep cycle after store errors",
        )
        .namespace(NAMESPACE),
        &["class"],
    )
    .expect("Failed to create RETENTION_ROOM_FAILURES_TOTAL metric")
});

/// Sweep cycle duration histogram
pub static RETENTION_CYCLE_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0];
    HistogramVec::new(
        HistogramOpts::new(
            "retention_cycle_duration_seconds",
            "Wall time of one retention sweep cycle",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["class"],
    )
    .expect("Failed to create RETENTION_CYCLE_DURATION_SECONDS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(HTTP_ERRORS_TOTAL.clone()))
        .expect("Failed to register HTTP_ERRORS_TOTAL");
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(QUOTA_REJECTIONS_TOTAL.clone()))
        .expect("Failed to register QUOTA_REJECTIONS_TOTAL");
    registry
        .register(Box::new(RETENTION_DELETED_TOTAL.clone()))
        .expect("Failed to register RETENTION_DELETED_TOTAL");
    registry
        .register(Box::new(RETENTION_ORPHAN_BLOBS_TOTAL.clone()))
        .expect("Failed to register RETENTION_ORPHAN_BLOBS_TOTAL");
    registry
        .register(Box::new(RETENTION_ROOM_FAILURES_TOTAL.clone()))
        .expect("Failed to register RETENTION_ROOM_FAILURES_TOTAL");
    registry
        .register(Box::new(RETENTION_CYCLE_DURATION_SECONDS.clone()))
        .expect("Failed to register RETENTION_CYCLE_DURATION_SECONDS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn record_http_error(code: u16) {
    HTTP_ERRORS_TOTAL
        .with_label_values(&[&code.to_string()])
        .inc();
}

/// Helper to update WebSocket connection count
pub fn set_websocket_connections(connected: usize) {
    WEBSOCKET_CONNECTIONS_ACTIVE.set(connected as f64);
}

pub fn record_quota_rejection(limit: &str) {
    QUOTA_REJECTIONS_TOTAL.with_label_values(&[limit]).inc();
}

/// Count records removed by a sweep page.
pub fn record_retention_deletion(class: &str, count: u64) {
    if count > 0 {
        RETENTION_DELETED_TOTAL
            .with_label_values(&[class])
            .inc_by(count);
    }
}

/// `source` is the resource class or "manual" for user-initiated deletes.
pub fn record_orphan_blob(source: &str) {
    RETENTION_ORPHAN_BLOBS_TOTAL
        .with_label_values(&[source])
        .inc();
}

pub fn record_retention_room_failure(class: &str) {
    RETENTION_ROOM_FAILURES_TOTAL
        .with_label_values(&[class])
        .inc();
}

pub fn record_retention_cycle(class: &str, duration_secs: f64) {
    RETENTION_CYCLE_DURATION_SECONDS
        .with_label_values(&[class])
        .observe(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_retention_counters() {
        record_retention_deletion("messages", 3);
        record_orphan_blob("files");
        let output = gather_metrics();
        assert!(output.contains("roomkeeper_retention_deleted_total"));
        assert!(output.contains("roomkeeper_retention_orphan_blobs_total"));
    }

    #[test]
    fn test_zero_deletions_not_counted() {
        let before = RETENTION_DELETED_TOTAL
            .with_label_values(&["noop"])
            .get();
        record_retention_deletion("noop", 0);
        assert_eq!(
            RETENTION_DELETED_TOTAL.with_label_values(&["noop"]).get(),
            before
        );
    }
}
