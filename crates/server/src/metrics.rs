//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the Chroma server:
//! - HTTP request metrics (latency, counts, in-flight)
//! - WebSocket connection metrics
//! - Job lifecycle metrics

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "chroma_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("chroma_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "chroma_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "chroma_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "chroma_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// Snapshots delivered over WebSocket.
pub static WS_SNAPSHOTS_SENT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "chroma_ws_snapshots_sent_total",
        "Job snapshots delivered over WebSocket",
    )
    .unwrap()
});

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs submitted total.
pub static JOBS_SUBMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "chroma_jobs_submitted_total",
        "Total jobs submitted since startup",
    )
    .unwrap()
});

/// Uploads accepted total.
pub static UPLOADS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "chroma_uploads_total",
        "Total image uploads accepted since startup",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_SNAPSHOTS_SENT.clone()))
        .unwrap();

    // Jobs
    registry
        .register(Box::new(JOBS_SUBMITTED_TOTAL.clone()))
        .unwrap();
    registry.register(Box::new(UPLOADS_TOTAL.clone())).unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Normalize a request path for metric labels, collapsing ids so label
/// cardinality stays bounded.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for segment in path.split('/') {
        // Ids are hex uuids or otherwise long opaque tokens.
        let is_id = segment.len() >= 16 && segment.chars().all(|c| c.is_ascii_alphanumeric());
        if is_id {
            parts.push(":id".to_string());
        } else {
            parts.push(segment.to_string());
        }
    }
    parts.join("/")
}
