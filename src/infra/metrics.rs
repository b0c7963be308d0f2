//! Prometheus metrics for monitoring.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, TextEncoder, register_histogram,
    register_int_counter, register_int_counter_vec,
};

/// Total requests that reached the router
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("gh_relay_requests_total", "Total requests handled by the relay")
        .expect("failed to register prometheus counter: gh_relay_requests_total")
});

/// Requests by dispatch outcome (pattern name, mirror, fallback, preflight, ...)
pub static REQUESTS_BY_ROUTE: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gh_relay_requests_by_route",
        "Requests by dispatch outcome",
        &["route"]
    )
    .expect("failed to register prometheus counter: gh_relay_requests_by_route")
});

/// Foreign redirects followed server-side
pub static REDIRECTS_FOLLOWED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gh_relay_redirects_followed_total",
        "Foreign redirects followed server-side"
    )
    .expect("failed to register prometheus counter: gh_relay_redirects_followed_total")
});

/// Upstream redirects rewritten to loop back through the relay
pub static LOOPBACK_REWRITES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gh_relay_loopback_rewrites_total",
        "Upstream redirects rewritten to loop back through the relay"
    )
    .expect("failed to register prometheus counter: gh_relay_loopback_rewrites_total")
});

/// Total bytes streamed to clients
pub static BYTES_TRANSFERRED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gh_relay_bytes_transferred_total",
        "Total bytes streamed to clients"
    )
    .expect("failed to register prometheus counter: gh_relay_bytes_transferred_total")
});

/// Relayed request duration, until the body stream ends
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "gh_relay_request_duration_seconds",
        "Relayed request duration in seconds",
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("failed to register prometheus histogram: gh_relay_request_duration_seconds")
});

/// Error counts by error type
pub static ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("gh_relay_errors_total", "Errors by type", &["error_type"])
        .expect("failed to register prometheus counter: gh_relay_errors_total")
});

pub fn record_route(route: &str) {
    HTTP_REQUESTS_TOTAL.inc();
    REQUESTS_BY_ROUTE.with_label_values(&[route]).inc();
}

pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::with_capacity(8192);
    encoder
        .encode(&metric_families, &mut buffer)
        .unwrap_or_default();
    let body = String::from_utf8_lossy(&buffer).to_string();

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}
