// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics module
//!
//! Operation metrics live in the default Prometheus registry and are exported
//! at `GET /metrics` by every [`Api`](crate::api::Api).

use std::sync::LazyLock;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, TextEncoder, register_histogram_vec,
    register_int_counter_vec,
};
use tracing::error;

/// Operations served, labeled by method, path template and response status
pub static OPERATION_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "rest_operation_requests_total",
        "Total number of operation invocations",
        &["method", "path", "status"]
    )
    .expect("Failed to create rest_operation_requests_total counter vec")
});

/// Time spent in the interceptor chain and handler, in seconds
pub static OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "rest_operation_duration_seconds",
        "Operation durations in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to create rest_operation_duration_seconds histogram")
});

/// Record one finished operation
///
/// # Arguments
/// * `method` - HTTP method of the operation
/// * `path` - Rendered path template, not the concrete request path
/// * `status` - Status code written to the client
/// * `duration_secs` - Time from chain entry to rendered response
pub fn observe_operation(method: &str, path: &str, status: StatusCode, duration_secs: f64) {
    OPERATION_REQUESTS
        .with_label_values(&[method, path, status.as_str()])
        .inc();
    OPERATION_DURATION
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Axum handler that exports metrics in Prometheus text format
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
