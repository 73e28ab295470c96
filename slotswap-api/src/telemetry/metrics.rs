//! Prometheus Metrics Definitions
//!
//! All metrics live in the default registry and are exposed on `/metrics`.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use slotswap_core::SlotSwapError;

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance, registered on first use.
pub static METRICS: Lazy<ApiResult<SlotSwapMetrics>> = Lazy::new(SlotSwapMetrics::new);

#[derive(Clone)]
pub struct SlotSwapMetrics {
    /// labels: method, path, status
    pub http_requests_total: CounterVec,

    /// labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// labels: operation, outcome
    pub swap_operations_total: CounterVec,
}

impl SlotSwapMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "slotswap_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to register http_requests_total: {}", e))
            })?,

            http_request_duration_seconds: register_histogram_vec!(
                "slotswap_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to register http_request_duration_seconds: {}",
                    e
                ))
            })?,

            swap_operations_total: register_counter_vec!(
                "slotswap_swap_operations_total",
                "Swap negotiation operations by outcome",
                &["operation", "outcome"]
            )
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to register swap_operations_total: {}", e))
            })?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Count a negotiation step. `outcome` is e.g. "proposed", "accepted",
    /// "rejected", or the failure kind.
    pub fn record_swap_operation(&self, operation: &str, outcome: &str) {
        self.swap_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }
}

/// Label for a failed negotiation step.
pub fn failure_outcome(err: &SlotSwapError) -> &'static str {
    use slotswap_core::ErrorKind;
    match err.kind() {
        ErrorKind::NotFound => "not_found",
        ErrorKind::Forbidden => "forbidden",
        ErrorKind::InvalidState => "invalid_state",
        ErrorKind::InvalidInput => "invalid_input",
        ErrorKind::StoreFailure => "store_failure",
    }
}

/// Record a negotiation step when metrics are available.
pub fn record_swap_operation(operation: &str, outcome: &str) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_swap_operation(operation, outcome);
    }
}

/// Handler for GET /metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Register ours before gathering so they appear on the first scrape.
    if let Err(e) = METRICS.as_ref() {
        tracing::warn!(error = %e, "Metrics registration failed");
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_swap_operation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        let before = metrics
            .swap_operations_total
            .with_label_values(&["respond", "accepted"])
            .get();
        record_swap_operation("respond", "accepted");
        let after = metrics
            .swap_operations_total
            .with_label_values(&["respond", "accepted"])
            .get();
        assert!(after >= before + 1.0);
        Ok(())
    }

    #[test]
    fn test_failure_outcome_labels() {
        assert_eq!(
            failure_outcome(&SlotSwapError::forbidden("x")),
            "forbidden"
        );
        assert_eq!(
            failure_outcome(&SlotSwapError::invalid_state("x")),
            "invalid_state"
        );
    }

    #[tokio::test]
    async fn test_metrics_handler_exposes_swap_counter() {
        record_swap_operation("propose", "proposed");
        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("slotswap_swap_operations_total"));
    }
}
