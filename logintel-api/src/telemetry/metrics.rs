//! Prometheus metric definitions, exposed for scraping at `GET /metrics`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

const HTTP_LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0];
const STORAGE_LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

pub static METRICS: Lazy<ApiResult<LogIntelMetrics>> = Lazy::new(LogIntelMetrics::new);

#[derive(Clone)]
pub struct LogIntelMetrics {
    /// labels: method, route, status
    pub http_requests_total: CounterVec,
    /// labels: method, route
    pub http_request_duration_seconds: HistogramVec,
    /// labels: component (row_store/index_store), operation, status
    pub storage_operations_total: CounterVec,
    /// labels: component, operation
    pub storage_operation_duration_seconds: HistogramVec,
    /// labels: outcome (stored/rejected)
    pub ingested_logs_total: CounterVec,
    /// labels: outcome (success/auth_required/invalid_token/rate_limited)
    pub auth_attempts_total: CounterVec,
    pub rate_limited_requests_total: CounterVec,
    pub analyzer_runs_total: CounterVec,
}

impl LogIntelMetrics {
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "logintel_http_requests_total",
                "Total number of HTTP requests",
                &["method", "route", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register http_requests_total: {e}")))?,

            http_request_duration_seconds: register_histogram_vec!(
                "logintel_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "route"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register http_request_duration_seconds: {e}")))?,

            storage_operations_total: register_counter_vec!(
                "logintel_storage_operations_total",
                "Total number of row/index store operations",
                &["component", "operation", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register storage_operations_total: {e}")))?,

            storage_operation_duration_seconds: register_histogram_vec!(
                "logintel_storage_operation_duration_seconds",
                "Row/index store operation duration in seconds",
                &["component", "operation"],
                STORAGE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register storage_operation_duration_seconds: {e}")))?,

            ingested_logs_total: register_counter_vec!(
                "logintel_ingested_logs_total",
                "Total log entries submitted to the ingestion coordinator",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register ingested_logs_total: {e}")))?,

            auth_attempts_total: register_counter_vec!(
                "logintel_auth_attempts_total",
                "Total authentication attempts",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register auth_attempts_total: {e}")))?,

            rate_limited_requests_total: register_counter_vec!(
                "logintel_rate_limited_requests_total",
                "Total requests rejected by rate limiting",
                &["endpoint_class"]
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register rate_limited_requests_total: {e}")))?,

            analyzer_runs_total: register_counter_vec!(
                "logintel_analyzer_runs_total",
                "Total batch analyzer runs",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register analyzer_runs_total: {e}")))?,
        })
    }

    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total.with_label_values(&[method, route, &status_str]).inc();
        self.http_request_duration_seconds.with_label_values(&[method, route]).observe(duration_secs);
    }

    pub fn record_storage_operation(&self, component: &str, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.storage_operations_total.with_label_values(&[component, operation, status]).inc();
        self.storage_operation_duration_seconds.with_label_values(&[component, operation]).observe(duration_secs);
    }

    pub fn record_ingested(&self, stored: usize, rejected: usize) {
        if stored > 0 {
            self.ingested_logs_total.with_label_values(&["stored"]).inc_by(stored as f64);
        }
        if rejected > 0 {
            self.ingested_logs_total.with_label_values(&["rejected"]).inc_by(rejected as f64);
        }
    }

    pub fn record_auth_attempt(&self, outcome: &str) {
        self.auth_attempts_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_rate_limited(&self, endpoint_class: &str) {
        self.rate_limited_requests_total.with_label_values(&[endpoint_class]).inc();
    }
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
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
            tracing::error!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("failed to encode metrics: {e}").into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_initialize_without_panicking() {
        let metrics = METRICS.as_ref().expect("metrics should register");
        metrics.record_http_request("GET", "/api/v1/logs/search", 200, 0.01);
        metrics.record_storage_operation("row_store", "insert_logs", true, 0.002);
        metrics.record_ingested(3, 1);
        metrics.record_auth_attempt("success");
        metrics.record_rate_limited("login");
    }
}
