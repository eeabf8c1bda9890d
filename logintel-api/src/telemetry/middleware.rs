//! Per-request observability: an OpenTelemetry span (with W3C `traceparent`
//! propagation), Prometheus metrics, and one structured log line per
//! completed request carrying `{endpoint, principal_id, latency_ms, outcome,
//! error_code?}`.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::{Status, TraceContextExt};
use opentelemetry::{global, Context, KeyValue};
use tracing::{info_span, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::auth::AuthContext;
use super::metrics::METRICS;

fn extract_trace_context(headers: &axum::http::HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderMapExtractor(headers)))
}

struct HeaderMapExtractor<'a>(&'a axum::http::HeaderMap);

impl<'a> Extractor for HeaderMapExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|key| key.as_str()).collect()
    }
}

/// Replaces UUIDs and numeric path segments with `{id}` so per-request
/// metric labels don't explode in cardinality with every distinct log's
/// external id.
fn normalize_path(path: &str) -> String {
    static UUID_REGEX: OnceLock<Result<regex::Regex, regex::Error>> = OnceLock::new();
    static ID_REGEX: OnceLock<Result<regex::Regex, regex::Error>> = OnceLock::new();

    let uuid_regex = UUID_REGEX.get_or_init(|| {
        regex::Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
    });
    let id_regex = ID_REGEX.get_or_init(|| regex::Regex::new(r"/[^/]*-\d{10,}-[0-9a-fA-F]{8}(/|$)"));

    let mut result = path.to_string();
    if let Ok(regex) = uuid_regex {
        result = regex.replace_all(&result, "{id}").to_string();
    }
    if let Ok(regex) = id_regex {
        result = regex.replace_all(&result, "/{id}$1").to_string();
    }
    result
}

pub async fn observability_middleware(request: axum::http::Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path().to_string();
    let normalized_path = normalize_path(&path);

    let parent_context = extract_trace_context(request.headers());

    let principal_id = request
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.user_id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    let tracing_span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %normalized_path,
        otel.kind = "server",
    );
    tracing_span.set_parent(parent_context);

    let span = tracing_span.clone();
    let response = next.run(request).instrument(tracing_span).await;

    let duration = start.elapsed();
    let status = response.status();
    let duration_secs = duration.as_secs_f64();

    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_http_request(method.as_str(), &normalized_path, status.as_u16(), duration_secs);
    } else {
        tracing::error!("metrics registry unavailable, skipping http request metrics");
    }

    let cx = span.context();
    cx.span().set_attribute(KeyValue::new("http.method", method.to_string()));
    cx.span().set_attribute(KeyValue::new("http.route", normalized_path.clone()));
    cx.span().set_attribute(KeyValue::new("http.status_code", status.as_u16() as i64));

    let outcome = if status.is_server_error() {
        cx.span().set_status(Status::error("server error"));
        "error"
    } else if status.is_client_error() {
        cx.span().set_status(Status::error("client error"));
        "rejected"
    } else {
        cx.span().set_status(Status::Ok);
        "success"
    };
    cx.span().end();

    tracing::info!(
        endpoint = %normalized_path,
        principal_id = %principal_id,
        latency_ms = duration.as_millis() as u64,
        outcome,
        status = status.as_u16(),
        "request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_collapses_generated_external_ids() {
        let path = "/api/v1/logs/application-1700000000000000-0a1b2c3d";
        assert_eq!(normalize_path(path), "/api/v1/logs/{id}");
    }

    #[test]
    fn normalize_path_collapses_uuid() {
        let path = "/api/v1/users/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/users/{id}");
    }

    #[test]
    fn normalize_path_leaves_plain_routes_alone() {
        assert_eq!(normalize_path("/api/v1/logs/search"), "/api/v1/logs/search");
    }
}
