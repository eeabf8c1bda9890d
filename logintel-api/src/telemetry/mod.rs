pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, LogIntelMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracer, shutdown_tracer, TelemetryConfig};
