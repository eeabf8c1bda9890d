//! logintel-api - HTTP surface, identity & access gate, and observability
//! for the logintel log-intelligence backend.

pub mod auth;
pub mod config;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod openapi;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

pub use auth::{authenticate, hash_password, issue_token_pair, validate_token, AuthConfig, AuthContext, Claims};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{
    auth_middleware, rate_limit_middleware, AuthExtractor, AuthMiddlewareState, RateLimiterState,
};
pub use openapi::ApiDoc;
pub use response::{ApiSuccess, ApiSuccessWithStatus};
pub use routes::build_router;
pub use state::AppState;
pub use telemetry::{init_tracer, metrics_handler, shutdown_tracer, LogIntelMetrics, TelemetryConfig, METRICS};
