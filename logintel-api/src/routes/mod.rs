//! Router assembly. Each route group is layered with the rate limiter for
//! its own [`EndpointClass`] and, where the group requires a session, the
//! auth middleware - applied in that order so auth runs first and the rate
//! limiter can key by `user_id` instead of falling back to client IP.

pub mod auth;
pub mod health;
pub mod logs;
pub mod ml;
pub mod users;

use axum::middleware::from_fn_with_state;
use axum::Router;

use logintel_core::{EndpointClass, RateLimitTable};

use crate::middleware::{auth_middleware, rate_limit_middleware, AuthMiddlewareState, RateLimiterState};
use crate::state::AppState;

fn rate_limited(router: Router<AppState>, class: EndpointClass, table: &RateLimitTable) -> Router<AppState> {
    router.layer(from_fn_with_state(RateLimiterState::new(class, table), rate_limit_middleware))
}

fn authenticated(router: Router<AppState>, auth_state: AuthMiddlewareState) -> Router<AppState> {
    router.layer(from_fn_with_state(auth_state, auth_middleware))
}

pub fn build_router(state: AppState) -> Router {
    let table = RateLimitTable::default();
    let auth_state = AuthMiddlewareState::new(state.auth_config.clone());

    let public_auth_routes = rate_limited(auth::public_router(), EndpointClass::Login, &table);

    let session_auth_routes = authenticated(
        rate_limited(auth::authenticated_router(), EndpointClass::ApiKey, &table),
        auth_state.clone(),
    );

    let users_routes = authenticated(
        rate_limited(users::router(), EndpointClass::ApiKey, &table),
        auth_state.clone(),
    );

    let logs_ingest_routes = authenticated(
        rate_limited(logs::ingest_router(), EndpointClass::Ingest, &table),
        auth_state.clone(),
    );
    let logs_read_routes = authenticated(
        rate_limited(logs::read_router(), EndpointClass::Search, &table),
        auth_state.clone(),
    );
    let logs_routes = logs_ingest_routes.merge(logs_read_routes);

    let health_routes = rate_limited(health::router(), EndpointClass::Anonymous, &table);

    let ml_routes = rate_limited(ml::router(), EndpointClass::Anonymous, &table);

    Router::new()
        .nest("/auth", public_auth_routes.merge(session_auth_routes))
        .nest("/users", users_routes)
        .nest("/logs", logs_routes)
        .nest("/health", health_routes)
        .nest("/ml", ml_routes)
        .with_state(state)
}
