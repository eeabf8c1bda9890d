//! Fixed-window-ish rate limiting, keyed by `(principal, EndpointClass)`.
//! One [`RateLimiterState`] instance is layered per route group sharing an
//! [`EndpointClass`]; its quota comes straight out of
//! [`logintel_core::RateLimitTable`] rather than a duplicated local config.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use governor::clock::{Clock, DefaultClock};
use governor::{Quota, RateLimiter};

use logintel_core::{EndpointClass, RateLimitQuota, RateLimitTable};

use crate::auth::AuthContext;
use crate::error::ApiError;

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, DefaultClock>;

/// Tracks request count and window start per key, purely so the
/// `X-RateLimit-Remaining`/`X-RateLimit-Reset` headers have something to
/// report. `governor`'s own limiter (below) remains the sole source of
/// truth for the allow/deny decision.
#[derive(Clone, Copy)]
struct WindowCounter {
    count: u32,
    window_start: Instant,
}

#[derive(Clone)]
pub struct RateLimiterState {
    class: EndpointClass,
    quota: RateLimitQuota,
    limiters: Arc<DashMap<String, Arc<DirectRateLimiter>>>,
    windows: Arc<DashMap<String, WindowCounter>>,
}

impl RateLimiterState {
    pub fn new(class: EndpointClass, table: &RateLimitTable) -> Self {
        Self {
            class,
            quota: table.quota_for(class),
            limiters: Arc::new(DashMap::new()),
            windows: Arc::new(DashMap::new()),
        }
    }

    fn governor_quota(&self) -> Quota {
        let limit = NonZeroU32::new(self.quota.limit).unwrap_or(NonZeroU32::MIN);
        let period = self.quota.window.checked_div(self.quota.limit.max(1)).unwrap_or(self.quota.window);
        Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(limit)
    }

    fn get_or_create(&self, key: &str) -> Arc<DirectRateLimiter> {
        self.limiters
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::direct(self.governor_quota())))
            .clone()
    }

    /// Advances (and possibly resets) the per-key window counter, returning
    /// `(remaining, reset_in_secs)` for the response headers.
    fn track_window(&self, key: &str) -> (u32, u64) {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(WindowCounter {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.quota.window {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.count = entry.count.saturating_add(1);

        let remaining = self.quota.limit.saturating_sub(entry.count);
        let reset_in = self
            .quota
            .window
            .saturating_sub(now.duration_since(entry.window_start))
            .as_secs();
        (remaining, reset_in)
    }
}

pub struct RateLimitError {
    pub retry_after_secs: u64,
    pub limit: u32,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut response = ApiError::rate_limit_exceeded(self.retry_after_secs).into_response();
        let headers = response.headers_mut();
        headers.insert(
            HeaderName::from_static("retry-after"),
            HeaderValue::from_str(&self.retry_after_secs.to_string()).unwrap_or(HeaderValue::from_static("60")),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from_str(&self.limit.to_string()).unwrap_or(HeaderValue::from_static("0")),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from_static("0"),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderValue::from_str(&self.retry_after_secs.to_string()).unwrap_or(HeaderValue::from_static("60")),
        );
        response
    }
}

fn client_ip(request: &Request, fallback: SocketAddr) -> IpAddr {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
        .unwrap_or_else(|| fallback.ip())
}

/// Authenticated requests are keyed by `user_id`; unauthenticated ones by
/// client IP. Both share the same quota, since the quota is determined by
/// the [`EndpointClass`] baked into this middleware's layer, not by caller
/// identity.
pub async fn rate_limit_middleware(
    State(state): State<RateLimiterState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let key = match request.extensions().get::<AuthContext>() {
        Some(ctx) => ctx.user_id.to_string(),
        None => client_ip(&request, addr).to_string(),
    };

    let limiter = state.get_or_create(&key);

    match limiter.check() {
        Ok(_) => {
            let (remaining, reset_in) = state.track_window(&key);
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from_str(&state.quota.limit.to_string()).unwrap_or(HeaderValue::from_static("0")),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from_str(&remaining.to_string()).unwrap_or(HeaderValue::from_static("0")),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-reset"),
                HeaderValue::from_str(&reset_in.to_string()).unwrap_or(HeaderValue::from_static("0")),
            );
            Ok(response)
        }
        Err(not_until) => {
            let retry_after_secs = not_until.wait_time_from(DefaultClock::default().now()).as_secs().max(1);
            Err(RateLimitError {
                retry_after_secs,
                limit: state.quota.limit,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::middleware as axum_middleware;
    use axum::routing::get;
    use axum::Router;
    use std::time::Duration;
    use tower::ServiceExt;

    fn tight_table() -> RateLimitTable {
        let mut table = RateLimitTable::default();
        table.login.limit = 1;
        table.login.window = Duration::from_secs(60);
        table
    }

    fn test_app() -> Router {
        let state = RateLimiterState::new(EndpointClass::Login, &tight_table());
        Router::new()
            .route("/limited", get(|| async { "ok" }))
            .layer(axum_middleware::from_fn_with_state(state, rate_limit_middleware))
    }

    #[tokio::test]
    async fn second_request_from_same_ip_is_rejected() {
        let app = test_app();
        let fallback: SocketAddr = "127.0.0.1:0".parse().unwrap();

        let make_req = || {
            let mut req = HttpRequest::builder()
                .uri("/limited")
                .header("x-forwarded-for", "203.0.113.5")
                .body(Body::empty())
                .unwrap();
            req.extensions_mut().insert(ConnectInfo(fallback));
            req
        };

        let first = app.clone().oneshot(make_req()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(make_req()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key("retry-after"));
    }
}
