//! Bearer-token authentication middleware: verifies the `Authorization`
//! header and injects [`AuthContext`] into request extensions for
//! downstream handlers to pick up via [`AuthExtractor`].

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::{authenticate, AuthConfig, AuthContext};
use crate::error::ApiError;

#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: Arc<AuthConfig>) -> Self {
        Self { auth_config }
    }
}

pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let context = authenticate(&state.auth_config, header).map_err(|e| AuthMiddlewareError(e.into()))?;
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

/// Typed extractor pulling the [`AuthContext`] injected by [`auth_middleware`]
/// out of request extensions. Routes that use this without the middleware
/// applied get a 500, not a silent bypass.
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "AuthContext missing from request extensions: auth_middleware not applied",
                ))
            })
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
    use tower::ServiceExt;

    use crate::auth::{test_clocks, issue_token_pair, JwtSecret};
    use logintel_core::{Role, User, UserId};
    use std::collections::HashSet;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: JwtSecret::new("test-secret-long-enough-for-hs256").unwrap(),
            jwt_algorithm: jsonwebtoken::Algorithm::HS256,
            access_token_secs: crate::auth::DEFAULT_ACCESS_TOKEN_SECS,
            refresh_token_secs: crate::auth::DEFAULT_REFRESH_TOKEN_SECS,
            clock_skew_secs: crate::auth::DEFAULT_CLOCK_SKEW_SECS,
            clock: test_clocks::valid(),
            environment: "development".to_string(),
        }
    }

    fn test_user() -> User {
        User {
            user_id: UserId::new_v4(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            password_hash: crate::auth::hash_password("pw").unwrap(),
            role: Role::Analyst,
            permissions: HashSet::new(),
            is_active: true,
            is_verified: true,
            last_login: None,
        }
    }

    fn test_app(config: AuthConfig) -> Router {
        let state = AuthMiddlewareState::new(Arc::new(config));
        Router::new()
            .route("/protected", get(|AuthExtractor(auth): AuthExtractor| async move { auth.user_id.to_string() }))
            .layer(axum_middleware::from_fn_with_state(state, auth_middleware))
    }

    #[tokio::test]
    async fn missing_authorization_header_is_rejected() {
        let app = test_app(test_config());
        let req = HttpRequest::builder().uri("/protected").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_bearer_token_is_accepted_and_injects_context() {
        let config = test_config();
        let user = test_user();
        let (access, _) = issue_token_pair(&config, &user).unwrap();

        let app = test_app(config);
        let req = HttpRequest::builder()
            .uri("/protected")
            .header("authorization", format!("Bearer {access}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_bearer_scheme_is_rejected() {
        let app = test_app(test_config());
        let req = HttpRequest::builder()
            .uri("/protected")
            .header("authorization", "Token not-bearer")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
