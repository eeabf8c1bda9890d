//! `/users/*` handlers: self-service profile management plus the
//! admin-only user directory (component A's role/permission surface).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use logintel_core::{Role, UserId, UserView};
use logintel_storage::RowStore;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::response::ApiSuccess;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserListResponse {
    pub users: Vec<UserView>,
    pub count: usize,
}

#[derive(Debug, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub permissions: Option<std::collections::HashSet<String>>,
    pub is_active: Option<bool>,
}

fn apply_update(mut user: logintel_core::User, req: UpdateUserRequest) -> logintel_core::User {
    if let Some(email) = req.email {
        user.email = email;
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    if let Some(permissions) = req.permissions {
        user.permissions = permissions;
    }
    if let Some(is_active) = req.is_active {
        user.is_active = is_active;
    }
    user
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/users/self",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "The caller's own profile")),
))]
pub async fn get_self(
    State(store): State<Arc<dyn RowStore>>,
    AuthExtractor(ctx): AuthExtractor,
) -> ApiResult<ApiSuccess<UserView>> {
    let user = store
        .get_user_by_id(ctx.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))?;
    Ok(ApiSuccess::new(UserView::from(&user)))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/users/self",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UpdateUserRequest,
    responses((status = 200, description = "Updated the caller's own profile")),
))]
pub async fn update_self(
    State(store): State<Arc<dyn RowStore>>,
    AuthExtractor(ctx): AuthExtractor,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<ApiSuccess<UserView>> {
    let user = store
        .get_user_by_id(ctx.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))?;
    // Self-service updates cannot change role or permissions; only an admin
    // acting through the admin endpoint below can escalate a user.
    let req = UpdateUserRequest { role: None, permissions: None, ..req };
    let updated = apply_update(user, req);
    store.update_user(updated.clone()).await?;
    Ok(ApiSuccess::new(UserView::from(&updated)))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/users/self",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Deleted the caller's own account")),
))]
pub async fn delete_self(
    State(store): State<Arc<dyn RowStore>>,
    AuthExtractor(ctx): AuthExtractor,
) -> ApiResult<ApiSuccess<serde_json::Value>> {
    store.delete_user(ctx.user_id).await?;
    Ok(ApiSuccess::new(serde_json::json!({ "message": "account deleted" })))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All registered users (admin only)")),
))]
pub async fn list_users(
    State(store): State<Arc<dyn RowStore>>,
    AuthExtractor(ctx): AuthExtractor,
) -> ApiResult<ApiSuccess<UserListResponse>> {
    ctx.require_role(Role::Admin)?;
    let users = store.list_users().await?;
    let views: Vec<UserView> = users.iter().map(UserView::from).collect();
    Ok(ApiSuccess::new(UserListResponse { count: views.len(), users: views }))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "A user's profile (admin only)")),
))]
pub async fn get_user(
    State(store): State<Arc<dyn RowStore>>,
    AuthExtractor(ctx): AuthExtractor,
    Path(user_id): Path<UserId>,
) -> ApiResult<ApiSuccess<UserView>> {
    ctx.require_role(Role::Admin)?;
    let user = store
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))?;
    Ok(ApiSuccess::new(UserView::from(&user)))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/users/{user_id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UpdateUserRequest,
    responses((status = 200, description = "Updated a user's profile, role, or permissions (admin only)")),
))]
pub async fn update_user(
    State(store): State<Arc<dyn RowStore>>,
    AuthExtractor(ctx): AuthExtractor,
    Path(user_id): Path<UserId>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<ApiSuccess<UserView>> {
    ctx.require_role(Role::Admin)?;
    let user = store
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))?;
    let updated = apply_update(user, req);
    store.update_user(updated.clone()).await?;
    Ok(ApiSuccess::new(UserView::from(&updated)))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/users/{user_id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Deleted a user (admin only, not self)")),
))]
pub async fn delete_user(
    State(store): State<Arc<dyn RowStore>>,
    AuthExtractor(ctx): AuthExtractor,
    Path(user_id): Path<UserId>,
) -> ApiResult<ApiSuccess<serde_json::Value>> {
    ctx.require_role(Role::Admin)?;
    if user_id == ctx.user_id {
        return Err(ApiError::cannot_delete_self());
    }
    store.delete_user(user_id).await?;
    Ok(ApiSuccess::new(serde_json::json!({ "message": "user deleted" })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/self", get(get_self).put(update_self).delete(delete_self))
        .route("/", get(list_users))
        .route("/:user_id", get(get_user).put(update_user).delete(delete_user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_update_only_touches_present_fields() {
        let user = logintel_core::User {
            user_id: UserId::new_v4(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            password_hash: "hash".into(),
            role: Role::User,
            permissions: Default::default(),
            is_active: true,
            is_verified: true,
            last_login: None,
        };
        let updated = apply_update(
            user.clone(),
            UpdateUserRequest { is_active: Some(false), ..Default::default() },
        );
        assert!(!updated.is_active);
        assert_eq!(updated.email, user.email);
    }
}
