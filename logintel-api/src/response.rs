//! Success envelope (`ApiSuccess<T>`). Mirrors [`crate::error::ApiError`]'s
//! `IntoResponse` technique so every handler response, success or failure,
//! carries the same `{success, ..., timestamp}` shape on the wire.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiSuccess<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> ApiSuccess<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Same shape as `ApiSuccess`, with an explicit status code for routes that
/// don't answer `200` (e.g. `201 Created` on registration).
pub struct ApiSuccessWithStatus<T: Serialize>(pub StatusCode, pub ApiSuccess<T>);

impl<T: Serialize> IntoResponse for ApiSuccessWithStatus<T> {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_serializes_success_true() {
        let envelope = ApiSuccess::new(serde_json::json!({"ok": true}));
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"timestamp\""));
    }
}
