//! HTTP-boundary error type. Business components (auth, storage, search, ml)
//! never raise HTTP-specific exceptions; `ApiError` is the single place
//! component-local errors are translated into the stable wire-level kinds
//! from the error-handling design.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use logintel_core::{AuthError, LogIntelError, MlError, SearchError, StorageError, ValidationError};

/// Closed set of externally-stable error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // auth (401/403)
    AuthRequired,
    InvalidToken,
    AuthenticationFailed,
    InsufficientPermissions,
    InsufficientRole,

    // validation (400)
    ValidationFailed,
    MissingFields,
    InvalidJson,

    // not found / conflict (404/409)
    NotFound,
    DuplicateExternalId,

    // rate limiting (429)
    RateLimitExceeded,

    // retriable server-side (502/503)
    StorageError,
    IndexError,
    IngestUnavailable,
    SearchUnavailable,
    PredictionPending,
    ModelsUnavailable,
    AnalyzerFailed,

    // 408/500
    RequestTimeout,
    InternalError,
}

impl ErrorCode {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorCode::AuthRequired => StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ErrorCode::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            ErrorCode::InsufficientPermissions => StatusCode::FORBIDDEN,
            ErrorCode::InsufficientRole => StatusCode::FORBIDDEN,

            ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorCode::MissingFields => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidJson => StatusCode::BAD_REQUEST,

            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::DuplicateExternalId => StatusCode::CONFLICT,

            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,

            ErrorCode::StorageError => StatusCode::BAD_GATEWAY,
            ErrorCode::IndexError => StatusCode::BAD_GATEWAY,
            ErrorCode::IngestUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::SearchUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::PredictionPending => StatusCode::ACCEPTED,
            ErrorCode::ModelsUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::AnalyzerFailed => StatusCode::INTERNAL_SERVER_ERROR,

            ErrorCode::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Present only on `rate_limit_exceeded`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            retry_after_seconds: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn auth_required() -> Self {
        Self::new(ErrorCode::AuthRequired, "authentication required")
    }

    /// Wrong username and wrong password must be indistinguishable to the
    /// caller (no account enumeration) - always the same code and message.
    pub fn authentication_failed() -> Self {
        Self::new(ErrorCode::AuthenticationFailed, "authentication failed")
    }

    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, reason.into())
    }

    pub fn insufficient_role(required: &str) -> Self {
        Self::new(
            ErrorCode::InsufficientRole,
            format!("requires role: {required}"),
        )
    }

    pub fn insufficient_permissions(required: &str) -> Self {
        Self::new(
            ErrorCode::InsufficientPermissions,
            format!("requires permission: {required}"),
        )
    }

    pub fn rate_limit_exceeded(retry_after_seconds: u64) -> Self {
        Self {
            code: ErrorCode::RateLimitExceeded,
            message: "rate limit exceeded".to_string(),
            details: None,
            retry_after_seconds: Some(retry_after_seconds),
        }
    }

    pub fn validation_failed(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, reason.into())
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::MissingFields, format!("missing field: {field}"))
    }

    pub fn invalid_json(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidJson, reason.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, what.into())
    }

    pub fn duplicate_external_id(external_id: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DuplicateExternalId,
            format!("duplicate external id: {}", external_id.into()),
        )
    }

    /// Admin deletion of self is rejected with `validation_failed`, not
    /// `forbidden` - it's a request shape problem, not an authorization one.
    pub fn cannot_delete_self() -> Self {
        Self::new(ErrorCode::ValidationFailed, "cannot delete your own account")
    }

    pub fn internal_error(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::error!(%reason, "internal error");
        Self::new(ErrorCode::InternalError, "an internal error occurred")
    }

    pub fn request_timeout() -> Self {
        Self::new(ErrorCode::RequestTimeout, "request timed out")
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Wire shape for every failed response: `{success: false, error: {...},
/// timestamp}`. Kept separate from `ApiError` itself so the many `From`
/// impls and unit tests below can keep constructing/inspecting `ApiError`
/// values directly without going through JSON.
#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    error: &'a ApiError,
    timestamp: DateTime<Utc>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let envelope = ErrorEnvelope {
            success: false,
            error: &self,
            timestamp: Utc::now(),
        };
        (status, Json(&envelope)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(id) => ApiError::not_found(format!("log {id} not found")),
            StorageError::DuplicateExternalId(id) => ApiError::duplicate_external_id(id.to_string()),
            StorageError::ValidationFailed(reason) => ApiError::validation_failed(reason),
            StorageError::UnknownLogInternalId(id) => {
                ApiError::validation_failed(format!("unknown log internal id {id}"))
            }
            StorageError::Transient(reason) | StorageError::TransactionFailed(reason) => {
                tracing::error!(%reason, "row store error");
                ApiError::new(ErrorCode::StorageError, "storage_error")
            }
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::Indexing(reason) => {
                tracing::warn!(%reason, "index store write failed, not aborting caller");
                ApiError::new(ErrorCode::IndexError, "index_error")
            }
            SearchError::Query(reason) => {
                tracing::error!(%reason, "index store query failed");
                ApiError::new(ErrorCode::SearchUnavailable, "search_unavailable")
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::validation_failed(e.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::AuthenticationFailed => ApiError::authentication_failed(),
            AuthError::AuthRequired => ApiError::auth_required(),
            AuthError::InvalidToken(reason) => ApiError::invalid_token(reason),
            AuthError::InsufficientRole { required } => ApiError::insufficient_role(&required),
            AuthError::InsufficientPermissions { required } => {
                ApiError::insufficient_permissions(&required)
            }
            AuthError::RateLimitExceeded { retry_after_secs } => {
                ApiError::rate_limit_exceeded(retry_after_secs)
            }
        }
    }
}

impl From<MlError> for ApiError {
    fn from(e: MlError) -> Self {
        match e {
            MlError::ModelsUnavailable(reason) => {
                tracing::warn!(%reason, "models unavailable");
                ApiError::new(ErrorCode::ModelsUnavailable, "models_unavailable")
            }
            MlError::AnalyzerFailed { stored_so_far, reason } => {
                tracing::error!(stored_so_far, %reason, "analyzer run failed");
                ApiError::new(ErrorCode::AnalyzerFailed, "analyzer_failed")
                    .with_details(serde_json::json!({ "stored_so_far": stored_so_far }))
            }
            MlError::PredictionPending(log_internal_id) => ApiError::new(
                ErrorCode::PredictionPending,
                format!("prediction pending for log {log_internal_id}"),
            ),
        }
    }
}

impl From<LogIntelError> for ApiError {
    fn from(e: LogIntelError) -> Self {
        match e {
            LogIntelError::Storage(e) => e.into(),
            LogIntelError::Search(e) => e.into(),
            LogIntelError::Validation(e) => e.into(),
            LogIntelError::Auth(e) => e.into(),
            LogIntelError::Ml(e) => e.into(),
        }
    }
}
