//! Component-local error taxonomy. These are business errors with no notion
//! of HTTP; the boundary translation into the stable wire-level error kinds
//! of the error-handling design lives at `logintel_api::error::ApiError`.

use thiserror::Error;

use crate::{ExternalId, LogInternalId};

/// Errors from the row-store adapter (`B`).
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("log with external id {0} not found")]
    NotFound(ExternalId),

    #[error("duplicate external id: {0}")]
    DuplicateExternalId(ExternalId),

    #[error("schema validation failed: {0}")]
    ValidationFailed(String),

    #[error("transient storage error: {0}")]
    Transient(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("prediction references unknown log internal id {0}")]
    UnknownLogInternalId(LogInternalId),
}

/// Errors from the index-store adapter (`C`). `Indexing` never aborts the
/// ingestion coordinator; `Query` surfaces to clients as `search_unavailable`.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("indexing error: {0}")]
    Indexing(String),

    #[error("query error: {0}")]
    Query(String),
}

/// Per-entry validation failures produced while checking a batch against the
/// type rules in the data model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Errors from the identity & access gate (`A`).
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("auth required")]
    AuthRequired,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("insufficient role: requires {required}")]
    InsufficientRole { required: String },

    #[error("insufficient permissions: requires {required}")]
    InsufficientPermissions { required: String },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },
}

/// Errors from the batch ML analyzer (`F`) and online serving (`G`).
#[derive(Debug, Clone, Error)]
pub enum MlError {
    #[error("model artifacts unavailable: {0}")]
    ModelsUnavailable(String),

    #[error("analyzer run failed after storing {stored_so_far} predictions: {reason}")]
    AnalyzerFailed { stored_so_far: u64, reason: String },

    #[error("prediction pending for log {0}")]
    PredictionPending(LogInternalId),
}

/// Master error type, used internally by components that may surface any of
/// the above (e.g. the ingestion coordinator touches both storage and
/// validation errors).
#[derive(Debug, Clone, Error)]
pub enum LogIntelError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Ml(#[from] MlError),
}

pub type LogIntelResult<T> = Result<T, LogIntelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_displays_external_id() {
        let err = StorageError::DuplicateExternalId(ExternalId::new("dup-1"));
        assert!(err.to_string().contains("dup-1"));
    }

    #[test]
    fn master_error_wraps_component_errors_via_from() {
        let err: LogIntelError = AuthError::AuthRequired.into();
        assert!(matches!(err, LogIntelError::Auth(AuthError::AuthRequired)));
    }
}
