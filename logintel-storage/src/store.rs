//! The `RowStore` trait: the single seam between the ingestion coordinator,
//! search engine, and ML components and whatever relational engine backs
//! them. Callers never see SQL; they see typed operations and outcomes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use logintel_core::{
    AggregateStats, CorrelationKey, ExternalId, LogEntry, LogInternalId, Pagination, Prediction,
    SearchFilter, SortOrder, StorageError, User, UserId,
};

/// Why one entry in a batch was rejected by `insert_logs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionKind {
    DuplicateExternalId,
    ValidationFailed,
    StorageError,
}

/// Per-entry result of a batch insert. Batch execution is atomic per-entry:
/// one bad entry never rejects the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Stored {
        external_id: ExternalId,
        internal_id: LogInternalId,
    },
    Rejected {
        external_id: ExternalId,
        kind: RejectionKind,
        detail: String,
    },
}

impl InsertOutcome {
    pub fn external_id(&self) -> &ExternalId {
        match self {
            InsertOutcome::Stored { external_id, .. } => external_id,
            InsertOutcome::Rejected { external_id, .. } => external_id,
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, InsertOutcome::Stored { .. })
    }
}

/// Typed CRUD over the relational log table plus the prediction table and
/// the user table. One transaction per `insert_logs` batch; one transaction
/// per prediction upsert (§5 locking discipline).
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Idempotent schema creation. Safe to call on every process start.
    async fn ensure_schema(&self) -> Result<(), StorageError>;

    async fn insert_logs(&self, batch: Vec<LogEntry>) -> Result<Vec<InsertOutcome>, StorageError>;

    async fn get_by_external_id(
        &self,
        id: &ExternalId,
    ) -> Result<Option<LogEntry>, StorageError>;

    async fn search_logs(
        &self,
        filter: &SearchFilter,
        pagination: Pagination,
        sort: SortOrder,
    ) -> Result<(Vec<LogEntry>, u64), StorageError>;

    /// Results ordered `timestamp ASC` (causal narrative order).
    async fn correlated_lookup(
        &self,
        key: CorrelationKey,
        value: &str,
        limit: u32,
    ) -> Result<Vec<LogEntry>, StorageError>;

    async fn stats_over_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AggregateStats, StorageError>;

    /// Overwrites any existing row for the same `log_internal_id`.
    async fn upsert_prediction(&self, prediction: Prediction) -> Result<(), StorageError>;

    async fn get_prediction(
        &self,
        log_internal_id: LogInternalId,
    ) -> Result<Option<Prediction>, StorageError>;

    async fn list_recent_predictions(
        &self,
        window: Duration,
        limit: u32,
    ) -> Result<Vec<Prediction>, StorageError>;

    /// Entries in `window` with no existing prediction row, ordered
    /// `timestamp DESC`. Used only by the batch analyzer.
    async fn fetch_unpredicted(
        &self,
        window: Duration,
        limit: u32,
    ) -> Result<Vec<LogEntry>, StorageError>;

    /// Mutual-exclusion token so two analyzer runs never interleave against
    /// the same unpredicted window. Returns `true` if the lock was acquired.
    async fn try_acquire_analyzer_run(&self) -> Result<bool, StorageError>;

    async fn release_analyzer_run(&self) -> Result<(), StorageError>;

    async fn last_analyzer_run(&self) -> Result<Option<DateTime<Utc>>, StorageError>;

    async fn create_user(&self, user: User) -> Result<(), StorageError>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>, StorageError>;

    async fn update_user(&self, user: User) -> Result<(), StorageError>;

    async fn delete_user(&self, id: UserId) -> Result<(), StorageError>;

    async fn list_users(&self) -> Result<Vec<User>, StorageError>;
}
