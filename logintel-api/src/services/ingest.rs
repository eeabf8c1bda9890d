//! Ingestion coordinator (component D). `RowStore` (`B`) is the single
//! source of truth: an entry is considered ingested once `insert_logs`
//! reports it stored. Indexing into `C` happens after that commit and is
//! best-effort - an index failure is logged but never rejects an already
//! committed entry, and there is no implicit retry of a failed batch.

use std::collections::HashMap;

use chrono::Utc;

use logintel_core::{ExternalId, LogEntry};
use logintel_search::IndexStore;
use logintel_storage::{InsertOutcome, RejectionKind, RowStore};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub outcomes: Vec<InsertOutcome>,
}

/// Checks one entry against the §3 value invariants: `timestamp <=
/// created_at`, `http_status` in `[100,599]` when present, `response_time_ms
/// >= 0` when present, `sap_severity` in `1..=8` when present. Returns the
/// first violation found.
fn validate_entry(entry: &LogEntry) -> Result<(), String> {
    if let Some(created_at) = entry.created_at {
        if entry.timestamp > created_at {
            return Err(format!(
                "timestamp {} is after created_at {}",
                entry.timestamp, created_at
            ));
        }
    }

    if let Some(http) = &entry.http {
        if let Some(status) = http.http_status {
            if !(100..=599).contains(&status) {
                return Err(format!("http_status {status} is outside [100,599]"));
            }
        }
        if let Some(response_time_ms) = http.response_time_ms {
            if response_time_ms < 0.0 {
                return Err(format!("response_time_ms {response_time_ms} must be >= 0"));
            }
        }
    }

    if let Some(sap) = &entry.sap {
        if let Some(severity) = sap.sap_severity {
            if !(1..=8).contains(&severity) {
                return Err(format!("sap_severity {severity} is outside 1..=8"));
            }
        }
    }

    Ok(())
}

/// Validates and stores a batch of log entries, then indexes the entries
/// that were actually stored. An entry with no `external_id` gets one
/// generated from its `source_type` and `timestamp`; a duplicate
/// `external_id` is a per-entry rejection, not a batch-wide error; an entry
/// failing a §3 value invariant is rejected before it ever reaches the row
/// store.
pub async fn ingest_batch(
    store: &dyn RowStore,
    index: &dyn IndexStore,
    batch: Vec<LogEntry>,
) -> ApiResult<IngestSummary> {
    if batch.is_empty() {
        return Err(ApiError::validation_failed("ingest batch must contain at least one log entry"));
    }

    let now = Utc::now();
    let prepared: Vec<LogEntry> = batch
        .into_iter()
        .map(|mut entry| {
            if entry.external_id.as_str().is_empty() {
                entry.external_id = ExternalId::generate(&entry.source_type.to_string(), entry.timestamp);
            }
            if entry.created_at.is_none() {
                entry.created_at = Some(now);
            }
            entry
        })
        .collect();

    let mut pre_validated = Vec::with_capacity(prepared.len());
    let mut outcomes = Vec::with_capacity(prepared.len());
    for entry in prepared {
        match validate_entry(&entry) {
            Ok(()) => pre_validated.push(entry),
            Err(detail) => outcomes.push(InsertOutcome::Rejected {
                external_id: entry.external_id.clone(),
                kind: RejectionKind::ValidationFailed,
                detail,
            }),
        }
    }

    let by_external_id: HashMap<ExternalId, LogEntry> = pre_validated
        .iter()
        .cloned()
        .map(|entry| (entry.external_id.clone(), entry))
        .collect();

    outcomes.extend(store.insert_logs(pre_validated).await?);

    let to_index: Vec<LogEntry> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            InsertOutcome::Stored { external_id, internal_id } => {
                by_external_id.get(external_id).cloned().map(|mut entry| {
                    entry.internal_id = Some(*internal_id);
                    entry
                })
            }
            InsertOutcome::Rejected { .. } => None,
        })
        .collect();

    if !to_index.is_empty() {
        if let Err(e) = index.bulk_index(&to_index).await {
            tracing::warn!(error = %e, count = to_index.len(), "bulk index failed after row store commit");
        }
    }

    let accepted = outcomes.iter().filter(|o| o.is_stored()).count();
    let rejected = outcomes.len() - accepted;

    Ok(IngestSummary {
        accepted,
        rejected,
        outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use logintel_core::{Level, SourceType};
    use logintel_search::{AggregateBuckets, IndexOutcome};
    use logintel_storage::InMemoryStore;

    struct NullIndex;

    #[async_trait]
    impl IndexStore for NullIndex {
        async fn ensure_index(&self) -> Result<(), logintel_core::SearchError> {
            Ok(())
        }
        async fn bulk_index(&self, batch: &[LogEntry]) -> Result<Vec<IndexOutcome>, logintel_core::SearchError> {
            Ok(batch
                .iter()
                .map(|e| IndexOutcome::Indexed {
                    external_id: e.external_id.clone(),
                })
                .collect())
        }
        async fn query(
            &self,
            _filter: &logintel_core::SearchFilter,
            _pagination: logintel_core::Pagination,
        ) -> Result<(Vec<LogEntry>, u64, Option<f64>), logintel_core::SearchError> {
            Ok((Vec::new(), 0, None))
        }
        async fn aggregate(
            &self,
            _filter: &logintel_core::SearchFilter,
        ) -> Result<AggregateBuckets, logintel_core::SearchError> {
            Ok(AggregateBuckets::default())
        }
    }

    fn sample_entry(external_id: &str) -> LogEntry {
        LogEntry {
            internal_id: None,
            external_id: ExternalId::new(external_id),
            timestamp: Utc::now(),
            level: Level::Info,
            message: "hello".into(),
            source_type: SourceType::Application,
            raw_log: "raw".into(),
            host: None,
            service: None,
            category: None,
            tags: Default::default(),
            structured_data: Default::default(),
            created_at: None,
            updated_at: None,
            request_id: None,
            session_id: None,
            correlation_id: None,
            ip_address: None,
            http: None,
            sap: None,
            anomaly: Default::default(),
        }
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_up_front() {
        let store = InMemoryStore::new();
        let index = NullIndex;
        let result = ingest_batch(&store, &index, Vec::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_external_id_is_generated() {
        let store = InMemoryStore::new();
        let index = NullIndex;
        let mut entry = sample_entry("");
        entry.external_id = ExternalId::new("");
        let summary = ingest_batch(&store, &index, vec![entry]).await.unwrap();
        assert_eq!(summary.accepted, 1);
        assert!(summary.outcomes[0].external_id().as_str().starts_with("application-"));
    }

    #[tokio::test]
    async fn duplicate_external_id_is_a_rejection_not_a_batch_error() {
        let store = InMemoryStore::new();
        let index = NullIndex;
        let first = sample_entry("dup-1");
        ingest_batch(&store, &index, vec![first]).await.unwrap();

        let second = sample_entry("dup-1");
        let summary = ingest_batch(&store, &index, vec![second]).await.unwrap();
        assert_eq!(summary.accepted, 0);
        assert_eq!(summary.rejected, 1);
    }

    #[tokio::test]
    async fn mixed_batch_reports_both_accepted_and_rejected() {
        let store = InMemoryStore::new();
        let index = NullIndex;
        let seed = sample_entry("seed-1");
        ingest_batch(&store, &index, vec![seed]).await.unwrap();

        let batch = vec![sample_entry("seed-1"), sample_entry("fresh-1")];
        let summary = ingest_batch(&store, &index, batch).await.unwrap();
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 1);
    }

    #[tokio::test]
    async fn invalid_http_status_is_rejected_before_storage() {
        let store = InMemoryStore::new();
        let index = NullIndex;
        let mut entry = sample_entry("bad-status-1");
        entry.http = Some(logintel_core::HttpFacet {
            http_status: Some(999),
            ..Default::default()
        });
        let summary = ingest_batch(&store, &index, vec![entry]).await.unwrap();
        assert_eq!(summary.accepted, 0);
        assert_eq!(summary.rejected, 1);
        match &summary.outcomes[0] {
            InsertOutcome::Rejected { kind, .. } => assert_eq!(*kind, RejectionKind::ValidationFailed),
            other => panic!("expected a validation rejection, got {other:?}"),
        }
        assert!(store.get_by_external_id(&ExternalId::new("bad-status-1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn negative_response_time_is_rejected() {
        let store = InMemoryStore::new();
        let index = NullIndex;
        let mut entry = sample_entry("bad-latency-1");
        entry.http = Some(logintel_core::HttpFacet {
            response_time_ms: Some(-5.0),
            ..Default::default()
        });
        let summary = ingest_batch(&store, &index, vec![entry]).await.unwrap();
        assert_eq!(summary.rejected, 1);
    }

    #[tokio::test]
    async fn out_of_range_sap_severity_is_rejected() {
        let store = InMemoryStore::new();
        let index = NullIndex;
        let mut entry = sample_entry("bad-sap-1");
        entry.sap = Some(logintel_core::SapFacet {
            sap_severity: Some(9),
            ..Default::default()
        });
        let summary = ingest_batch(&store, &index, vec![entry]).await.unwrap();
        assert_eq!(summary.rejected, 1);
    }

    #[allow(dead_code)]
    fn _arc_index_store_is_object_safe(_index: Arc<dyn IndexStore>) {}
}
