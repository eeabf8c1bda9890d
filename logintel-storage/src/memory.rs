//! In-memory `RowStore` implementation. Used by integration tests and by
//! any deployment that wants to exercise the coordinator/engine without a
//! live Postgres instance; not recommended for production (no durability).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use logintel_core::{
    AggregateStats, CorrelationKey, ExternalId, Level, LogEntry, LogInternalId, Pagination,
    Prediction, SearchFilter, SortOrder, StorageError, User, UserId,
};

use crate::store::{InsertOutcome, RejectionKind, RowStore};

#[derive(Default)]
struct State {
    logs: Vec<LogEntry>,
    external_index: HashMap<String, usize>,
    predictions: HashMap<i64, Prediction>,
    users: HashMap<UserId, User>,
    usernames: HashMap<String, UserId>,
    next_internal_id: i64,
    analyzer_running: bool,
    last_analyzer_run: Option<DateTime<Utc>>,
}

/// Process-local, mutex-guarded row store. Matches the shape of the
/// `RowStore` trait exactly so it is swappable with `PostgresStore` behind
/// an `Arc<dyn RowStore>`.
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_internal_id: 1,
                ..Default::default()
            }),
        }
    }

    fn matches(filter: &SearchFilter, entry: &LogEntry, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if entry.timestamp < start || entry.timestamp > end {
            return false;
        }
        if let Some(source_type) = filter.source_type {
            if entry.source_type != source_type {
                return false;
            }
        }
        if let Some(level) = filter.level {
            if entry.level != level {
                return false;
            }
        }
        if let Some(host) = &filter.host {
            if entry.host.as_deref() != Some(host.as_str()) {
                return false;
            }
        }
        if let Some(service) = &filter.service {
            if entry.service.as_deref() != Some(service.as_str()) {
                return false;
            }
        }
        if let Some(is_anomaly) = filter.is_anomaly {
            if entry.anomaly.is_anomaly != is_anomaly {
                return false;
            }
        }
        if let Some(request_id) = &filter.request_id {
            if entry.request_id.as_deref() != Some(request_id.as_str()) {
                return false;
            }
        }
        if let Some(session_id) = &filter.session_id {
            if entry.session_id.as_deref() != Some(session_id.as_str()) {
                return false;
            }
        }
        if let Some(correlation_id) = &filter.correlation_id {
            if entry.correlation_id.as_deref() != Some(correlation_id.as_str()) {
                return false;
            }
        }
        if let Some(ip_address) = &filter.ip_address {
            if entry.ip_address.as_deref() != Some(ip_address.as_str()) {
                return false;
            }
        }
        if filter.has_text_query() {
            let query = filter.text_query.as_deref().unwrap_or_default().to_lowercase();
            if !entry.message.to_lowercase().contains(&query) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl RowStore for InMemoryStore {
    async fn ensure_schema(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn insert_logs(&self, batch: Vec<LogEntry>) -> Result<Vec<InsertOutcome>, StorageError> {
        let mut state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        let mut outcomes = Vec::with_capacity(batch.len());
        for mut entry in batch {
            let external_key = entry.external_id.as_str().to_string();
            if state.external_index.contains_key(&external_key) {
                outcomes.push(InsertOutcome::Rejected {
                    external_id: entry.external_id.clone(),
                    kind: RejectionKind::DuplicateExternalId,
                    detail: format!("external_id {external_key} already stored"),
                });
                continue;
            }
            let internal_id = LogInternalId::new(state.next_internal_id);
            state.next_internal_id += 1;
            entry.internal_id = Some(internal_id);
            entry.created_at.get_or_insert(Utc::now());
            let index = state.logs.len();
            state.external_index.insert(external_key, index);
            outcomes.push(InsertOutcome::Stored {
                external_id: entry.external_id.clone(),
                internal_id,
            });
            state.logs.push(entry);
        }
        Ok(outcomes)
    }

    async fn get_by_external_id(&self, id: &ExternalId) -> Result<Option<LogEntry>, StorageError> {
        let state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        Ok(state
            .external_index
            .get(id.as_str())
            .and_then(|idx| state.logs.get(*idx).cloned()))
    }

    async fn search_logs(
        &self,
        filter: &SearchFilter,
        pagination: Pagination,
        sort: SortOrder,
    ) -> Result<(Vec<LogEntry>, u64), StorageError> {
        let state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        let (start, end) = filter.effective_range(Utc::now());
        let mut matched: Vec<&LogEntry> = state
            .logs
            .iter()
            .filter(|entry| Self::matches(filter, entry, start, end))
            .collect();

        match sort {
            SortOrder::TimestampAsc => matched.sort_by_key(|e| e.timestamp),
            SortOrder::TimestampDesc | SortOrder::RelevanceThenTimestampDesc => {
                matched.sort_by_key(|e| std::cmp::Reverse(e.timestamp))
            }
        }

        let total = matched.len() as u64;
        let pagination = pagination.clamp();
        let page: Vec<LogEntry> = matched
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn correlated_lookup(
        &self,
        key: CorrelationKey,
        value: &str,
        limit: u32,
    ) -> Result<Vec<LogEntry>, StorageError> {
        let state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        let mut matched: Vec<LogEntry> = state
            .logs
            .iter()
            .filter(|e| e.correlation_value(key) == Some(value))
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.timestamp);
        matched.truncate(limit as usize);
        Ok(matched)
    }

    async fn stats_over_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AggregateStats, StorageError> {
        let state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        let in_window: Vec<&LogEntry> = state
            .logs
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect();

        let mut by_level: HashMap<String, u64> = HashMap::new();
        let mut by_source: HashMap<String, u64> = HashMap::new();
        let mut anomaly_count = 0u64;
        let mut error_count = 0u64;
        let mut response_times = Vec::new();

        for entry in &in_window {
            *by_level.entry(entry.level.to_string()).or_insert(0) += 1;
            *by_source.entry(entry.source_type.to_string()).or_insert(0) += 1;
            if entry.anomaly.is_anomaly {
                anomaly_count += 1;
            }
            if matches!(entry.level, Level::Error | Level::Fatal) {
                error_count += 1;
            }
            if let Some(http) = &entry.http {
                if let Some(rt) = http.response_time_ms {
                    response_times.push(rt);
                }
            }
        }

        let avg_response_time_ms = if response_times.is_empty() {
            None
        } else {
            Some(response_times.iter().sum::<f64>() / response_times.len() as f64)
        };

        Ok(AggregateStats::from_counts(
            in_window.len() as u64,
            by_level,
            by_source,
            anomaly_count,
            error_count,
            avg_response_time_ms,
        ))
    }

    async fn upsert_prediction(&self, prediction: Prediction) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        let exists = state
            .logs
            .iter()
            .any(|e| e.internal_id == Some(prediction.log_internal_id));
        if !exists {
            return Err(StorageError::UnknownLogInternalId(prediction.log_internal_id));
        }
        state.predictions.insert(prediction.log_internal_id.get(), prediction);
        Ok(())
    }

    async fn get_prediction(&self, log_internal_id: LogInternalId) -> Result<Option<Prediction>, StorageError> {
        let state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        Ok(state.predictions.get(&log_internal_id.get()).cloned())
    }

    async fn list_recent_predictions(&self, window: Duration, limit: u32) -> Result<Vec<Prediction>, StorageError> {
        let state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or_default();
        let mut predictions: Vec<Prediction> = state
            .predictions
            .values()
            .filter(|p| p.predicted_at >= cutoff)
            .cloned()
            .collect();
        predictions.sort_by_key(|p| std::cmp::Reverse(p.predicted_at));
        predictions.truncate(limit as usize);
        Ok(predictions)
    }

    async fn fetch_unpredicted(&self, window: Duration, limit: u32) -> Result<Vec<LogEntry>, StorageError> {
        let state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or_default();
        let mut entries: Vec<LogEntry> = state
            .logs
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .filter(|e| {
                e.internal_id
                    .map(|id| !state.predictions.contains_key(&id.get()))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        entries.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn try_acquire_analyzer_run(&self) -> Result<bool, StorageError> {
        let mut state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        if state.analyzer_running {
            return Ok(false);
        }
        state.analyzer_running = true;
        Ok(true)
    }

    async fn release_analyzer_run(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        state.analyzer_running = false;
        state.last_analyzer_run = Some(Utc::now());
        Ok(())
    }

    async fn last_analyzer_run(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        Ok(state.last_analyzer_run)
    }

    async fn create_user(&self, user: User) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        if state.usernames.contains_key(&user.username) {
            return Err(StorageError::ValidationFailed(format!(
                "username {} already exists",
                user.username
            )));
        }
        state.usernames.insert(user.username.clone(), user.user_id);
        state.users.insert(user.user_id, user);
        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        Ok(state
            .usernames
            .get(username)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        Ok(state.users.get(&id).cloned())
    }

    async fn update_user(&self, user: User) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        if !state.users.contains_key(&user.user_id) {
            return Err(StorageError::NotFound(ExternalId::new(user.user_id.to_string())));
        }
        state.users.insert(user.user_id, user);
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        if let Some(user) = state.users.remove(&id) {
            state.usernames.remove(&user.username);
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let state = self.state.lock().map_err(|_| StorageError::TransactionFailed("lock poisoned".into()))?;
        Ok(state.users.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logintel_core::{AnomalyFacet, SourceType};
    use std::collections::{HashMap as StdHashMap, HashSet};

    fn log(external_id: &str, ts: DateTime<Utc>) -> LogEntry {
        LogEntry {
            internal_id: None,
            external_id: ExternalId::new(external_id),
            timestamp: ts,
            level: Level::Info,
            message: "database connection failed".into(),
            source_type: SourceType::Application,
            raw_log: "{}".into(),
            host: Some("web-01".into()),
            service: None,
            category: None,
            tags: HashSet::new(),
            structured_data: StdHashMap::new(),
            created_at: None,
            updated_at: None,
            request_id: Some("req-1".into()),
            session_id: None,
            correlation_id: None,
            ip_address: None,
            http: None,
            sap: None,
            anomaly: AnomalyFacet::default(),
        }
    }

    #[tokio::test]
    async fn duplicate_external_id_is_rejected_not_inserted_twice() {
        let store = InMemoryStore::new();
        let ts = Utc::now();
        let first = store.insert_logs(vec![log("dup-1", ts)]).await.unwrap();
        assert!(first[0].is_stored());

        let second = store.insert_logs(vec![log("dup-1", ts)]).await.unwrap();
        assert!(matches!(
            second[0],
            InsertOutcome::Rejected {
                kind: RejectionKind::DuplicateExternalId,
                ..
            }
        ));

        let (results, total) = store
            .search_logs(&SearchFilter::default(), Pagination::default(), SortOrder::TimestampDesc)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn correlated_lookup_orders_by_timestamp_ascending() {
        let store = InMemoryStore::new();
        let base = Utc::now();
        store
            .insert_logs(vec![
                log("a", base + chrono::Duration::seconds(5)),
                log("b", base),
            ])
            .await
            .unwrap();

        let results = store
            .correlated_lookup(CorrelationKey::RequestId, "req-1", 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].timestamp <= results[1].timestamp);
    }

    #[tokio::test]
    async fn upsert_prediction_requires_existing_log() {
        let store = InMemoryStore::new();
        let prediction = Prediction {
            log_internal_id: LogInternalId::new(9999),
            predicted_level: Level::Error,
            level_confidence: 0.9,
            is_anomaly: false,
            anomaly_score: 0.1,
            anomaly_confidence: 0.5,
            severity: logintel_core::Severity::Low,
            model_version: "v1".into(),
            predicted_at: Utc::now(),
        };
        let result = store.upsert_prediction(prediction).await;
        assert!(matches!(result, Err(StorageError::UnknownLogInternalId(_))));
    }

    #[tokio::test]
    async fn analyzer_run_lock_is_exclusive() {
        let store = InMemoryStore::new();
        assert!(store.try_acquire_analyzer_run().await.unwrap());
        assert!(!store.try_acquire_analyzer_run().await.unwrap());
        store.release_analyzer_run().await.unwrap();
        assert!(store.try_acquire_analyzer_run().await.unwrap());
    }
}
