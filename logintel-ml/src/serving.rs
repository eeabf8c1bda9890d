//! Online ML serving (component G): pure read-through against predictions
//! already produced by the batch analyzer. No inference happens here, so
//! the latency target is dominated entirely by the row store.

use std::sync::Arc;
use std::time::Duration;

use logintel_core::{LogInternalId, MlError, Prediction};
use logintel_storage::RowStore;

/// Default window for `list_recent` and `analytics_rollup` when the caller
/// does not specify one.
pub const DEFAULT_SERVING_WINDOW: Duration = Duration::from_secs(60 * 60);

pub struct OnlineServing {
    store: Arc<dyn RowStore>,
}

impl OnlineServing {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Looks up the prediction for one log. `PredictionPending` means the
    /// log exists but the batch analyzer has not yet scored it (not an
    /// error condition for the caller: it's a "come back later" signal).
    pub async fn get_prediction(&self, log_internal_id: LogInternalId) -> Result<Prediction, MlError> {
        self.store
            .get_prediction(log_internal_id)
            .await
            .map_err(|e| MlError::ModelsUnavailable(e.to_string()))?
            .ok_or(MlError::PredictionPending(log_internal_id))
    }

    pub async fn list_recent(&self, window: Duration, limit: u32) -> Result<Vec<Prediction>, MlError> {
        self.store
            .list_recent_predictions(window, limit)
            .await
            .map_err(|e| MlError::ModelsUnavailable(e.to_string()))
    }

    /// Rolled-up distribution of recent predictions by predicted level and
    /// by severity, computed from whatever the store already returns rather
    /// than re-running any model.
    pub async fn analytics_rollup(&self, window: Duration) -> Result<RollupSummary, MlError> {
        let predictions = self
            .store
            .list_recent_predictions(window, u32::MAX)
            .await
            .map_err(|e| MlError::ModelsUnavailable(e.to_string()))?;

        let mut summary = RollupSummary {
            total: predictions.len() as u64,
            ..Default::default()
        };
        for prediction in &predictions {
            *summary
                .by_predicted_level
                .entry(prediction.predicted_level.to_string())
                .or_insert(0) += 1;
            *summary
                .by_severity
                .entry(prediction.severity.to_string())
                .or_insert(0) += 1;
            if prediction.is_anomaly {
                summary.anomaly_count += 1;
            }
        }
        Ok(summary)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollupSummary {
    pub total: u64,
    pub anomaly_count: u64,
    pub by_predicted_level: std::collections::HashMap<String, u64>,
    pub by_severity: std::collections::HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use logintel_core::{AnomalyFacet, ExternalId, Level, LogEntry, Severity, SourceType};
    use logintel_storage::InMemoryStore;
    use std::collections::{HashMap as StdHashMap, HashSet};

    fn log(external_id: &str) -> LogEntry {
        LogEntry {
            internal_id: None,
            external_id: ExternalId::new(external_id),
            timestamp: Utc::now(),
            level: Level::Error,
            message: "boom".into(),
            source_type: SourceType::Application,
            raw_log: "{}".into(),
            host: None,
            service: None,
            category: None,
            tags: HashSet::new(),
            structured_data: StdHashMap::new(),
            created_at: None,
            updated_at: None,
            request_id: None,
            session_id: None,
            correlation_id: None,
            ip_address: None,
            http: None,
            sap: None,
            anomaly: AnomalyFacet::default(),
        }
    }

    #[tokio::test]
    async fn unpredicted_log_reports_pending() {
        let store: Arc<dyn RowStore> = Arc::new(InMemoryStore::new());
        let outcomes = store.insert_logs(vec![log("a")]).await.unwrap();
        let internal_id = match &outcomes[0] {
            logintel_storage::InsertOutcome::Stored { internal_id, .. } => *internal_id,
            _ => panic!("expected stored"),
        };

        let serving = OnlineServing::new(store);
        let result = serving.get_prediction(internal_id).await;
        assert!(matches!(result, Err(MlError::PredictionPending(_))));
    }

    #[tokio::test]
    async fn analytics_rollup_counts_by_level_and_severity() {
        let store: Arc<dyn RowStore> = Arc::new(InMemoryStore::new());
        let outcomes = store.insert_logs(vec![log("a"), log("b")]).await.unwrap();
        for outcome in &outcomes {
            if let logintel_storage::InsertOutcome::Stored { internal_id, .. } = outcome {
                store
                    .upsert_prediction(Prediction {
                        log_internal_id: *internal_id,
                        predicted_level: Level::Error,
                        level_confidence: 0.9,
                        is_anomaly: true,
                        anomaly_score: 0.95,
                        anomaly_confidence: 0.9,
                        severity: Severity::Critical,
                        model_version: "v1".into(),
                        predicted_at: Utc::now(),
                    })
                    .await
                    .unwrap();
            }
        }

        let serving = OnlineServing::new(store);
        let rollup = serving.analytics_rollup(DEFAULT_SERVING_WINDOW).await.unwrap();
        assert_eq!(rollup.total, 2);
        assert_eq!(rollup.anomaly_count, 2);
        assert_eq!(rollup.by_severity.get("critical"), Some(&2));
    }
}
