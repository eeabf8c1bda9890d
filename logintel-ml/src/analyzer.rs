//! The batch ML analyzer (component F): loads model artifacts once per run,
//! scans unpredicted logs, produces predictions, and upserts them into the
//! row store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use logintel_core::{MlError, Prediction};
use logintel_storage::RowStore;

use crate::featurize::featurize;
use crate::model::ModelBundle;
use crate::severity::derive_severity;

/// Default values from the execution contract: scan the last 24 hours, up
/// to 1000 unpredicted logs per run.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_LIMIT: u32 = 1000;

/// Counts stored, skipped, errored, plus a small distribution table (per
/// predicted level, per severity), emitted as a structured tracing event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub stored: u64,
    pub errored: u64,
    pub by_predicted_level: HashMap<String, u64>,
    pub by_severity: HashMap<String, u64>,
}

/// Outcome of attempting to start a run: either it ran (with a summary) or
/// another run already held the mutual-exclusion token.
#[derive(Debug)]
pub enum AnalyzerRunOutcome {
    Ran(RunSummary),
    AlreadyRunning,
}

pub struct BatchAnalyzer {
    store: Arc<dyn RowStore>,
    bundle: ModelBundle,
    window: Duration,
    limit: u32,
}

impl BatchAnalyzer {
    pub fn new(store: Arc<dyn RowStore>, bundle: ModelBundle) -> Self {
        Self {
            store,
            bundle,
            window: DEFAULT_WINDOW,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Runs one pass of the execution contract: fetch, featurize, predict,
    /// upsert, summarize. Never interleaves with a concurrently-running
    /// analyzer against the same store.
    pub async fn run(&self) -> Result<AnalyzerRunOutcome, MlError> {
        let acquired = self
            .store
            .try_acquire_analyzer_run()
            .await
            .map_err(|e| MlError::AnalyzerFailed {
                stored_so_far: 0,
                reason: e.to_string(),
            })?;
        if !acquired {
            return Ok(AnalyzerRunOutcome::AlreadyRunning);
        }

        let result = self.run_locked().await;

        // Release unconditionally: a failed run must not wedge the lock for
        // every subsequent scheduler invocation.
        let _ = self.store.release_analyzer_run().await;

        result.map(AnalyzerRunOutcome::Ran)
    }

    async fn run_locked(&self) -> Result<RunSummary, MlError> {
        let logs = self
            .store
            .fetch_unpredicted(self.window, self.limit)
            .await
            .map_err(|e| MlError::AnalyzerFailed {
                stored_so_far: 0,
                reason: e.to_string(),
            })?;

        let mut summary = RunSummary::default();

        for log in logs {
            let Some(internal_id) = log.internal_id else {
                summary.errored += 1;
                continue;
            };

            let features = match featurize(&log, self.bundle.feature_extractor.as_ref()) {
                Ok(f) => f,
                Err(reason) => {
                    tracing::warn!(log_internal_id = %internal_id, %reason, "featurization failed, skipping log");
                    summary.errored += 1;
                    continue;
                }
            };

            let (predicted_level, level_confidence) = self.bundle.level_classifier.classify(&features);
            let (is_anomaly, anomaly_score, anomaly_confidence) =
                self.bundle.anomaly_detector.detect_anomaly(&features);
            let severity = match &self.bundle.severity_classifier {
                Some(classifier) => classifier.classify_severity(&features),
                None => derive_severity(predicted_level, is_anomaly, anomaly_score),
            };

            let prediction = Prediction {
                log_internal_id: internal_id,
                predicted_level,
                level_confidence,
                is_anomaly,
                anomaly_score,
                anomaly_confidence,
                severity,
                model_version: self.bundle.metadata.model_version.clone(),
                predicted_at: Utc::now(),
            };

            match self.store.upsert_prediction(prediction.clone()).await {
                Ok(()) => {
                    summary.stored += 1;
                    *summary
                        .by_predicted_level
                        .entry(predicted_level.to_string())
                        .or_insert(0) += 1;
                    *summary
                        .by_severity
                        .entry(severity.to_string())
                        .or_insert(0) += 1;
                }
                Err(e) => {
                    return Err(MlError::AnalyzerFailed {
                        stored_so_far: summary.stored,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            stored = summary.stored,
            errored = summary.errored,
            by_predicted_level = ?summary.by_predicted_level,
            by_severity = ?summary.by_severity,
            "batch analyzer run complete"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnomalyDetector, FeatureExtractor, LevelClassifier, ModelMetadata};
    use logintel_core::{AnomalyFacet, ExternalId, Level, LogEntry, SourceType};
    use logintel_storage::InMemoryStore;
    use std::collections::{HashMap as StdHashMap, HashSet};

    struct StubExtractor;
    impl FeatureExtractor for StubExtractor {
        fn extract_features(&self, text: &str, _c: &[&str], _n: &[f32]) -> Result<Vec<f32>, String> {
            if text.contains("FAIL_FEATURIZE") {
                Err("simulated featurization failure".to_string())
            } else {
                Ok(vec![1.0, 2.0, 3.0])
            }
        }
    }

    struct StubClassifier;
    impl LevelClassifier for StubClassifier {
        fn classify(&self, _features: &Vec<f32>) -> (Level, f64) {
            (Level::Error, 0.8)
        }
    }

    struct StubAnomalyDetector;
    impl AnomalyDetector for StubAnomalyDetector {
        fn detect_anomaly(&self, _features: &Vec<f32>) -> (bool, f64, f64) {
            (false, 0.1, 0.9)
        }
    }

    fn bundle() -> ModelBundle {
        ModelBundle {
            metadata: ModelMetadata {
                model_version: "test-v1".into(),
                feature_dimension: 3,
            },
            feature_extractor: Box::new(StubExtractor),
            level_classifier: Box::new(StubClassifier),
            anomaly_detector: Box::new(StubAnomalyDetector),
            severity_classifier: None,
        }
    }

    fn log(external_id: &str, message: &str) -> LogEntry {
        LogEntry {
            internal_id: None,
            external_id: ExternalId::new(external_id),
            timestamp: Utc::now(),
            level: Level::Error,
            message: message.into(),
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
    async fn run_predicts_and_upserts_unpredicted_logs() {
        let store: Arc<dyn RowStore> = Arc::new(InMemoryStore::new());
        store.insert_logs(vec![log("a", "boom")]).await.unwrap();

        let analyzer = BatchAnalyzer::new(store.clone(), bundle());
        let outcome = analyzer.run().await.unwrap();
        let summary = match outcome {
            AnalyzerRunOutcome::Ran(s) => s,
            AnalyzerRunOutcome::AlreadyRunning => panic!("expected a run"),
        };
        assert_eq!(summary.stored, 1);
        assert_eq!(summary.errored, 0);

        let unpredicted = store
            .fetch_unpredicted(DEFAULT_WINDOW, DEFAULT_LIMIT)
            .await
            .unwrap();
        assert!(unpredicted.is_empty());
    }

    #[tokio::test]
    async fn featurization_failure_skips_log_without_aborting_run() {
        let store: Arc<dyn RowStore> = Arc::new(InMemoryStore::new());
        store
            .insert_logs(vec![log("a", "FAIL_FEATURIZE"), log("b", "ok")])
            .await
            .unwrap();

        let analyzer = BatchAnalyzer::new(store, bundle());
        let outcome = analyzer.run().await.unwrap();
        let summary = match outcome {
            AnalyzerRunOutcome::Ran(s) => s,
            AnalyzerRunOutcome::AlreadyRunning => panic!("expected a run"),
        };
        assert_eq!(summary.stored, 1);
        assert_eq!(summary.errored, 1);
    }

    #[tokio::test]
    async fn concurrent_runs_do_not_interleave() {
        let store: Arc<dyn RowStore> = Arc::new(InMemoryStore::new());
        assert!(store.try_acquire_analyzer_run().await.unwrap());

        let analyzer = BatchAnalyzer::new(store.clone(), bundle());
        let outcome = analyzer.run().await.unwrap();
        assert!(matches!(outcome, AnalyzerRunOutcome::AlreadyRunning));
    }
}
