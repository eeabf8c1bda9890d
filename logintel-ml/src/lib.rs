//! logintel-ml - batch analyzer and online prediction serving.
//!
//! Model artifacts are hidden behind the narrow traits in `model`; nothing
//! in `analyzer` or `serving` knows whether a bundle came from ONNX files or
//! was assembled programmatically for tests.

mod analyzer;
mod featurize;
mod model;
mod serving;
mod severity;

pub use analyzer::{AnalyzerRunOutcome, BatchAnalyzer, RunSummary, DEFAULT_LIMIT, DEFAULT_WINDOW};
pub use featurize::featurize;
pub use model::{AnomalyDetector, FeatureExtractor, FeatureVector, LevelClassifier, ModelBundle, ModelMetadata, SeverityClassifier};
pub use serving::{OnlineServing, RollupSummary, DEFAULT_SERVING_WINDOW};
pub use severity::derive_severity;

#[cfg(feature = "onnx")]
pub use model::onnx;
