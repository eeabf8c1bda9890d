//! Featurization: text from `message`, categorical features from
//! `source_type`/`service`/`endpoint`/`level`/bucketed `http_status`, and a
//! bucketed `response_time_ms` numeric feature. Unknown categorical values
//! fall back to a sentinel rather than failing the log.

use logintel_core::LogEntry;

use crate::model::{FeatureExtractor, FeatureVector};

const UNKNOWN_CATEGORY: &str = "__unknown__";

/// HTTP status code bucketed into its class (`2xx`, `4xx`, ...); unknown or
/// absent statuses fall back to `UNKNOWN_CATEGORY`.
fn bucket_http_status(status: Option<i32>) -> String {
    match status {
        Some(s) if (100..600).contains(&s) => format!("{}xx", s / 100),
        _ => UNKNOWN_CATEGORY.to_string(),
    }
}

/// Response time bucketed into coarse latency bands, in milliseconds.
fn bucket_response_time(response_time_ms: Option<f64>) -> f32 {
    match response_time_ms {
        Some(ms) if ms < 100.0 => 0.0,
        Some(ms) if ms < 500.0 => 1.0,
        Some(ms) if ms < 2000.0 => 2.0,
        Some(_) => 3.0,
        None => -1.0,
    }
}

/// Build the categorical and numeric feature context for one log entry,
/// then hand it to the loaded `FeatureExtractor`.
pub fn featurize(entry: &LogEntry, extractor: &dyn FeatureExtractor) -> Result<FeatureVector, String> {
    let service = entry.service.as_deref().unwrap_or(UNKNOWN_CATEGORY);
    let endpoint = entry
        .http
        .as_ref()
        .and_then(|h| h.endpoint.as_deref())
        .unwrap_or(UNKNOWN_CATEGORY);
    let http_status_bucket = bucket_http_status(entry.http.as_ref().and_then(|h| h.http_status));
    let level = entry.level.to_string();
    let source_type = entry.source_type.to_string();

    let categorical = [
        source_type.as_str(),
        service,
        endpoint,
        http_status_bucket.as_str(),
        level.as_str(),
    ];
    let numeric = [bucket_response_time(
        entry.http.as_ref().and_then(|h| h.response_time_ms),
    )];

    extractor.extract_features(&entry.message, &categorical, &numeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_buckets_into_class() {
        assert_eq!(bucket_http_status(Some(200)), "2xx");
        assert_eq!(bucket_http_status(Some(404)), "4xx");
        assert_eq!(bucket_http_status(Some(503)), "5xx");
        assert_eq!(bucket_http_status(None), UNKNOWN_CATEGORY);
        assert_eq!(bucket_http_status(Some(999)), UNKNOWN_CATEGORY);
    }

    #[test]
    fn response_time_buckets_are_monotonic() {
        assert_eq!(bucket_response_time(Some(50.0)), 0.0);
        assert_eq!(bucket_response_time(Some(300.0)), 1.0);
        assert_eq!(bucket_response_time(Some(1000.0)), 2.0);
        assert_eq!(bucket_response_time(Some(5000.0)), 3.0);
        assert_eq!(bucket_response_time(None), -1.0);
    }
}
