//! Ambient HTTP configuration: CORS allow-list and per-class request
//! timeouts. Rate-limit quotas are not duplicated here - they already live
//! in [`logintel_core::RateLimitTable`], which this crate's middleware reads
//! directly rather than re-deriving a flatter IP/tenant scheme.

use std::time::Duration;

/// Default wall-clock budget for read endpoints (search, correlation,
/// stats, ml serving).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
/// Default wall-clock budget for ingest requests.
pub const DEFAULT_INGEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Empty means "allow all" in development; `*` must never appear here
    /// when `environment == production`.
    pub cors_origins: Vec<String>,
    pub cors_allow_credentials: bool,
    pub cors_max_age_secs: u64,
    pub read_timeout: Duration,
    pub ingest_timeout: Duration,
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 3600,
            read_timeout: DEFAULT_READ_TIMEOUT,
            ingest_timeout: DEFAULT_INGEST_TIMEOUT,
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Environment variables:
    /// - `LOGINTEL_CORS_ORIGINS` (comma-separated, default empty)
    /// - `LOGINTEL_CORS_ALLOW_CREDENTIALS` (default `false`)
    /// - `LOGINTEL_CORS_MAX_AGE_SECS` (default `3600`)
    /// - `LOGINTEL_READ_TIMEOUT_SECS` (default `10`)
    /// - `LOGINTEL_INGEST_TIMEOUT_SECS` (default `30`)
    /// - `LOGINTEL_ENVIRONMENT` (default `development`)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            cors_origins: std::env::var("LOGINTEL_CORS_ORIGINS")
                .map(|s| s.split(',').map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect())
                .unwrap_or_default(),
            cors_allow_credentials: std::env::var("LOGINTEL_CORS_ALLOW_CREDENTIALS")
                .map(|s| s == "true")
                .unwrap_or(false),
            cors_max_age_secs: std::env::var("LOGINTEL_CORS_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.cors_max_age_secs),
            read_timeout: Duration::from_secs(
                std::env::var("LOGINTEL_READ_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_READ_TIMEOUT.as_secs()),
            ),
            ingest_timeout: Duration::from_secs(
                std::env::var("LOGINTEL_INGEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_INGEST_TIMEOUT.as_secs()),
            ),
            environment: std::env::var("LOGINTEL_ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// `*` origin is never permitted in production; anywhere else an empty
    /// allow-list means "allow all".
    pub fn validate_for_production(&self) -> Result<(), String> {
        if self.is_production() {
            if self.cors_origins.iter().any(|o| o == "*") {
                return Err("CORS wildcard origin is not permitted in production".to_string());
            }
            if self.cors_origins.is_empty() {
                return Err("CORS allow-list must be explicit in production".to_string());
            }
        }
        Ok(())
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }
        self.cors_origins.iter().any(|allowed| {
            if allowed == "*" {
                true
            } else if let Some(suffix) = allowed.strip_prefix("*.") {
                origin.ends_with(suffix) && origin.len() > suffix.len()
            } else {
                allowed == origin
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_subdomain_matches() {
        let config = ApiConfig {
            cors_origins: vec!["*.example.com".to_string()],
            ..Default::default()
        };
        assert!(config.is_origin_allowed("https://app.example.com"));
        assert!(!config.is_origin_allowed("https://evil.com"));
    }

    #[test]
    fn empty_allow_list_allows_all_in_dev() {
        let config = ApiConfig::default();
        assert!(config.is_origin_allowed("https://anything.test"));
    }

    #[test]
    fn production_rejects_wildcard_origin() {
        let config = ApiConfig {
            environment: "production".to_string(),
            cors_origins: vec!["*".to_string()],
            ..Default::default()
        };
        assert!(config.validate_for_production().is_err());
    }

    #[test]
    fn production_rejects_empty_allow_list() {
        let config = ApiConfig {
            environment: "production".to_string(),
            cors_origins: vec![],
            ..Default::default()
        };
        assert!(config.validate_for_production().is_err());
    }
}
