//! logintel Test Utilities
//!
//! Centralized test infrastructure for the logintel workspace:
//! - Proptest generators for core entity types
//! - Test fixtures for common scenarios (including the acceptance-test
//!   fixtures S1-S6)
//! - Custom assertions for logintel-specific validation

// Re-export the in-memory row store from its source crate, so a single
// dependency gives callers both the store and the fixtures to seed it with.
pub use logintel_storage::InMemoryStore;

// Re-export core types for convenience.
pub use logintel_core::{
    AggregateStats, AnomalyFacet, AuthError, CorrelationKey, EndpointClass, ExternalId, HttpFacet,
    Level, LogEntry, LogInternalId, LogIntelError, MlError, Pagination, Prediction, Role,
    SapFacet, SearchError, SearchFilter, SortOrder, SourceType, StorageError, TokenKind, User,
    UserId, UserView, ValidationError,
};

use chrono::Utc;
use std::collections::{HashMap, HashSet};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating logintel entity types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random UUID-backed `UserId`.
    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        any::<[u8; 16]>().prop_map(|bytes| UserId(uuid::Uuid::from_bytes(bytes)))
    }

    /// Generate an `ExternalId` from a short alphanumeric string.
    pub fn arb_external_id() -> impl Strategy<Value = ExternalId> {
        "[a-z0-9-]{3,20}".prop_map(ExternalId::new)
    }

    /// Generate a `Level` variant.
    pub fn arb_level() -> impl Strategy<Value = Level> {
        prop_oneof![
            Just(Level::Debug),
            Just(Level::Info),
            Just(Level::Warn),
            Just(Level::Error),
            Just(Level::Fatal),
        ]
    }

    /// Generate a `SourceType` variant.
    pub fn arb_source_type() -> impl Strategy<Value = SourceType> {
        prop_oneof![
            Just(SourceType::Splunk),
            Just(SourceType::Sap),
            Just(SourceType::Application),
            Just(SourceType::System),
            Just(SourceType::Custom),
        ]
    }

    /// Generate a `Role` variant.
    pub fn arb_role() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::Viewer),
            Just(Role::User),
            Just(Role::Analyst),
            Just(Role::Admin),
        ]
    }

    /// Generate a timestamp within a reasonable range (2020-2030).
    pub fn arb_timestamp() -> impl Strategy<Value = chrono::DateTime<Utc>> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    /// Generate a minimal, always-valid `LogEntry`. `source_type`-specific
    /// facets are left unset; use `arb_log_entry_with_facets` for those.
    pub fn arb_log_entry() -> impl Strategy<Value = LogEntry> {
        (
            arb_external_id(),
            arb_timestamp(),
            arb_level(),
            "[a-zA-Z0-9 ]{1,100}",
            arb_source_type(),
            prop::option::of("[a-z0-9.-]{3,30}"),
            prop::option::of("[a-z-]{3,20}"),
        )
            .prop_map(
                |(external_id, timestamp, level, message, source_type, host, service)| LogEntry {
                    internal_id: None,
                    external_id,
                    timestamp,
                    level,
                    message,
                    source_type,
                    raw_log: "{}".to_string(),
                    host,
                    service,
                    category: None,
                    tags: HashSet::new(),
                    structured_data: HashMap::new(),
                    created_at: None,
                    updated_at: None,
                    request_id: None,
                    session_id: None,
                    correlation_id: None,
                    ip_address: None,
                    http: None,
                    sap: None,
                    anomaly: AnomalyFacet::default(),
                },
            )
    }

    /// Generate a `User` with a deterministic (non-random) password hash;
    /// callers needing an authenticatable user should overwrite
    /// `password_hash` via `logintel_api::hash_password`.
    pub fn arb_user() -> impl Strategy<Value = User> {
        (
            arb_user_id(),
            "[a-z][a-z0-9_]{2,15}",
            "[a-z]{3,10}",
            arb_role(),
            any::<bool>(),
        )
            .prop_map(|(user_id, username, domain, role, is_active)| User {
                user_id,
                email: format!("{username}@{domain}.test"),
                username,
                password_hash: "unset".to_string(),
                role,
                permissions: HashSet::new(),
                is_active,
                is_verified: false,
                last_login: None,
            })
    }

    /// Generate a `Prediction` tied to a given log internal id.
    pub fn arb_prediction(log_internal_id: LogInternalId) -> impl Strategy<Value = Prediction> {
        (arb_level(), 0.0f64..1.0, any::<bool>(), 0.0f64..1.0, 0.0f64..1.0)
            .prop_map(move |(predicted_level, level_confidence, is_anomaly, anomaly_score, anomaly_confidence)| {
                Prediction {
                    log_internal_id,
                    predicted_level,
                    level_confidence,
                    is_anomaly,
                    anomaly_score,
                    anomaly_confidence,
                    severity: logintel_core::Severity::Low,
                    model_version: "test-model-v0".to_string(),
                    predicted_at: Utc::now(),
                }
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios, including the
    //! acceptance-test scenarios S1-S6.

    use super::*;

    /// A log entry with the four correlation keys populated, source type
    /// `application`. Grounds scenario S1 (ingest-then-search round trip).
    pub fn application_log(external_id: &str) -> LogEntry {
        LogEntry {
            internal_id: None,
            external_id: ExternalId::new(external_id),
            timestamp: Utc::now(),
            level: Level::Error,
            message: "request failed with 500".to_string(),
            source_type: SourceType::Application,
            raw_log: r#"{"status":500}"#.to_string(),
            host: Some("web-01".to_string()),
            service: Some("checkout".to_string()),
            category: None,
            tags: HashSet::new(),
            structured_data: HashMap::new(),
            created_at: None,
            updated_at: None,
            request_id: Some("req-42".to_string()),
            session_id: None,
            correlation_id: None,
            ip_address: None,
            http: Some(HttpFacet {
                http_method: Some("POST".to_string()),
                http_status: Some(500),
                endpoint: Some("/checkout".to_string()),
                response_time_ms: Some(812.0),
                application_type: None,
                framework: None,
            }),
            sap: None,
            anomaly: AnomalyFacet::default(),
        }
    }

    /// A SAP-facet log entry sharing `request_id` with `application_log`,
    /// for scenario S2 (correlation across sources).
    pub fn sap_log_sharing_request_id(external_id: &str, request_id: &str) -> LogEntry {
        LogEntry {
            internal_id: None,
            external_id: ExternalId::new(external_id),
            timestamp: Utc::now(),
            level: Level::Warn,
            message: "transaction posted with warnings".to_string(),
            source_type: SourceType::Sap,
            raw_log: "BAPI_TRANSACTION_COMMIT".to_string(),
            host: None,
            service: None,
            category: None,
            tags: HashSet::new(),
            structured_data: HashMap::new(),
            created_at: None,
            updated_at: None,
            request_id: Some(request_id.to_string()),
            session_id: None,
            correlation_id: None,
            ip_address: None,
            http: None,
            sap: Some(SapFacet {
                transaction_code: Some("FB01".to_string()),
                sap_system: Some("PRD".to_string()),
                sap_client: Some("100".to_string()),
                sap_message_type: None,
                sap_severity: None,
                business_fields: HashMap::new(),
            }),
            anomaly: AnomalyFacet::default(),
        }
    }

    /// A batch of 100 logs matching the exact distribution in scenario S6:
    /// 70 INFO, 20 WARN, 8 ERROR, 2 FATAL; 60 application, 30 splunk, 10 sap;
    /// 5 anomalies. Timestamps are spread evenly across `[start, end)`.
    pub fn stats_fixture_batch(start: chrono::DateTime<Utc>, end: chrono::DateTime<Utc>) -> Vec<LogEntry> {
        let levels = [
            (Level::Info, 70),
            (Level::Warn, 20),
            (Level::Error, 8),
            (Level::Fatal, 2),
        ];
        let sources = [
            (SourceType::Application, 60),
            (SourceType::Splunk, 30),
            (SourceType::Sap, 10),
        ];

        let mut level_seq = Vec::with_capacity(100);
        for (level, count) in levels {
            level_seq.extend(std::iter::repeat(level).take(count));
        }
        let mut source_seq = Vec::with_capacity(100);
        for (source, count) in sources {
            source_seq.extend(std::iter::repeat(source).take(count));
        }

        let span = end - start;
        (0..100)
            .map(|i| {
                let offset = span / 100 * i as i32;
                LogEntry {
                    internal_id: None,
                    external_id: ExternalId::new(format!("stats-fixture-{i}")),
                    timestamp: start + offset,
                    level: level_seq[i],
                    message: format!("log {i}"),
                    source_type: source_seq[i],
                    raw_log: "{}".to_string(),
                    host: None,
                    service: None,
                    category: None,
                    tags: HashSet::new(),
                    structured_data: HashMap::new(),
                    created_at: None,
                    updated_at: None,
                    request_id: None,
                    session_id: None,
                    correlation_id: None,
                    ip_address: None,
                    http: None,
                    sap: None,
                    anomaly: AnomalyFacet {
                        is_anomaly: i < 5,
                        anomaly_type: if i < 5 { Some("outlier".to_string()) } else { None },
                        performance_metrics: HashMap::new(),
                        error_details: HashMap::new(),
                    },
                }
            })
            .collect()
    }

    /// A minimal, always-active `User` with `role` and a deterministic
    /// username/email, suitable for seeding a store ahead of an auth flow.
    pub fn test_user(username: &str, role: Role) -> User {
        User {
            user_id: UserId::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.test"),
            password_hash: "unset".to_string(),
            role,
            permissions: HashSet::new(),
            is_active: true,
            is_verified: true,
            last_login: None,
        }
    }

    /// A `Prediction` with `is_anomaly: true`, for tests that exercise the
    /// anomaly-serving path.
    pub fn anomalous_prediction(log_internal_id: LogInternalId) -> Prediction {
        Prediction {
            log_internal_id,
            predicted_level: Level::Error,
            level_confidence: 0.92,
            is_anomaly: true,
            anomaly_score: 0.88,
            anomaly_confidence: 0.9,
            severity: logintel_core::Severity::High,
            model_version: "test-model-v0".to_string(),
            predicted_at: Utc::now(),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for logintel-specific validation.

    use super::*;

    /// Assert that a `LogIntelResult` is `Ok`.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &Result<T, LogIntelError>) {
        assert!(result.is_ok(), "expected Ok, got Err: {result:?}");
    }

    /// Assert that a result is a `Storage(DuplicateExternalId)` error.
    #[track_caller]
    pub fn assert_duplicate_external_id<T: std::fmt::Debug>(result: &Result<T, LogIntelError>) {
        match result {
            Err(LogIntelError::Storage(StorageError::DuplicateExternalId(_))) => {}
            other => panic!("expected DuplicateExternalId error, got: {other:?}"),
        }
    }

    /// Assert that a result is a `Storage(NotFound)` error.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &Result<T, LogIntelError>) {
        match result {
            Err(LogIntelError::Storage(StorageError::NotFound(_))) => {}
            other => panic!("expected NotFound error, got: {other:?}"),
        }
    }

    /// Assert that a result is an `Auth(RateLimitExceeded)` error with a
    /// positive `retry_after_secs`, per scenario S4.
    #[track_caller]
    pub fn assert_rate_limited<T: std::fmt::Debug>(result: &Result<T, LogIntelError>) {
        match result {
            Err(LogIntelError::Auth(AuthError::RateLimitExceeded { retry_after_secs })) => {
                assert!(*retry_after_secs > 0, "retry_after_secs should be positive");
            }
            other => panic!("expected RateLimitExceeded error, got: {other:?}"),
        }
    }

    /// Assert that a result is an `Ml(PredictionPending)` error, per
    /// scenario S5 before the analyzer has run.
    #[track_caller]
    pub fn assert_prediction_pending<T: std::fmt::Debug>(result: &Result<T, LogIntelError>) {
        match result {
            Err(LogIntelError::Ml(MlError::PredictionPending(_))) => {}
            other => panic!("expected PredictionPending error, got: {other:?}"),
        }
    }

    /// Assert that aggregate stats match scenario S6's fixture exactly.
    #[track_caller]
    pub fn assert_matches_stats_fixture(stats: &AggregateStats) {
        assert_eq!(stats.total_logs, 100);
        assert_eq!(stats.logs_by_level.get("INFO").copied().unwrap_or(0), 70);
        assert_eq!(stats.logs_by_level.get("WARN").copied().unwrap_or(0), 20);
        assert_eq!(stats.logs_by_level.get("ERROR").copied().unwrap_or(0), 8);
        assert_eq!(stats.logs_by_level.get("FATAL").copied().unwrap_or(0), 2);
        assert_eq!(stats.logs_by_source.get("application").copied().unwrap_or(0), 60);
        assert_eq!(stats.logs_by_source.get("splunk").copied().unwrap_or(0), 30);
        assert_eq!(stats.logs_by_source.get("sap").copied().unwrap_or(0), 10);
        assert_eq!(stats.anomaly_count, 5);
        assert_eq!(stats.error_count, 10);
        assert_eq!(stats.anomaly_rate, 5.0);
        assert_eq!(stats.error_rate, 10.0);
    }

    /// Assert that a `User`'s effective permission set contains `permission`.
    #[track_caller]
    pub fn assert_has_permission(user: &User, permission: &str) {
        assert!(
            user.has_permission(permission),
            "expected user {} to have permission {permission}",
            user.username
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::*;
    use crate::fixtures::*;
    use proptest::prelude::*;

    #[test]
    fn stats_fixture_batch_matches_s6_distribution() {
        let start = Utc::now() - chrono::Duration::hours(1);
        let end = Utc::now();
        let batch = stats_fixture_batch(start, end);
        assert_eq!(batch.len(), 100);

        let info_count = batch.iter().filter(|l| l.level == Level::Info).count();
        let anomaly_count = batch.iter().filter(|l| l.anomaly.is_anomaly).count();
        assert_eq!(info_count, 70);
        assert_eq!(anomaly_count, 5);
    }

    #[test]
    fn application_log_and_sap_log_share_request_id() {
        let app = application_log("app-1");
        let sap = sap_log_sharing_request_id("sap-1", "req-42");
        assert_eq!(app.request_id.as_deref(), Some("req-42"));
        assert_eq!(sap.request_id.as_deref(), Some("req-42"));
    }

    #[test]
    fn assert_matches_stats_fixture_accepts_the_canonical_shape() {
        let stats = AggregateStats::from_counts(
            100,
            HashMap::from([
                ("INFO".to_string(), 70),
                ("WARN".to_string(), 20),
                ("ERROR".to_string(), 8),
                ("FATAL".to_string(), 2),
            ]),
            HashMap::from([
                ("application".to_string(), 60),
                ("splunk".to_string(), 30),
                ("sap".to_string(), 10),
            ]),
            5,
            10,
            None,
        );
        assert_matches_stats_fixture(&stats);
    }

    #[test]
    fn test_user_has_default_role_permissions() {
        let user = test_user("ana", Role::Analyst);
        assert_has_permission(&user, "read_predictions");
    }

    proptest! {
        #[test]
        fn arb_log_entry_always_has_nonempty_message(entry in generators::arb_log_entry()) {
            prop_assert!(!entry.message.is_empty());
        }
    }
}
