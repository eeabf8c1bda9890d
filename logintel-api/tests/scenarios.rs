//! End-to-end scenario tests driving a fully assembled `Router` in-process
//! with `tower::ServiceExt::oneshot`, no live listener required.
//!
//! There is no in-memory `IndexStore` in `logintel-search` (only the
//! Elasticsearch-backed one), so these tests bring their own naive
//! substring-matching stub, in the same spirit as the `StubIndex`/
//! `FailingIndex` helpers already living in `logintel-api`'s unit tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{SecondsFormat, Utc};
use tower::ServiceExt;

use logintel_api::{hash_password, issue_token_pair, build_router, AppState, AuthConfig};
use logintel_api::config::ApiConfig;
use logintel_core::{
    AggregateStats, AuthError, ExternalId, Level, LogEntry, LogInternalId, LogIntelError, MlError,
    Pagination, Role, SearchError, SearchFilter, StorageError,
};
use logintel_ml::OnlineServing;
use logintel_search::{AggregateBuckets, IndexOutcome, IndexStore};
use logintel_storage::{InMemoryStore, RowStore};
use logintel_test_utils::assertions::{
    assert_duplicate_external_id, assert_not_found, assert_prediction_pending, assert_rate_limited,
};
use logintel_test_utils::fixtures;

/// Naive substring-matching stand-in for the Elasticsearch adapter. Applies
/// the same field predicates as `InMemoryStore::matches` plus a
/// case-insensitive substring check on `message`/`raw_log` for the text
/// query, since that's the one thing the row store itself can't answer.
struct TestIndex {
    docs: Mutex<Vec<LogEntry>>,
}

impl TestIndex {
    fn new() -> Self {
        Self { docs: Mutex::new(Vec::new()) }
    }

    fn matches(filter: &SearchFilter, entry: &LogEntry, start: chrono::DateTime<Utc>, end: chrono::DateTime<Utc>) -> bool {
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
        if let Some(q) = &filter.text_query {
            let q = q.trim().to_lowercase();
            if !q.is_empty() {
                let haystack = format!("{} {}", entry.message, entry.raw_log).to_lowercase();
                if !haystack.contains(&q) {
                    return false;
                }
            }
        }
        true
    }
}

#[async_trait]
impl IndexStore for TestIndex {
    async fn ensure_index(&self) -> Result<(), SearchError> {
        Ok(())
    }

    async fn bulk_index(&self, batch: &[LogEntry]) -> Result<Vec<IndexOutcome>, SearchError> {
        let mut docs = self.docs.lock().unwrap();
        let outcomes = batch
            .iter()
            .map(|entry| {
                docs.push(entry.clone());
                IndexOutcome::Indexed { external_id: entry.external_id.clone() }
            })
            .collect();
        Ok(outcomes)
    }

    async fn query(
        &self,
        filter: &SearchFilter,
        pagination: Pagination,
    ) -> Result<(Vec<LogEntry>, u64, Option<f64>), SearchError> {
        let (start, end) = filter.effective_range(Utc::now());
        let docs = self.docs.lock().unwrap();
        let mut matched: Vec<LogEntry> =
            docs.iter().filter(|e| Self::matches(filter, e, start, end)).cloned().collect();
        matched.sort_by_key(|e| std::cmp::Reverse(e.timestamp));

        let total = matched.len() as u64;
        let pagination = pagination.clamp();
        let page: Vec<LogEntry> =
            matched.into_iter().skip(pagination.offset as usize).take(pagination.limit as usize).collect();
        Ok((page, total, Some(1.0)))
    }

    async fn aggregate(&self, _filter: &SearchFilter) -> Result<AggregateBuckets, SearchError> {
        Ok(AggregateBuckets::default())
    }
}

struct TestApp {
    router: Router,
    store: Arc<dyn RowStore>,
    auth_config: Arc<AuthConfig>,
}

fn test_app() -> TestApp {
    let store: Arc<dyn RowStore> = Arc::new(InMemoryStore::new());
    let index: Arc<dyn IndexStore> = Arc::new(TestIndex::new());
    let serving = Arc::new(OnlineServing::new(store.clone()));
    let auth_config = Arc::new(AuthConfig::from_env());
    let api_config = Arc::new(ApiConfig::default());

    let state = AppState {
        store: store.clone(),
        index,
        serving,
        auth_config: auth_config.clone(),
        api_config,
        start_time: Instant::now(),
    };

    TestApp { router: build_router(state), store, auth_config }
}

/// Seeds an always-active admin user and returns a bearer access token -
/// Admin carries every default permission, so one seeded user covers every
/// route under test.
async fn admin_token(store: &Arc<dyn RowStore>, auth_config: &AuthConfig) -> String {
    let mut user = fixtures::test_user("scenario-admin", Role::Admin);
    user.password_hash = hash_password("correct horse battery staple").unwrap();
    store.create_user(user.clone()).await.unwrap();
    issue_token_pair(auth_config, &user).unwrap().0
}

const PEER: &str = "198.51.100.7:0";

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
        None => Body::empty(),
    };
    let mut req = builder.body(body).unwrap();
    let addr: SocketAddr = PEER.parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { serde_json::Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn s1_ingest_then_search_round_trip() {
    let app = test_app();
    let token = admin_token(&app.store, &app.auth_config).await;

    let entry = LogEntry {
        message: "Database connection failed".to_string(),
        level: Level::Error,
        ..fixtures::application_log("app-1-abc")
    };
    let (status, body) =
        send(&app.router, request("POST", "/logs", Some(&token), Some(serde_json::json!({ "logs": [entry] })))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ingested_count"], 1);
    assert_eq!(body["data"]["failed_count"], 0);

    let (status, body) =
        send(&app.router, request("GET", "/logs/search?q=database&level=ERROR&limit=10", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    let logs = body["data"]["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["external_id"], "app-1-abc");
}

#[tokio::test]
async fn s2_correlation_across_sources() {
    let app = test_app();
    let token = admin_token(&app.store, &app.auth_config).await;

    let t0 = Utc::now() - chrono::Duration::minutes(1);
    let first = LogEntry { timestamp: t0, ..fixtures::application_log("s2-app-1") };
    let second =
        LogEntry { timestamp: t0 + chrono::Duration::seconds(5), ..fixtures::sap_log_sharing_request_id("s2-sap-1", "req-42") };

    let (status, _) = send(
        &app.router,
        request("POST", "/logs", Some(&token), Some(serde_json::json!({ "logs": [first, second] }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        send(&app.router, request("GET", "/logs/correlation/request_id/req-42?limit=10", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 2);
    let logs = body["data"]["logs"].as_array().unwrap();
    assert_eq!(logs[0]["external_id"], "s2-app-1");
    assert_eq!(logs[1]["external_id"], "s2-sap-1");
}

#[tokio::test]
async fn s3_duplicate_external_id_is_idempotent() {
    let app = test_app();
    let token = admin_token(&app.store, &app.auth_config).await;
    let entry = LogEntry { ..fixtures::application_log("dup-1") };

    let (status, body) =
        send(&app.router, request("POST", "/logs", Some(&token), Some(serde_json::json!({ "logs": [entry.clone()] })))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ingested_count"], 1);
    assert_eq!(body["data"]["failed_count"], 0);

    let (status, body) =
        send(&app.router, request("POST", "/logs", Some(&token), Some(serde_json::json!({ "logs": [entry] })))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ingested_count"], 0);
    assert_eq!(body["data"]["failed_count"], 1);
    let errors = body["data"]["per_entry_errors"].as_array().unwrap();
    assert_eq!(errors[0]["kind"], "duplicate_external_id");
    assert_eq!(errors[0]["external_id"], "dup-1");

    let (status, body) = send(&app.router, request("GET", "/logs/dup-1", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["external_id"], "dup-1");
}

#[tokio::test]
async fn s4_rate_limit_trips_on_sixth_login_attempt() {
    let app = test_app();
    let login_body = serde_json::json!({ "username": "nobody", "password": "wrong" });

    let mut last_status = StatusCode::OK;
    let mut last_body = serde_json::Value::Null;
    for _ in 0..6 {
        let req = request("POST", "/auth/login", None, Some(login_body.clone()));
        let response = app.router.clone().oneshot(req).await.unwrap();
        last_status = response.status();
        let remaining = response.headers().get("x-ratelimit-remaining").cloned();
        let retry_after = response.headers().get("retry-after").cloned();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        last_body = serde_json::from_slice(&bytes).unwrap();
        if last_status == StatusCode::TOO_MANY_REQUESTS {
            assert_eq!(remaining.unwrap().to_str().unwrap(), "0");
            assert!(retry_after.unwrap().to_str().unwrap().parse::<u64>().unwrap() > 0);
        }
    }

    assert_eq!(last_status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(last_body["error"]["code"], "rate_limit_exceeded");
}

#[tokio::test]
async fn s5_ml_serving_reports_pending_then_real_prediction() {
    let app = test_app();
    let token = admin_token(&app.store, &app.auth_config).await;

    let entry = LogEntry { ..fixtures::application_log("ml-1") };
    let (status, _) =
        send(&app.router, request("POST", "/logs", Some(&token), Some(serde_json::json!({ "logs": [entry] })))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        send(&app.router, request("GET", "/ml?action=analyze&log_id=ml-1", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["prediction"].is_null());
    assert_eq!(body["data"]["source"], "mock_data_fallback");

    let stored = app.store.get_by_external_id(&ExternalId::new("ml-1")).await.unwrap().unwrap();
    let internal_id = stored.internal_id.unwrap();
    app.store.upsert_prediction(fixtures::anomalous_prediction(internal_id)).await.unwrap();

    let (status, body) =
        send(&app.router, request("GET", "/ml?action=analyze&log_id=ml-1", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["data"]["prediction"].is_null());
    assert_eq!(body["data"]["source"], "ml_predictions_table");
}

#[tokio::test]
async fn s6_stats_aggregation_matches_fixture() {
    let app = test_app();
    let token = admin_token(&app.store, &app.auth_config).await;

    let start = Utc::now() - chrono::Duration::hours(1);
    let end = Utc::now();
    let batch = fixtures::stats_fixture_batch(start, end);
    let (status, _) =
        send(&app.router, request("POST", "/logs", Some(&token), Some(serde_json::json!({ "logs": batch })))).await;
    assert_eq!(status, StatusCode::OK);

    let start_param = start.to_rfc3339_opts(SecondsFormat::Secs, true);
    let end_param = end.to_rfc3339_opts(SecondsFormat::Secs, true);
    let uri = format!("/logs/statistics?start_time={start_param}&end_time={end_param}");
    let (status, body) = send(&app.router, request("GET", &uri, Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let stats: AggregateStats = serde_json::from_value(body["data"].clone()).unwrap();
    logintel_test_utils::assertions::assert_matches_stats_fixture(&stats);
}

/// The `assertions` module's error-shape helpers have no other caller in
/// the codebase - `LogIntelError` is an internal umbrella that handlers
/// convert straight to `ApiError`, so this builds the four component errors
/// by hand and checks each one is recognized.
#[test]
fn assertions_module_recognizes_component_error_shapes() {
    let duplicate: Result<(), LogIntelError> = Err(StorageError::DuplicateExternalId(ExternalId::new("dup-1")).into());
    assert_duplicate_external_id(&duplicate);

    let missing: Result<(), LogIntelError> = Err(StorageError::NotFound(ExternalId::new("missing-1")).into());
    assert_not_found(&missing);

    let limited: Result<(), LogIntelError> = Err(AuthError::RateLimitExceeded { retry_after_secs: 42 }.into());
    assert_rate_limited(&limited);

    let pending: Result<(), LogIntelError> = Err(MlError::PredictionPending(LogInternalId::new(1)).into());
    assert_prediction_pending(&pending);
}
