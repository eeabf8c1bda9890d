//! `/logs/*` handlers: ingestion, full-text/structured search, direct
//! lookup, correlation-key lookup, and aggregate statistics.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use logintel_core::{
    AggregateStats, CorrelationKey, LogEntry, Pagination, SearchFilter, SourceType, DEFAULT_WINDOW_HOURS,
};
use logintel_search::IndexStore;
use logintel_storage::{InsertOutcome, RejectionKind, RowStore};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::response::ApiSuccess;
use crate::services;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IngestRequest {
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PerEntryError {
    pub external_id: String,
    pub kind: &'static str,
    pub detail: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IngestResponse {
    pub ingested_count: usize,
    pub failed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_entry_errors: Option<Vec<PerEntryError>>,
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/logs",
    tag = "Logs",
    security(("bearer_auth" = [])),
    request_body = IngestRequest,
    responses((status = 200, description = "Per-entry ingestion outcome")),
))]
pub async fn ingest(
    State(store): State<Arc<dyn RowStore>>,
    State(index): State<Arc<dyn IndexStore>>,
    AuthExtractor(ctx): AuthExtractor,
    Json(req): Json<IngestRequest>,
) -> ApiResult<ApiSuccess<IngestResponse>> {
    ctx.require_permission("ingest_logs")?;
    if req.logs.is_empty() {
        return Err(ApiError::validation_failed("logs must not be empty"));
    }

    let summary = services::ingest_batch(store.as_ref(), index.as_ref(), req.logs).await?;
    let errors: Vec<PerEntryError> = summary
        .outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            InsertOutcome::Rejected { external_id, kind, detail } => Some(PerEntryError {
                external_id: external_id.0.clone(),
                kind: match kind {
                    RejectionKind::DuplicateExternalId => "duplicate_external_id",
                    RejectionKind::ValidationFailed => "validation_failed",
                    RejectionKind::StorageError => "storage_error",
                },
                detail: detail.clone(),
            }),
            InsertOutcome::Stored { .. } => None,
        })
        .collect();

    Ok(ApiSuccess::new(IngestResponse {
        ingested_count: summary.accepted,
        failed_count: summary.rejected,
        per_entry_errors: if errors.is_empty() { None } else { Some(errors) },
    }))
}

#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    pub source_type: Option<SourceType>,
    pub level: Option<String>,
    pub host: Option<String>,
    pub service: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_anomaly: Option<bool>,
    pub q: Option<String>,
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
    pub ip_address: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SearchResponse {
    pub logs: Vec<LogEntry>,
    pub total_count: u64,
    pub limit: u32,
    pub offset: u32,
}

fn build_filter(query: &SearchQuery) -> ApiResult<SearchFilter> {
    let level = query
        .level
        .as_deref()
        .map(|l| l.parse().map_err(|_| ApiError::validation_failed(format!("invalid level: {l}"))))
        .transpose()?;

    Ok(SearchFilter {
        source_type: query.source_type,
        level,
        host: query.host.clone(),
        service: query.service.clone(),
        start_time: query.start_time,
        end_time: query.end_time,
        is_anomaly: query.is_anomaly,
        text_query: query.q.clone(),
        request_id: query.request_id.clone(),
        session_id: query.session_id.clone(),
        correlation_id: query.correlation_id.clone(),
        ip_address: query.ip_address.clone(),
    })
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/logs/search",
    tag = "Logs",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Filtered log search")),
))]
pub async fn search(
    State(store): State<Arc<dyn RowStore>>,
    State(index): State<Arc<dyn IndexStore>>,
    AuthExtractor(ctx): AuthExtractor,
    Query(query): Query<SearchQuery>,
) -> ApiResult<ApiSuccess<SearchResponse>> {
    ctx.require_permission("read_logs")?;

    let filter = build_filter(&query)?;
    let pagination = Pagination::new(query.limit.unwrap_or(50), query.offset.unwrap_or(0)).clamp();

    let outcome = services::search_logs(store.as_ref(), index.as_ref(), &filter, pagination).await?;
    Ok(ApiSuccess::new(SearchResponse {
        logs: outcome.entries,
        total_count: outcome.total,
        limit: pagination.limit,
        offset: pagination.offset,
    }))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/logs/{external_id}",
    tag = "Logs",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "A single log entry by external id")),
))]
pub async fn get_by_external_id(
    State(store): State<Arc<dyn RowStore>>,
    AuthExtractor(ctx): AuthExtractor,
    Path(external_id): Path<String>,
) -> ApiResult<ApiSuccess<LogEntry>> {
    ctx.require_permission("read_logs")?;
    let entry = store
        .get_by_external_id(&external_id.into())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("log {external_id} not found")))?;
    Ok(ApiSuccess::new(entry))
}

#[derive(Debug, Deserialize, Default)]
pub struct CorrelationQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CorrelationResponse {
    pub logs: Vec<LogEntry>,
    pub correlation_key: String,
    pub correlation_value: String,
    pub count: usize,
    pub limit: u32,
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/logs/correlation/{key}/{value}",
    tag = "Logs",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Logs sharing a correlation key/value")),
))]
pub async fn correlation(
    State(store): State<Arc<dyn RowStore>>,
    AuthExtractor(ctx): AuthExtractor,
    Path((key, value)): Path<(String, String)>,
    Query(query): Query<CorrelationQuery>,
) -> ApiResult<ApiSuccess<CorrelationResponse>> {
    ctx.require_permission("read_logs")?;

    let correlation_key: CorrelationKey = key
        .parse()
        .map_err(|_| ApiError::validation_failed(format!("unknown correlation key: {key}")))?;
    let limit = Pagination::new(query.limit.unwrap_or(50), 0).clamp().limit;

    let logs = services::correlated_lookup(store.as_ref(), correlation_key, &value, limit).await?;
    Ok(ApiSuccess::new(CorrelationResponse {
        count: logs.len(),
        logs,
        correlation_key: correlation_key.to_string(),
        correlation_value: value,
        limit,
    }))
}

#[derive(Debug, Deserialize, Default)]
pub struct StatsQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/logs/statistics",
    tag = "Logs",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Aggregate counts over a time window")),
))]
pub async fn statistics(
    State(store): State<Arc<dyn RowStore>>,
    AuthExtractor(ctx): AuthExtractor,
    Query(query): Query<StatsQuery>,
) -> ApiResult<ApiSuccess<AggregateStats>> {
    ctx.require_permission("read_logs")?;

    let end = query.end_time.unwrap_or_else(Utc::now);
    let start = query
        .start_time
        .unwrap_or_else(|| end - chrono::Duration::hours(DEFAULT_WINDOW_HOURS as i64));

    let stats = store.stats_over_window(start, end).await?;
    Ok(ApiSuccess::new(stats))
}

/// Ingestion gets its own router so callers can layer it under the
/// `Ingest` rate-limit class while reads use the more generous `Search`
/// class - the two share a path prefix but not a quota.
pub fn ingest_router() -> Router<AppState> {
    Router::new().route("/", post(ingest))
}

pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/search", get(search))
        .route("/statistics", get(statistics))
        .route("/correlation/:key/:value", get(correlation))
        .route("/:external_id", get(get_by_external_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_filter_rejects_unknown_level() {
        let query = SearchQuery { level: Some("not-a-level".into()), ..Default::default() };
        assert!(build_filter(&query).is_err());
    }

    #[test]
    fn build_filter_passes_through_text_query() {
        let query = SearchQuery { q: Some("timeout".into()), ..Default::default() };
        let filter = build_filter(&query).unwrap();
        assert!(filter.has_text_query());
    }
}
