//! `IndexStore` trait and its Elasticsearch-backed production implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use elasticsearch::http::request::JsonBody;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::indices::{IndicesCreateParts, IndicesExistsParts};
use elasticsearch::{BulkParts, Elasticsearch, SearchParts};
use serde_json::{json, Value as JsonValue};

use logintel_core::{ExternalId, LogEntry, Pagination, SearchError, SearchFilter};

use crate::aggregate::AggregateBuckets;
use crate::query::{build_query, is_scored};

const INDEX_NAME: &str = "log_entries";

/// Elasticsearch connection configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
        }
    }
}

impl SearchConfig {
    /// Environment variable: `LOGINTEL_SEARCH_URL` (default `http://localhost:9200`).
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("LOGINTEL_SEARCH_URL")
                .unwrap_or_else(|_| "http://localhost:9200".to_string()),
        }
    }
}

/// Outcome of indexing a single document in a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed { external_id: ExternalId },
    Failed { external_id: ExternalId, detail: String },
}

#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn ensure_index(&self) -> Result<(), SearchError>;

    /// Submits documents keyed by `external_id`. A failure for one document
    /// never aborts the rest of the batch.
    async fn bulk_index(&self, batch: &[LogEntry]) -> Result<Vec<IndexOutcome>, SearchError>;

    /// `(hits, total, max_score)`. `max_score` is `None` when the query has
    /// no scored text sub-query.
    async fn query(
        &self,
        filter: &SearchFilter,
        pagination: Pagination,
    ) -> Result<(Vec<LogEntry>, u64, Option<f64>), SearchError>;

    async fn aggregate(
        &self,
        filter: &SearchFilter,
    ) -> Result<AggregateBuckets, SearchError>;
}

pub struct ElasticsearchIndexStore {
    client: Elasticsearch,
}

impl ElasticsearchIndexStore {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let url = config
            .url
            .parse()
            .map_err(|e| SearchError::Query(format!("invalid elasticsearch url: {e}")))?;
        let pool = SingleNodeConnectionPool::new(url);
        let transport = TransportBuilder::new(pool)
            .build()
            .map_err(|e| SearchError::Query(format!("failed to build transport: {e}")))?;
        Ok(Self {
            client: Elasticsearch::new(transport),
        })
    }

    fn doc_body(entry: &LogEntry) -> JsonValue {
        json!({
            "external_id": entry.external_id.as_str(),
            "timestamp": entry.timestamp.to_rfc3339(),
            "level": entry.level.to_string(),
            "message": entry.message,
            "source_type": entry.source_type.to_string(),
            "host": entry.host,
            "service": entry.service,
            "category": entry.category,
            "request_id": entry.request_id,
            "session_id": entry.session_id,
            "correlation_id": entry.correlation_id,
            "ip_address": entry.ip_address,
            "is_anomaly": entry.anomaly.is_anomaly,
        })
    }

    fn hit_to_log(hit: &JsonValue) -> Option<LogEntry> {
        let source = hit.get("_source")?;
        serde_json::from_value(json!({
            "internal_id": null,
            "external_id": source.get("external_id")?.as_str()?,
            "timestamp": source.get("timestamp")?,
            "level": source.get("level")?,
            "message": source.get("message")?,
            "source_type": source.get("source_type")?,
            "raw_log": "",
            "host": source.get("host"),
            "service": source.get("service"),
            "category": source.get("category"),
            "tags": [],
            "structured_data": {},
            "created_at": null,
            "updated_at": null,
            "request_id": source.get("request_id"),
            "session_id": source.get("session_id"),
            "correlation_id": source.get("correlation_id"),
            "ip_address": source.get("ip_address"),
            "anomaly": { "is_anomaly": source.get("is_anomaly").cloned().unwrap_or(json!(false)) },
        }))
        .ok()
    }
}

#[async_trait]
impl IndexStore for ElasticsearchIndexStore {
    async fn ensure_index(&self) -> Result<(), SearchError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[INDEX_NAME]))
            .send()
            .await
            .map_err(|e| SearchError::Indexing(format!("index existence check failed: {e}")))?;

        if exists.status_code().is_success() {
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(INDEX_NAME))
            .body(json!({
                "mappings": {
                    "properties": {
                        "external_id": { "type": "keyword" },
                        "timestamp": { "type": "date" },
                        "level": { "type": "keyword" },
                        "message": { "type": "text" },
                        "source_type": { "type": "keyword" },
                        "host": { "type": "keyword" },
                        "service": { "type": "keyword" },
                        "category": { "type": "keyword" },
                        "request_id": { "type": "keyword" },
                        "session_id": { "type": "keyword" },
                        "correlation_id": { "type": "keyword" },
                        "ip_address": { "type": "keyword" },
                        "is_anomaly": { "type": "boolean" }
                    }
                }
            }))
            .send()
            .await
            .map_err(|e| SearchError::Indexing(format!("index creation failed: {e}")))?;

        if !response.status_code().is_success() {
            return Err(SearchError::Indexing(format!(
                "index creation returned {}",
                response.status_code()
            )));
        }
        Ok(())
    }

    async fn bulk_index(&self, batch: &[LogEntry]) -> Result<Vec<IndexOutcome>, SearchError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut body: Vec<JsonBody<_>> = Vec::with_capacity(batch.len() * 2);
        for entry in batch {
            body.push(json!({ "index": { "_id": entry.external_id.as_str() } }).into());
            body.push(Self::doc_body(entry).into());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(INDEX_NAME))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchError::Indexing(format!("bulk request failed: {e}")))?;

        let payload: JsonValue = response
            .json()
            .await
            .map_err(|e| SearchError::Indexing(format!("bulk response parse failed: {e}")))?;

        let mut outcomes = Vec::with_capacity(batch.len());
        let items = payload["items"].as_array().cloned().unwrap_or_default();
        for (entry, item) in batch.iter().zip(items.iter()) {
            let status = item["index"]["status"].as_u64().unwrap_or(0);
            if (200..300).contains(&status) {
                outcomes.push(IndexOutcome::Indexed {
                    external_id: entry.external_id.clone(),
                });
            } else {
                let detail = item["index"]["error"]["reason"]
                    .as_str()
                    .unwrap_or("unknown indexing error")
                    .to_string();
                outcomes.push(IndexOutcome::Failed {
                    external_id: entry.external_id.clone(),
                    detail,
                });
            }
        }
        Ok(outcomes)
    }

    async fn query(
        &self,
        filter: &SearchFilter,
        pagination: Pagination,
    ) -> Result<(Vec<LogEntry>, u64, Option<f64>), SearchError> {
        let pagination = pagination.clamp();
        let now = Utc::now();
        let query = build_query(filter, now);
        let sort = if is_scored(filter) {
            json!([{ "_score": "desc" }, { "timestamp": "desc" }])
        } else {
            json!([{ "timestamp": "desc" }])
        };

        let body = json!({
            "query": query,
            "sort": sort,
            "from": pagination.offset,
            "size": pagination.limit,
            "track_total_hits": true,
        });

        let response = self
            .client
            .search(SearchParts::Index(&[INDEX_NAME]))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchError::Query(format!("search request failed: {e}")))?;

        let payload: JsonValue = response
            .json()
            .await
            .map_err(|e| SearchError::Query(format!("search response parse failed: {e}")))?;

        let total = payload["hits"]["total"]["value"].as_u64().unwrap_or(0);
        let max_score = payload["hits"]["max_score"].as_f64();
        let hits = payload["hits"]["hits"].as_array().cloned().unwrap_or_default();
        let entries: Vec<LogEntry> = hits.iter().filter_map(Self::hit_to_log).collect();

        Ok((entries, total, max_score))
    }

    async fn aggregate(&self, filter: &SearchFilter) -> Result<AggregateBuckets, SearchError> {
        let now = Utc::now();
        let query = build_query(filter, now);
        let body = json!({
            "query": query,
            "size": 0,
            "aggs": {
                "by_level": { "terms": { "field": "level", "size": 10 } },
                "by_source_type": { "terms": { "field": "source_type", "size": 10 } },
                "by_service": { "terms": { "field": "service", "size": 20 } },
                "by_host": { "terms": { "field": "host", "size": 20 } },
            }
        });

        let response = self
            .client
            .search(SearchParts::Index(&[INDEX_NAME]))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchError::Query(format!("aggregate request failed: {e}")))?;

        let payload: JsonValue = response
            .json()
            .await
            .map_err(|e| SearchError::Query(format!("aggregate response parse failed: {e}")))?;

        let bucket_map = |name: &str| -> HashMap<String, u64> {
            payload["aggregations"][name]["buckets"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .iter()
                .filter_map(|b| {
                    Some((
                        b["key"].as_str()?.to_string(),
                        b["doc_count"].as_u64().unwrap_or(0),
                    ))
                })
                .collect()
        };

        Ok(AggregateBuckets {
            by_level: bucket_map("by_level"),
            by_source_type: bucket_map("by_source_type"),
            by_service: bucket_map("by_service"),
            by_host: bucket_map("by_host"),
            top_endpoints: Vec::new(),
        })
    }
}
