//! Search filter, pagination, sort, and aggregate-stats shapes shared by the
//! row-store adapter, index-store adapter, and the search & correlation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Level, SourceType};

/// Maximum page size accepted by `SearchLogs`/`Query`; requests above this
/// are clamped, never rejected.
pub const MAX_SEARCH_LIMIT: u32 = 1000;

/// Default lookback window used whenever a caller omits an explicit time
/// range. This is an implicit default only — callers may always override it.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Sort order for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum SortOrder {
    TimestampDesc,
    TimestampAsc,
    RelevanceThenTimestampDesc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::TimestampDesc
    }
}

/// `(limit, offset)` pair. `new` enforces the clamp described in
/// `Pagination::clamp` so callers constructing a `Pagination` never need to
/// re-derive the rule by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }.clamp()
    }

    /// `limit > MAX_SEARCH_LIMIT` is clamped to `MAX_SEARCH_LIMIT`, never an
    /// error; `limit == 0` defaults to `MAX_SEARCH_LIMIT` (no-limit supplied).
    pub fn clamp(mut self) -> Self {
        if self.limit == 0 || self.limit > MAX_SEARCH_LIMIT {
            self.limit = MAX_SEARCH_LIMIT;
        }
        self
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

/// Filter carried by `SearchLogs`/`Query`. All fields optional; an empty
/// filter with no text query returns the most recent entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SearchFilter {
    pub source_type: Option<SourceType>,
    pub level: Option<Level>,
    pub host: Option<String>,
    pub service: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_anomaly: Option<bool>,
    pub text_query: Option<String>,
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
    pub ip_address: Option<String>,
}

impl SearchFilter {
    pub fn has_text_query(&self) -> bool {
        self.text_query
            .as_ref()
            .map(|q| !q.trim().is_empty())
            .unwrap_or(false)
    }

    /// Implicit time range: upper bound "now", lower bound
    /// `DEFAULT_WINDOW_HOURS` prior, applied only where the caller left a
    /// bound unset.
    pub fn effective_range(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = self.end_time.unwrap_or(now);
        let start = self
            .start_time
            .unwrap_or_else(|| end - chrono::Duration::hours(DEFAULT_WINDOW_HOURS));
        (start, end)
    }
}

/// Aggregate statistics over a time window, sourced from either the row
/// store's native aggregate or the index store's bucketed aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AggregateStats {
    pub total_logs: u64,
    pub logs_by_level: HashMap<String, u64>,
    pub logs_by_source: HashMap<String, u64>,
    pub anomaly_count: u64,
    pub error_count: u64,
    pub anomaly_rate: f64,
    pub error_rate: f64,
    pub avg_response_time_ms: Option<f64>,
}

impl AggregateStats {
    /// Build stats from raw counts, computing rates as percentages so
    /// `anomaly_count / total_logs * 100` matches the scenario fixture in the
    /// acceptance tests (e.g. 5 anomalies in 100 logs -> `anomaly_rate: 5.0`).
    pub fn from_counts(
        total_logs: u64,
        logs_by_level: HashMap<String, u64>,
        logs_by_source: HashMap<String, u64>,
        anomaly_count: u64,
        error_count: u64,
        avg_response_time_ms: Option<f64>,
    ) -> Self {
        let rate = |count: u64| -> f64 {
            if total_logs == 0 {
                0.0
            } else {
                (count as f64 / total_logs as f64) * 100.0
            }
        };
        Self {
            total_logs,
            anomaly_rate: rate(anomaly_count),
            error_rate: rate(error_count),
            logs_by_level,
            logs_by_source,
            anomaly_count,
            error_count,
            avg_response_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_over_max() {
        let page = Pagination::new(5000, 0);
        assert_eq!(page.limit, MAX_SEARCH_LIMIT);
    }

    #[test]
    fn pagination_zero_limit_defaults_to_max() {
        let page = Pagination::new(0, 10);
        assert_eq!(page.limit, MAX_SEARCH_LIMIT);
    }

    #[test]
    fn search_filter_has_text_query_ignores_whitespace() {
        let mut filter = SearchFilter::default();
        filter.text_query = Some("   ".into());
        assert!(!filter.has_text_query());
        filter.text_query = Some("database".into());
        assert!(filter.has_text_query());
    }

    #[test]
    fn effective_range_defaults_to_24h_window() {
        let filter = SearchFilter::default();
        let now = Utc::now();
        let (start, end) = filter.effective_range(now);
        assert_eq!(end, now);
        assert_eq!((end - start).num_hours(), DEFAULT_WINDOW_HOURS);
    }

    #[test]
    fn aggregate_stats_rates_match_fixture() {
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
        assert_eq!(stats.anomaly_rate, 5.0);
        assert_eq!(stats.error_rate, 10.0);
    }
}
