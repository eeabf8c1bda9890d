//! Search & correlation engine (component E). Routing rule: a filter that
//! carries a non-blank `text_query` is answered by `C` (full-text relevance
//! ranking, which `B` cannot do); every other filter shape, including the
//! empty filter, is answered by `B`. Both paths fold the implicit time
//! window and pagination clamp defined on `SearchFilter`/`Pagination`
//! themselves, so routing never re-derives those rules.
//!
//! If `C` fails the query, the result falls back to a row-store-only answer
//! from `B` rather than failing the request outright; ranking is lost
//! (`max_score` becomes `None`) but the search still returns results.

use chrono::Utc;

use logintel_core::{CorrelationKey, LogEntry, Pagination, SearchFilter, SortOrder};
use logintel_search::IndexStore;
use logintel_storage::RowStore;

use crate::error::ApiResult;

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub entries: Vec<LogEntry>,
    pub total: u64,
    pub max_score: Option<f64>,
}

/// Empty filter with no text query -> most recent entries (`B`, sorted
/// `TimestampDesc`). Missing time range -> implicit 24h window. Limit above
/// the max or zero is clamped, never rejected. Offset beyond the total
/// simply returns an empty page.
pub async fn search_logs(
    store: &dyn RowStore,
    index: &dyn IndexStore,
    filter: &SearchFilter,
    pagination: Pagination,
) -> ApiResult<SearchOutcome> {
    let pagination = pagination.clamp();
    let mut filter = filter.clone();
    let (start, end) = filter.effective_range(Utc::now());
    filter.start_time = Some(start);
    filter.end_time = Some(end);

    if filter.has_text_query() {
        match index.query(&filter, pagination).await {
            Ok((entries, total, max_score)) => Ok(SearchOutcome {
                entries,
                total,
                max_score,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "index query failed, falling back to row store");
                let (entries, total) =
                    store.search_logs(&filter, pagination, SortOrder::TimestampDesc).await?;
                Ok(SearchOutcome {
                    entries,
                    total,
                    max_score: None,
                })
            }
        }
    } else {
        let (entries, total) = store.search_logs(&filter, pagination, SortOrder::TimestampDesc).await?;
        Ok(SearchOutcome {
            entries,
            total,
            max_score: None,
        })
    }
}

/// Correlated lookup always routes to `B`: it is an exact-match join over a
/// flat attribute, not a relevance query, and results come back in causal
/// (`timestamp ASC`) order.
pub async fn correlated_lookup(
    store: &dyn RowStore,
    key: CorrelationKey,
    value: &str,
    limit: u32,
) -> ApiResult<Vec<LogEntry>> {
    let limit = Pagination::new(limit, 0).limit;
    Ok(store.correlated_lookup(key, value, limit).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use logintel_core::{AggregateStats, Level, SourceType};
    use logintel_search::{AggregateBuckets, IndexOutcome};
    use logintel_storage::InMemoryStore;

    struct StubIndex {
        queried: std::sync::atomic::AtomicBool,
    }

    impl StubIndex {
        fn new() -> Self {
            Self {
                queried: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl IndexStore for StubIndex {
        async fn ensure_index(&self) -> Result<(), logintel_core::SearchError> {
            Ok(())
        }
        async fn bulk_index(&self, _batch: &[LogEntry]) -> Result<Vec<IndexOutcome>, logintel_core::SearchError> {
            Ok(Vec::new())
        }
        async fn query(
            &self,
            _filter: &SearchFilter,
            _pagination: Pagination,
        ) -> Result<(Vec<LogEntry>, u64, Option<f64>), logintel_core::SearchError> {
            self.queried.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok((Vec::new(), 0, Some(1.0)))
        }
        async fn aggregate(&self, _filter: &SearchFilter) -> Result<AggregateBuckets, logintel_core::SearchError> {
            Ok(AggregateBuckets::default())
        }
    }

    fn _unused(_: AggregateStats, _: Level, _: SourceType) {}

    #[tokio::test]
    async fn empty_filter_routes_to_row_store_not_index() {
        let store = InMemoryStore::new();
        let index = StubIndex::new();
        let filter = SearchFilter::default();
        let outcome = search_logs(&store, &index, &filter, Pagination::default()).await.unwrap();
        assert_eq!(outcome.total, 0);
        assert!(!index.queried.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn text_query_routes_to_index_store() {
        let store = InMemoryStore::new();
        let index = StubIndex::new();
        let mut filter = SearchFilter::default();
        filter.text_query = Some("database timeout".to_string());
        let outcome = search_logs(&store, &index, &filter, Pagination::default()).await.unwrap();
        assert_eq!(outcome.max_score, Some(1.0));
        assert!(index.queried.load(std::sync::atomic::Ordering::SeqCst));
    }

    struct FailingIndex;

    #[async_trait]
    impl IndexStore for FailingIndex {
        async fn ensure_index(&self) -> Result<(), logintel_core::SearchError> {
            Ok(())
        }
        async fn bulk_index(&self, _batch: &[LogEntry]) -> Result<Vec<IndexOutcome>, logintel_core::SearchError> {
            Ok(Vec::new())
        }
        async fn query(
            &self,
            _filter: &SearchFilter,
            _pagination: Pagination,
        ) -> Result<(Vec<LogEntry>, u64, Option<f64>), logintel_core::SearchError> {
            Err(logintel_core::SearchError::Query("index down".to_string()))
        }
        async fn aggregate(&self, _filter: &SearchFilter) -> Result<AggregateBuckets, logintel_core::SearchError> {
            Ok(AggregateBuckets::default())
        }
    }

    #[tokio::test]
    async fn text_query_falls_back_to_row_store_when_index_query_fails() {
        let store = InMemoryStore::new();
        let index = FailingIndex;
        let mut filter = SearchFilter::default();
        filter.text_query = Some("database timeout".to_string());
        let outcome = search_logs(&store, &index, &filter, Pagination::default()).await.unwrap();
        assert_eq!(outcome.total, 0);
        assert_eq!(outcome.max_score, None);
    }

    #[tokio::test]
    async fn whitespace_only_text_query_still_routes_to_row_store() {
        let store = InMemoryStore::new();
        let index = StubIndex::new();
        let mut filter = SearchFilter::default();
        filter.text_query = Some("   ".to_string());
        search_logs(&store, &index, &filter, Pagination::default()).await.unwrap();
        assert!(!index.queried.load(std::sync::atomic::Ordering::SeqCst));
    }
}
