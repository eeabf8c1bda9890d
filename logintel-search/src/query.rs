//! Pure construction of the Elasticsearch query DSL from a `SearchFilter`.
//! Kept free of any transport concerns so the shape of the generated query
//! can be asserted on directly in tests.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use logintel_core::SearchFilter;

/// Builds a compound `bool` query: term filters for every exact-match
/// attribute, a range filter on `timestamp`, and — when present — a scored
/// `match` sub-query against `message`.
pub fn build_query(filter: &SearchFilter, now: DateTime<Utc>) -> Value {
    let (start, end) = filter.effective_range(now);

    let mut must: Vec<Value> = vec![json!({
        "range": {
            "timestamp": {
                "gte": start.to_rfc3339(),
                "lte": end.to_rfc3339(),
            }
        }
    })];

    macro_rules! term {
        ($field:literal, $value:expr) => {
            if let Some(v) = $value {
                must.push(json!({ "term": { $field: v } }));
            }
        };
    }

    term!("source_type", filter.source_type.map(|s| s.to_string()));
    term!("level", filter.level.map(|l| l.to_string()));
    term!("host", filter.host.clone());
    term!("service", filter.service.clone());
    term!("is_anomaly", filter.is_anomaly);
    term!("request_id", filter.request_id.clone());
    term!("session_id", filter.session_id.clone());
    term!("correlation_id", filter.correlation_id.clone());
    term!("ip_address", filter.ip_address.clone());

    if filter.has_text_query() {
        must.push(json!({
            "match": {
                "message": {
                    "query": filter.text_query.clone().unwrap_or_default()
                }
            }
        }));
    }

    json!({ "bool": { "must": must } })
}

/// Whether a query built from this filter should sort by relevance score
/// (text query present) or fall back to `timestamp DESC`.
pub fn is_scored(filter: &SearchFilter) -> bool {
    filter.has_text_query()
}

#[cfg(test)]
mod tests {
    use super::*;
    use logintel_core::{Level, SourceType};

    #[test]
    fn empty_filter_produces_only_a_range_clause() {
        let filter = SearchFilter::default();
        let query = build_query(&filter, Utc::now());
        let must = query["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 1);
        assert!(must[0]["range"]["timestamp"].is_object());
    }

    #[test]
    fn text_query_adds_a_scored_match_clause() {
        let mut filter = SearchFilter::default();
        filter.text_query = Some("database".into());
        filter.level = Some(Level::Error);
        filter.source_type = Some(SourceType::Application);

        let query = build_query(&filter, Utc::now());
        let must = query["bool"]["must"].as_array().unwrap();
        assert!(must.iter().any(|clause| clause["match"]["message"]["query"] == "database"));
        assert!(must.iter().any(|clause| clause["term"]["level"] == "ERROR"));
        assert!(must.iter().any(|clause| clause["term"]["source_type"] == "application"));
        assert!(is_scored(&filter));
    }

    #[test]
    fn filter_without_text_query_is_not_scored() {
        let filter = SearchFilter::default();
        assert!(!is_scored(&filter));
    }
}
