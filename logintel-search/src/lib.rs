//! logintel-search - the index-store adapter (component C).
//!
//! Bulk indexing and compound query construction over an inverted-index
//! store (Elasticsearch), keyed by `external_id`. Indexing failures never
//! abort the ingestion coordinator; query failures surface to clients as
//! `search_unavailable`.

mod aggregate;
mod client;
mod query;

pub use aggregate::AggregateBuckets;
pub use client::{ElasticsearchIndexStore, IndexOutcome, IndexStore, SearchConfig};
pub use query::build_query;
