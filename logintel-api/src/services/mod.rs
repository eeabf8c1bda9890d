//! Orchestration layer: plain async functions composing the row store (`B`),
//! the index store (`C`), and ML serving (`G`) into the two HTTP-facing
//! operations that need more than one of them - ingestion and search.

pub mod ingest;
pub mod search;

pub use ingest::{ingest_batch, IngestSummary};
pub use search::{correlated_lookup, search_logs, SearchOutcome};
