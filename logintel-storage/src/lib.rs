//! logintel-storage - the row-store adapter (component B).
//!
//! Typed CRUD over the relational log table, transactional batch insert,
//! correlation queries, and stats aggregates. B is the source of truth:
//! every entry the coordinator reports as `stored` is retrievable here even
//! if the index store never saw it.

mod config;
mod memory;
mod postgres;
mod store;

pub use config::DbConfig;
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{InsertOutcome, RejectionKind, RowStore};
