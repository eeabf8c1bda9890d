//! Bucketed aggregation shape returned by `IndexStore::aggregate`, used by
//! the stats endpoint when the row store's native aggregate is insufficient
//! (e.g. facet cardinality exceeds what `B` indexes).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateBuckets {
    pub by_level: HashMap<String, u64>,
    pub by_source_type: HashMap<String, u64>,
    pub by_service: HashMap<String, u64>,
    pub by_host: HashMap<String, u64>,
    pub top_endpoints: Vec<(String, u64)>,
}
