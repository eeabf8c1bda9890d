//! `/health` - anonymous liveness/readiness probe. Exercises the row store,
//! the index store, and the analyzer's locking primitive without mutating
//! anything a real caller would notice.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Router;

use logintel_core::{ComponentStatus, HealthReport, ServiceHealth};
use logintel_ml::OnlineServing;
use logintel_search::IndexStore;
use logintel_storage::RowStore;

use crate::response::ApiSuccess;
use crate::state::AppState;

async fn probe_row_store(store: &Arc<dyn RowStore>) -> ComponentStatus {
    match store.ensure_schema().await {
        Ok(()) => ComponentStatus::Up,
        Err(_) => ComponentStatus::Down,
    }
}

async fn probe_index_store(index: &Arc<dyn IndexStore>) -> ComponentStatus {
    match index.ensure_index().await {
        Ok(()) => ComponentStatus::Up,
        Err(_) => ComponentStatus::Degraded,
    }
}

/// The analyzer has no dedicated health endpoint of its own; whether it has
/// ever completed a run is treated as "up", a never-run analyzer as
/// "degraded" (not yet proven healthy, but not failing either).
async fn probe_analyzer(store: &Arc<dyn RowStore>) -> ComponentStatus {
    match store.last_analyzer_run().await {
        Ok(Some(_)) => ComponentStatus::Up,
        Ok(None) => ComponentStatus::Degraded,
        Err(_) => ComponentStatus::Down,
    }
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Liveness/readiness of the row store, index store, and analyzer")),
))]
pub async fn health(
    State(store): State<Arc<dyn RowStore>>,
    State(index): State<Arc<dyn IndexStore>>,
    State(_serving): State<Arc<OnlineServing>>,
) -> ApiSuccess<HealthReport> {
    let services = ServiceHealth {
        row_store: probe_row_store(&store).await,
        index_store: probe_index_store(&index).await,
        analyzer: probe_analyzer(&store).await,
    };
    ApiSuccess::new(HealthReport::overall(services))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}
