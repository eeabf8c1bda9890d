//! `/ml` handler. A single GET endpoint branches on `?action=analyze|status`
//! because the two actions have different auth requirements on the same
//! path: `analyze` needs a valid access token, `status` is anonymous. Axum's
//! router-level auth middleware can't express "auth required for this query
//! param value but not that one" on a single route, so auth is checked
//! inline instead of via [`crate::middleware::AuthExtractor`].

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use logintel_core::{MlError, Prediction};
use logintel_ml::OnlineServing;
use logintel_storage::RowStore;

use crate::auth::{authenticate, AuthConfig};
use crate::error::{ApiError, ApiResult};
use crate::response::ApiSuccess;
use crate::state::AppState;

/// Long enough to treat "recent" predictions as "all of them" for a status
/// summary without risking the `Duration`/`chrono::Duration` conversion
/// overflow that a `u64::MAX`-scale window would invite.
const STATUS_ROLLUP_WINDOW: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 5);

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MlQuery {
    pub action: String,
    pub log_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnalyzeResponse {
    pub prediction: Option<Prediction>,
    pub source: &'static str,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusResponse {
    pub total_predictions: u64,
    pub anomaly_count: u64,
    pub last_prediction_at: Option<DateTime<Utc>>,
}

async fn analyze(
    store: &Arc<dyn RowStore>,
    serving: &Arc<OnlineServing>,
    headers: &HeaderMap,
    auth_config: &AuthConfig,
    log_id: Option<String>,
) -> ApiResult<AnalyzeResponse> {
    let auth_header = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    authenticate(auth_config, auth_header)?;

    let external_id = log_id.ok_or_else(|| ApiError::missing_field("log_id"))?;
    let entry = store
        .get_by_external_id(&external_id.clone().into())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("log {external_id} not found")))?;
    let internal_id = entry
        .internal_id
        .ok_or_else(|| ApiError::internal_error("stored log missing internal id"))?;

    match serving.get_prediction(internal_id).await {
        Ok(prediction) => Ok(AnalyzeResponse { prediction: Some(prediction), source: "ml_predictions_table" }),
        Err(MlError::PredictionPending(_)) => Ok(AnalyzeResponse { prediction: None, source: "mock_data_fallback" }),
        Err(e) => Err(e.into()),
    }
}

async fn status(serving: &Arc<OnlineServing>) -> ApiResult<StatusResponse> {
    let rollup = serving.analytics_rollup(STATUS_ROLLUP_WINDOW).await?;
    let latest = serving.list_recent(STATUS_ROLLUP_WINDOW, 1).await?;
    Ok(StatusResponse {
        total_predictions: rollup.total,
        anomaly_count: rollup.anomaly_count,
        last_prediction_at: latest.first().map(|p| p.predicted_at),
    })
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/ml",
    tag = "Ml",
    responses(
        (status = 200, description = "`?action=analyze&log_id=...` (auth required) or `?action=status` (anonymous)"),
    ),
))]
pub async fn ml_handler(
    State(store): State<Arc<dyn RowStore>>,
    State(serving): State<Arc<OnlineServing>>,
    State(auth_config): State<Arc<AuthConfig>>,
    headers: HeaderMap,
    Query(query): Query<MlQuery>,
) -> ApiResult<axum::response::Response> {
    use axum::response::IntoResponse;

    match query.action.as_str() {
        "analyze" => Ok(ApiSuccess::new(analyze(&store, &serving, &headers, &auth_config, query.log_id).await?)
            .into_response()),
        "status" => Ok(ApiSuccess::new(status(&serving).await?).into_response()),
        other => Err(ApiError::validation_failed(format!("unknown action: {other}"))),
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(ml_handler))
}
