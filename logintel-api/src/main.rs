//! logintel API server entry point.
//!
//! Bootstraps configuration, wires the storage/search/ml backends into
//! [`AppState`], and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use logintel_api::{
    init_tracer, shutdown_tracer, ApiConfig, ApiError, ApiResult, AppState, AuthConfig, TelemetryConfig,
};
use logintel_ml::OnlineServing;
use logintel_search::{ElasticsearchIndexStore, IndexStore, SearchConfig};
use logintel_storage::{DbConfig, InMemoryStore, PostgresStore, RowStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let auth_config = Arc::new(AuthConfig::from_env());
    let api_config = Arc::new(ApiConfig::from_env());
    if api_config.is_production() {
        api_config
            .validate_for_production()
            .map_err(|reason| ApiError::internal_error(format!("invalid production config: {reason}")))?;
    }

    let store: Arc<dyn RowStore> = build_row_store().await?;
    store.ensure_schema().await?;

    let search_config = SearchConfig::from_env();
    let index: Arc<dyn IndexStore> = Arc::new(
        ElasticsearchIndexStore::new(&search_config)
            .map_err(|e| ApiError::internal_error(format!("failed to build index store: {e}")))?,
    );
    index.ensure_index().await?;

    let serving = Arc::new(OnlineServing::new(store.clone()));

    let state = AppState {
        store,
        index,
        serving,
        auth_config,
        api_config,
        start_time: std::time::Instant::now(),
    };

    let app: Router = logintel_api::build_router(state);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "starting logintel API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("failed to bind {addr}: {e}")))?;

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>());
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("server error: {e}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    shutdown_tracer();
    Ok(())
}

/// `LOGINTEL_STORE_BACKEND=postgres` (the default) wires a real Postgres
/// pool; `memory` runs against the in-process store, for local development
/// and smoke-testing without a database.
async fn build_row_store() -> ApiResult<Arc<dyn RowStore>> {
    let backend = std::env::var("LOGINTEL_STORE_BACKEND").unwrap_or_else(|_| "postgres".to_string());
    match backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        "postgres" => {
            let db_config = DbConfig::from_env();
            let store = PostgresStore::from_config(&db_config)
                .map_err(|e| ApiError::internal_error(format!("failed to connect to postgres: {e}")))?;
            Ok(Arc::new(store))
        }
        other => Err(ApiError::internal_error(format!("unknown LOGINTEL_STORE_BACKEND: {other}"))),
    }
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("LOGINTEL_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("LOGINTEL_API_PORT").ok())
        .unwrap_or_else(|| "8080".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::validation_failed(format!("invalid port value: {port_str}")))?;

    let addr = format!("{host}:{port}");
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::validation_failed(format!("invalid bind address {addr}: {e}")))
}
