//! Connection pool configuration, following the teacher's `from_env()`
//! convention: sensible dev defaults, environment override, no panics on
//! missing values.

use std::time::Duration;

use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use logintel_core::StorageError;

/// PostgreSQL connection pool configuration for the row store.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_size: usize,
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "logintel".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Environment variables:
    /// - `LOGINTEL_DB_HOST` (default `localhost`)
    /// - `LOGINTEL_DB_PORT` (default `5432`)
    /// - `LOGINTEL_DB_NAME` (default `logintel`)
    /// - `LOGINTEL_DB_USER` (default `postgres`)
    /// - `LOGINTEL_DB_PASSWORD` (default empty)
    /// - `LOGINTEL_DB_POOL_SIZE` (default `16`)
    /// - `LOGINTEL_DB_TIMEOUT_SECS` (default `30`)
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("LOGINTEL_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("LOGINTEL_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("LOGINTEL_DB_NAME").unwrap_or_else(|_| "logintel".to_string()),
            user: std::env::var("LOGINTEL_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("LOGINTEL_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("LOGINTEL_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("LOGINTEL_DB_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    pub fn create_pool(&self) -> Result<Pool, StorageError> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::Transient(format!("failed to create pool: {e}")))
    }
}
