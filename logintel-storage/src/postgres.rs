//! Production `RowStore` implementation over `deadpool-postgres`.
//!
//! Issues parameterized SQL directly against a conventional `log_entries` /
//! `ml_predictions` / `users` schema — no custom extension, no stored
//! procedures. One transaction per `insert_logs` batch, with a savepoint per
//! entry so one bad row never aborts the rest of the batch.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use serde_json::Value as JsonValue;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use logintel_core::{
    AggregateStats, AnomalyFacet, CorrelationKey, ExternalId, HttpFacet, Level, LogEntry,
    LogInternalId, Pagination, Prediction, SapFacet, SearchFilter, Severity, SortOrder,
    SourceType, StorageError, User, UserId,
};

use crate::config::DbConfig;
use crate::store::{InsertOutcome, RejectionKind, RowStore};

const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS log_entries (
    internal_id BIGSERIAL PRIMARY KEY,
    external_id TEXT NOT NULL UNIQUE,
    "timestamp" TIMESTAMPTZ NOT NULL,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    source_type TEXT NOT NULL,
    raw_log TEXT NOT NULL,
    host TEXT,
    service TEXT,
    category TEXT,
    tags TEXT[] NOT NULL DEFAULT '{}',
    structured_data JSONB NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ,
    request_id TEXT,
    session_id TEXT,
    correlation_id TEXT,
    ip_address TEXT,
    http_facet JSONB,
    sap_facet JSONB,
    is_anomaly BOOLEAN NOT NULL DEFAULT false,
    anomaly_type TEXT,
    performance_metrics JSONB NOT NULL DEFAULT '{}',
    error_details JSONB NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS log_entries_timestamp_idx ON log_entries ("timestamp");
CREATE INDEX IF NOT EXISTS log_entries_level_idx ON log_entries (level);
CREATE INDEX IF NOT EXISTS log_entries_source_type_idx ON log_entries (source_type);
CREATE INDEX IF NOT EXISTS log_entries_request_id_idx ON log_entries (request_id);
CREATE INDEX IF NOT EXISTS log_entries_session_id_idx ON log_entries (session_id);
CREATE INDEX IF NOT EXISTS log_entries_correlation_id_idx ON log_entries (correlation_id);
CREATE INDEX IF NOT EXISTS log_entries_ip_address_idx ON log_entries (ip_address);
CREATE INDEX IF NOT EXISTS log_entries_message_fts_idx ON log_entries USING gin (to_tsvector('english', message));

CREATE TABLE IF NOT EXISTS ml_predictions (
    log_internal_id BIGINT PRIMARY KEY REFERENCES log_entries (internal_id),
    predicted_level TEXT NOT NULL,
    level_confidence DOUBLE PRECISION NOT NULL,
    is_anomaly BOOLEAN NOT NULL,
    anomaly_score DOUBLE PRECISION NOT NULL,
    anomaly_confidence DOUBLE PRECISION NOT NULL,
    severity TEXT NOT NULL,
    model_version TEXT NOT NULL,
    predicted_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS ml_predictions_predicted_at_idx ON ml_predictions (predicted_at);

CREATE TABLE IF NOT EXISTS users (
    user_id UUID PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    permissions TEXT[] NOT NULL DEFAULT '{}',
    is_active BOOLEAN NOT NULL DEFAULT true,
    is_verified BOOLEAN NOT NULL DEFAULT false,
    last_login TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS analyzer_runs (
    id SMALLINT PRIMARY KEY DEFAULT 1,
    running BOOLEAN NOT NULL DEFAULT false,
    started_at TIMESTAMPTZ,
    finished_at TIMESTAMPTZ,
    CHECK (id = 1)
);
INSERT INTO analyzer_runs (id, running) VALUES (1, false) ON CONFLICT (id) DO NOTHING;
"#;

#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> Result<Self, StorageError> {
        Ok(Self::new(config.create_pool()?))
    }

    async fn conn(&self) -> Result<deadpool_postgres::Object, StorageError> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::Transient(format!("pool exhausted: {e}")))
    }

    fn row_to_log(row: &Row) -> LogEntry {
        let tags: Vec<String> = row.get("tags");
        let structured_data: JsonValue = row.get("structured_data");
        let http_facet: Option<JsonValue> = row.get("http_facet");
        let sap_facet: Option<JsonValue> = row.get("sap_facet");
        let performance_metrics: JsonValue = row.get("performance_metrics");
        let error_details: JsonValue = row.get("error_details");
        let level_str: String = row.get("level");
        let source_type_str: String = row.get("source_type");

        LogEntry {
            internal_id: Some(LogInternalId::new(row.get("internal_id"))),
            external_id: ExternalId::new(row.get::<_, String>("external_id")),
            timestamp: row.get("timestamp"),
            level: level_str.parse().unwrap_or(Level::Info),
            message: row.get("message"),
            source_type: source_type_str.parse().unwrap_or(SourceType::Custom),
            raw_log: row.get("raw_log"),
            host: row.get("host"),
            service: row.get("service"),
            category: row.get("category"),
            tags: tags.into_iter().collect(),
            structured_data: serde_json::from_value(structured_data).unwrap_or_default(),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            request_id: row.get("request_id"),
            session_id: row.get("session_id"),
            correlation_id: row.get("correlation_id"),
            ip_address: row.get("ip_address"),
            http: http_facet.and_then(|v| serde_json::from_value(v).ok()),
            sap: sap_facet.and_then(|v| serde_json::from_value(v).ok()),
            anomaly: AnomalyFacet {
                is_anomaly: row.get("is_anomaly"),
                anomaly_type: row.get("anomaly_type"),
                performance_metrics: serde_json::from_value(performance_metrics).unwrap_or_default(),
                error_details: serde_json::from_value(error_details).unwrap_or_default(),
            },
        }
    }

    fn row_to_prediction(row: &Row) -> Prediction {
        let predicted_level: String = row.get("predicted_level");
        let severity: String = row.get("severity");
        Prediction {
            log_internal_id: LogInternalId::new(row.get("log_internal_id")),
            predicted_level: predicted_level.parse().unwrap_or(Level::Info),
            level_confidence: row.get("level_confidence"),
            is_anomaly: row.get("is_anomaly"),
            anomaly_score: row.get("anomaly_score"),
            anomaly_confidence: row.get("anomaly_confidence"),
            severity: match severity.as_str() {
                "critical" => Severity::Critical,
                "high" => Severity::High,
                "medium" => Severity::Medium,
                _ => Severity::Low,
            },
            model_version: row.get("model_version"),
            predicted_at: row.get("predicted_at"),
        }
    }

    fn row_to_user(row: &Row) -> User {
        let role: String = row.get("role");
        let permissions: Vec<String> = row.get("permissions");
        User {
            user_id: UserId(row.get("user_id")),
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            role: match role.as_str() {
                "admin" => logintel_core::Role::Admin,
                "analyst" => logintel_core::Role::Analyst,
                "user" => logintel_core::Role::User,
                _ => logintel_core::Role::Viewer,
            },
            permissions: permissions.into_iter().collect(),
            is_active: row.get("is_active"),
            is_verified: row.get("is_verified"),
            last_login: row.get("last_login"),
        }
    }
}

#[async_trait]
impl RowStore for PostgresStore {
    async fn ensure_schema(&self) -> Result<(), StorageError> {
        let client = self.conn().await?;
        client
            .batch_execute(SCHEMA_DDL)
            .await
            .map_err(|e| StorageError::TransactionFailed(format!("schema creation failed: {e}")))
    }

    async fn insert_logs(&self, batch: Vec<LogEntry>) -> Result<Vec<InsertOutcome>, StorageError> {
        let mut client = self.conn().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;

        let mut outcomes = Vec::with_capacity(batch.len());
        for (idx, entry) in batch.into_iter().enumerate() {
            let savepoint_name = format!("sp_{idx}");
            tx.batch_execute(&format!("SAVEPOINT {savepoint_name}"))
                .await
                .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;

            let external_id = entry.external_id.clone();
            let result = tx
                .query_one(
                    r#"INSERT INTO log_entries
                        (external_id, "timestamp", level, message, source_type, raw_log, host,
                         service, category, tags, structured_data, request_id, session_id,
                         correlation_id, ip_address, http_facet, sap_facet, is_anomaly,
                         anomaly_type, performance_metrics, error_details)
                       VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21)
                       RETURNING internal_id"#,
                    &[
                        &external_id.as_str(),
                        &entry.timestamp,
                        &entry.level.to_string(),
                        &entry.message,
                        &entry.source_type.to_string(),
                        &entry.raw_log,
                        &entry.host,
                        &entry.service,
                        &entry.category,
                        &entry.tags.iter().cloned().collect::<Vec<_>>(),
                        &serde_json::to_value(&entry.structured_data).unwrap_or_default(),
                        &entry.request_id,
                        &entry.session_id,
                        &entry.correlation_id,
                        &entry.ip_address,
                        &entry.http.as_ref().and_then(|h| serde_json::to_value(h).ok()),
                        &entry.sap.as_ref().and_then(|s| serde_json::to_value(s).ok()),
                        &entry.anomaly.is_anomaly,
                        &entry.anomaly.anomaly_type,
                        &serde_json::to_value(&entry.anomaly.performance_metrics).unwrap_or_default(),
                        &serde_json::to_value(&entry.anomaly.error_details).unwrap_or_default(),
                    ] as &[&(dyn ToSql + Sync)],
                )
                .await;

            match result {
                Ok(row) => {
                    tx.batch_execute(&format!("RELEASE SAVEPOINT {savepoint_name}"))
                        .await
                        .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;
                    outcomes.push(InsertOutcome::Stored {
                        external_id,
                        internal_id: LogInternalId::new(row.get("internal_id")),
                    });
                }
                Err(e) => {
                    tx.batch_execute(&format!("ROLLBACK TO SAVEPOINT {savepoint_name}"))
                        .await
                        .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;
                    let is_unique_violation = e
                        .code()
                        .map(|c| c == &tokio_postgres::error::SqlState::UNIQUE_VIOLATION)
                        .unwrap_or(false);
                    if is_unique_violation {
                        outcomes.push(InsertOutcome::Rejected {
                            external_id,
                            kind: RejectionKind::DuplicateExternalId,
                            detail: "external_id already stored".to_string(),
                        });
                    } else {
                        outcomes.push(InsertOutcome::Rejected {
                            external_id,
                            kind: RejectionKind::StorageError,
                            detail: e.to_string(),
                        });
                    }
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;
        Ok(outcomes)
    }

    async fn get_by_external_id(&self, id: &ExternalId) -> Result<Option<LogEntry>, StorageError> {
        let client = self.conn().await?;
        let row = client
            .query_opt(
                "SELECT * FROM log_entries WHERE external_id = $1",
                &[&id.as_str()],
            )
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(row.as_ref().map(Self::row_to_log))
    }

    async fn search_logs(
        &self,
        filter: &SearchFilter,
        pagination: Pagination,
        sort: SortOrder,
    ) -> Result<(Vec<LogEntry>, u64), StorageError> {
        let client = self.conn().await?;
        let (start, end) = filter.effective_range(Utc::now());
        let pagination = pagination.clamp();

        let mut clauses: Vec<String> = vec!["\"timestamp\" BETWEEN $1 AND $2".to_string()];
        let mut params: Vec<Box<dyn ToSql + Sync>> = vec![Box::new(start), Box::new(end)];

        macro_rules! push_eq {
            ($field:expr, $value:expr) => {
                if let Some(v) = $value {
                    params.push(Box::new(v));
                    clauses.push(format!("{} = ${}", $field, params.len()));
                }
            };
        }

        push_eq!("source_type", filter.source_type.map(|s| s.to_string()));
        push_eq!("level", filter.level.map(|l| l.to_string()));
        push_eq!("host", filter.host.clone());
        push_eq!("service", filter.service.clone());
        push_eq!("is_anomaly", filter.is_anomaly);
        push_eq!("request_id", filter.request_id.clone());
        push_eq!("session_id", filter.session_id.clone());
        push_eq!("correlation_id", filter.correlation_id.clone());
        push_eq!("ip_address", filter.ip_address.clone());

        if filter.has_text_query() {
            params.push(Box::new(filter.text_query.clone().unwrap_or_default()));
            clauses.push(format!(
                "to_tsvector('english', message) @@ plainto_tsquery('english', ${})",
                params.len()
            ));
        }

        let order_by = match sort {
            SortOrder::TimestampAsc => "\"timestamp\" ASC",
            _ => "\"timestamp\" DESC",
        };

        let where_clause = clauses.join(" AND ");
        let limit_idx = params.len() + 1;
        let offset_idx = params.len() + 2;
        let sql = format!(
            "SELECT *, count(*) OVER() AS total_count FROM log_entries WHERE {where_clause} ORDER BY {order_by} LIMIT ${limit_idx} OFFSET ${offset_idx}"
        );
        params.push(Box::new(pagination.limit as i64));
        params.push(Box::new(pagination.offset as i64));

        let param_refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
        let rows = client
            .query(&sql, &param_refs)
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;

        let total = rows
            .first()
            .map(|r| r.get::<_, i64>("total_count") as u64)
            .unwrap_or(0);
        let entries = rows.iter().map(Self::row_to_log).collect();
        Ok((entries, total))
    }

    async fn correlated_lookup(
        &self,
        key: CorrelationKey,
        value: &str,
        limit: u32,
    ) -> Result<Vec<LogEntry>, StorageError> {
        let client = self.conn().await?;
        let column = key.to_string();
        let sql = format!(
            "SELECT * FROM log_entries WHERE {column} = $1 ORDER BY \"timestamp\" ASC LIMIT $2"
        );
        let rows = client
            .query(&sql, &[&value, &(limit as i64)])
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(rows.iter().map(Self::row_to_log).collect())
    }

    async fn stats_over_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AggregateStats, StorageError> {
        let client = self.conn().await?;
        let total_row = client
            .query_one(
                "SELECT count(*) AS c FROM log_entries WHERE \"timestamp\" BETWEEN $1 AND $2",
                &[&start, &end],
            )
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        let total: i64 = total_row.get("c");

        let level_rows = client
            .query(
                "SELECT level, count(*) AS c FROM log_entries WHERE \"timestamp\" BETWEEN $1 AND $2 GROUP BY level",
                &[&start, &end],
            )
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        let logs_by_level = level_rows
            .iter()
            .map(|r| (r.get::<_, String>("level"), r.get::<_, i64>("c") as u64))
            .collect();

        let source_rows = client
            .query(
                "SELECT source_type, count(*) AS c FROM log_entries WHERE \"timestamp\" BETWEEN $1 AND $2 GROUP BY source_type",
                &[&start, &end],
            )
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        let logs_by_source = source_rows
            .iter()
            .map(|r| (r.get::<_, String>("source_type"), r.get::<_, i64>("c") as u64))
            .collect();

        let anomaly_row = client
            .query_one(
                "SELECT count(*) AS c FROM log_entries WHERE \"timestamp\" BETWEEN $1 AND $2 AND is_anomaly",
                &[&start, &end],
            )
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        let anomaly_count: i64 = anomaly_row.get("c");

        let error_row = client
            .query_one(
                "SELECT count(*) AS c FROM log_entries WHERE \"timestamp\" BETWEEN $1 AND $2 AND level IN ('ERROR','FATAL')",
                &[&start, &end],
            )
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        let error_count: i64 = error_row.get("c");

        let avg_row = client
            .query_one(
                "SELECT avg((http_facet->>'response_time_ms')::double precision) AS avg_rt FROM log_entries WHERE \"timestamp\" BETWEEN $1 AND $2 AND http_facet ? 'response_time_ms'",
                &[&start, &end],
            )
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        let avg_response_time_ms: Option<f64> = avg_row.get("avg_rt");

        Ok(AggregateStats::from_counts(
            total as u64,
            logs_by_level,
            logs_by_source,
            anomaly_count as u64,
            error_count as u64,
            avg_response_time_ms,
        ))
    }

    async fn upsert_prediction(&self, prediction: Prediction) -> Result<(), StorageError> {
        let client = self.conn().await?;
        client
            .execute(
                r#"INSERT INTO ml_predictions
                    (log_internal_id, predicted_level, level_confidence, is_anomaly, anomaly_score,
                     anomaly_confidence, severity, model_version, predicted_at)
                   VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
                   ON CONFLICT (log_internal_id) DO UPDATE SET
                     predicted_level = EXCLUDED.predicted_level,
                     level_confidence = EXCLUDED.level_confidence,
                     is_anomaly = EXCLUDED.is_anomaly,
                     anomaly_score = EXCLUDED.anomaly_score,
                     anomaly_confidence = EXCLUDED.anomaly_confidence,
                     severity = EXCLUDED.severity,
                     model_version = EXCLUDED.model_version,
                     predicted_at = EXCLUDED.predicted_at"#,
                &[
                    &prediction.log_internal_id.get(),
                    &prediction.predicted_level.to_string(),
                    &prediction.level_confidence,
                    &prediction.is_anomaly,
                    &prediction.anomaly_score,
                    &prediction.anomaly_confidence,
                    &prediction.severity.to_string(),
                    &prediction.model_version,
                    &prediction.predicted_at,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&tokio_postgres::error::SqlState::FOREIGN_KEY_VIOLATION) {
                    StorageError::UnknownLogInternalId(prediction.log_internal_id)
                } else {
                    StorageError::Transient(e.to_string())
                }
            })?;
        Ok(())
    }

    async fn get_prediction(&self, log_internal_id: LogInternalId) -> Result<Option<Prediction>, StorageError> {
        let client = self.conn().await?;
        let row = client
            .query_opt(
                "SELECT * FROM ml_predictions WHERE log_internal_id = $1",
                &[&log_internal_id.get()],
            )
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(row.as_ref().map(Self::row_to_prediction))
    }

    async fn list_recent_predictions(&self, window: Duration, limit: u32) -> Result<Vec<Prediction>, StorageError> {
        let client = self.conn().await?;
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or_default();
        let rows = client
            .query(
                "SELECT * FROM ml_predictions WHERE predicted_at >= $1 ORDER BY predicted_at DESC LIMIT $2",
                &[&cutoff, &(limit as i64)],
            )
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(rows.iter().map(Self::row_to_prediction).collect())
    }

    async fn fetch_unpredicted(&self, window: Duration, limit: u32) -> Result<Vec<LogEntry>, StorageError> {
        let client = self.conn().await?;
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or_default();
        let rows = client
            .query(
                r#"SELECT l.* FROM log_entries l
                   LEFT JOIN ml_predictions p ON p.log_internal_id = l.internal_id
                   WHERE l."timestamp" >= $1 AND p.log_internal_id IS NULL
                   ORDER BY l."timestamp" DESC
                   LIMIT $2"#,
                &[&cutoff, &(limit as i64)],
            )
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(rows.iter().map(Self::row_to_log).collect())
    }

    async fn try_acquire_analyzer_run(&self) -> Result<bool, StorageError> {
        let client = self.conn().await?;
        let row = client
            .query_one(
                "UPDATE analyzer_runs SET running = true, started_at = now() WHERE id = 1 AND running = false RETURNING id",
                &[],
            )
            .await;
        match row {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    async fn release_analyzer_run(&self) -> Result<(), StorageError> {
        let client = self.conn().await?;
        client
            .execute(
                "UPDATE analyzer_runs SET running = false, finished_at = now() WHERE id = 1",
                &[],
            )
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn last_analyzer_run(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let client = self.conn().await?;
        let row = client
            .query_one("SELECT finished_at FROM analyzer_runs WHERE id = 1", &[])
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(row.get("finished_at"))
    }

    async fn create_user(&self, user: User) -> Result<(), StorageError> {
        let client = self.conn().await?;
        client
            .execute(
                r#"INSERT INTO users (user_id, username, email, password_hash, role, permissions, is_active, is_verified, last_login)
                   VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)"#,
                &[
                    &user.user_id.as_uuid(),
                    &user.username,
                    &user.email,
                    &user.password_hash,
                    &format!("{:?}", user.role).to_lowercase(),
                    &user.permissions.iter().cloned().collect::<Vec<_>>(),
                    &user.is_active,
                    &user.is_verified,
                    &user.last_login,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION) {
                    StorageError::ValidationFailed(format!("username or email already exists: {e}"))
                } else {
                    StorageError::Transient(e.to_string())
                }
            })?;
        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let client = self.conn().await?;
        let row = client
            .query_opt("SELECT * FROM users WHERE username = $1", &[&username])
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(row.as_ref().map(Self::row_to_user))
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let client = self.conn().await?;
        let row = client
            .query_opt("SELECT * FROM users WHERE user_id = $1", &[&id.as_uuid()])
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(row.as_ref().map(Self::row_to_user))
    }

    async fn update_user(&self, user: User) -> Result<(), StorageError> {
        let client = self.conn().await?;
        let updated = client
            .execute(
                r#"UPDATE users SET email = $2, password_hash = $3, role = $4, permissions = $5,
                     is_active = $6, is_verified = $7, last_login = $8
                   WHERE user_id = $1"#,
                &[
                    &user.user_id.as_uuid(),
                    &user.email,
                    &user.password_hash,
                    &format!("{:?}", user.role).to_lowercase(),
                    &user.permissions.iter().cloned().collect::<Vec<_>>(),
                    &user.is_active,
                    &user.is_verified,
                    &user.last_login,
                ],
            )
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        if updated == 0 {
            return Err(StorageError::NotFound(ExternalId::new(user.user_id.to_string())));
        }
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StorageError> {
        let client = self.conn().await?;
        client
            .execute("DELETE FROM users WHERE user_id = $1", &[&id.as_uuid()])
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let client = self.conn().await?;
        let rows = client
            .query("SELECT * FROM users ORDER BY username", &[])
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(rows.iter().map(Self::row_to_user).collect())
    }
}
