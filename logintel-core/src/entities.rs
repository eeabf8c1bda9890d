//! Core entities: `LogEntry`, `Prediction`, `User`, `SessionToken`, `RateBucket`.
//!
//! Dynamic validation of heterogeneous payloads is modeled as a shared base
//! record plus variant-specific facet extensions, keyed by `source_type`,
//! rather than ad-hoc attribute access on a single bag of fields.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EndpointClass, ExternalId, Level, LogInternalId, Role, SapMessageType, SourceType, Severity, TokenKind, UserId};

/// HTTP-facet attributes, present when `source_type == application`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HttpFacet {
    pub http_method: Option<String>,
    pub http_status: Option<i32>,
    pub endpoint: Option<String>,
    pub response_time_ms: Option<f64>,
    pub application_type: Option<String>,
    pub framework: Option<String>,
}

/// SAP transaction-facet attributes, present when `source_type == sap`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SapFacet {
    pub transaction_code: Option<String>,
    pub sap_system: Option<String>,
    pub sap_client: Option<String>,
    pub sap_message_type: Option<SapMessageType>,
    /// Severity as reported by SAP itself, 1 (lowest) through 8 (highest).
    pub sap_severity: Option<i16>,
    /// Business fields whose shape varies per transaction type: `amount`,
    /// `customer_id`, `vendor_id`, `material_number`, etc.
    #[serde(default)]
    pub business_fields: HashMap<String, Value>,
}

/// Model-derived anomaly attributes. Populated by the batch analyzer; absent
/// on freshly-ingested entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnomalyFacet {
    pub is_anomaly: bool,
    pub anomaly_type: Option<String>,
    #[serde(default)]
    pub performance_metrics: HashMap<String, f64>,
    #[serde(default)]
    pub error_details: HashMap<String, Value>,
}

/// The canonical unit of ingest and search. Created exclusively by the
/// ingestion coordinator; never mutated after insert (append-only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LogEntry {
    /// Assigned by the row store on insert. `None` before the entry is stored.
    pub internal_id: Option<LogInternalId>,
    pub external_id: ExternalId,

    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub source_type: SourceType,
    pub raw_log: String,

    pub host: Option<String>,
    pub service: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: HashSet<String>,
    #[serde(default)]
    pub structured_data: HashMap<String, Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,

    pub request_id: Option<String>,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
    pub ip_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpFacet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sap: Option<SapFacet>,
    #[serde(default)]
    pub anomaly: AnomalyFacet,
}

impl LogEntry {
    /// Any of the four flat correlation-key attributes used to stitch logs
    /// together across source types.
    pub fn correlation_value(&self, key: CorrelationKey) -> Option<&str> {
        match key {
            CorrelationKey::RequestId => self.request_id.as_deref(),
            CorrelationKey::SessionId => self.session_id.as_deref(),
            CorrelationKey::CorrelationId => self.correlation_id.as_deref(),
            CorrelationKey::IpAddress => self.ip_address.as_deref(),
        }
    }
}

/// The four correlation keys defined in the data model, modeled as flat
/// attributes rather than a graph so joins stay expressible as indexed
/// lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationKey {
    RequestId,
    SessionId,
    CorrelationId,
    IpAddress,
}

impl std::str::FromStr for CorrelationKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request_id" => Ok(CorrelationKey::RequestId),
            "session_id" => Ok(CorrelationKey::SessionId),
            "correlation_id" => Ok(CorrelationKey::CorrelationId),
            "ip_address" => Ok(CorrelationKey::IpAddress),
            other => Err(format!("unknown correlation key: {other}")),
        }
    }
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CorrelationKey::RequestId => "request_id",
            CorrelationKey::SessionId => "session_id",
            CorrelationKey::CorrelationId => "correlation_id",
            CorrelationKey::IpAddress => "ip_address",
        };
        write!(f, "{s}")
    }
}

/// Result of running a trained model on one `LogEntry`. 1:1 with the log via
/// `log_internal_id`; overwritten by subsequent batch-analyzer runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Prediction {
    pub log_internal_id: LogInternalId,
    pub predicted_level: Level,
    pub level_confidence: f64,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
    pub anomaly_confidence: f64,
    pub severity: Severity,
    pub model_version: String,
    pub predicted_at: DateTime<Utc>,
}

/// Identity principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    /// Never serialized to clients; see [`crate::ApiError`] boundary for the
    /// client-facing `UserView` projection.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub permissions: HashSet<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Effective permission set: role defaults, overridden/extended by any
    /// explicit permissions on the user record.
    pub fn effective_permissions(&self) -> HashSet<String> {
        let mut perms: HashSet<String> = self
            .role
            .default_permissions()
            .into_iter()
            .map(str::to_string)
            .collect();
        perms.extend(self.permissions.iter().cloned());
        perms
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.effective_permissions().contains(permission)
    }
}

/// Client-facing projection of `User` that never carries `password_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserView {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub permissions: HashSet<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            permissions: user.effective_permissions(),
            is_active: user.is_active,
            is_verified: user.is_verified,
            last_login: user.last_login,
        }
    }
}

/// Short-lived bearer artifact. Access tokens expire in 30 minutes; refresh
/// tokens in a longer window, configured in days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionToken {
    pub user_id: UserId,
    pub role: Role,
    pub permissions: HashSet<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub token_kind: TokenKind,
}

impl SessionToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Per-principal counter keyed by `(principal_id, endpoint_class, window_start)`.
/// Process-wide state with best-effort durability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBucket {
    pub principal_id: String,
    pub endpoint_class: EndpointClass,
    pub window_start_secs: i64,
    pub count: u32,
    pub window_secs: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_log() -> LogEntry {
        LogEntry {
            internal_id: None,
            external_id: ExternalId::new("app-1"),
            timestamp: Utc::now(),
            level: Level::Error,
            message: "boom".into(),
            source_type: SourceType::Application,
            raw_log: "{}".into(),
            host: None,
            service: None,
            category: None,
            tags: HashSet::new(),
            structured_data: HashMap::new(),
            created_at: Some(Utc::now()),
            updated_at: None,
            request_id: Some("req-1".into()),
            session_id: None,
            correlation_id: None,
            ip_address: None,
            http: None,
            sap: None,
            anomaly: AnomalyFacet::default(),
        }
    }

    #[test]
    fn correlation_value_reads_the_right_field() {
        let log = sample_log();
        assert_eq!(
            log.correlation_value(CorrelationKey::RequestId),
            Some("req-1")
        );
        assert_eq!(log.correlation_value(CorrelationKey::SessionId), None);
    }

    #[test]
    fn correlation_key_parses_snake_case() {
        assert_eq!(
            CorrelationKey::from_str("correlation_id").unwrap(),
            CorrelationKey::CorrelationId
        );
        assert!(CorrelationKey::from_str("bogus").is_err());
    }

    #[test]
    fn user_effective_permissions_merge_role_and_explicit() {
        let user = User {
            user_id: UserId::new_v4(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            password_hash: "hash".into(),
            role: Role::Viewer,
            permissions: HashSet::from(["manage_users".to_string()]),
            is_active: true,
            is_verified: true,
            last_login: None,
        };
        assert!(user.has_permission("read_logs"));
        assert!(user.has_permission("manage_users"));
    }

    #[test]
    fn user_view_never_carries_password_hash() {
        let user = User {
            user_id: UserId::new_v4(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            password_hash: "secret".into(),
            role: Role::User,
            permissions: HashSet::new(),
            is_active: true,
            is_verified: true,
            last_login: None,
        };
        let view = UserView::from(&user);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn session_token_expiry() {
        let now = Utc::now();
        let token = SessionToken {
            user_id: UserId::new_v4(),
            role: Role::User,
            permissions: HashSet::new(),
            issued_at: now,
            expires_at: now + chrono::Duration::minutes(30),
            token_kind: TokenKind::Access,
        };
        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + chrono::Duration::minutes(31)));
    }
}
