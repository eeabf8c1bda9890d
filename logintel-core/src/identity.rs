//! Identity types for logintel entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Dense, monotonic key assigned by the row store on insert. Primary reference
/// for joins between `LogEntry` and `Prediction`. Never assigned by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct LogInternalId(pub i64);

impl LogInternalId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for LogInternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for LogInternalId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Opaque, caller-supplied (or ingestion-generated) identifier for a `LogEntry`.
/// Unique within the system; the stable handle for client-facing lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct ExternalId(pub String);

impl ExternalId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate an external id for a log entry that did not supply one:
    /// `{source_type}-{timestamp_micros}-{random_suffix}`. Collision
    /// probability is negligible; the row store's unique constraint is the
    /// authoritative guard.
    pub fn generate(source_type: &str, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        let micros = timestamp.timestamp_micros();
        let suffix: u32 = {
            use std::time::{SystemTime, UNIX_EPOCH};
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.subsec_nanos())
                .unwrap_or_default();
            let pid = std::process::id();
            nanos.wrapping_mul(2654435761).wrapping_add(pid)
        };
        Self(format!("{source_type}-{micros}-{suffix:08x}"))
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ExternalId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ExternalId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Type-safe wrapper around a user's UUID primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

pub type Timestamp = chrono::DateTime<chrono::Utc>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_id_generate_is_stable_shape() {
        let id = ExternalId::generate("application", chrono::Utc::now());
        assert!(id.as_str().starts_with("application-"));
    }

    #[test]
    fn user_id_roundtrips_through_string() {
        let id = UserId::new_v4();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn log_internal_id_display() {
        let id = LogInternalId::new(42);
        assert_eq!(id.to_string(), "42");
    }
}
