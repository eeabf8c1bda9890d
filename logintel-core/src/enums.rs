//! Closed enumerations shared across the logintel data model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Log severity as reported by the producing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "FATAL" | "CRITICAL" => Ok(Level::Fatal),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Broad origin of a log entry, dictating which optional facet fields apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Splunk,
    Sap,
    Application,
    System,
    Custom,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceType::Splunk => "splunk",
            SourceType::Sap => "sap",
            SourceType::Application => "application",
            SourceType::System => "system",
            SourceType::Custom => "custom",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "splunk" => Ok(SourceType::Splunk),
            "sap" => Ok(SourceType::Sap),
            "application" => Ok(SourceType::Application),
            "system" => Ok(SourceType::System),
            "custom" => Ok(SourceType::Custom),
            other => Err(format!("unknown source type: {other}")),
        }
    }
}

/// SAP transaction message type, one letter code per the R/3 convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum SapMessageType {
    #[serde(rename = "S")]
    Success,
    #[serde(rename = "I")]
    Information,
    #[serde(rename = "W")]
    Warning,
    #[serde(rename = "E")]
    Error,
    #[serde(rename = "A")]
    Abort,
    #[serde(rename = "X")]
    Exit,
}

/// Business-impact label, distinct from `Level`. Produced only by the ML
/// prediction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Coarse identity role. Implies a default permission set (see
/// [`Role::default_permissions`]); explicit `User::permissions` override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    User,
    Analyst,
    Admin,
}

impl Role {
    pub fn default_permissions(self) -> Vec<&'static str> {
        match self {
            Role::Viewer => vec!["read_logs"],
            Role::User => vec!["read_logs", "ingest_logs"],
            Role::Analyst => vec!["read_logs", "ingest_logs", "read_predictions"],
            Role::Admin => vec![
                "read_logs",
                "ingest_logs",
                "read_predictions",
                "manage_users",
            ],
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Bearer-token kind. Access tokens are short-lived; refresh tokens longer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Rate-limit bucket class. Each variant maps to a row in the fixed-window
/// limits table (see [`crate::RateLimitTable`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    Login,
    Register,
    Search,
    Ingest,
    Admin,
    Anonymous,
    ApiKey,
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndpointClass::Login => "login",
            EndpointClass::Register => "register",
            EndpointClass::Search => "search",
            EndpointClass::Ingest => "ingest",
            EndpointClass::Admin => "admin",
            EndpointClass::Anonymous => "anonymous",
            EndpointClass::ApiKey => "api_key",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_roundtrips_case_insensitively() {
        for (raw, expected) in [("debug", Level::Debug), ("ERROR", Level::Error), ("warning", Level::Warn)] {
            let parsed: Level = raw.parse().unwrap();
            assert_eq!(parsed, expected);
        }
    }

    #[test]
    fn source_type_rejects_unknown() {
        let result: Result<SourceType, _> = "unknown".parse();
        assert!(result.is_err());
    }

    #[test]
    fn role_default_permissions_escalate_with_rank() {
        assert!(Role::Admin.default_permissions().contains(&"manage_users"));
        assert!(!Role::Viewer.default_permissions().contains(&"manage_users"));
    }
}
