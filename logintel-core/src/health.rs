//! Health/readiness reporting shapes for the `/health` route and the
//! per-component admin status sub-report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ServiceHealth {
    pub row_store: ComponentStatus,
    pub index_store: ComponentStatus,
    pub analyzer: ComponentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthReport {
    pub status: ComponentStatus,
    pub services: ServiceHealth,
}

/// Per-component status detail, surfaced only to admin users via the
/// observability status sub-report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComponentStatusDetail {
    pub name: String,
    pub status: ComponentStatus,
    pub last_checked_at: DateTime<Utc>,
    pub detail: Option<String>,
}

impl HealthReport {
    /// Overall status is `Up` only when every sub-service is `Up`; `Down`
    /// when the row store (the source of truth) is `Down`; `Degraded`
    /// otherwise.
    pub fn overall(services: ServiceHealth) -> Self {
        let status = if services.row_store == ComponentStatus::Down {
            ComponentStatus::Down
        } else if services.row_store == ComponentStatus::Up
            && services.index_store == ComponentStatus::Up
            && services.analyzer == ComponentStatus::Up
        {
            ComponentStatus::Up
        } else {
            ComponentStatus::Degraded
        };
        Self { status, services }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_status_down_when_row_store_down() {
        let report = HealthReport::overall(ServiceHealth {
            row_store: ComponentStatus::Down,
            index_store: ComponentStatus::Up,
            analyzer: ComponentStatus::Up,
        });
        assert_eq!(report.status, ComponentStatus::Down);
    }

    #[test]
    fn overall_status_degraded_when_index_down() {
        let report = HealthReport::overall(ServiceHealth {
            row_store: ComponentStatus::Up,
            index_store: ComponentStatus::Down,
            analyzer: ComponentStatus::Up,
        });
        assert_eq!(report.status, ComponentStatus::Degraded);
    }
}
