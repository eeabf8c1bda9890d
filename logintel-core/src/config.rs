//! Shared configuration shapes. Component-specific `from_env()` constructors
//! live alongside each component (e.g. `logintel_storage::DbConfig`,
//! `logintel_api::AuthConfig`); this module holds the one table that's
//! genuinely cross-cutting: the fixed-window rate-limit quotas.

use std::time::Duration;

use crate::EndpointClass;

/// One row of the fixed-window rate-limit table: `limit` requests per
/// `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitQuota {
    pub limit: u32,
    pub window: Duration,
}

/// The literal per-endpoint-class limits table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitTable {
    pub login: RateLimitQuota,
    pub register: RateLimitQuota,
    pub search: RateLimitQuota,
    pub ingest: RateLimitQuota,
    pub admin: RateLimitQuota,
    pub anonymous: RateLimitQuota,
    pub api_key: RateLimitQuota,
}

impl Default for RateLimitTable {
    fn default() -> Self {
        Self {
            login: RateLimitQuota {
                limit: 5,
                window: Duration::from_secs(5 * 60),
            },
            register: RateLimitQuota {
                limit: 3,
                window: Duration::from_secs(60 * 60),
            },
            search: RateLimitQuota {
                limit: 100,
                window: Duration::from_secs(5 * 60),
            },
            ingest: RateLimitQuota {
                limit: 1000,
                window: Duration::from_secs(60 * 60),
            },
            admin: RateLimitQuota {
                limit: 200,
                window: Duration::from_secs(5 * 60),
            },
            anonymous: RateLimitQuota {
                limit: 100,
                window: Duration::from_secs(60 * 60),
            },
            api_key: RateLimitQuota {
                limit: 5000,
                window: Duration::from_secs(60 * 60),
            },
        }
    }
}

impl RateLimitTable {
    pub fn quota_for(&self, class: EndpointClass) -> RateLimitQuota {
        match class {
            EndpointClass::Login => self.login,
            EndpointClass::Register => self.register,
            EndpointClass::Search => self.search,
            EndpointClass::Ingest => self.ingest,
            EndpointClass::Admin => self.admin,
            EndpointClass::Anonymous => self.anonymous,
            EndpointClass::ApiKey => self.api_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_literal_spec_values() {
        let table = RateLimitTable::default();
        assert_eq!(table.quota_for(EndpointClass::Login).limit, 5);
        assert_eq!(table.quota_for(EndpointClass::Register).limit, 3);
        assert_eq!(table.quota_for(EndpointClass::Search).limit, 100);
        assert_eq!(table.quota_for(EndpointClass::Ingest).limit, 1000);
        assert_eq!(table.quota_for(EndpointClass::Admin).limit, 200);
        assert_eq!(table.quota_for(EndpointClass::Anonymous).limit, 100);
        assert_eq!(table.quota_for(EndpointClass::ApiKey).limit, 5000);
    }
}
