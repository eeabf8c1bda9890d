//! OpenAPI document for the logintel HTTP API, generated from route and
//! type annotations via `utoipa`.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::{auth, health, logs, ml, users};

use logintel_core::{
    AggregateStats, AnomalyFacet, ComponentStatus, HealthReport, HttpFacet, LogEntry, Prediction, Role, SapFacet,
    ServiceHealth, SourceType, UserView,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "logintel API",
        version = "0.1.0",
        description = "Log ingestion, search, correlation, and anomaly-prediction serving",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "https://api.logintel.example", description = "Production"),
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Auth", description = "Identity, sessions, and password management"),
        (name = "Users", description = "Self-service and admin user management"),
        (name = "Logs", description = "Ingestion, search, correlation, and aggregate statistics"),
        (name = "Ml", description = "Anomaly prediction serving"),
        (name = "Health", description = "Liveness and readiness"),
    ),
    paths(
        auth::login,
        auth::refresh,
        auth::me,
        auth::register,
        auth::logout,
        auth::change_password,
        auth::password_reset_request,
        auth::password_reset_confirm,

        users::get_self,
        users::update_self,
        users::delete_self,
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,

        logs::ingest,
        logs::search,
        logs::get_by_external_id,
        logs::correlation,
        logs::statistics,

        ml::ml_handler,

        health::health,
    ),
    components(
        schemas(
            ApiError, ErrorCode,

            auth::LoginRequest, auth::TokenPair, auth::LoginResponse, auth::MeResponse,
            auth::RefreshRequest, auth::RegisterRequest, auth::ChangePasswordRequest,
            auth::PasswordResetRequestBody, auth::PasswordResetRequestResponse,
            auth::PasswordResetConfirmBody,

            users::UserListResponse, users::UpdateUserRequest,

            logs::IngestRequest, logs::PerEntryError, logs::IngestResponse,
            logs::SearchResponse, logs::CorrelationResponse,

            ml::MlQuery, ml::AnalyzeResponse, ml::StatusResponse,

            LogEntry, HttpFacet, SapFacet, AnomalyFacet, Prediction, SourceType, Role, UserView,
            AggregateStats, HealthReport, ServiceHealth, ComponentStatus,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi as _;

    #[test]
    fn openapi_document_has_expected_shape() {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "logintel API");

        let tags = openapi.tags.as_ref().expect("tags present");
        assert!(tags.len() >= 5);

        let components = openapi.components.as_ref().expect("components present");
        assert!(components.security_schemes.contains_key("api_key"));
        assert!(components.security_schemes.contains_key("bearer_auth"));

        assert!(!openapi.paths.paths.is_empty());
        assert!(openapi.paths.paths.contains_key("/auth/login"));
        assert!(openapi.paths.paths.contains_key("/logs"));
        assert!(openapi.paths.paths.contains_key("/health"));
    }

    #[test]
    fn openapi_json_round_trips() {
        let json = ApiDoc::to_json().expect("serializes");
        serde_json::from_str::<serde_json::Value>(&json).expect("valid json");
        assert!(json.contains("logintel API"));
        assert!(json.contains("\"bearer_auth\""));
    }
}
