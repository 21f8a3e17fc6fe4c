use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::OpenApi;

use crate::auth::middleware::SESSION_HEADER;
use crate::handlers::{admin, auth, health, DataResponse};
use crate::models::{Meter, TokenHistory, UsageHistory, UserProfile};
use crate::services::{FleetSummary, MeterSnapshot, TokenBalanceEntry, TopUpReceipt};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Prepaid Meter Admin API",
        version = "0.1.0",
        description = "Token ledger, energy usage and session authentication for prepaid smart meters",
        license(name = "MIT")
    ),
    paths(
        health::health_check,
        health::prometheus_metrics,
        auth::login,
        auth::logout,
        auth::me,
        admin::monitoring,
        admin::tokens,
        admin::update_kwh,
        admin::get_meter,
        admin::top_up,
        admin::token_history,
        admin::usage_history,
        admin::record_usage,
    ),
    components(schemas(
        health::HealthStatus,
        auth::LoginRequest,
        auth::LoginResponse,
        admin::UpdateKwhRequest,
        admin::EnergyUpdateResponse,
        admin::TopUpRequest,
        admin::RecordUsageRequest,
        UserProfile,
        Meter,
        TokenHistory,
        UsageHistory,
        FleetSummary,
        MeterSnapshot,
        TokenBalanceEntry,
        TopUpReceipt,
        DataResponse<Vec<TokenBalanceEntry>>,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health and metrics"),
        (name = "auth", description = "Login, logout and current user"),
        (name = "admin", description = "Meter ledger and fleet monitoring (admin only)"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(SESSION_HEADER))),
            );
        }
    }
}
