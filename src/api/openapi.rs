//! OpenAPI document and route registration metadata.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        crate::api::handlers::health::health,
        crate::api::handlers::login::token,
        crate::api::handlers::maintenance::status,
        crate::api::handlers::expenses::list_expenses,
        crate::api::handlers::subscription::current,
        crate::api::handlers::subscription::renew,
        crate::api::handlers::superadmin::maintenance_status,
        crate::api::handlers::superadmin::set_maintenance,
        crate::api::handlers::superadmin::force_logout,
        crate::api::handlers::superadmin::suspend_tenant,
        crate::api::handlers::superadmin::reinstate_tenant,
    ),
    components(schemas(
        crate::api::handlers::login::TokenRequest,
        crate::api::handlers::login::TokenResponse,
        crate::api::handlers::subscription::SubscriptionResponse,
        crate::store::models::MaintenanceFlag,
        crate::store::models::Role,
        crate::store::models::SubscriptionStatus,
        crate::store::models::BillingCycle,
    )),
    tags(
        (name = "auth", description = "Credential exchange"),
        (name = "billing", description = "Tenant-scoped billing routes"),
        (name = "maintenance", description = "Maintenance status"),
        (name = "superadmin", description = "Platform administration"),
        (name = "health", description = "Probes")
    )
)]
pub struct ApiDoc;
