use axum::{
    extract::Extension,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::gate::TenantScope;

/// Thin business collaborator: expense persistence is out of scope here,
/// the route exists so the gate has real tenant-scoped traffic to protect.
/// The response echoes the resolved scope (null for the all-tenant
/// administrator view).
#[utoipa::path(
    get,
    path = "/api/expenses",
    responses(
        (status = 200, description = "Tenant-scoped expense listing"),
        (status = 401, description = "Authentication required"),
        (status = 402, description = "Subscription blocked"),
        (status = 403, description = "Tenant blocked"),
        (status = 503, description = "Maintenance mode")
    ),
    security(("bearer" = [])),
    tag = "billing"
)]
pub async fn list_expenses(Extension(scope): Extension<TenantScope>) -> impl IntoResponse {
    let tenant = match scope {
        TenantScope::AllTenants => serde_json::Value::Null,
        TenantScope::Tenant(id) => json!(id),
    };
    Json(json!({
        "tenant": tenant,
        "items": [],
    }))
}
