//! Platform-administration surface. Paths under `/api/superadmin` are
//! exempt from the maintenance gate; the PlatformAdmin role is enforced
//! here.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::gate::{GateState, Identity};
use crate::store::models::{MaintenanceFlag, Role, TenantStatus};
use crate::store::AuditEvent;

fn require_platform_admin(identity: &Identity) -> Result<(), Response> {
    if identity.role == Role::PlatformAdmin {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "platform administrator role required",
                "code": "forbidden",
            })),
        )
            .into_response())
    }
}

fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": format!("{what} not found"),
            "code": "not_found",
        })),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/api/superadmin/maintenance",
    responses(
        (status = 200, description = "Maintenance flag", body = MaintenanceFlag),
        (status = 403, description = "Platform administrator role required")
    ),
    security(("bearer" = [])),
    tag = "superadmin"
)]
pub async fn maintenance_status(
    Extension(state): Extension<Arc<GateState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    if let Err(response) = require_platform_admin(&identity) {
        return response;
    }
    match state.config_store().maintenance().await {
        Ok(flag) => (StatusCode::OK, Json(flag)).into_response(),
        Err(err) => {
            error!("failed to read maintenance flag: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/superadmin/maintenance",
    request_body = MaintenanceFlag,
    responses(
        (status = 200, description = "Maintenance flag updated", body = MaintenanceFlag),
        (status = 403, description = "Platform administrator role required")
    ),
    security(("bearer" = [])),
    tag = "superadmin"
)]
pub async fn set_maintenance(
    Extension(state): Extension<Arc<GateState>>,
    Extension(identity): Extension<Identity>,
    Json(flag): Json<MaintenanceFlag>,
) -> Response {
    if let Err(response) = require_platform_admin(&identity) {
        return response;
    }
    if let Err(err) = state.config_store().set_maintenance(&flag).await {
        error!("failed to write maintenance flag: {err:#}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    state.audit().record(AuditEvent::MaintenanceToggled {
        enabled: flag.enabled,
        by: identity.user_id,
    });
    (StatusCode::OK, Json(flag)).into_response()
}

/// Invalidate every outstanding token for the user; takes effect on their
/// very next request.
#[utoipa::path(
    post,
    path = "/api/superadmin/users/{id}/force-logout",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "Session epoch bumped"),
        (status = 403, description = "Platform administrator role required"),
        (status = 404, description = "Unknown user")
    ),
    security(("bearer" = [])),
    tag = "superadmin"
)]
pub async fn force_logout(
    Extension(state): Extension<Arc<GateState>>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<i64>,
) -> Response {
    if let Err(response) = require_platform_admin(&identity) {
        return response;
    }
    match state.users().bump_session_epoch(user_id).await {
        Ok(Some(_epoch)) => {
            state.audit().record(AuditEvent::ForcedLogout {
                user_id,
                by: identity.user_id,
            });
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(None) => not_found("user"),
        Err(err) => {
            error!(user_id, "failed to bump session epoch: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/superadmin/tenants/{id}/suspend",
    params(("id" = i64, Path, description = "Tenant id")),
    responses(
        (status = 204, description = "Tenant suspended"),
        (status = 403, description = "Platform administrator role required"),
        (status = 404, description = "Unknown tenant")
    ),
    security(("bearer" = [])),
    tag = "superadmin"
)]
pub async fn suspend_tenant(
    Extension(state): Extension<Arc<GateState>>,
    Extension(identity): Extension<Identity>,
    Path(tenant_id): Path<i64>,
) -> Response {
    if let Err(response) = require_platform_admin(&identity) {
        return response;
    }
    match state
        .tenants()
        .set_status(tenant_id, TenantStatus::Suspended)
        .await
    {
        Ok(true) => {
            state.audit().record(AuditEvent::TenantSuspended {
                tenant_id,
                by: identity.user_id,
            });
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => not_found("tenant"),
        Err(err) => {
            error!(tenant_id, "failed to suspend tenant: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/superadmin/tenants/{id}/reinstate",
    params(("id" = i64, Path, description = "Tenant id")),
    responses(
        (status = 204, description = "Tenant reinstated"),
        (status = 403, description = "Platform administrator role required"),
        (status = 404, description = "Unknown tenant")
    ),
    security(("bearer" = [])),
    tag = "superadmin"
)]
pub async fn reinstate_tenant(
    Extension(state): Extension<Arc<GateState>>,
    Extension(identity): Extension<Identity>,
    Path(tenant_id): Path<i64>,
) -> Response {
    if let Err(response) = require_platform_admin(&identity) {
        return response;
    }
    match state
        .tenants()
        .set_status(tenant_id, TenantStatus::Active)
        .await
    {
        Ok(true) => {
            state.audit().record(AuditEvent::TenantReinstated {
                tenant_id,
                by: identity.user_id,
            });
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => not_found("tenant"),
        Err(err) => {
            error!(tenant_id, "failed to reinstate tenant: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
