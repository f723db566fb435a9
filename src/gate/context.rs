//! Per-request context threaded through the guard chain.

use axum::http::Method;
use chrono::{DateTime, Utc};

use crate::store::models::{Role, PLATFORM_TENANT_ID};

/// Authenticated caller, produced exactly once by the token authenticator.
/// Downstream guards and handlers never re-parse raw claims.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    /// Tenant claim; `PLATFORM_TENANT_ID` (0) marks a platform
    /// administrator.
    pub tenant_id: i64,
    /// Absent on tokens issued before epoch tracking existed.
    pub session_epoch: Option<i64>,
}

impl Identity {
    #[must_use]
    pub fn is_platform_admin(&self) -> bool {
        self.tenant_id == PLATFORM_TENANT_ID
    }
}

/// Data scope the request operates under, resolved by the tenant resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TenantScope {
    /// Platform-administrator view across every tenant.
    AllTenants,
    Tenant(i64),
}

#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    /// Raw bearer token, when an Authorization header was present.
    pub bearer: Option<String>,
    /// Raw `X-Tenant-Id` header value, if any.
    pub tenant_override: Option<String>,
    pub now: DateTime<Utc>,
    pub identity: Option<Identity>,
    pub scope: Option<TenantScope>,
}

impl RequestContext {
    #[must_use]
    pub fn new(
        method: Method,
        path: String,
        bearer: Option<String>,
        tenant_override: Option<String>,
    ) -> Self {
        Self {
            method,
            path,
            bearer,
            tenant_override,
            now: Utc::now(),
            identity: None,
            scope: None,
        }
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        is_public(&self.path)
    }
}

/// Routes reachable with no token: credential exchange, probes, docs and
/// static assets. These also bypass the tenant and subscription guards.
#[must_use]
pub fn is_public(path: &str) -> bool {
    path == "/"
        || path == "/health"
        || path == "/api/auth/token"
        || path == "/api/maintenance"
        || path == "/docs"
        || path.starts_with("/docs/")
        || path.starts_with("/api-docs/")
        || path.starts_with("/assets/")
}

/// Platform-administration surface, exempt from the maintenance gate by
/// path (role checks happen in the handlers).
#[must_use]
pub fn is_superadmin(path: &str) -> bool {
    path == "/api/superadmin" || path.starts_with("/api/superadmin/")
}

/// Subscription self-service endpoints stay reachable while the
/// subscription guard is blocking, so a tenant can pay to unblock itself.
#[must_use]
pub fn is_subscription_selfservice(path: &str) -> bool {
    path == "/api/subscription" || path.starts_with("/api/subscription/")
}
