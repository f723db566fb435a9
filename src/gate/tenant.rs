//! Tenant-context resolution and tenant-lifecycle enforcement.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::store::models::TenantStatus;
use crate::store::{AuditEvent, AuditSink, TenantStore};

use super::context::{RequestContext, TenantScope};
use super::error::Deny;
use super::{Decision, Guard};

/// Derives the effective tenant for the request. Platform administrators
/// may impersonate a tenant for the duration of one request via the
/// `X-Tenant-Id` header; the override is never persisted and only narrows
/// data scope. For everyone else the token's tenant claim is authoritative
/// and the header is ignored.
pub struct TenantResolver {
    audit: Arc<dyn AuditSink>,
}

impl TenantResolver {
    #[must_use]
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self { audit }
    }
}

#[async_trait]
impl Guard for TenantResolver {
    fn name(&self) -> &'static str {
        "tenant_resolver"
    }

    async fn evaluate(&self, ctx: &mut RequestContext) -> Decision {
        let Some(identity) = ctx.identity.as_ref() else {
            return Decision::Allow;
        };
        let scope = if identity.is_platform_admin() {
            match ctx
                .tenant_override
                .as_deref()
                .and_then(|raw| raw.trim().parse::<i64>().ok())
            {
                Some(tenant_id) => {
                    self.audit.record(AuditEvent::ImpersonationUsed {
                        admin_id: identity.user_id,
                        tenant_id,
                    });
                    TenantScope::Tenant(tenant_id)
                }
                None => TenantScope::AllTenants,
            }
        } else {
            TenantScope::Tenant(identity.tenant_id)
        };
        ctx.scope = Some(scope);
        Decision::Allow
    }
}

/// Enforces the tenant account state. Platform administrators bypass this
/// guard entirely; public routes never reach it with an identity.
pub struct TenantLifecycleGuard {
    tenants: Arc<dyn TenantStore>,
}

impl TenantLifecycleGuard {
    #[must_use]
    pub fn new(tenants: Arc<dyn TenantStore>) -> Self {
        Self { tenants }
    }
}

#[async_trait]
impl Guard for TenantLifecycleGuard {
    fn name(&self) -> &'static str {
        "tenant_lifecycle"
    }

    async fn evaluate(&self, ctx: &mut RequestContext) -> Decision {
        let Some(identity) = ctx.identity.as_ref() else {
            return Decision::Allow;
        };
        if identity.is_platform_admin() {
            return Decision::Allow;
        }
        match self.tenants.find_by_id(identity.tenant_id).await {
            Ok(Some(tenant)) => match tenant.status {
                TenantStatus::Suspended => Decision::Deny(Deny::TenantSuspended),
                TenantStatus::Expired => Decision::Deny(Deny::TenantExpired),
                TenantStatus::Trial
                    if tenant.trial_ends_at.is_some_and(|end| end <= ctx.now) =>
                {
                    Decision::Deny(Deny::TenantExpired)
                }
                TenantStatus::Trial | TenantStatus::Active => Decision::Allow,
            },
            Ok(None) => {
                warn!(
                    tenant_id = identity.tenant_id,
                    "no tenant row for authenticated user, allowing request"
                );
                Decision::Allow
            }
            Err(err) => {
                error!("tenant lifecycle check failed, allowing request: {err:#}");
                Decision::Allow
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::context::Identity;
    use crate::store::models::{Role, Tenant, PLATFORM_TENANT_ID};
    use crate::store::{MemoryStore, TracingAuditSink};
    use axum::http::Method;
    use chrono::{Duration, Utc};

    fn ctx(identity: Option<Identity>, tenant_override: Option<&str>) -> RequestContext {
        let mut ctx = RequestContext::new(
            Method::GET,
            "/api/expenses".to_string(),
            Some("token".to_string()),
            tenant_override.map(str::to_string),
        );
        ctx.identity = identity;
        ctx
    }

    fn admin() -> Identity {
        Identity {
            user_id: 1,
            email: "ops@fakturi.dev".to_string(),
            role: Role::PlatformAdmin,
            tenant_id: PLATFORM_TENANT_ID,
            session_epoch: Some(0),
        }
    }

    fn staff(tenant_id: i64) -> Identity {
        Identity {
            user_id: 2,
            email: "staff@example.com".to_string(),
            role: Role::Staff,
            tenant_id,
            session_epoch: Some(0),
        }
    }

    #[tokio::test]
    async fn admin_with_header_scopes_to_that_tenant() {
        let resolver = TenantResolver::new(Arc::new(TracingAuditSink));
        let mut ctx = ctx(Some(admin()), Some("42"));
        resolver.evaluate(&mut ctx).await;
        assert_eq!(ctx.scope, Some(TenantScope::Tenant(42)));
    }

    #[tokio::test]
    async fn admin_without_header_sees_all_tenants() {
        let resolver = TenantResolver::new(Arc::new(TracingAuditSink));
        let mut ctx = ctx(Some(admin()), None);
        resolver.evaluate(&mut ctx).await;
        assert_eq!(ctx.scope, Some(TenantScope::AllTenants));
    }

    #[tokio::test]
    async fn unparseable_header_falls_back_to_all_tenants() {
        let resolver = TenantResolver::new(Arc::new(TracingAuditSink));
        let mut ctx = ctx(Some(admin()), Some("not-a-number"));
        resolver.evaluate(&mut ctx).await;
        assert_eq!(ctx.scope, Some(TenantScope::AllTenants));
    }

    #[tokio::test]
    async fn header_is_ignored_for_non_admins() {
        let resolver = TenantResolver::new(Arc::new(TracingAuditSink));
        let mut ctx = ctx(Some(staff(7)), Some("42"));
        resolver.evaluate(&mut ctx).await;
        assert_eq!(ctx.scope, Some(TenantScope::Tenant(7)));
    }

    #[tokio::test]
    async fn suspended_tenant_is_denied() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tenant(Tenant {
            id: 7,
            status: TenantStatus::Suspended,
            trial_ends_at: None,
        });
        let guard = TenantLifecycleGuard::new(store);
        let mut ctx = ctx(Some(staff(7)), None);
        assert!(matches!(
            guard.evaluate(&mut ctx).await,
            Decision::Deny(Deny::TenantSuspended)
        ));
    }

    #[tokio::test]
    async fn lapsed_trial_is_denied() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tenant(Tenant {
            id: 7,
            status: TenantStatus::Trial,
            trial_ends_at: Some(Utc::now() - Duration::days(1)),
        });
        let guard = TenantLifecycleGuard::new(store);
        let mut ctx = ctx(Some(staff(7)), None);
        assert!(matches!(
            guard.evaluate(&mut ctx).await,
            Decision::Deny(Deny::TenantExpired)
        ));
    }

    #[tokio::test]
    async fn live_trial_and_active_pass() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tenant(Tenant {
            id: 7,
            status: TenantStatus::Trial,
            trial_ends_at: Some(Utc::now() + Duration::days(10)),
        });
        store.insert_tenant(Tenant {
            id: 8,
            status: TenantStatus::Active,
            trial_ends_at: None,
        });
        let guard = TenantLifecycleGuard::new(store);
        let mut trial_ctx = ctx(Some(staff(7)), None);
        assert!(matches!(
            guard.evaluate(&mut trial_ctx).await,
            Decision::Allow
        ));
        let mut active_ctx = ctx(Some(staff(8)), None);
        assert!(matches!(
            guard.evaluate(&mut active_ctx).await,
            Decision::Allow
        ));
    }

    #[tokio::test]
    async fn platform_admin_bypasses_lifecycle() {
        let store = Arc::new(MemoryStore::new());
        let guard = TenantLifecycleGuard::new(store);
        let mut ctx = ctx(Some(admin()), None);
        assert!(matches!(guard.evaluate(&mut ctx).await, Decision::Allow));
    }

    #[tokio::test]
    async fn store_error_fails_open() {
        let store = Arc::new(MemoryStore::new());
        store.insert_tenant(Tenant {
            id: 7,
            status: TenantStatus::Suspended,
            trial_ends_at: None,
        });
        store.set_fail_reads(true);
        let guard = TenantLifecycleGuard::new(store);
        let mut ctx = ctx(Some(staff(7)), None);
        assert!(matches!(guard.evaluate(&mut ctx).await, Decision::Allow));
    }
}
