//! Global maintenance circuit breaker.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::store::ConfigStore;

use super::context::{is_public, is_superadmin, RequestContext};
use super::error::Deny;
use super::token::TokenAuthenticator;
use super::{Decision, Guard};

/// First guard in the chain. When the flag is set, everything is rejected
/// except credential exchange, probes, the platform-administration surface
/// and callers holding a valid platform-administrator token. Because this
/// runs before the token authenticator, the administrator exemption decodes
/// the bearer itself, and only when the flag is set and the path is not
/// already exempt.
pub struct MaintenanceGate {
    config: Arc<dyn ConfigStore>,
    authenticator: Arc<TokenAuthenticator>,
}

impl MaintenanceGate {
    #[must_use]
    pub fn new(config: Arc<dyn ConfigStore>, authenticator: Arc<TokenAuthenticator>) -> Self {
        Self {
            config,
            authenticator,
        }
    }
}

#[async_trait]
impl Guard for MaintenanceGate {
    fn name(&self) -> &'static str {
        "maintenance_gate"
    }

    async fn evaluate(&self, ctx: &mut RequestContext) -> Decision {
        let flag = match self.config.maintenance().await {
            Ok(flag) => flag,
            Err(err) => {
                // A transient config-store error must not take the platform
                // down.
                error!("maintenance flag read failed, failing open: {err:#}");
                return Decision::Allow;
            }
        };
        if !flag.enabled {
            return Decision::Allow;
        }
        if is_public(&ctx.path) || is_superadmin(&ctx.path) {
            return Decision::Allow;
        }
        if let Some(bearer) = ctx.bearer.as_deref() {
            if let Ok(identity) = self.authenticator.verify(bearer) {
                if identity.is_platform_admin() {
                    return Decision::Allow;
                }
            }
        }
        Decision::Deny(Deny::Maintenance {
            message: flag.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{MaintenanceFlag, Role, User};
    use crate::store::MemoryStore;
    use axum::http::Method;
    use chrono::Duration;
    use secrecy::SecretString;

    fn authenticator() -> Arc<TokenAuthenticator> {
        Arc::new(TokenAuthenticator::new(
            &SecretString::from("maintenance-test-secret-value".to_string()),
            "fakturi".to_string(),
            "fakturi-api".to_string(),
        ))
    }

    fn admin_user() -> User {
        User {
            id: 1,
            email: "ops@fakturi.dev".to_string(),
            display_name: "Ops".to_string(),
            password_hash: String::new(),
            role: Role::PlatformAdmin,
            tenant_id: None,
            session_epoch: 0,
            branch_ids: Vec::new(),
            last_login: None,
        }
    }

    fn ctx(path: &str, bearer: Option<String>) -> RequestContext {
        RequestContext::new(Method::GET, path.to_string(), bearer, None)
    }

    async fn gate_with_flag(enabled: bool) -> (MaintenanceGate, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .set_maintenance(&MaintenanceFlag {
                enabled,
                message: Some("back soon".to_string()),
            })
            .await
            .expect("set flag");
        (MaintenanceGate::new(store.clone(), authenticator()), store)
    }

    #[tokio::test]
    async fn disabled_flag_allows_everything() {
        let (gate, _store) = gate_with_flag(false).await;
        let mut ctx = ctx("/api/expenses", None);
        assert!(matches!(gate.evaluate(&mut ctx).await, Decision::Allow));
    }

    #[tokio::test]
    async fn enabled_flag_rejects_business_routes() {
        let (gate, _store) = gate_with_flag(true).await;
        let mut ctx = ctx("/api/expenses", None);
        match gate.evaluate(&mut ctx).await {
            Decision::Deny(Deny::Maintenance { message }) => {
                assert_eq!(message.as_deref(), Some("back soon"));
            }
            other => panic!("expected maintenance deny, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exempt_paths_pass() {
        let (gate, _store) = gate_with_flag(true).await;
        for path in [
            "/api/auth/token",
            "/health",
            "/api/maintenance",
            "/api/superadmin/maintenance",
        ] {
            let mut ctx = ctx(path, None);
            assert!(
                matches!(gate.evaluate(&mut ctx).await, Decision::Allow),
                "{path} should be exempt"
            );
        }
    }

    #[tokio::test]
    async fn platform_admin_token_passes() {
        let (gate, _store) = gate_with_flag(true).await;
        let (token, _) = authenticator()
            .issue(&admin_user(), Duration::hours(1))
            .expect("issue");
        let mut ctx = ctx("/api/expenses", Some(token));
        assert!(matches!(gate.evaluate(&mut ctx).await, Decision::Allow));
    }

    #[tokio::test]
    async fn config_store_error_fails_open() {
        let (gate, store) = gate_with_flag(true).await;
        store.set_fail_reads(true);
        let mut ctx = ctx("/api/expenses", None);
        assert!(matches!(gate.evaluate(&mut ctx).await, Decision::Allow));
    }
}
