//! The request-gating pipeline.
//!
//! Flow Overview: every inbound request runs, in order, through
//! maintenance gate → token authenticator → session-epoch guard → tenant
//! resolver → tenant-lifecycle guard → subscription-lifecycle guard. The
//! orchestrator short-circuits on the first deny; on allow it injects the
//! typed identity and resolved tenant scope as request extensions. The
//! login lockout guard sits outside this chain, in front of the credential
//! exchange only.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use chrono::Duration;
use secrecy::SecretString;
use tracing::debug;

use crate::store::{
    AuditSink, AtomicCounter, ConfigStore, CounterStore, LockoutStore, SubscriptionStore,
    TenantStore, UserStore,
};

pub mod context;
pub mod error;
pub mod lockout;
pub mod maintenance;
pub mod session;
pub mod subscription;
pub mod tenant;
pub mod token;

pub use context::{Identity, RequestContext, TenantScope};
pub use error::{Deny, SubscriptionBlock};
pub use lockout::LoginLockoutGuard;
pub use maintenance::MaintenanceGate;
pub use session::SessionEpochGuard;
pub use subscription::{compute_status, SubscriptionLifecycleGuard};
pub use tenant::{TenantLifecycleGuard, TenantResolver};
pub use token::{TokenAuthenticator, TokenError};

/// Outcome of a guard. Guards never throw; store failures are resolved to a
/// decision inside the guard, per its fail-open/fail-closed posture.
#[derive(Debug)]
pub enum Decision {
    Allow,
    Deny(Deny),
}

#[async_trait]
pub trait Guard: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&self, ctx: &mut RequestContext) -> Decision;
}

/// The ordered guard list, first deny wins. Ordering is data, not
/// registration-order wiring.
pub struct RequestPipeline {
    guards: Vec<Arc<dyn Guard>>,
    activity: Arc<dyn CounterStore>,
}

impl RequestPipeline {
    #[must_use]
    pub fn new(guards: Vec<Arc<dyn Guard>>, activity: Arc<dyn CounterStore>) -> Self {
        Self { guards, activity }
    }

    pub async fn evaluate(&self, ctx: &mut RequestContext) -> Decision {
        self.activity.increment();
        for guard in &self.guards {
            if let Decision::Deny(deny) = guard.evaluate(ctx).await {
                debug!(
                    guard = guard.name(),
                    code = deny.code(),
                    path = %ctx.path,
                    "request denied"
                );
                return Decision::Deny(deny);
            }
        }
        Decision::Allow
    }
}

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 8 * 60 * 60;
const DEFAULT_REMEMBER_ME_TTL_SECONDS: i64 = 14 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct GateConfig {
    issuer: String,
    audience: String,
    token_ttl_seconds: i64,
    remember_me_ttl_seconds: i64,
}

impl GateConfig {
    #[must_use]
    pub fn new(issuer: String, audience: String) -> Self {
        Self {
            issuer,
            audience,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            remember_me_ttl_seconds: DEFAULT_REMEMBER_ME_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_remember_me_ttl_seconds(mut self, seconds: i64) -> Self {
        self.remember_me_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Token lifetime for a login, long when remember-me is set. Both are
    /// still subject to session-epoch revocation.
    #[must_use]
    pub fn token_ttl(&self, remember_me: bool) -> Duration {
        if remember_me {
            Duration::seconds(self.remember_me_ttl_seconds)
        } else {
            Duration::seconds(self.token_ttl_seconds)
        }
    }
}

/// Store bundle injected into the pipeline.
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub tenants: Arc<dyn TenantStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub lockouts: Arc<dyn LockoutStore>,
    pub config: Arc<dyn ConfigStore>,
    pub audit: Arc<dyn AuditSink>,
}

/// Everything the handlers and the gate middleware share.
pub struct GateState {
    config: GateConfig,
    authenticator: Arc<TokenAuthenticator>,
    pipeline: RequestPipeline,
    lockout: LoginLockoutGuard,
    users: Arc<dyn UserStore>,
    tenants: Arc<dyn TenantStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    config_store: Arc<dyn ConfigStore>,
    audit: Arc<dyn AuditSink>,
    activity: Arc<AtomicCounter>,
}

impl GateState {
    #[must_use]
    pub fn new(config: GateConfig, token_secret: &SecretString, stores: Stores) -> Self {
        let authenticator = Arc::new(TokenAuthenticator::new(
            token_secret,
            config.issuer().to_string(),
            config.audience().to_string(),
        ));
        let activity = Arc::new(AtomicCounter::new());
        let guards: Vec<Arc<dyn Guard>> = vec![
            Arc::new(MaintenanceGate::new(
                stores.config.clone(),
                authenticator.clone(),
            )),
            authenticator.clone(),
            Arc::new(SessionEpochGuard::new(stores.users.clone())),
            Arc::new(TenantResolver::new(stores.audit.clone())),
            Arc::new(TenantLifecycleGuard::new(stores.tenants.clone())),
            Arc::new(SubscriptionLifecycleGuard::new(stores.subscriptions.clone())),
        ];
        let pipeline = RequestPipeline::new(guards, activity.clone());
        let lockout = LoginLockoutGuard::new(stores.lockouts, stores.audit.clone());
        Self {
            config,
            authenticator,
            pipeline,
            lockout,
            users: stores.users,
            tenants: stores.tenants,
            subscriptions: stores.subscriptions,
            config_store: stores.config,
            audit: stores.audit,
            activity,
        }
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    #[must_use]
    pub fn authenticator(&self) -> &TokenAuthenticator {
        &self.authenticator
    }

    #[must_use]
    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn lockout(&self) -> &LoginLockoutGuard {
        &self.lockout
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    #[must_use]
    pub fn tenants(&self) -> &dyn TenantStore {
        self.tenants.as_ref()
    }

    #[must_use]
    pub fn subscriptions(&self) -> &dyn SubscriptionStore {
        self.subscriptions.as_ref()
    }

    #[must_use]
    pub fn config_store(&self) -> &dyn ConfigStore {
        self.config_store.as_ref()
    }

    #[must_use]
    pub fn audit(&self) -> &dyn AuditSink {
        self.audit.as_ref()
    }

    #[must_use]
    pub fn activity(&self) -> &AtomicCounter {
        self.activity.as_ref()
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::to_string)
}

/// Axum middleware wrapping the whole pipeline. This is the only point
/// where business routes meet the gating logic.
pub async fn gate(
    Extension(state): Extension<Arc<GateState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let tenant_override = request
        .headers()
        .get("x-tenant-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let mut ctx = RequestContext::new(
        request.method().clone(),
        request.uri().path().to_string(),
        bearer_token(&request),
        tenant_override,
    );
    match state.pipeline().evaluate(&mut ctx).await {
        Decision::Deny(deny) => deny.into_response(),
        Decision::Allow => {
            if let Some(identity) = ctx.identity {
                request.extensions_mut().insert(identity);
            }
            if let Some(scope) = ctx.scope {
                request.extensions_mut().insert(scope);
            }
            next.run(request).await
        }
    }
}
