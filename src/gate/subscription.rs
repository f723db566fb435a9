//! Subscription-lifecycle enforcement with lazy, read-triggered
//! transitions.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::store::models::{Subscription, SubscriptionStatus};
use crate::store::SubscriptionStore;

use super::context::{is_subscription_selfservice, RequestContext};
use super::error::{Deny, SubscriptionBlock};
use super::{Decision, Guard};

/// Pure transition function: the status the subscription should have at
/// `now`, and whether that differs from what is stored. There is no
/// background job; the guard computes this on every gated read.
#[must_use]
pub fn compute_status(
    subscription: &Subscription,
    now: DateTime<Utc>,
) -> (SubscriptionStatus, bool) {
    let mut status = subscription.status;
    if status == SubscriptionStatus::Trial
        && subscription.trial_ends_at.is_some_and(|end| end <= now)
    {
        status = SubscriptionStatus::Expired;
    }
    if subscription.expires_at.is_some_and(|end| end <= now) {
        status = SubscriptionStatus::Expired;
    }
    (status, status != subscription.status)
}

fn block_for(status: SubscriptionStatus) -> Option<SubscriptionBlock> {
    match status {
        SubscriptionStatus::Expired => Some(SubscriptionBlock::Expired),
        SubscriptionStatus::PastDue => Some(SubscriptionBlock::PastDue),
        SubscriptionStatus::Cancelled => Some(SubscriptionBlock::Cancelled),
        SubscriptionStatus::Suspended => Some(SubscriptionBlock::Suspended),
        SubscriptionStatus::Trial | SubscriptionStatus::Active => None,
    }
}

/// Finer-grained than the tenant guard and evaluated after it; the
/// subscription state is authoritative even when the tenant row still reads
/// Active. Subscription self-service endpoints always pass so a blocked
/// tenant can pay its way out.
pub struct SubscriptionLifecycleGuard {
    subscriptions: Arc<dyn SubscriptionStore>,
}

impl SubscriptionLifecycleGuard {
    #[must_use]
    pub fn new(subscriptions: Arc<dyn SubscriptionStore>) -> Self {
        Self { subscriptions }
    }

    /// Compute the effective status and persist it when it changed.
    /// Persistence failure never fails the read path; the freshly computed
    /// status still drives the current decision.
    pub async fn effective_status(
        &self,
        subscription: &Subscription,
        now: DateTime<Utc>,
    ) -> SubscriptionStatus {
        let (status, changed) = compute_status(subscription, now);
        if changed {
            if let Err(err) = self.subscriptions.update_status(subscription.id, status).await {
                warn!(
                    subscription_id = subscription.id,
                    "failed to persist lazy subscription transition: {err:#}"
                );
            }
        }
        status
    }
}

#[async_trait]
impl Guard for SubscriptionLifecycleGuard {
    fn name(&self) -> &'static str {
        "subscription_lifecycle"
    }

    async fn evaluate(&self, ctx: &mut RequestContext) -> Decision {
        let Some(identity) = ctx.identity.as_ref() else {
            return Decision::Allow;
        };
        if identity.is_platform_admin() {
            return Decision::Allow;
        }
        if is_subscription_selfservice(&ctx.path) {
            return Decision::Allow;
        }
        let subscription = match self
            .subscriptions
            .current_for_tenant(identity.tenant_id)
            .await
        {
            Ok(Some(subscription)) => subscription,
            Ok(None) => {
                // Unmetered legacy/manual-billing tenants carry no row and
                // are not locked out by this guard's absence of data.
                debug!(
                    tenant_id = identity.tenant_id,
                    "no subscription row, allowing request"
                );
                return Decision::Allow;
            }
            Err(err) => {
                error!("subscription check failed, allowing request: {err:#}");
                return Decision::Allow;
            }
        };
        let status = self.effective_status(&subscription, ctx.now).await;
        match block_for(status) {
            Some(block) => Decision::Deny(Deny::SubscriptionBlocked(block)),
            None => Decision::Allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::context::Identity;
    use crate::store::models::{BillingCycle, Role};
    use crate::store::MemoryStore;
    use axum::http::Method;
    use chrono::Duration;

    fn subscription(status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: 0,
            tenant_id: 7,
            plan: "standard".to_string(),
            status,
            billing_cycle: BillingCycle::Monthly,
            trial_ends_at: None,
            expires_at: None,
            next_billing_at: None,
            created_at: Utc::now(),
        }
    }

    fn ctx(path: &str) -> RequestContext {
        let mut ctx = RequestContext::new(
            Method::GET,
            path.to_string(),
            Some("token".to_string()),
            None,
        );
        ctx.identity = Some(Identity {
            user_id: 2,
            email: "staff@example.com".to_string(),
            role: Role::Staff,
            tenant_id: 7,
            session_epoch: Some(0),
        });
        ctx
    }

    #[test]
    fn trial_past_end_expires() {
        let mut sub = subscription(SubscriptionStatus::Trial);
        sub.trial_ends_at = Some(Utc::now() - Duration::hours(1));
        let (status, changed) = compute_status(&sub, Utc::now());
        assert_eq!(status, SubscriptionStatus::Expired);
        assert!(changed);
    }

    #[test]
    fn live_trial_is_unchanged() {
        let mut sub = subscription(SubscriptionStatus::Trial);
        sub.trial_ends_at = Some(Utc::now() + Duration::days(3));
        let (status, changed) = compute_status(&sub, Utc::now());
        assert_eq!(status, SubscriptionStatus::Trial);
        assert!(!changed);
    }

    #[test]
    fn hard_expiry_overrides_any_status() {
        for initial in [
            SubscriptionStatus::Trial,
            SubscriptionStatus::Active,
            SubscriptionStatus::PastDue,
        ] {
            let mut sub = subscription(initial);
            sub.expires_at = Some(Utc::now() - Duration::minutes(1));
            let (status, changed) = compute_status(&sub, Utc::now());
            assert_eq!(status, SubscriptionStatus::Expired);
            assert!(changed);
        }
    }

    #[test]
    fn already_expired_does_not_rewrite() {
        let mut sub = subscription(SubscriptionStatus::Expired);
        sub.expires_at = Some(Utc::now() - Duration::days(1));
        let (status, changed) = compute_status(&sub, Utc::now());
        assert_eq!(status, SubscriptionStatus::Expired);
        assert!(!changed);
    }

    #[tokio::test]
    async fn lazy_transition_is_persisted_before_the_decision() {
        let store = Arc::new(MemoryStore::new());
        let mut sub = subscription(SubscriptionStatus::Trial);
        sub.trial_ends_at = Some(Utc::now() - Duration::hours(1));
        let id = store.insert_subscription(sub);
        let guard = SubscriptionLifecycleGuard::new(store.clone());
        let mut ctx = ctx("/api/expenses");
        assert!(matches!(
            guard.evaluate(&mut ctx).await,
            Decision::Deny(Deny::SubscriptionBlocked(SubscriptionBlock::Expired))
        ));
        let stored = store.subscription(id).expect("subscription");
        assert_eq!(stored.status, SubscriptionStatus::Expired);
    }

    #[tokio::test]
    async fn past_due_blocks() {
        let store = Arc::new(MemoryStore::new());
        store.insert_subscription(subscription(SubscriptionStatus::PastDue));
        let guard = SubscriptionLifecycleGuard::new(store);
        let mut ctx = ctx("/api/expenses");
        assert!(matches!(
            guard.evaluate(&mut ctx).await,
            Decision::Deny(Deny::SubscriptionBlocked(SubscriptionBlock::PastDue))
        ));
    }

    #[tokio::test]
    async fn missing_row_fails_open() {
        let store = Arc::new(MemoryStore::new());
        let guard = SubscriptionLifecycleGuard::new(store);
        let mut ctx = ctx("/api/expenses");
        assert!(matches!(guard.evaluate(&mut ctx).await, Decision::Allow));
    }

    #[tokio::test]
    async fn selfservice_endpoints_bypass_blocking() {
        let store = Arc::new(MemoryStore::new());
        store.insert_subscription(subscription(SubscriptionStatus::Cancelled));
        let guard = SubscriptionLifecycleGuard::new(store);
        let mut ctx = ctx("/api/subscription/renew");
        assert!(matches!(guard.evaluate(&mut ctx).await, Decision::Allow));
    }

    #[tokio::test]
    async fn store_error_fails_open() {
        let store = Arc::new(MemoryStore::new());
        store.insert_subscription(subscription(SubscriptionStatus::Cancelled));
        store.set_fail_reads(true);
        let guard = SubscriptionLifecycleGuard::new(store);
        let mut ctx = ctx("/api/expenses");
        assert!(matches!(guard.evaluate(&mut ctx).await, Decision::Allow));
    }
}
