//! In-memory store used by tests and local development.
//!
//! One struct implements every store trait so a single `Arc<MemoryStore>`
//! can back a whole pipeline. `set_fail_reads(true)` makes every read
//! return an error, to exercise the guards' fail-open postures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::models::{
    LockoutRecord, MaintenanceFlag, Subscription, SubscriptionStatus, Tenant, TenantStatus, User,
};
use super::{ConfigStore, LockoutStore, SubscriptionStore, TenantStore, UserStore};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<i64, User>>,
    tenants: RwLock<HashMap<i64, Tenant>>,
    subscriptions: RwLock<Vec<Subscription>>,
    lockouts: RwLock<HashMap<String, LockoutRecord>>,
    maintenance: RwLock<MaintenanceFlag>,
    next_subscription_id: AtomicI64,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_subscription_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    /// Make every read return an error until switched back off.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated store failure"));
        }
        Ok(())
    }

    pub fn insert_user(&self, user: User) {
        self.users.write().insert(user.id, user);
    }

    pub fn insert_tenant(&self, tenant: Tenant) {
        self.tenants.write().insert(tenant.id, tenant);
    }

    /// Insert and return the assigned subscription id.
    pub fn insert_subscription(&self, mut subscription: Subscription) -> i64 {
        let id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        subscription.id = id;
        self.subscriptions.write().push(subscription);
        id
    }

    pub fn subscription(&self, id: i64) -> Option<Subscription> {
        self.subscriptions
            .read()
            .iter()
            .find(|sub| sub.id == id)
            .cloned()
    }

    pub fn lockout(&self, email: &str) -> Option<LockoutRecord> {
        self.lockouts.read().get(email).cloned()
    }

    /// Test hook: rewrite a lockout record in place (e.g. to age it out).
    pub fn set_lockout(&self, record: LockoutRecord) {
        self.lockouts.write().insert(record.email.clone(), record);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        self.check_reads()?;
        Ok(self.users.read().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.check_reads()?;
        Ok(self
            .users
            .read()
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        if let Some(user) = self.users.write().get_mut(&id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn bump_session_epoch(&self, id: i64) -> Result<Option<i64>> {
        Ok(self.users.write().get_mut(&id).map(|user| {
            user.session_epoch += 1;
            user.session_epoch
        }))
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Tenant>> {
        self.check_reads()?;
        Ok(self.tenants.read().get(&id).cloned())
    }

    async fn set_status(&self, id: i64, status: TenantStatus) -> Result<bool> {
        Ok(self
            .tenants
            .write()
            .get_mut(&id)
            .map(|tenant| tenant.status = status)
            .is_some())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn current_for_tenant(&self, tenant_id: i64) -> Result<Option<Subscription>> {
        self.check_reads()?;
        Ok(self
            .subscriptions
            .read()
            .iter()
            .filter(|sub| sub.tenant_id == tenant_id)
            .max_by_key(|sub| (sub.created_at, sub.id))
            .cloned())
    }

    async fn update_status(&self, id: i64, status: SubscriptionStatus) -> Result<()> {
        self.check_reads()?;
        if let Some(sub) = self
            .subscriptions
            .write()
            .iter_mut()
            .find(|sub| sub.id == id)
        {
            sub.status = status;
        }
        Ok(())
    }

    async fn renew(&self, id: i64, next_billing_at: DateTime<Utc>) -> Result<()> {
        if let Some(sub) = self
            .subscriptions
            .write()
            .iter_mut()
            .find(|sub| sub.id == id)
        {
            sub.status = SubscriptionStatus::Active;
            sub.next_billing_at = Some(next_billing_at);
            sub.expires_at = None;
        }
        Ok(())
    }
}

#[async_trait]
impl LockoutStore for MemoryStore {
    async fn find(&self, email: &str) -> Result<Option<LockoutRecord>> {
        self.check_reads()?;
        Ok(self.lockouts.read().get(email).cloned())
    }

    async fn upsert(&self, record: &LockoutRecord) -> Result<()> {
        self.lockouts
            .write()
            .insert(record.email.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, email: &str) -> Result<()> {
        self.lockouts.write().remove(email);
        Ok(())
    }

    async fn prune_stale(
        &self,
        last_attempt_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let mut lockouts = self.lockouts.write();
        let before = lockouts.len();
        lockouts.retain(|_, record| {
            record.last_attempt_at >= last_attempt_before
                || record.locked_until.is_some_and(|until| until > now)
        });
        Ok((before - lockouts.len()) as u64)
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn maintenance(&self) -> Result<MaintenanceFlag> {
        self.check_reads()?;
        Ok(self.maintenance.read().clone())
    }

    async fn set_maintenance(&self, flag: &MaintenanceFlag) -> Result<()> {
        *self.maintenance.write() = flag.clone();
        Ok(())
    }
}
