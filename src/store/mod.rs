//! Store interfaces the gating pipeline depends on.
//!
//! Every store is an explicit injected interface so the pipeline can be
//! exercised against in-memory fakes and swapped for a distributed store
//! under multi-instance deployment. The Postgres implementations live in
//! [`postgres`], the in-memory ones in [`memory`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod audit;
pub mod counter;
pub mod memory;
pub mod models;
pub mod password;
pub mod postgres;

pub use audit::{AuditEvent, AuditSink, TracingAuditSink};
pub use counter::{AtomicCounter, CounterStore};
pub use memory::MemoryStore;
pub use models::{
    BillingCycle, LockoutRecord, MaintenanceFlag, Role, Subscription, SubscriptionStatus, Tenant,
    TenantStatus, User, PLATFORM_TENANT_ID,
};
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Lookup by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Force-logout: increment the session epoch, invalidating every token
    /// issued before the bump. Returns the new epoch, or None when the user
    /// does not exist.
    async fn bump_session_epoch(&self, id: i64) -> Result<Option<i64>>;
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Tenant>>;

    /// Returns false when the tenant does not exist.
    async fn set_status(&self, id: i64, status: TenantStatus) -> Result<bool>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// The most recently created subscription for the tenant, if any.
    async fn current_for_tenant(&self, tenant_id: i64) -> Result<Option<Subscription>>;

    /// Persist a lazily computed status transition.
    async fn update_status(&self, id: i64, status: SubscriptionStatus) -> Result<()>;

    /// Self-service renewal: mark Active, advance the billing timestamp and
    /// clear the hard expiry.
    async fn renew(&self, id: i64, next_billing_at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait LockoutStore: Send + Sync {
    async fn find(&self, email: &str) -> Result<Option<LockoutRecord>>;

    async fn upsert(&self, record: &LockoutRecord) -> Result<()>;

    async fn delete(&self, email: &str) -> Result<()>;

    /// Drop records whose last attempt predates `last_attempt_before` and
    /// that are not locked as of `now`. Returns the number removed.
    async fn prune_stale(
        &self,
        last_attempt_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn maintenance(&self) -> Result<MaintenanceFlag>;

    async fn set_maintenance(&self, flag: &MaintenanceFlag) -> Result<()>;
}
