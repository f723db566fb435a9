//! Postgres-backed stores.
//!
//! Plain queries with `db.query` spans; reference DDL lives in
//! `db/schema.sql`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::models::{
    LockoutRecord, MaintenanceFlag, Subscription, Tenant, TenantStatus, User,
};
use super::{ConfigStore, LockoutStore, SubscriptionStore, TenantStore, UserStore};

const MAINTENANCE_KEY: &str = "maintenance";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_span(operation: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation
    )
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        password_hash: row.get("password_hash"),
        role: role.parse()?,
        tenant_id: row.get("tenant_id"),
        session_epoch: row.get("session_epoch"),
        branch_ids: row.get("branch_ids"),
        last_login: row.get("last_login"),
    })
}

fn tenant_from_row(row: &PgRow) -> Result<Tenant> {
    let status: String = row.get("status");
    Ok(Tenant {
        id: row.get("id"),
        status: status.parse()?,
        trial_ends_at: row.get("trial_ends_at"),
    })
}

fn subscription_from_row(row: &PgRow) -> Result<Subscription> {
    let status: String = row.get("status");
    let billing_cycle: String = row.get("billing_cycle");
    Ok(Subscription {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        plan: row.get("plan"),
        status: status.parse()?,
        billing_cycle: billing_cycle.parse()?,
        trial_ends_at: row.get("trial_ends_at"),
        expires_at: row.get("expires_at"),
        next_billing_at: row.get("next_billing_at"),
        created_at: row.get("created_at"),
    })
}

const USER_COLUMNS: &str =
    "id, email, display_name, password_hash, role, tenant_id, session_epoch, branch_ids, last_login";

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await
            .context("failed to fetch user by id")?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await
            .context("failed to fetch user by email")?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let query = "UPDATE users SET last_login = $2 WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .context("failed to record last login")?;
        Ok(())
    }

    async fn bump_session_epoch(&self, id: i64) -> Result<Option<i64>> {
        let query =
            "UPDATE users SET session_epoch = session_epoch + 1 WHERE id = $1 RETURNING session_epoch";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .context("failed to bump session epoch")?;
        Ok(row.map(|row| row.get("session_epoch")))
    }
}

#[async_trait]
impl TenantStore for PgStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Tenant>> {
        let query = "SELECT id, status, trial_ends_at FROM tenants WHERE id = $1";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await
            .context("failed to fetch tenant")?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn set_status(&self, id: i64, status: TenantStatus) -> Result<bool> {
        let query = "UPDATE tenants SET status = $2 WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .context("failed to update tenant status")?;
        Ok(result.rows_affected() > 0)
    }
}

const SUBSCRIPTION_COLUMNS: &str = "id, tenant_id, plan, status, billing_cycle, trial_ends_at, expires_at, next_billing_at, created_at";

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn current_for_tenant(&self, tenant_id: i64) -> Result<Option<Subscription>> {
        let query = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE tenant_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await
            .context("failed to fetch current subscription")?;
        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn update_status(
        &self,
        id: i64,
        status: super::models::SubscriptionStatus,
    ) -> Result<()> {
        let query = "UPDATE subscriptions SET status = $2 WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .context("failed to persist subscription status")?;
        Ok(())
    }

    async fn renew(&self, id: i64, next_billing_at: DateTime<Utc>) -> Result<()> {
        let query = "UPDATE subscriptions \
                     SET status = 'active', next_billing_at = $2, expires_at = NULL \
                     WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .bind(next_billing_at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE"))
            .await
            .context("failed to renew subscription")?;
        Ok(())
    }
}

#[async_trait]
impl LockoutStore for PgStore {
    async fn find(&self, email: &str) -> Result<Option<LockoutRecord>> {
        let query = "SELECT email, failed_attempts, last_attempt_at, locked_until \
                     FROM login_lockouts WHERE email = $1";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await
            .context("failed to fetch lockout record")?;
        Ok(row.map(|row| LockoutRecord {
            email: row.get("email"),
            failed_attempts: row.get("failed_attempts"),
            last_attempt_at: row.get("last_attempt_at"),
            locked_until: row.get("locked_until"),
        }))
    }

    async fn upsert(&self, record: &LockoutRecord) -> Result<()> {
        // Last writer wins; racing increments may drop one attempt, which
        // only delays lockout by a single try.
        let query = "INSERT INTO login_lockouts (email, failed_attempts, last_attempt_at, locked_until) \
                     VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (email) DO UPDATE \
                     SET failed_attempts = EXCLUDED.failed_attempts, \
                         last_attempt_at = EXCLUDED.last_attempt_at, \
                         locked_until = EXCLUDED.locked_until";
        sqlx::query(query)
            .bind(&record.email)
            .bind(record.failed_attempts)
            .bind(record.last_attempt_at)
            .bind(record.locked_until)
            .execute(&self.pool)
            .instrument(query_span("INSERT"))
            .await
            .context("failed to upsert lockout record")?;
        Ok(())
    }

    async fn delete(&self, email: &str) -> Result<()> {
        let query = "DELETE FROM login_lockouts WHERE email = $1";
        sqlx::query(query)
            .bind(email)
            .execute(&self.pool)
            .instrument(query_span("DELETE"))
            .await
            .context("failed to delete lockout record")?;
        Ok(())
    }

    async fn prune_stale(
        &self,
        last_attempt_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let query = "DELETE FROM login_lockouts \
                     WHERE last_attempt_at < $1 \
                       AND (locked_until IS NULL OR locked_until <= $2)";
        let result = sqlx::query(query)
            .bind(last_attempt_before)
            .bind(now)
            .execute(&self.pool)
            .instrument(query_span("DELETE"))
            .await
            .context("failed to prune stale lockout records")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ConfigStore for PgStore {
    async fn maintenance(&self) -> Result<MaintenanceFlag> {
        let query = "SELECT value FROM app_config WHERE key = $1";
        let row = sqlx::query(query)
            .bind(MAINTENANCE_KEY)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await
            .context("failed to read maintenance flag")?;
        match row {
            Some(row) => {
                let value: serde_json::Value = row.get("value");
                serde_json::from_value(value).context("malformed maintenance flag")
            }
            None => Ok(MaintenanceFlag::default()),
        }
    }

    async fn set_maintenance(&self, flag: &MaintenanceFlag) -> Result<()> {
        let value = serde_json::to_value(flag).context("failed to encode maintenance flag")?;
        let query = "INSERT INTO app_config (key, value) VALUES ($1, $2) \
                     ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value";
        sqlx::query(query)
            .bind(MAINTENANCE_KEY)
            .bind(value)
            .execute(&self.pool)
            .instrument(query_span("INSERT"))
            .await
            .context("failed to write maintenance flag")?;
        Ok(())
    }
}
