//! Domain records shared by the gating pipeline and the stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tenant id carried in platform-administrator tokens instead of a real
/// tenant reference.
pub const PLATFORM_TENANT_ID: i64 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Staff,
    PlatformAdmin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::PlatformAdmin => "platform_admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            "platform_admin" => Ok(Self::PlatformAdmin),
            other => Err(anyhow::anyhow!("unknown role: {other}")),
        }
    }
}

/// A user row as the gate sees it. Business profile fields live elsewhere.
#[derive(Clone, Debug)]
pub struct User {
    pub id: i64,
    /// Normalized (trimmed, lowercased) email, unique case-insensitively.
    pub email: String,
    pub display_name: String,
    /// Argon2 PHC-format hash.
    pub password_hash: String,
    pub role: Role,
    /// None for platform administrators.
    pub tenant_id: Option<i64>,
    /// Monotonic counter; bumping it invalidates all outstanding tokens.
    pub session_epoch: i64,
    /// Branch ids the user may act on, returned at login.
    pub branch_ids: Vec<i64>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Tenant id as embedded in token claims (sentinel 0 for platform
    /// administrators).
    #[must_use]
    pub fn claim_tenant_id(&self) -> i64 {
        self.tenant_id.unwrap_or(PLATFORM_TENANT_ID)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Trial,
    Active,
    Suspended,
    Expired,
}

impl TenantStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Expired => "expired",
        }
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "trial" => Ok(Self::Trial),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "expired" => Ok(Self::Expired),
            other => Err(anyhow::anyhow!("unknown tenant status: {other}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Tenant {
    pub id: i64,
    pub status: TenantStatus,
    /// Cleared once the tenant converts to a paid plan.
    pub trial_ends_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    PastDue,
    Suspended,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Suspended => "suspended",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Statuses that block business traffic. PastDue blocks the same as the
    /// terminal states.
    #[must_use]
    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            Self::PastDue | Self::Suspended | Self::Cancelled | Self::Expired
        )
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "trial" => Ok(Self::Trial),
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "suspended" => Ok(Self::Suspended),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(anyhow::anyhow!("unknown subscription status: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Next billing timestamp one cycle after `from`.
    #[must_use]
    pub fn next_billing_after(self, from: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            Self::Monthly => 1,
            Self::Yearly => 12,
        };
        from.checked_add_months(chrono::Months::new(months))
            .unwrap_or(from)
    }
}

impl std::str::FromStr for BillingCycle {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(anyhow::anyhow!("unknown billing cycle: {other}")),
        }
    }
}

/// The most recently created subscription per tenant is the current one.
#[derive(Clone, Debug)]
pub struct Subscription {
    pub id: i64,
    pub tenant_id: i64,
    pub plan: String,
    pub status: SubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub trial_ends_at: Option<DateTime<Utc>>,
    /// Hard expiry; past this point the subscription is Expired no matter
    /// what the stored status says.
    pub expires_at: Option<DateTime<Utc>>,
    pub next_billing_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Per-email brute-force counter, keyed by normalized email.
#[derive(Clone, Debug)]
pub struct LockoutRecord {
    pub email: String,
    pub failed_attempts: i32,
    pub last_attempt_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Global maintenance flag kept in the config store.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceFlag {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Owner, Role::Admin, Role::Staff, Role::PlatformAdmin] {
            let parsed: Role = role.as_str().parse().expect("parse role");
            assert_eq!(parsed, role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn claim_tenant_id_uses_platform_sentinel() {
        let user = User {
            id: 1,
            email: "ops@fakturi.dev".to_string(),
            display_name: "Ops".to_string(),
            password_hash: String::new(),
            role: Role::PlatformAdmin,
            tenant_id: None,
            session_epoch: 0,
            branch_ids: Vec::new(),
            last_login: None,
        };
        assert_eq!(user.claim_tenant_id(), PLATFORM_TENANT_ID);
    }

    #[test]
    fn blocking_statuses_include_past_due() {
        assert!(SubscriptionStatus::PastDue.is_blocking());
        assert!(SubscriptionStatus::Expired.is_blocking());
        assert!(SubscriptionStatus::Cancelled.is_blocking());
        assert!(SubscriptionStatus::Suspended.is_blocking());
        assert!(!SubscriptionStatus::Trial.is_blocking());
        assert!(!SubscriptionStatus::Active.is_blocking());
    }

    #[test]
    fn billing_cycle_advances_by_cycle_length() {
        let from = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let monthly = BillingCycle::Monthly.next_billing_after(from);
        assert_eq!(monthly, Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap());
        let yearly = BillingCycle::Yearly.next_billing_after(from);
        assert_eq!(yearly, Utc.with_ymd_and_hms(2027, 1, 15, 0, 0, 0).unwrap());
    }
}
