//! Audit/alert sink for security-relevant gate events.
//!
//! The pipeline only produces events; delivery (SIEM, webhooks, email) is an
//! external collaborator. The default sink writes structured tracing events
//! under the `audit` target.

use tracing::info;

#[derive(Clone, Debug)]
pub enum AuditEvent {
    LoginLockoutTripped { email: String },
    ForcedLogout { user_id: i64, by: i64 },
    MaintenanceToggled { enabled: bool, by: i64 },
    TenantSuspended { tenant_id: i64, by: i64 },
    TenantReinstated { tenant_id: i64, by: i64 },
    ImpersonationUsed { admin_id: i64, tenant_id: i64 },
}

pub trait AuditSink: Send + Sync {
    /// Fire-and-forget; a sink must never fail the request that produced
    /// the event.
    fn record(&self, event: AuditEvent);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match event {
            AuditEvent::LoginLockoutTripped { email } => {
                info!(target: "audit", email, "login lockout tripped");
            }
            AuditEvent::ForcedLogout { user_id, by } => {
                info!(target: "audit", user_id, by, "session epoch bumped (force logout)");
            }
            AuditEvent::MaintenanceToggled { enabled, by } => {
                info!(target: "audit", enabled, by, "maintenance mode toggled");
            }
            AuditEvent::TenantSuspended { tenant_id, by } => {
                info!(target: "audit", tenant_id, by, "tenant suspended");
            }
            AuditEvent::TenantReinstated { tenant_id, by } => {
                info!(target: "audit", tenant_id, by, "tenant reinstated");
            }
            AuditEvent::ImpersonationUsed { admin_id, tenant_id } => {
                info!(target: "audit", admin_id, tenant_id, "tenant impersonation used");
            }
        }
    }
}
