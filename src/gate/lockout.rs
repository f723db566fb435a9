//! Login brute-force lockout.
//!
//! Flow Overview:
//! 1) Track failed attempts per normalized email in the lockout store.
//! 2) Five failures inside a 15-minute sliding window stamp a lockout.
//! 3) Successful login clears the record; stale unlocked records are pruned
//!    opportunistically on each check.
//!
//! Defense-in-depth, not a hard boundary: increments race without
//! serialization (a lost update delays lockout by one attempt) and every
//! store error fails open.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, warn};

use crate::store::models::LockoutRecord;
use crate::store::{AuditEvent, AuditSink, LockoutStore};

const LOCKOUT_THRESHOLD: i32 = 5;
const LOCKOUT_WINDOW_MINUTES: i64 = 15;

fn lockout_window() -> Duration {
    Duration::minutes(LOCKOUT_WINDOW_MINUTES)
}

pub struct LoginLockoutGuard {
    store: Arc<dyn LockoutStore>,
    audit: Arc<dyn AuditSink>,
}

impl LoginLockoutGuard {
    #[must_use]
    pub fn new(store: Arc<dyn LockoutStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Remaining lockout in seconds, or None when the email may attempt a
    /// login. Must be called before password verification.
    pub async fn is_locked_out(&self, email: &str) -> Option<i64> {
        let now = Utc::now();
        // Opportunistic prune bounds storage growth; failure is harmless.
        if let Err(err) = self.store.prune_stale(now - lockout_window(), now).await {
            debug!("lockout prune failed: {err:#}");
        }
        match self.store.find(email).await {
            Ok(Some(record)) => record
                .locked_until
                .filter(|until| *until > now)
                .map(|until| (until - now).num_seconds().max(1)),
            Ok(None) => None,
            Err(err) => {
                error!("lockout check failed, failing open: {err:#}");
                None
            }
        }
    }

    /// Count a failed password verification. Only called after the password
    /// check fails.
    pub async fn record_failed_attempt(&self, email: &str) {
        let now = Utc::now();
        let existing = match self.store.find(email).await {
            Ok(record) => record,
            Err(err) => {
                warn!("lockout read failed, skipping attempt count: {err:#}");
                return;
            }
        };
        let mut record = match existing {
            Some(mut record) => {
                // The window slides: a gap longer than the window restarts
                // the count.
                if now - record.last_attempt_at > lockout_window() {
                    record.failed_attempts = 1;
                } else {
                    record.failed_attempts += 1;
                }
                record.last_attempt_at = now;
                record
            }
            None => LockoutRecord {
                email: email.to_string(),
                failed_attempts: 1,
                last_attempt_at: now,
                locked_until: None,
            },
        };
        if record.failed_attempts >= LOCKOUT_THRESHOLD
            && record.locked_until.is_none_or(|until| until <= now)
        {
            record.locked_until = Some(now + lockout_window());
            self.audit.record(AuditEvent::LoginLockoutTripped {
                email: email.to_string(),
            });
        }
        if let Err(err) = self.store.upsert(&record).await {
            warn!("lockout write failed: {err:#}");
        }
    }

    /// Successful login clears the record (idempotent delete).
    pub async fn clear_attempts(&self, email: &str) {
        if let Err(err) = self.store.delete(email).await {
            warn!("lockout clear failed: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, TracingAuditSink};

    fn guard(store: Arc<MemoryStore>) -> LoginLockoutGuard {
        LoginLockoutGuard::new(store, Arc::new(TracingAuditSink))
    }

    #[tokio::test]
    async fn locks_after_threshold_failures() {
        let store = Arc::new(MemoryStore::new());
        let guard = guard(store.clone());
        for _ in 0..4 {
            guard.record_failed_attempt("a@b.com").await;
            assert!(guard.is_locked_out("a@b.com").await.is_none());
        }
        guard.record_failed_attempt("a@b.com").await;
        let remaining = guard.is_locked_out("a@b.com").await.expect("locked");
        assert!(remaining > 0 && remaining <= LOCKOUT_WINDOW_MINUTES * 60);
    }

    #[tokio::test]
    async fn lock_expires_with_the_window() {
        let store = Arc::new(MemoryStore::new());
        let guard = guard(store.clone());
        let now = Utc::now();
        store.set_lockout(LockoutRecord {
            email: "a@b.com".to_string(),
            failed_attempts: 5,
            last_attempt_at: now - Duration::minutes(20),
            locked_until: Some(now - Duration::minutes(5)),
        });
        assert!(guard.is_locked_out("a@b.com").await.is_none());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let guard = guard(store.clone());
        guard.record_failed_attempt("a@b.com").await;
        guard.clear_attempts("a@b.com").await;
        assert!(store.lockout("a@b.com").is_none());
        // Clearing a missing record is fine.
        guard.clear_attempts("a@b.com").await;
    }

    #[tokio::test]
    async fn gap_longer_than_window_restarts_the_count() {
        let store = Arc::new(MemoryStore::new());
        let guard = guard(store.clone());
        let now = Utc::now();
        store.set_lockout(LockoutRecord {
            email: "a@b.com".to_string(),
            failed_attempts: 4,
            last_attempt_at: now - Duration::minutes(30),
            locked_until: None,
        });
        guard.record_failed_attempt("a@b.com").await;
        let record = store.lockout("a@b.com").expect("record");
        assert_eq!(record.failed_attempts, 1);
        assert!(record.locked_until.is_none());
    }

    #[tokio::test]
    async fn store_errors_fail_open() {
        let store = Arc::new(MemoryStore::new());
        store.set_lockout(LockoutRecord {
            email: "a@b.com".to_string(),
            failed_attempts: 5,
            last_attempt_at: Utc::now(),
            locked_until: Some(Utc::now() + Duration::minutes(10)),
        });
        store.set_fail_reads(true);
        let guard = guard(store.clone());
        assert!(guard.is_locked_out("a@b.com").await.is_none());
    }
}
