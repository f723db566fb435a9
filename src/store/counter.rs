//! Best-effort counters for operational visibility.

use std::sync::atomic::{AtomicU64, Ordering};

/// Increment/read/reset interface so the in-process counter can be swapped
/// for a shared store under multi-instance deployment.
pub trait CounterStore: Send + Sync {
    fn increment(&self) -> u64;
    fn value(&self) -> u64;
    fn reset(&self);
}

/// In-process counter. Relaxed ordering: lost updates under concurrent
/// writes are acceptable, the count is not correctness-critical.
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for AtomicCounter {
    fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}
