//! Per-owner concurrency limiting for heavy operations.
//!
//! Each owner may hold at most `max_active` slots. A slot is claimed before
//! the operation begins (the asset upload route is the current user) and
//! released through [`ActiveSlot`]'s `Drop`, so every exit path gives the
//! slot back. Counts live in memory only and reset on restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Debug, Error)]
#[error("owner {owner_id} already has {active} of {limit} active jobs")]
pub struct CapacityError {
    pub owner_id: String,
    pub active: u32,
    pub limit: u32,
}

#[derive(Clone)]
pub struct ConcurrencyGuard {
    inner: Arc<GuardInner>,
}

#[derive(Debug)]
struct GuardInner {
    max_active: u32,
    counts: Mutex<HashMap<String, u32>>,
}

impl ConcurrencyGuard {
    pub fn new(max_active: u32) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                max_active,
                counts: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Claim a slot for `owner_id`. Fails without side effects when the
    /// owner is at the limit.
    pub fn acquire(&self, owner_id: &str) -> Result<ActiveSlot, CapacityError> {
        let mut counts = self.inner.counts.lock().unwrap();
        let count = counts.entry(owner_id.to_string()).or_insert(0);

        if *count >= self.inner.max_active {
            return Err(CapacityError {
                owner_id: owner_id.to_string(),
                active: *count,
                limit: self.inner.max_active,
            });
        }

        *count += 1;
        Ok(ActiveSlot {
            inner: Arc::clone(&self.inner),
            owner_id: owner_id.to_string(),
        })
    }

    /// Current slot count for an owner.
    pub fn active(&self, owner_id: &str) -> u32 {
        let counts = self.inner.counts.lock().unwrap();
        counts.get(owner_id).copied().unwrap_or(0)
    }

    pub fn limit(&self) -> u32 {
        self.inner.max_active
    }
}

/// A held concurrency slot; released on drop.
#[derive(Debug)]
pub struct ActiveSlot {
    inner: Arc<GuardInner>,
    owner_id: String,
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        let mut counts = self.inner.counts.lock().unwrap();
        if let Some(count) = counts.get_mut(&self.owner_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&self.owner_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_up_to_limit() {
        let guard = ConcurrencyGuard::new(2);

        let _a = guard.acquire("alice").unwrap();
        let _b = guard.acquire("alice").unwrap();
        assert_eq!(guard.active("alice"), 2);

        let err = guard.acquire("alice").unwrap_err();
        assert_eq!(err.active, 2);
        assert_eq!(err.limit, 2);
    }

    #[test]
    fn test_owners_are_independent() {
        let guard = ConcurrencyGuard::new(1);

        let _a = guard.acquire("alice").unwrap();
        let _b = guard.acquire("bob").unwrap();
        assert_eq!(guard.active("alice"), 1);
        assert_eq!(guard.active("bob"), 1);
    }

    #[test]
    fn test_drop_releases_slot() {
        let guard = ConcurrencyGuard::new(1);

        let slot = guard.acquire("alice").unwrap();
        assert!(guard.acquire("alice").is_err());

        drop(slot);
        assert_eq!(guard.active("alice"), 0);
        assert!(guard.acquire("alice").is_ok());
    }

    #[test]
    fn test_failed_acquire_has_no_side_effects() {
        let guard = ConcurrencyGuard::new(1);

        let _slot = guard.acquire("alice").unwrap();
        let _ = guard.acquire("alice");
        let _ = guard.acquire("alice");
        assert_eq!(guard.active("alice"), 1);
    }
}
