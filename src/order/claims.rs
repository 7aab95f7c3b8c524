//! Per-order claims serializing operations that span a vendor call.
//!
//! The store's compare-and-set keeps each status write on the lattice, but
//! an explicit operation reads the order, calls the vendor and only then
//! writes. Holding a claim across those steps means a second operation on
//! the same order sees the first one's result instead of racing it to the
//! vendor.

use crate::types::OrderKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-order claims.
///
/// Entries exist only while a claim is held or awaited.
#[derive(Debug, Default)]
pub struct OrderClaims {
    slots: Mutex<HashMap<OrderKey, Arc<AsyncMutex<()>>>>,
}

impl OrderClaims {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &OrderKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Wait until `key` is free and claim it.
    pub async fn claim(&self, key: &OrderKey) -> OrderClaim<'_> {
        let guard = self.slot(key).lock_owned().await;
        OrderClaim {
            claims: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Claim `key` only if nobody holds it.
    pub fn try_claim(&self, key: &OrderKey) -> Option<OrderClaim<'_>> {
        let guard = self.slot(key).try_lock_owned().ok();
        match guard {
            Some(guard) => Some(OrderClaim {
                claims: self,
                key: key.clone(),
                guard: Some(guard),
            }),
            None => {
                self.prune(key);
                None
            }
        }
    }

    /// Whether some operation currently holds or awaits `key`.
    pub fn is_claimed(&self, key: &OrderKey) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Drop the slot of `key` when only the registry still refers to it.
    fn prune(&self, key: &OrderKey) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(key);
        }
    }
}

/// Exclusive hold on one order, released on drop.
pub struct OrderClaim<'a> {
    claims: &'a OrderClaims,
    key: OrderKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl std::fmt::Debug for OrderClaim<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderClaim").field("key", &self.key).finish()
    }
}

impl Drop for OrderClaim<'_> {
    fn drop(&mut self) {
        // Release the lock (and its reference to the slot) before pruning
        drop(self.guard.take());
        self.claims.prune(&self.key);
    }
}
