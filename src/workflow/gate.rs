use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use rocket::tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serialises attempts that share a key, so that a check-then-write sequence
/// for one key (a national ID being registered, an identity voting) cannot
/// interleave with another attempt for the same key.
pub struct Gate<K> {
    slots: Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>,
}

/// Held for the duration of one attempt.
pub struct GatePass<K: Eq + Hash> {
    gate: Gate<K>,
    key: K,
    _guard: OwnedMutexGuard<()>,
}

impl<K> Default for Gate<K> {
    fn default() -> Self {
        Self {
            slots: Default::default(),
        }
    }
}

impl<K> Clone for Gate<K> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

impl<K: Eq + Hash + Clone> Gate<K> {
    /// Wait until no other attempt for this key is in progress.
    pub async fn enter(&self, key: K) -> GatePass<K> {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();
        let guard = slot.lock_owned().await;
        GatePass {
            gate: self.clone(),
            key,
            _guard: guard,
        }
    }

    /// Number of keys with an attempt in progress or waiting.
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<K: Eq + Hash> Drop for GatePass<K> {
    fn drop(&mut self) {
        let mut slots = self
            .gate
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one in our guard: nobody else is waiting.
        if let Some(slot) = slots.get(&self.key) {
            if Arc::strong_count(slot) == 2 {
                slots.remove(&self.key);
            }
        }
    }
}
