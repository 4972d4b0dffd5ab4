use std::collections::HashMap;
use std::hash::Hash;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Async mutex per key, created on first use and dropped once nobody holds or
/// waits on it. Each slot carries a `V` that lives as long as the slot does,
/// so overlapping holders of the same key can hand state to each other.
pub struct KeyedLocks<K, V = ()> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<V>>>>,
}

impl<K, V> KeyedLocks<K, V>
where
    K: Eq + Hash + Clone,
    V: Default,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn lock(&self, key: K) -> KeyGuard<'_, K, V> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(key.clone()).or_default().clone()
        };

        let guard = slot.lock_owned().await;
        KeyGuard {
            locks: self,
            key,
            guard,
        }
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for KeyedLocks<K, V>
where
    K: Eq + Hash + Clone,
    V: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

pub struct KeyGuard<'a, K: Eq + Hash, V> {
    locks: &'a KeyedLocks<K, V>,
    key: K,
    guard: OwnedMutexGuard<V>,
}

impl<K: Eq + Hash, V> Deref for KeyGuard<'_, K, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.guard
    }
}

impl<K: Eq + Hash, V> DerefMut for KeyGuard<'_, K, V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut self.guard
    }
}

impl<K: Eq + Hash, V> Drop for KeyGuard<'_, K, V> {
    fn drop(&mut self) {
        // Waiters clone the slot under the map lock. Two references left
        // (the map and this guard) means nobody else can reach it.
        let mut slots = self.locks.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 2) {
            slots.remove(&self.key);
        }
    }
}
