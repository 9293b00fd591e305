//! Per-key async lock registry.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

/// Hands out one async mutex per key, creating it on first use.
///
/// Holders of different keys never contend. An entry is dropped from the
/// registry when its last guard is released and nobody else is waiting on it.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Registry<K>,
}

impl<K> Clone for KeyedLocks<K> {
    fn clone(&self) -> Self {
        Self {
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the lock on `key`.
    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let entry = self.entry(&key);
        let guard = entry.lock_owned().await;
        self.guard(key, guard)
    }

    /// Takes the lock on `key` only if nobody holds it.
    pub fn try_lock(&self, key: K) -> Option<KeyedGuard<K>> {
        let entry = self.entry(&key);
        let guard = entry.try_lock_owned().ok()?;
        Some(self.guard(key, guard))
    }

    /// Returns the number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, key: &K) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    fn guard(&self, key: K, guard: OwnedMutexGuard<()>) -> KeyedGuard<K> {
        KeyedGuard {
            key,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }
}

/// Holds the lock for one key until dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct KeyedGuard<K>
where
    K: Eq + Hash,
{
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Registry<K>,
}

impl<K> KeyedGuard<K>
where
    K: Eq + Hash,
{
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K> std::fmt::Debug for KeyedGuard<K>
where
    K: Eq + Hash + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedGuard").field("key", &self.key).finish()
    }
}

impl<K> Drop for KeyedGuard<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the registry's own reference left: nobody holds or awaits it.
        if locks
            .get(&self.key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&self.key);
        }
    }
}
