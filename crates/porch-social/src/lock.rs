use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A fixed set of mutexes selected by key hash.
///
/// Serialises work on the same key (a recipient, a conversation pair)
/// without one lock for everybody and without per-key bookkeeping.
pub struct StripedLock {
    stripes: Vec<Mutex<()>>,
    hasher: RandomState,
}

impl StripedLock {
    pub fn new(stripes: usize) -> Self {
        let stripes = stripes.max(1);
        Self {
            stripes: (0..stripes).map(|_| Mutex::new(())).collect(),
            hasher: RandomState::new(),
        }
    }

    pub fn lock<K: Hash>(&self, key: &K) -> MutexGuard<'_, ()> {
        let idx = (self.hasher.hash_one(key) % self.stripes.len() as u64) as usize;
        // The guarded value is (), so a panic elsewhere leaves nothing inconsistent.
        self.stripes[idx].lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StripedLock {
    fn default() -> Self {
        Self::new(64)
    }
}
