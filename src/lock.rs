use ahash::RandomState;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

/// One build lock per instance key.
///
/// Builds nest along dependency edges, so locks are never shared between keys:
/// sharing a lock between two keys would let two threads building unrelated
/// chains wait on each other.
pub(crate) struct KeyedLocks<L> {
    locks: Mutex<HashMap<u64, Arc<L>, RandomState>>,
}

impl<L: Default> KeyedLocks<L> {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::default()),
        }
    }

    #[must_use]
    pub(crate) fn get(&self, key: u64) -> Arc<L> {
        self.locks.lock().entry(key).or_default().clone()
    }

    pub(crate) fn clear(&self) {
        self.locks.lock().clear();
    }
}

impl<L: Default> Default for KeyedLocks<L> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) type SyncLocks = KeyedLocks<Mutex<()>>;
pub(crate) type AsyncLocks = KeyedLocks<async_lock::Mutex<()>>;
