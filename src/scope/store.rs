use arc_swap::ArcSwap;
use core::future::Future;
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

use crate::{
    any::Object,
    lock::{AsyncLocks, SyncLocks},
};

/// Objects resolved in one scope, keyed by instance hash.
///
/// Reads load an immutable snapshot and never block. Writes copy the snapshot under a mutex and swap it in.
/// A per-key build lock makes every key build at most once.
pub(crate) struct InstanceStore {
    snapshot: ArcSwap<BTreeMap<u64, Object>>,
    writer: Mutex<()>,
    locks: SyncLocks,
    async_locks: AsyncLocks,
}

impl InstanceStore {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(BTreeMap::new()),
            writer: Mutex::new(()),
            locks: SyncLocks::new(),
            async_locks: AsyncLocks::new(),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, key: u64) -> Option<Object> {
        self.snapshot.load().get(&key).cloned()
    }

    fn insert(&self, key: u64, object: Object) {
        let _guard = self.writer.lock();
        let mut objects = BTreeMap::clone(&self.snapshot.load());
        objects.insert(key, object);
        self.snapshot.store(Arc::new(objects));
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub(crate) fn clear(&self) {
        let _guard = self.writer.lock();
        self.snapshot.store(Arc::new(BTreeMap::new()));
        self.locks.clear();
        self.async_locks.clear();
    }

    /// Returns the stored object or builds, stores and returns a new one.
    /// The flag is `true` when this call built the object.
    pub(crate) fn get_or_build<E>(&self, key: u64, build: impl FnOnce() -> Result<Object, E>) -> Result<(Object, bool), E> {
        if let Some(object) = self.get(key) {
            debug!("Found in store");
            return Ok((object, false));
        }

        let lock = self.locks.get(key);
        let _guard = lock.lock();
        if let Some(object) = self.get(key) {
            debug!("Found in store after waiting");
            return Ok((object, false));
        }

        debug!("Not found in store");
        let object = build()?;
        self.insert(key, object.clone());
        Ok((object, true))
    }

    pub(crate) async fn get_or_build_async<E, F, Fut>(&self, key: u64, build: F) -> Result<(Object, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Object, E>>,
    {
        if let Some(object) = self.get(key) {
            debug!("Found in store");
            return Ok((object, false));
        }

        let lock = self.async_locks.get(key);
        let _guard = lock.lock().await;
        if let Some(object) = self.get(key) {
            debug!("Found in store after waiting");
            return Ok((object, false));
        }

        debug!("Not found in store");
        let object = build().await?;
        self.insert(key, object.clone());
        Ok((object, true))
    }
}
