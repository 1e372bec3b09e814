use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::{
    any::Object,
    finalizer::BoxedFinalizer,
    service::Service as _,
};

/// What `dispose` does on a scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisposalLock {
    #[default]
    Unlocked,
    /// Disposal calls are ignored.
    Ignore,
    /// Disposal calls fail with an error.
    ThrowOnDispose,
}

struct Tracked {
    object: Object,
    finalizer: BoxedFinalizer,
    label: String,
}

/// Disposable objects of a scope, in the order they were first resolved.
#[derive(Default)]
pub(crate) struct Disposables {
    tracked: Mutex<Vec<Tracked>>,
}

impl Disposables {
    pub(crate) fn track(&self, object: Object, finalizer: BoxedFinalizer, label: String) {
        debug!(%label, "Tracked for disposal");
        self.tracked.lock().push(Tracked { object, finalizer, label });
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.tracked.lock().len()
    }

    /// Runs every finalizer once and forgets the objects.
    ///
    /// A panicking finalizer is logged and the remaining ones still run.
    pub(crate) fn dispose(&self) {
        let tracked = core::mem::take(&mut *self.tracked.lock());
        for Tracked { object, finalizer, label } in tracked {
            match catch_unwind(AssertUnwindSafe(|| finalizer.call(object))) {
                Ok(Ok(())) => debug!(%label, "Finalizer called"),
                Ok(Err(never)) => match never {},
                Err(_) => warn!(%label, "Finalizer panicked"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Disposables;
    use crate::finalizer::boxed_finalizer;

    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_panicking_finalizer_does_not_stop_disposal() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let disposables = Disposables::default();

        let first = log.clone();
        disposables.track(
            Arc::new(1u32),
            boxed_finalizer(move |value: Arc<u32>| first.lock().push(*value)),
            "first".to_owned(),
        );
        disposables.track(
            Arc::new(2u32),
            boxed_finalizer(|value: Arc<u32>| assert_eq!(*value, 0, "finalizer failed")),
            "second".to_owned(),
        );
        let third = log.clone();
        disposables.track(
            Arc::new(3u32),
            boxed_finalizer(move |value: Arc<u32>| third.lock().push(*value)),
            "third".to_owned(),
        );

        disposables.dispose();

        assert_eq!(*log.lock(), [1, 3]);
        assert_eq!(disposables.len(), 0);
        assert!(logs_contain("Finalizer panicked"));
    }
}
