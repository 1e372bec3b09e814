use core::convert::Infallible;
use std::sync::Arc;
use tracing::warn;

use crate::{
    any::{Object, TypeInfo},
    service::{service_fn, BoxService},
};

/// Cleanup run when the scope that tracks an object is disposed.
pub trait Finalizer<Dep>: Send + Sync + 'static {
    fn finalize(&self, dependency: Arc<Dep>);
}

pub(crate) type BoxedFinalizer = BoxService<Object, (), Infallible>;

#[must_use]
pub(crate) fn boxed_finalizer<Dep, Fin>(finalizer: Fin) -> BoxedFinalizer
where
    Dep: Send + Sync + 'static,
    Fin: Finalizer<Dep>,
{
    BoxService::new(service_fn(move |dependency: Object| {
        match dependency.downcast::<Dep>() {
            Ok(dependency) => finalizer.finalize(dependency),
            Err(_) => warn!(expected = %TypeInfo::of::<Dep>(), "Finalizer skipped for object of another type"),
        }
        Ok(())
    }))
}

impl<F, Dep> Finalizer<Dep> for F
where
    F: Fn(Arc<Dep>) + Send + Sync + 'static,
{
    #[inline]
    fn finalize(&self, dependency: Arc<Dep>) {
        self(dependency);
    }
}
