use core::ops::Deref;
use std::sync::Arc;

use crate::{
    any::TypeInfo,
    dependency_resolver::{Arguments, DependencyResolver, Parameter},
    errors::ResolveErrorKind,
};

/// Required dependency resolved from the graph.
pub struct Inject<Dep>(pub Arc<Dep>);

impl<Dep: Send + Sync + 'static> DependencyResolver for Inject<Dep> {
    #[inline]
    fn parameters(parameters: &mut Vec<Parameter>) {
        parameters.push(Parameter::required(TypeInfo::of::<Dep>()));
    }

    #[inline]
    fn extract(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind> {
        arguments.take().map(Self)
    }
}

/// Optional dependency: `None` when nothing can satisfy it.
impl<Dep: Send + Sync + 'static> DependencyResolver for Option<Inject<Dep>> {
    #[inline]
    fn parameters(parameters: &mut Vec<Parameter>) {
        parameters.push(Parameter::optional(TypeInfo::of::<Dep>()));
    }

    #[inline]
    fn extract(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind> {
        Ok(arguments.take_optional()?.map(Inject))
    }
}

impl<Dep> Deref for Inject<Dep> {
    type Target = Dep;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The instance a decorator wraps.
///
/// A decorator constructor takes exactly one `Decorated<T>`, where `T` is the decorated service type.
pub struct Decorated<Dep>(pub Arc<Dep>);

impl<Dep: Send + Sync + 'static> DependencyResolver for Decorated<Dep> {
    #[inline]
    fn parameters(parameters: &mut Vec<Parameter>) {
        parameters.push(Parameter {
            service_type: TypeInfo::of::<Dep>(),
            optional: false,
            decorated: true,
        });
    }

    #[inline]
    fn extract(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind> {
        arguments.take().map(Self)
    }
}

impl<Dep> Deref for Decorated<Dep> {
    type Target = Dep;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
