use std::sync::Arc;

use crate::{
    any::TypeInfo,
    dependency_resolver::DependencyResolver,
    errors::InstantiateErrorKind,
    instance::Instance,
    instantiator::{Constructor, Instantiator},
};

type Filter = Arc<dyn Fn(&Instance) -> bool + Send + Sync>;

/// Wraps every matching instance of a service type with another object of the same type.
pub struct Decorator {
    pub(crate) service_type: TypeInfo,
    pub(crate) implementation: Option<TypeInfo>,
    pub(crate) constructor: Constructor,
    filter: Option<Filter>,
}

impl Decorator {
    /// The constructor must take exactly one [`Decorated`](crate::Decorated) parameter of the provided type.
    #[must_use]
    pub fn new<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Error = InstantiateErrorKind>,
        Deps: DependencyResolver,
    {
        Self {
            service_type: TypeInfo::of::<Inst::Provides>(),
            implementation: None,
            constructor: Constructor::new(instantiator).labeled("decorate"),
            filter: None,
        }
    }

    #[must_use]
    pub fn implemented_by<T: ?Sized + 'static>(mut self) -> Self {
        self.implementation = Some(TypeInfo::of::<T>());
        self
    }

    /// Restricts the decorator to instances accepted by `filter`.
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Instance) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    #[inline]
    #[must_use]
    pub fn service_type(&self) -> &TypeInfo {
        &self.service_type
    }

    fn decorated_parameters(&self) -> usize {
        self.constructor
            .parameters()
            .iter()
            .filter(|parameter| parameter.decorated && parameter.service_type == self.service_type)
            .count()
    }

    /// Whether this decorator wraps `instance`.
    ///
    /// A decorator never wraps an instance of its own implementation, so re-applying it is a no-op.
    pub(crate) fn applies_to(&self, instance: &Instance) -> bool {
        if instance.service_type() != &self.service_type || self.decorated_parameters() != 1 {
            return false;
        }
        if self.implementation.is_some() && instance.implementation() == self.implementation.as_ref() {
            return false;
        }
        self.filter.as_ref().map_or(true, |filter| filter(instance))
    }
}
