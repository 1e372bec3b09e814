use std::{collections::BTreeMap, sync::Arc};

use crate::{
    any::{Object, TypeInfo},
    decorator::Decorator,
    dependency_resolver::DependencyResolver,
    errors::InstantiateErrorKind,
    finalizer::{boxed_finalizer, BoxedFinalizer, Finalizer},
    instantiator::{AsyncInstantiator, Constructor, Constructors, Instantiator},
    lifetime::Lifetime,
};

#[derive(Clone)]
pub(crate) enum Source {
    Factory(Constructor),
    Constructed(Vec<Constructor>),
    Object(Object),
}

/// One way of producing a service, as declared by the user.
#[derive(Clone)]
pub struct Registration {
    pub(crate) service_type: TypeInfo,
    pub(crate) source: Source,
    pub(crate) name: Option<Arc<str>>,
    pub(crate) lifetime: Lifetime,
    pub(crate) implementation: Option<TypeInfo>,
    pub(crate) is_default: bool,
    pub(crate) finalizer: Option<BoxedFinalizer>,
    pub(crate) named_dependencies: Vec<(TypeInfo, Arc<str>)>,
    pub(crate) inline_dependencies: Vec<Registration>,
}

impl Registration {
    fn with_source(service_type: TypeInfo, source: Source) -> Self {
        Self {
            service_type,
            source,
            name: None,
            lifetime: Lifetime::default(),
            implementation: None,
            is_default: false,
            finalizer: None,
            named_dependencies: Vec::new(),
            inline_dependencies: Vec::new(),
        }
    }

    /// Service built by a single factory closure.
    #[must_use]
    pub fn factory<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Error = InstantiateErrorKind>,
        Deps: DependencyResolver,
    {
        Self::with_source(
            TypeInfo::of::<Inst::Provides>(),
            Source::Factory(Constructor::new(instantiator).labeled("factory")),
        )
    }

    #[must_use]
    pub fn factory_async<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: AsyncInstantiator<Deps, Error = InstantiateErrorKind>,
        Deps: DependencyResolver,
    {
        Self::with_source(
            TypeInfo::of::<Inst::Provides>(),
            Source::Factory(Constructor::new_async(instantiator).labeled("factory")),
        )
    }

    /// Concrete type with several candidate constructors. The best resolvable one is picked at planning time.
    #[must_use]
    pub fn constructed<T: Send + Sync + 'static>(constructors: Constructors<T>) -> Self {
        let mut registration = Self::with_source(TypeInfo::of::<T>(), Source::Constructed(constructors.constructors));
        registration.implementation = Some(TypeInfo::of::<T>());
        registration
    }

    /// Pre-built object. Always a singleton.
    #[must_use]
    pub fn object<T: Send + Sync + 'static>(value: T) -> Self {
        let mut registration = Self::with_source(TypeInfo::of::<T>(), Source::Object(Arc::new(value)));
        registration.implementation = Some(TypeInfo::of::<T>());
        registration.lifetime = Lifetime::Singleton;
        registration
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        if !matches!(self.source, Source::Object(_)) {
            self.lifetime = lifetime;
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn singleton(self) -> Self {
        self.lifetime(Lifetime::Singleton)
    }

    #[inline]
    #[must_use]
    pub fn scoped(self) -> Self {
        self.lifetime(Lifetime::Scoped)
    }

    #[inline]
    #[must_use]
    pub fn transient(self) -> Self {
        self.lifetime(Lifetime::Transient)
    }

    /// Concrete type behind the service, used for naming and decorator filters.
    #[must_use]
    pub fn implemented_by<T: ?Sized + 'static>(mut self) -> Self {
        self.implementation = Some(TypeInfo::of::<T>());
        self
    }

    /// Makes this registration the family default regardless of registration order.
    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    #[must_use]
    pub fn with_finalizer<Dep, Fin>(mut self, finalizer: Fin) -> Self
    where
        Dep: Send + Sync + 'static,
        Fin: Finalizer<Dep>,
    {
        self.finalizer = Some(boxed_finalizer(finalizer));
        self
    }

    /// Satisfies parameters of type `Dep` with the instance named `name` instead of the family default.
    #[must_use]
    pub fn with_named_dependency<Dep: ?Sized + 'static>(mut self, name: impl Into<Arc<str>>) -> Self {
        self.named_dependencies.push((TypeInfo::of::<Dep>(), name.into()));
        self
    }

    /// Satisfies parameters of the dependency's service type with a private instance built inline.
    #[must_use]
    pub fn with_inline_dependency(mut self, dependency: Registration) -> Self {
        self.inline_dependencies.push(dependency);
        self
    }

    #[inline]
    #[must_use]
    pub fn service_type(&self) -> &TypeInfo {
        &self.service_type
    }
}

pub(crate) type Closer = Arc<dyn Fn(&[TypeInfo]) -> Option<Registration> + Send + Sync>;

/// Registration of an open generic definition, closed on demand for each requested argument list.
#[derive(Clone)]
pub(crate) struct OpenRegistration {
    pub(crate) definition: TypeInfo,
    pub(crate) lifetime: Lifetime,
    pub(crate) name: Option<Arc<str>>,
    pub(crate) closer: Closer,
}

#[derive(Default, Clone)]
pub struct Registry {
    pub(crate) registrations: Vec<Registration>,
    pub(crate) open_registrations: Vec<OpenRegistration>,
    pub(crate) decorators: Vec<Arc<Decorator>>,
    pub(crate) finalizers: BTreeMap<TypeInfo, BoxedFinalizer>,
}

impl Registry {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn register(mut self, registration: Registration) -> Self {
        self.registrations.push(registration);
        self
    }

    #[inline]
    #[must_use]
    pub fn provide<Inst, Deps>(self, instantiator: Inst, lifetime: Lifetime) -> Self
    where
        Inst: Instantiator<Deps, Error = InstantiateErrorKind>,
        Deps: DependencyResolver,
    {
        self.register(Registration::factory(instantiator).lifetime(lifetime))
    }

    #[inline]
    #[must_use]
    pub fn provide_async<Inst, Deps>(self, instantiator: Inst, lifetime: Lifetime) -> Self
    where
        Inst: AsyncInstantiator<Deps, Error = InstantiateErrorKind>,
        Deps: DependencyResolver,
    {
        self.register(Registration::factory_async(instantiator).lifetime(lifetime))
    }

    #[inline]
    #[must_use]
    pub fn construct<T: Send + Sync + 'static>(self, constructors: Constructors<T>, lifetime: Lifetime) -> Self {
        self.register(Registration::constructed(constructors).lifetime(lifetime))
    }

    #[inline]
    #[must_use]
    pub fn instance<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.register(Registration::object(value))
    }

    /// Registers an open generic definition.
    ///
    /// `closer` receives the generic arguments of a requested closed type and returns the
    /// registration for it, or `None` when the arguments can't close the definition.
    #[must_use]
    pub fn provide_open<F>(mut self, definition: TypeInfo, lifetime: Lifetime, closer: F) -> Self
    where
        F: Fn(&[TypeInfo]) -> Option<Registration> + Send + Sync + 'static,
    {
        self.open_registrations.push(OpenRegistration {
            definition: definition.definition(),
            lifetime,
            name: None,
            closer: Arc::new(closer),
        });
        self
    }

    #[must_use]
    pub fn provide_open_named<F>(mut self, definition: TypeInfo, name: impl Into<Arc<str>>, lifetime: Lifetime, closer: F) -> Self
    where
        F: Fn(&[TypeInfo]) -> Option<Registration> + Send + Sync + 'static,
    {
        self.open_registrations.push(OpenRegistration {
            definition: definition.definition(),
            lifetime,
            name: Some(name.into()),
            closer: Arc::new(closer),
        });
        self
    }

    /// Decorators apply in registration order, so the first one registered ends up innermost.
    #[inline]
    #[must_use]
    pub fn decorate(mut self, decorator: Decorator) -> Self {
        self.decorators.push(Arc::new(decorator));
        self
    }

    /// Finalizer for every registration of `Dep` that doesn't carry its own.
    #[must_use]
    pub fn add_finalizer<Dep, Fin>(mut self, finalizer: Fin) -> Self
    where
        Dep: Send + Sync + 'static,
        Fin: Finalizer<Dep>,
    {
        self.finalizers.insert(TypeInfo::of::<Dep>(), boxed_finalizer(finalizer));
        self
    }

    /// Appends every registration of `other` after the ones already present.
    #[must_use]
    pub fn merge(mut self, other: Registry) -> Self {
        self.registrations.extend(other.registrations);
        self.open_registrations.extend(other.open_registrations);
        self.decorators.extend(other.decorators);
        self.finalizers.extend(other.finalizers);
        self
    }
}
