use core::marker::PhantomData;
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::{
    any::{Object, TypeInfo},
    dependency_resolver::{downcast, Arguments, DependencyResolver, Parameter},
    errors::ResolveErrorKind,
    scope::WeakScope,
};

pub(crate) fn lazy_definition() -> &'static TypeInfo {
    static DEFINITION: OnceCell<TypeInfo> = OnceCell::new();
    DEFINITION.get_or_init(|| TypeInfo::of::<Lazy<()>>().definition())
}

pub(crate) fn provider_definition() -> &'static TypeInfo {
    static DEFINITION: OnceCell<TypeInfo> = OnceCell::new();
    DEFINITION.get_or_init(|| TypeInfo::of::<Provider<()>>().definition())
}

pub(crate) fn many_definition() -> &'static TypeInfo {
    static DEFINITION: OnceCell<TypeInfo> = OnceCell::new();
    DEFINITION.get_or_init(|| TypeInfo::of::<Many<()>>().definition())
}

pub(crate) struct LazyObject {
    scope: WeakScope,
    target: TypeInfo,
    name: Option<Arc<str>>,
    value: OnceCell<Object>,
}

impl LazyObject {
    pub(crate) fn new(scope: WeakScope, target: TypeInfo, name: Option<Arc<str>>) -> Self {
        Self {
            scope,
            target,
            name,
            value: OnceCell::new(),
        }
    }

    fn get(&self) -> Result<Object, ResolveErrorKind> {
        self.value
            .get_or_try_init(|| {
                let scope = self.scope.upgrade().ok_or(ResolveErrorKind::ScopeDisposed)?;
                match &self.name {
                    Some(name) => scope.get_named_instance(&self.target, name),
                    None => scope.get_instance(&self.target),
                }
            })
            .cloned()
    }
}

/// Resolves `T` on first [`get`](Lazy::get) and keeps the result.
///
/// Only available as a constructor parameter. The scope it resolves from is held weakly.
pub struct Lazy<T> {
    inner: Arc<LazyObject>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Lazy<T> {
    pub fn get(&self) -> Result<Arc<T>, ResolveErrorKind> {
        downcast(self.inner.get()?)
    }
}

impl<T: Send + Sync + 'static> DependencyResolver for Lazy<T> {
    #[inline]
    fn parameters(parameters: &mut Vec<Parameter>) {
        parameters.push(Parameter::required(TypeInfo::of::<Self>()));
    }

    #[inline]
    fn extract(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind> {
        Ok(Self {
            inner: arguments.take::<LazyObject>()?,
            _marker: PhantomData,
        })
    }
}

pub(crate) struct ProviderObject {
    scope: WeakScope,
    target: TypeInfo,
}

impl ProviderObject {
    pub(crate) fn new(scope: WeakScope, target: TypeInfo) -> Self {
        Self { scope, target }
    }
}

/// Resolves `T` through the captured scope on every call.
pub struct Provider<T> {
    inner: Arc<ProviderObject>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Provider<T> {
    pub fn create(&self) -> Result<Arc<T>, ResolveErrorKind> {
        let scope = self.inner.scope.upgrade().ok_or(ResolveErrorKind::ScopeDisposed)?;
        downcast(scope.get_instance(&self.inner.target)?)
    }

    pub fn create_named(&self, name: &str) -> Result<Arc<T>, ResolveErrorKind> {
        let scope = self.inner.scope.upgrade().ok_or(ResolveErrorKind::ScopeDisposed)?;
        downcast(scope.get_named_instance(&self.inner.target, name)?)
    }
}

impl<T: Send + Sync + 'static> DependencyResolver for Provider<T> {
    #[inline]
    fn parameters(parameters: &mut Vec<Parameter>) {
        parameters.push(Parameter::required(TypeInfo::of::<Self>()));
    }

    #[inline]
    fn extract(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind> {
        Ok(Self {
            inner: arguments.take::<ProviderObject>()?,
            _marker: PhantomData,
        })
    }
}

pub(crate) struct ManyObject(pub(crate) Vec<Object>);

/// Every instance of `T`, in registration order. Empty when nothing is registered.
pub struct Many<T>(pub Vec<Arc<T>>);

impl<T: Send + Sync + 'static> DependencyResolver for Many<T> {
    #[inline]
    fn parameters(parameters: &mut Vec<Parameter>) {
        parameters.push(Parameter::required(TypeInfo::of::<Self>()));
    }

    fn extract(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind> {
        let elements = arguments.take::<ManyObject>()?;
        elements.0.iter().cloned().map(downcast).collect::<Result<_, _>>().map(Self)
    }
}

impl<T> core::ops::Deref for Many<T> {
    type Target = [Arc<T>];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
