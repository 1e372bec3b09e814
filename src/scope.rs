mod disposal;
mod store;

use core::{
    fmt::{self, Debug, Formatter},
    sync::atomic::{AtomicBool, Ordering},
};
use futures_core::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, debug_span, error, info_span, warn, Instrument as _};

pub use disposal::DisposalLock;

use crate::{
    any::{Object, TypeInfo},
    dependency_resolver::{downcast, Arguments, DependencyResolver, Parameter},
    errors::{ResolveErrorKind, ScopeErrorKind},
    graph::ServiceGraph,
    instance::Instance,
    lifetime::Lifetime,
};
use disposal::Disposables;
use store::InstanceStore;

pub(crate) struct ScopeInner {
    graph: Arc<ServiceGraph>,
    root: Option<Scope>,
    store: InstanceStore,
    disposables: Disposables,
    disposed: AtomicBool,
    lock: Mutex<DisposalLock>,
}

impl ScopeInner {
    fn dispose_objects(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            debug!("Scope already disposed");
            return;
        }
        self.disposables.dispose();
        self.store.clear();
        debug!(root = self.root.is_none(), "Scope disposed");
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        match *self.lock.lock() {
            DisposalLock::Unlocked => {
                self.dispose_objects();
                debug!("Scope disposed on drop");
            }
            lock => warn!(?lock, "Disposal on drop skipped, scope is locked"),
        }
    }
}

/// Runtime node owning resolved objects. The root scope holds singletons, every scope holds its scoped objects.
///
/// Cloning a scope gives another handle to the same node.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

/// Handle that doesn't keep a scope alive.
#[derive(Clone)]
pub(crate) struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    #[inline]
    pub(crate) fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(|inner| Scope { inner })
    }
}

impl Scope {
    pub(crate) fn new_root(graph: Arc<ServiceGraph>) -> Self {
        let lock = graph.config().disposal_lock;
        Self {
            inner: Arc::new(ScopeInner {
                graph,
                root: None,
                store: InstanceStore::new(),
                disposables: Disposables::default(),
                disposed: AtomicBool::new(false),
                lock: Mutex::new(lock),
            }),
        }
    }

    /// Child scope sharing the graph and the root of this one.
    #[must_use]
    pub fn create_scope(&self) -> Scope {
        debug!("Child scope created");
        Self {
            inner: Arc::new(ScopeInner {
                graph: self.inner.graph.clone(),
                root: Some(self.root()),
                store: InstanceStore::new(),
                disposables: Disposables::default(),
                disposed: AtomicBool::new(false),
                lock: Mutex::new(DisposalLock::Unlocked),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &Arc<ServiceGraph> {
        &self.inner.graph
    }

    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.inner.root.is_none()
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn root(&self) -> Scope {
        self.inner.root.clone().unwrap_or_else(|| self.clone())
    }

    #[inline]
    pub(crate) fn downgrade(&self) -> WeakScope {
        WeakScope(Arc::downgrade(&self.inner))
    }

    /// Number of objects stored in this scope.
    #[must_use]
    pub fn stored(&self) -> usize {
        self.inner.store.len()
    }

    /// Number of objects waiting for disposal in this scope.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.inner.disposables.len()
    }

    pub fn set_disposal_lock(&self, lock: DisposalLock) {
        *self.inner.lock.lock() = lock;
    }

    /// Runs the finalizers of everything this scope tracks, in first-resolved order.
    ///
    /// Repeated calls do nothing. A locked scope ignores the call or fails, depending on the lock.
    pub fn dispose(&self) -> Result<(), ScopeErrorKind> {
        match *self.inner.lock.lock() {
            DisposalLock::Unlocked => {}
            DisposalLock::Ignore => {
                debug!("Disposal ignored, scope is locked");
                return Ok(());
            }
            DisposalLock::ThrowOnDispose => {
                let err = ScopeErrorKind::DisposalLocked;
                error!("{}", err);
                return Err(err);
            }
        }
        self.inner.dispose_objects();
        Ok(())
    }

    fn ensure_alive(&self) -> Result<(), ResolveErrorKind> {
        if self.is_disposed() {
            let err = ResolveErrorKind::ScopeDisposed;
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    fn lookup(&self, service_type: &TypeInfo, name: Option<&str>) -> Result<Arc<Instance>, ResolveErrorKind> {
        let graph = self.graph();
        let instance = match name {
            Some(name) => graph.find_instance(service_type, name),
            None => graph.find_default(service_type),
        };
        instance.ok_or_else(|| {
            let err = ResolveErrorKind::NoInstance {
                service: service_type.clone(),
                name: name.map(ToOwned::to_owned),
            };
            error!("{}", err);
            err
        })
    }

    pub fn get_instance(&self, service_type: &TypeInfo) -> Result<Object, ResolveErrorKind> {
        let span = info_span!("get_instance", service = %service_type);
        let _guard = span.enter();

        self.ensure_alive()?;
        if *service_type == TypeInfo::of::<Scope>() {
            return Ok(Arc::new(self.clone()));
        }
        let instance = self.lookup(service_type, None)?;
        self.resolve_instance(&instance)
    }

    pub fn get_named_instance(&self, service_type: &TypeInfo, name: &str) -> Result<Object, ResolveErrorKind> {
        let span = info_span!("get_instance", service = %service_type, name);
        let _guard = span.enter();

        self.ensure_alive()?;
        let instance = self.lookup(service_type, Some(name))?;
        self.resolve_instance(&instance)
    }

    /// Like [`get_instance`](Scope::get_instance), but a missing registration or a disposed scope gives `None`.
    pub fn try_get_instance(&self, service_type: &TypeInfo) -> Result<Option<Object>, ResolveErrorKind> {
        match self.get_instance(service_type) {
            Ok(object) => Ok(Some(object)),
            Err(ResolveErrorKind::NoInstance { .. } | ResolveErrorKind::ScopeDisposed) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn try_get_named_instance(&self, service_type: &TypeInfo, name: &str) -> Result<Option<Object>, ResolveErrorKind> {
        match self.get_named_instance(service_type, name) {
            Ok(object) => Ok(Some(object)),
            Err(ResolveErrorKind::NoInstance { .. } | ResolveErrorKind::ScopeDisposed) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn get_all_instances(&self, service_type: &TypeInfo) -> Result<Vec<Object>, ResolveErrorKind> {
        let span = info_span!("get_all_instances", service = %service_type);
        let _guard = span.enter();

        self.ensure_alive()?;
        self.graph()
            .find_all(service_type)
            .iter()
            .map(|instance| self.resolve_instance(instance))
            .collect()
    }

    pub fn get_instance_async<'a>(&'a self, service_type: &'a TypeInfo, name: Option<&'a str>) -> BoxFuture<'a, Result<Object, ResolveErrorKind>> {
        let span = info_span!("get_instance_async", service = %service_type, name);
        Box::pin(
            async move {
                self.ensure_alive()?;
                if *service_type == TypeInfo::of::<Scope>() {
                    return Ok(Arc::new(self.clone()) as Object);
                }
                let instance = self.lookup(service_type, name)?;
                self.resolve_instance_async(&instance).await
            }
            .instrument(span),
        )
    }

    #[inline]
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        downcast(self.get_instance(&TypeInfo::of::<T>())?)
    }

    #[inline]
    pub fn get_named<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveErrorKind> {
        downcast(self.get_named_instance(&TypeInfo::of::<T>(), name)?)
    }

    #[inline]
    pub fn try_get<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        self.try_get_instance(&TypeInfo::of::<T>())?.map(downcast).transpose()
    }

    #[inline]
    pub fn try_get_named<T: Send + Sync + 'static>(&self, name: &str) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        self.try_get_named_instance(&TypeInfo::of::<T>(), name)?.map(downcast).transpose()
    }

    pub fn get_all<T: Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        self.get_all_instances(&TypeInfo::of::<T>())?.into_iter().map(downcast).collect()
    }

    pub async fn get_async<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        let service_type = TypeInfo::of::<T>();
        downcast(self.get_instance_async(&service_type, None).await?)
    }

    pub async fn get_named_async<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveErrorKind> {
        let service_type = TypeInfo::of::<T>();
        downcast(self.get_instance_async(&service_type, Some(name)).await?)
    }

    /// Builds or finds `instance` according to its lifetime.
    pub(crate) fn resolve_instance(&self, instance: &Arc<Instance>) -> Result<Object, ResolveErrorKind> {
        let span = debug_span!("resolve", service = %instance.service_type, name = %instance.name, lifetime = %instance.lifetime);
        let _guard = span.enter();

        let graph = self.graph();
        // the resolver rejects cycles, so it goes before the recursive async check
        let resolver = instance.resolver(graph).map_err(|err| {
            error!("{}", err);
            ResolveErrorKind::from(err)
        })?;
        if instance.is_async(graph) {
            let err = ResolveErrorKind::AsyncRequired {
                service: instance.service_type.clone(),
                name: instance.name.to_string(),
            };
            error!("{}", err);
            return Err(err);
        }

        match instance.lifetime {
            Lifetime::Transient => resolver.build(instance, self),
            Lifetime::Scoped => self.stored_or_built(instance, || resolver.build(instance, self)),
            Lifetime::Singleton => {
                let root = self.root();
                root.ensure_alive()?;
                root.stored_or_built(instance, || resolver.build(instance, &root))
            }
        }
    }

    fn stored_or_built(&self, instance: &Instance, build: impl FnOnce() -> Result<Object, ResolveErrorKind>) -> Result<Object, ResolveErrorKind> {
        let (object, built) = self.inner.store.get_or_build(instance.hash, build)?;
        if built {
            self.track(instance, &object);
        }
        Ok(object)
    }

    pub(crate) fn resolve_instance_async<'a>(&'a self, instance: &'a Arc<Instance>) -> BoxFuture<'a, Result<Object, ResolveErrorKind>> {
        Box::pin(async move {
            let graph = self.graph();
            let resolver = instance.resolver(graph).map_err(|err| {
                error!("{}", err);
                ResolveErrorKind::from(err)
            })?;
            if !instance.is_async(graph) {
                return self.resolve_instance(instance);
            }

            match instance.lifetime {
                Lifetime::Transient => resolver.build_async(instance, self).await,
                Lifetime::Scoped => {
                    let (object, built) = self
                        .inner
                        .store
                        .get_or_build_async(instance.hash, || resolver.build_async(instance, self))
                        .await?;
                    if built {
                        self.track(instance, &object);
                    }
                    Ok(object)
                }
                Lifetime::Singleton => {
                    let root = self.root();
                    root.ensure_alive()?;
                    let (object, built) = root
                        .inner
                        .store
                        .get_or_build_async(instance.hash, || resolver.build_async(instance, &root))
                        .await?;
                    if built {
                        root.track(instance, &object);
                    }
                    Ok(object)
                }
            }
        })
    }

    fn track(&self, instance: &Instance, object: &Object) {
        if let Some(finalizer) = &instance.finalizer {
            self.inner.disposables.track(object.clone(), finalizer.clone(), instance.describe());
        }
    }

    /// Tracks a freshly built transient of `instance` for disposal with this scope.
    pub(crate) fn track_transient(&self, instance: &Instance, object: &Object) {
        if instance.lifetime == Lifetime::Transient {
            self.track(instance, object);
        }
    }
}

impl Debug for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("root", &self.is_root())
            .field("disposed", &self.is_disposed())
            .field("stored", &self.stored())
            .finish_non_exhaustive()
    }
}

/// The requesting scope itself, always resolvable.
impl DependencyResolver for Scope {
    #[inline]
    fn parameters(parameters: &mut Vec<Parameter>) {
        parameters.push(Parameter::required(TypeInfo::of::<Scope>()));
    }

    #[inline]
    fn extract(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind> {
        arguments.take::<Scope>().map(|scope| Scope::clone(&scope))
    }
}
