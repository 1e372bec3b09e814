use core::{future::Future, marker::PhantomData};
use futures_core::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

use crate::{
    any::{Object, TypeInfo},
    dependency_resolver::{parameters_of, Arguments, DependencyResolver, Parameter},
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    service::{service_fn, BoxService, Service as _},
};

pub trait Instantiator<Deps>: Send + Sync + 'static
where
    Deps: DependencyResolver,
{
    type Provides: Send + Sync + 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

pub trait AsyncInstantiator<Deps>: Send + Sync + 'static
where
    Deps: DependencyResolver,
{
    type Provides: Send + Sync + 'static;
    type Error: Into<InstantiateErrorKind>;
    type Future: Future<Output = Result<Self::Provides, Self::Error>> + Send + 'static;

    fn instantiate(&self, dependencies: Deps) -> Self::Future;
}

pub(crate) type BoxedInstantiator = BoxService<Arguments, Object, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>>;
pub(crate) type BoxedAsyncInstantiator = BoxService<Arguments, BoxFuture<'static, Result<Object, InstantiateErrorKind>>, ResolveErrorKind>;

#[must_use]
pub(crate) fn boxed_instantiator<Inst, Deps>(instantiator: Inst) -> BoxedInstantiator
where
    Inst: Instantiator<Deps>,
    Deps: DependencyResolver,
{
    BoxService::new(service_fn(move |mut arguments: Arguments| {
        let dependencies = match Deps::extract(&mut arguments) {
            Ok(dependencies) => dependencies,
            Err(err) => return Err(InstantiatorErrorKind::Deps(err)),
        };
        let dependency = match instantiator.instantiate(dependencies) {
            Ok(dependency) => dependency,
            Err(err) => return Err(InstantiatorErrorKind::Factory(err.into())),
        };

        debug!("Instantiated");

        Ok(Arc::new(dependency) as Object)
    }))
}

#[must_use]
pub(crate) fn boxed_async_instantiator<Inst, Deps>(instantiator: Inst) -> BoxedAsyncInstantiator
where
    Inst: AsyncInstantiator<Deps>,
    Deps: DependencyResolver,
{
    BoxService::new(service_fn(move |mut arguments: Arguments| {
        let dependencies = Deps::extract(&mut arguments)?;
        let future = instantiator.instantiate(dependencies);

        Ok(Box::pin(async move {
            match future.await {
                Ok(dependency) => {
                    debug!("Instantiated");
                    Ok::<_, InstantiateErrorKind>(Arc::new(dependency) as Object)
                }
                Err(err) => Err(err.into()),
            }
        }) as BoxFuture<'static, _>)
    }))
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Result<Response, Err> + Send + Sync + 'static,
            Response: Send + Sync + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            #[inline]
            fn instantiate(&self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }

        #[allow(non_snake_case)]
        impl<F, Fut, Response, Err, $($ty,)*> AsyncInstantiator<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<Response, Err>> + Send + 'static,
            Response: Send + Sync + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;
            type Future = Fut;

            #[inline]
            fn instantiate(&self, ($($ty,)*): ($($ty,)*)) -> Self::Future {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

#[derive(Clone)]
pub(crate) enum Invoke {
    Sync(BoxedInstantiator),
    Async(BoxedAsyncInstantiator),
}

/// Erased way of building one service type: its parameters plus the callable that consumes them.
#[derive(Clone)]
pub struct Constructor {
    pub(crate) provides: TypeInfo,
    pub(crate) label: Arc<str>,
    pub(crate) parameters: Arc<[Parameter]>,
    pub(crate) invoke: Invoke,
    pub(crate) is_default: bool,
}

impl Constructor {
    #[must_use]
    pub fn new<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps>,
        Deps: DependencyResolver,
    {
        Self {
            provides: TypeInfo::of::<Inst::Provides>(),
            label: Arc::from("new"),
            parameters: parameters_of::<Deps>().into(),
            invoke: Invoke::Sync(boxed_instantiator(instantiator)),
            is_default: false,
        }
    }

    #[must_use]
    pub fn new_async<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: AsyncInstantiator<Deps>,
        Deps: DependencyResolver,
    {
        Self {
            provides: TypeInfo::of::<Inst::Provides>(),
            label: Arc::from("new"),
            parameters: parameters_of::<Deps>().into(),
            invoke: Invoke::Async(boxed_async_instantiator(instantiator)),
            is_default: false,
        }
    }

    /// Name the constructor is rendered with in generated source.
    #[must_use]
    pub fn labeled(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Marks the constructor as the one to pick whenever it's resolvable.
    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self.invoke, Invoke::Async(_))
    }

    pub(crate) fn call(&self, arguments: Arguments) -> Result<Object, ResolveErrorKind> {
        match &self.invoke {
            Invoke::Sync(instantiator) => instantiator.call(arguments).map_err(ResolveErrorKind::from),
            Invoke::Async(_) => Err(ResolveErrorKind::AsyncRequired {
                service: self.provides.clone(),
                name: self.label.to_string(),
            }),
        }
    }

    pub(crate) fn call_async(&self, arguments: Arguments) -> BoxFuture<'static, Result<Object, ResolveErrorKind>> {
        match &self.invoke {
            Invoke::Sync(instantiator) => {
                let result: Result<Object, ResolveErrorKind> = instantiator.call(arguments).map_err(Into::into);
                Box::pin(core::future::ready(result))
            }
            Invoke::Async(instantiator) => match instantiator.call(arguments) {
                Ok(future) => Box::pin(async move {
                    future
                        .await
                        .map_err(|err| ResolveErrorKind::from(InstantiatorErrorKind::<ResolveErrorKind, _>::Factory(err)))
                }),
                Err(err) => Box::pin(core::future::ready(Err(ResolveErrorKind::from(
                    InstantiatorErrorKind::<_, InstantiateErrorKind>::Deps(err),
                )))),
            },
        }
    }
}

/// Candidate constructors of one concrete type, in declaration order.
pub struct Constructors<T> {
    pub(crate) constructors: Vec<Constructor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Constructors<T> {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: Vec::new(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn with<Inst, Deps>(self, label: &str, instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Provides = T>,
        Deps: DependencyResolver,
    {
        self.push(Constructor::new(instantiator).labeled(label))
    }

    #[must_use]
    pub fn with_async<Inst, Deps>(self, label: &str, instantiator: Inst) -> Self
    where
        Inst: AsyncInstantiator<Deps, Provides = T>,
        Deps: DependencyResolver,
    {
        self.push(Constructor::new_async(instantiator).labeled(label))
    }

    #[must_use]
    pub fn with_default<Inst, Deps>(self, label: &str, instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Provides = T>,
        Deps: DependencyResolver,
    {
        self.push(Constructor::new(instantiator).labeled(label).as_default())
    }

    #[must_use]
    pub fn push(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }
}

impl<T: Send + Sync + 'static> Default for Constructors<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
