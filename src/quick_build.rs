//! Builds instances by walking their plans directly, without a compiled frame chain.
//!
//! Used when compilation is off and for instances whose dependencies can't be inlined:
//! lazy and provider wrappers and anything that takes the scope itself.

use futures_core::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    any::Object,
    dependency_resolver::Arguments,
    errors::{BuildErrorKind, ResolveErrorKind},
    instance::{DependencySource, Instance, InstanceKind, InstancePlan, PlannedDependency},
    instantiator::Constructor,
    scope::Scope,
    wrappers::{LazyObject, ManyObject, ProviderObject},
};

#[derive(Clone, Copy)]
pub(crate) struct QuickBuilder<'a> {
    scope: &'a Scope,
}

impl<'a> QuickBuilder<'a> {
    #[inline]
    pub(crate) fn new(scope: &'a Scope) -> Self {
        Self { scope }
    }

    fn constructor(instance: &Instance, plan: &InstancePlan) -> Result<Constructor, ResolveErrorKind> {
        match &plan.constructor {
            Some(constructor) if plan.is_valid() => Ok(constructor.clone()),
            _ => {
                let err = ResolveErrorKind::Build(BuildErrorKind::Plan(instance.unbuildable(plan.errors.clone())));
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Builds `instance` in place. Lifetime caching is the caller's concern, dependencies go through the scope.
    pub(crate) fn build(self, instance: &Arc<Instance>) -> Result<Object, ResolveErrorKind> {
        let graph = self.scope.graph();
        match &instance.kind {
            InstanceKind::Object(object) => Ok(object.clone()),
            InstanceKind::Lazy { target, name } => Ok(Arc::new(LazyObject::new(self.scope.downgrade(), target.clone(), name.clone())) as Object),
            InstanceKind::Provider { target } => Ok(Arc::new(ProviderObject::new(self.scope.downgrade(), target.clone())) as Object),
            InstanceKind::Collection { elements, .. } => {
                let objects = elements
                    .iter()
                    .map(|element| self.scope.resolve_instance(element))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Arc::new(ManyObject(objects)) as Object)
            }
            InstanceKind::Factory(_) | InstanceKind::Constructed(_) | InstanceKind::Decorated { .. } => {
                let plan = instance.create_plan(graph);
                let constructor = Self::constructor(instance, &plan)?;
                let arguments = plan
                    .dependencies
                    .iter()
                    .map(|dependency| self.argument(dependency))
                    .collect::<Result<Vec<_>, _>>()?;

                let object = constructor.call(Arguments::new(arguments))?;
                self.scope.track_transient(instance, &object);
                debug!(service = %instance.service_type, name = %instance.name, "Quick built");
                Ok(object)
            }
        }
    }

    fn argument(self, dependency: &PlannedDependency) -> Result<Option<Object>, ResolveErrorKind> {
        match &dependency.source {
            DependencySource::Graph { instance, .. } => self.scope.resolve_instance(instance).map(Some),
            DependencySource::Inline(instance) | DependencySource::Decorated(instance) => self.build(instance).map(Some),
            DependencySource::Scope => Ok(Some(Arc::new(self.scope.clone()) as Object)),
            DependencySource::Absent => Ok(self.scope.graph().config().ignorable_default(&dependency.parameter.service_type)),
        }
    }

    pub(crate) fn build_async<'b>(self, instance: &'b Arc<Instance>) -> BoxFuture<'b, Result<Object, ResolveErrorKind>>
    where
        'a: 'b,
    {
        Box::pin(async move {
            let graph = self.scope.graph();
            match &instance.kind {
                InstanceKind::Object(_) | InstanceKind::Lazy { .. } | InstanceKind::Provider { .. } => self.build(instance),
                InstanceKind::Collection { elements, .. } => {
                    let mut objects = Vec::with_capacity(elements.len());
                    for element in elements {
                        objects.push(self.scope.resolve_instance_async(element).await?);
                    }
                    Ok(Arc::new(ManyObject(objects)) as Object)
                }
                InstanceKind::Factory(_) | InstanceKind::Constructed(_) | InstanceKind::Decorated { .. } => {
                    let plan = instance.create_plan(graph);
                    let constructor = Self::constructor(instance, &plan)?;
                    let mut arguments = Vec::with_capacity(plan.dependencies.len());
                    for dependency in &plan.dependencies {
                        arguments.push(self.argument_async(dependency).await?);
                    }

                    let object = constructor.call_async(Arguments::new(arguments)).await?;
                    self.scope.track_transient(instance, &object);
                    debug!(service = %instance.service_type, name = %instance.name, "Quick built");
                    Ok(object)
                }
            }
        })
    }

    async fn argument_async(self, dependency: &PlannedDependency) -> Result<Option<Object>, ResolveErrorKind> {
        match &dependency.source {
            DependencySource::Graph { instance, .. } => self.scope.resolve_instance_async(instance).await.map(Some),
            DependencySource::Inline(instance) | DependencySource::Decorated(instance) => {
                self.build_async(instance).await.map(Some)
            }
            DependencySource::Scope => Ok(Some(Arc::new(self.scope.clone()) as Object)),
            DependencySource::Absent => Ok(self.scope.graph().config().ignorable_default(&dependency.parameter.service_type)),
        }
    }
}
