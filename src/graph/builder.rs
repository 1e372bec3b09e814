use std::sync::Arc;
use tracing::debug;

use super::{family::ServiceFamily, ServiceGraph};
use crate::{
    any::TypeInfo,
    errors::GraphErrorKind,
    instance::{Instance, InstanceKind},
    lifetime::Lifetime,
    registry::{Registration, Source},
};

/// Turns registrations into instances: names, hashes, finalizers, inline dependencies and decorators.
pub(super) struct InstanceBuilder<'g> {
    graph: &'g ServiceGraph,
}

impl<'g> InstanceBuilder<'g> {
    #[inline]
    pub(super) fn new(graph: &'g ServiceGraph) -> Self {
        Self { graph }
    }

    /// Later registrations with an already used name replace the earlier one.
    pub(super) fn family(&self, service_type: &TypeInfo, registrations: Vec<Registration>) -> Result<ServiceFamily, GraphErrorKind> {
        let mut instances: Vec<Arc<Instance>> = Vec::with_capacity(registrations.len());
        for registration in registrations {
            let name = match &registration.name {
                Some(name) => name.clone(),
                None => default_name(&registration, &instances),
            };
            if let Some(position) = instances.iter().position(|instance| instance.name == name) {
                debug!(service = %service_type, %name, "Registration replaced");
                instances.remove(position);
            }
            instances.push(self.instance(registration, name)?);
        }
        Ok(ServiceFamily::new(service_type.clone(), instances))
    }

    pub(super) fn instance(&self, registration: Registration, name: Arc<str>) -> Result<Arc<Instance>, GraphErrorKind> {
        let hash = (self.graph.hasher)(&registration.service_type, &name);
        let instance = self.decorate(self.bare(registration, name, hash)?);
        self.graph.claim_hash(&instance)?;
        Ok(Arc::new(instance))
    }

    fn bare(&self, registration: Registration, name: Arc<str>, hash: u64) -> Result<Instance, GraphErrorKind> {
        let Registration {
            service_type,
            source,
            lifetime,
            implementation,
            is_default,
            finalizer,
            named_dependencies,
            inline_dependencies,
            ..
        } = registration;

        let kind = match source {
            Source::Factory(constructor) => InstanceKind::Factory(constructor),
            Source::Constructed(constructors) => InstanceKind::Constructed(constructors),
            Source::Object(object) => InstanceKind::Object(object),
        };

        let inline_dependencies = inline_dependencies
            .into_iter()
            .enumerate()
            .map(|(index, dependency)| {
                let inline_name: Arc<str> = match &dependency.name {
                    Some(inline_name) => format!("{name}::{inline_name}").into(),
                    None => format!("{name}::inline{index}").into(),
                };
                let inline_hash = (self.graph.hasher)(&dependency.service_type, &inline_name);
                let mut inline = self.bare(dependency, inline_name, inline_hash)?;
                inline.lifetime = Lifetime::Transient;
                Ok(Arc::new(inline))
            })
            .collect::<Result<Vec<_>, GraphErrorKind>>()?;

        let finalizer = finalizer.or_else(|| self.graph.finalizers.get(&service_type).cloned());

        let mut instance = Instance::new(service_type, name, lifetime, kind, hash);
        instance.implementation = implementation;
        instance.is_default = is_default;
        instance.finalizer = finalizer;
        instance.named_dependencies = named_dependencies;
        instance.inline_dependencies = inline_dependencies;
        Ok(instance)
    }

    /// Wraps `instance` with every applicable decorator, first registered innermost.
    ///
    /// The wrapper takes over the lifetime, default marker and finalizer; the inner instance becomes transient.
    pub(super) fn decorate(&self, mut instance: Instance) -> Instance {
        for decorator in &self.graph.decorators {
            if !decorator.applies_to(&instance) {
                continue;
            }

            debug!(service = %instance.service_type, name = %instance.name, "Decorator applied");

            let lifetime = instance.lifetime;
            let finalizer = instance.finalizer.take();
            let service_type = instance.service_type.clone();
            let name = instance.name.clone();
            let hash = instance.hash;
            let is_default = instance.is_default;
            instance.lifetime = Lifetime::Transient;

            let mut wrapper = Instance::new(
                service_type,
                name,
                lifetime,
                InstanceKind::Decorated {
                    inner: Arc::new(instance),
                    decorator: decorator.clone(),
                },
                hash,
            );
            wrapper.implementation = decorator.implementation.clone();
            wrapper.is_default = is_default;
            wrapper.finalizer = finalizer;
            instance = wrapper;
        }
        instance
    }
}

fn default_name(registration: &Registration, taken: &[Arc<Instance>]) -> Arc<str> {
    let base = registration
        .implementation
        .as_ref()
        .unwrap_or(&registration.service_type)
        .variable_name();
    let is_taken = |name: &str| taken.iter().any(|instance| &*instance.name == name);
    if !is_taken(&base) {
        return base.into();
    }
    (2..)
        .map(|index| format!("{base}_{index}"))
        .find(|name| !is_taken(name))
        .unwrap_or_else(|| base.clone())
        .into()
}
