use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{builder::InstanceBuilder, family::ServiceFamily, ServiceGraph};
use crate::{
    any::TypeInfo,
    instance::{Instance, InstanceKind},
    lifetime::Lifetime,
    registry::Registration,
    wrappers::{lazy_definition, many_definition, provider_definition},
};

impl ServiceGraph {
    /// Builds the family of a type nobody registered directly, when a policy covers it.
    pub(super) fn synthesize(&self, service_type: &TypeInfo) -> Option<ServiceFamily> {
        if !service_type.is_closed_generic() {
            return None;
        }

        let definition = service_type.definition();
        let target = service_type.args().first()?;
        if definition == *lazy_definition() {
            if !self.could_resolve(target) {
                return None;
            }
            let kind = InstanceKind::Lazy {
                target: target.clone(),
                name: None,
            };
            return self.wrapper_family(service_type, kind);
        }
        if definition == *provider_definition() {
            if !self.could_resolve(target) {
                return None;
            }
            let kind = InstanceKind::Provider { target: target.clone() };
            return self.wrapper_family(service_type, kind);
        }
        if definition == *many_definition() {
            let kind = InstanceKind::Collection {
                element_type: target.clone(),
                elements: self.find_all(target),
            };
            return self.wrapper_family(service_type, kind);
        }

        self.close_open_generic(service_type)
    }

    pub(super) fn could_synthesize(&self, service_type: &TypeInfo) -> bool {
        if !service_type.is_closed_generic() {
            return false;
        }

        let definition = service_type.definition();
        if definition == *lazy_definition() || definition == *provider_definition() {
            return service_type.args().first().is_some_and(|target| self.could_resolve(target));
        }
        if definition == *many_definition() {
            return true;
        }
        self.open_registrations
            .iter()
            .filter(|open| open.definition == definition)
            .any(|open| (open.closer)(service_type.args()).is_some())
    }

    fn wrapper_family(&self, service_type: &TypeInfo, kind: InstanceKind) -> Option<ServiceFamily> {
        let instance = self.wrapper_instance(service_type, "default".into(), kind)?;
        Some(ServiceFamily::new(service_type.clone(), vec![instance]))
    }

    fn wrapper_instance(&self, service_type: &TypeInfo, name: Arc<str>, kind: InstanceKind) -> Option<Arc<Instance>> {
        let hash = (self.hasher)(service_type, &name);
        let instance = Instance::new(service_type.clone(), name, Lifetime::Transient, kind, hash);
        if let Err(err) = self.claim_hash(&instance) {
            error!("{}", err);
            return None;
        }

        debug!(service = %service_type, name = %instance.name, "Wrapper synthesized");
        Some(Arc::new(instance))
    }

    /// Named `Lazy<T>`: defers resolution of the instance of `T` with the same name.
    pub(super) fn named_wrapper(&self, service_type: &TypeInfo, name: &str) -> Option<Arc<Instance>> {
        if !service_type.is_closed_generic() || service_type.definition() != *lazy_definition() {
            return None;
        }

        let key = (service_type.clone(), Arc::<str>::from(name));
        if let Some(instance) = self.named_wrappers.read().get(&key) {
            return Some(instance.clone());
        }

        let target = service_type.args().first()?;
        self.find_instance(target, name)?;
        let kind = InstanceKind::Lazy {
            target: target.clone(),
            name: Some(key.1.clone()),
        };
        let instance = self.wrapper_instance(service_type, key.1.clone(), kind)?;
        Some(self.named_wrappers.write().entry(key).or_insert(instance).clone())
    }

    fn close_open_generic(&self, service_type: &TypeInfo) -> Option<ServiceFamily> {
        let definition = service_type.definition();
        let registrations: Vec<Registration> = self
            .open_registrations
            .iter()
            .filter(|open| open.definition == definition)
            .filter_map(|open| {
                let mut registration = (open.closer)(service_type.args())?.lifetime(open.lifetime);
                if registration.service_type != *service_type {
                    warn!(
                        requested = %service_type,
                        provided = %registration.service_type,
                        "Open generic closer provided another type"
                    );
                    return None;
                }
                if registration.name.is_none() {
                    registration.name = open.name.clone();
                }
                Some(registration)
            })
            .collect();
        if registrations.is_empty() {
            return None;
        }

        match InstanceBuilder::new(self).family(service_type, registrations) {
            Ok(family) => {
                debug!(service = %service_type, instances = family.instances().len(), "Open generic closed");
                Some(family)
            }
            Err(err) => {
                error!("{}", err);
                None
            }
        }
    }
}
