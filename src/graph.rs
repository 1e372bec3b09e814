mod builder;
mod family;
mod policy;

use ahash::RandomState;
use core::{
    any::TypeId,
    hash::{BuildHasher as _, Hash as _, Hasher as _},
};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tracing::info;

pub use family::ServiceFamily;

use crate::{
    any::TypeInfo,
    config::Config,
    decorator::Decorator,
    errors::{GraphErrorKind, PlanErrorKind},
    finalizer::BoxedFinalizer,
    instance::Instance,
    registry::{OpenRegistration, Registration, Registry},
    scope::Scope,
};
use builder::InstanceBuilder;

pub(crate) type InstanceHasher = fn(&TypeInfo, &str) -> u64;

/// Structural hash of an instance identity. Seeds are fixed so hashes are stable between runs.
pub(crate) fn instance_hash(service_type: &TypeInfo, name: &str) -> u64 {
    let mut hasher = RandomState::with_seeds(0x6a6f_696e, 0x6572_7921, 0x5eed_0001, 0x5eed_0002).build_hasher();
    service_type.hash(&mut hasher);
    name.hash(&mut hasher);
    hasher.finish()
}

/// Every service family plus the policies that synthesize new ones on demand.
pub struct ServiceGraph {
    config: Config,
    families: RwLock<BTreeMap<TypeInfo, Arc<ServiceFamily>>>,
    named_wrappers: RwLock<BTreeMap<(TypeInfo, Arc<str>), Arc<Instance>>>,
    open_registrations: Vec<OpenRegistration>,
    decorators: Vec<Arc<Decorator>>,
    finalizers: BTreeMap<TypeInfo, BoxedFinalizer>,
    hashes: Mutex<BTreeMap<u64, (String, Option<TypeId>)>>,
    hasher: InstanceHasher,
}

impl ServiceGraph {
    pub(crate) fn new(registry: Registry, config: Config) -> Result<Self, GraphErrorKind> {
        Self::with_hasher(registry, config, instance_hash)
    }

    pub(crate) fn with_hasher(registry: Registry, config: Config, hasher: InstanceHasher) -> Result<Self, GraphErrorKind> {
        let Registry {
            registrations,
            open_registrations,
            decorators,
            finalizers,
        } = registry;

        let graph = Self {
            config,
            families: RwLock::default(),
            named_wrappers: RwLock::default(),
            open_registrations,
            decorators,
            finalizers,
            hashes: Mutex::default(),
            hasher,
        };

        let mut grouped: BTreeMap<TypeInfo, Vec<Registration>> = BTreeMap::new();
        for registration in registrations {
            grouped.entry(registration.service_type.clone()).or_default().push(registration);
        }

        let builder = InstanceBuilder::new(&graph);
        let mut families = BTreeMap::new();
        for (service_type, registrations) in grouped {
            let family = builder.family(&service_type, registrations)?;
            families.insert(service_type, Arc::new(family));
        }

        info!(families = families.len(), open = graph.open_registrations.len(), "Service graph built");

        *graph.families.write() = families;
        Ok(graph)
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Records the identity behind a hash. Two identities sharing one hash is a hard error.
    pub(crate) fn claim_hash(&self, instance: &Instance) -> Result<(), GraphErrorKind> {
        let identity = format!("{} ('{}')", instance.service_type, instance.name);
        let id = instance.service_type.id();
        let mut hashes = self.hashes.lock();
        match hashes.get(&instance.hash) {
            // distinct types may share a type name, their ids still differ
            Some((existing, existing_id)) if *existing != identity || matches!((existing_id, id), (Some(left), Some(right)) if left != &right) => {
                Err(GraphErrorKind::HashCollision {
                    hash: instance.hash,
                    first: existing.clone(),
                    second: identity,
                })
            }
            Some((_, existing_id)) => {
                if existing_id.is_none() && id.is_some() {
                    hashes.insert(instance.hash, (identity, id));
                }
                Ok(())
            }
            None => {
                hashes.insert(instance.hash, (identity, id));
                Ok(())
            }
        }
    }

    /// Family of `service_type`, synthesizing it from open generic or wrapper policies when needed.
    pub fn find_family(&self, service_type: &TypeInfo) -> Option<Arc<ServiceFamily>> {
        if let Some(family) = self.families.read().get(service_type) {
            return Some(family.clone());
        }

        let family = Arc::new(self.synthesize(service_type)?);
        let mut families = self.families.write();
        Some(families.entry(service_type.clone()).or_insert(family).clone())
    }

    pub fn find_default(&self, service_type: &TypeInfo) -> Option<Arc<Instance>> {
        self.find_family(service_type)?.default().cloned()
    }

    pub fn find_instance(&self, service_type: &TypeInfo, name: &str) -> Option<Arc<Instance>> {
        if let Some(instance) = self.find_family(service_type).and_then(|family| family.find(name).cloned()) {
            return Some(instance);
        }
        self.named_wrapper(service_type, name)
    }

    pub fn find_all(&self, service_type: &TypeInfo) -> Vec<Arc<Instance>> {
        self.find_family(service_type)
            .map(|family| family.instances().to_vec())
            .unwrap_or_default()
    }

    /// Whether `service_type` can be resolved, without synthesizing or building anything.
    pub fn could_resolve(&self, service_type: &TypeInfo) -> bool {
        if *service_type == TypeInfo::of::<Scope>() {
            return true;
        }
        if let Some(family) = self.families.read().get(service_type) {
            return !family.instances().is_empty();
        }
        self.could_synthesize(service_type)
    }

    /// Snapshot of every family created so far, ordered by service type.
    #[must_use]
    pub fn families(&self) -> Vec<Arc<ServiceFamily>> {
        self.families.read().values().cloned().collect()
    }

    /// Fails when building `instance` would require itself, following every non-deferred edge.
    pub(crate) fn ensure_acyclic(&self, instance: &Arc<Instance>) -> Result<(), PlanErrorKind> {
        let mut path = Vec::new();
        let mut done = BTreeSet::new();
        self.visit(instance, &mut path, &mut done)
    }

    fn visit(&self, instance: &Arc<Instance>, path: &mut Vec<Arc<Instance>>, done: &mut BTreeSet<usize>) -> Result<(), PlanErrorKind> {
        let key = Arc::as_ptr(instance) as usize;
        if done.contains(&key) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|visited| Arc::ptr_eq(visited, instance)) {
            let mut cycle: Vec<String> = path[start..].iter().map(|visited| visited.describe()).collect();
            cycle.push(instance.describe());
            return Err(PlanErrorKind::CyclicDependency { path: cycle });
        }

        path.push(instance.clone());
        let plan = instance.create_plan(self);
        for dependency in plan.edges() {
            self.visit(dependency, path, done)?;
        }
        path.pop();

        done.insert(key);
        Ok(())
    }
}
