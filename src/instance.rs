mod selection;
mod variables;

use core::fmt::{self, Debug, Formatter};
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::{
    any::{Object, TypeInfo},
    codegen::{Compiler, GeneratedAssembly, GeneratedType},
    decorator::Decorator,
    dependency_resolver::Parameter,
    errors::{BuildErrorKind, PlanErrorKind},
    finalizer::BoxedFinalizer,
    graph::ServiceGraph,
    instantiator::Constructor,
    lifetime::Lifetime,
    plan::GeneratedMethod,
    resolver::Resolver,
    scope::Scope,
};

pub(crate) use variables::{BuildMode, PlanVariables};

/// How an instance produces its object.
pub(crate) enum InstanceKind {
    Factory(Constructor),
    Constructed(Vec<Constructor>),
    Object(Object),
    /// Every instance of `element_type`, in registration order.
    Collection {
        element_type: TypeInfo,
        elements: Vec<Arc<Instance>>,
    },
    /// Deferred single resolution of `target`.
    Lazy {
        target: TypeInfo,
        name: Option<Arc<str>>,
    },
    /// Repeatable resolution of `target`.
    Provider { target: TypeInfo },
    Decorated {
        inner: Arc<Instance>,
        decorator: Arc<Decorator>,
    },
}

impl InstanceKind {
    fn describe(&self) -> &'static str {
        match self {
            Self::Factory(_) => "factory",
            Self::Constructed(_) => "constructor",
            Self::Object(_) => "object",
            Self::Collection { .. } => "collection",
            Self::Lazy { .. } => "lazy",
            Self::Provider { .. } => "provider",
            Self::Decorated { .. } => "decorator",
        }
    }
}

/// Where the value of one constructor parameter comes from.
#[derive(Clone)]
pub(crate) enum DependencySource {
    /// Family default, or the named instance when `named` is set.
    Graph {
        instance: Arc<Instance>,
        named: Option<Arc<str>>,
    },
    /// Private instance built in place for this object.
    Inline(Arc<Instance>),
    /// The instance wrapped by a decorator.
    Decorated(Arc<Instance>),
    /// The requesting scope itself.
    Scope,
    /// Unresolvable optional or ignorable parameter.
    Absent,
}

#[derive(Clone)]
pub(crate) struct PlannedDependency {
    pub(crate) parameter: Parameter,
    pub(crate) source: DependencySource,
}

impl PlannedDependency {
    pub(crate) fn instance(&self) -> Option<&Arc<Instance>> {
        match &self.source {
            DependencySource::Graph { instance, .. } | DependencySource::Inline(instance) | DependencySource::Decorated(instance) => {
                Some(instance)
            }
            DependencySource::Scope | DependencySource::Absent => None,
        }
    }
}

/// Result of planning an instance: the selected constructor and how each of its parameters is satisfied.
///
/// Planning never recurses into the plans of dependencies.
#[derive(Clone, Default)]
pub(crate) struct InstancePlan {
    pub(crate) constructor: Option<Constructor>,
    pub(crate) dependencies: Vec<PlannedDependency>,
    pub(crate) errors: Vec<String>,
}

impl InstancePlan {
    #[inline]
    pub(crate) fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn edges(&self) -> impl Iterator<Item = &Arc<Instance>> {
        self.dependencies.iter().filter_map(PlannedDependency::instance)
    }
}

/// A resolvable unit of the service graph.
pub struct Instance {
    pub(crate) service_type: TypeInfo,
    pub(crate) name: Arc<str>,
    pub(crate) implementation: Option<TypeInfo>,
    pub(crate) lifetime: Lifetime,
    pub(crate) kind: InstanceKind,
    pub(crate) is_default: bool,
    pub(crate) finalizer: Option<BoxedFinalizer>,
    pub(crate) named_dependencies: Vec<(TypeInfo, Arc<str>)>,
    pub(crate) inline_dependencies: Vec<Arc<Instance>>,
    pub(crate) hash: u64,
    plan: OnceCell<Arc<InstancePlan>>,
    method: OnceCell<Result<Arc<GeneratedMethod>, PlanErrorKind>>,
    resolver: OnceCell<Result<Resolver, BuildErrorKind>>,
    is_async: OnceCell<bool>,
}

impl Instance {
    pub(crate) fn new(service_type: TypeInfo, name: Arc<str>, lifetime: Lifetime, kind: InstanceKind, hash: u64) -> Self {
        let lifetime = if matches!(kind, InstanceKind::Object(_)) {
            Lifetime::Singleton
        } else {
            lifetime
        };
        Self {
            service_type,
            name,
            implementation: None,
            lifetime,
            kind,
            is_default: false,
            finalizer: None,
            named_dependencies: Vec::new(),
            inline_dependencies: Vec::new(),
            hash,
            plan: OnceCell::new(),
            method: OnceCell::new(),
            resolver: OnceCell::new(),
            is_async: OnceCell::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn service_type(&self) -> &TypeInfo {
        &self.service_type
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn implementation(&self) -> Option<&TypeInfo> {
        self.implementation.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    #[inline]
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Identity key of the instance inside scope stores.
    #[inline]
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        self.kind.describe()
    }

    pub(crate) fn describe(&self) -> String {
        format!("{} ('{}')", self.service_type.short_name(), self.name)
    }

    pub(crate) fn inline_for(&self, service_type: &TypeInfo) -> Option<&Arc<Instance>> {
        self.inline_dependencies
            .iter()
            .find(|instance| &instance.service_type == service_type)
    }

    pub(crate) fn named_for(&self, service_type: &TypeInfo) -> Option<&Arc<str>> {
        self.named_dependencies
            .iter()
            .find_map(|(ty, name)| (ty == service_type).then_some(name))
    }

    /// Selects the constructor and dependency sources once. Later calls return the cached plan.
    pub(crate) fn create_plan(&self, graph: &ServiceGraph) -> Arc<InstancePlan> {
        self.plan.get_or_init(|| Arc::new(selection::plan(self, graph))).clone()
    }

    pub(crate) fn unbuildable(&self, errors: Vec<String>) -> PlanErrorKind {
        PlanErrorKind::Unbuildable {
            service: self.service_type.clone(),
            name: self.name.to_string(),
            errors,
        }
    }

    /// Whether the build plan awaits anything.
    pub(crate) fn is_async(&self, graph: &ServiceGraph) -> bool {
        *self.is_async.get_or_init(|| match &self.kind {
            InstanceKind::Object(_) | InstanceKind::Lazy { .. } | InstanceKind::Provider { .. } => false,
            InstanceKind::Collection { elements, .. } => elements.iter().any(|element| element.is_async(graph)),
            InstanceKind::Factory(_) | InstanceKind::Constructed(_) | InstanceKind::Decorated { .. } => {
                let plan = self.create_plan(graph);
                plan.constructor.as_ref().is_some_and(Constructor::is_async) || plan.edges().any(|dependency| dependency.is_async(graph))
            }
        })
    }

    /// Instances that can't be compiled into a frame chain and are built by direct recursion instead.
    pub(crate) fn requires_quick_build(&self, graph: &ServiceGraph) -> bool {
        match &self.kind {
            InstanceKind::Lazy { .. } | InstanceKind::Provider { .. } => true,
            InstanceKind::Object(_) | InstanceKind::Collection { .. } => false,
            InstanceKind::Factory(_) | InstanceKind::Constructed(_) | InstanceKind::Decorated { .. } => {
                let plan = self.create_plan(graph);
                plan.dependencies.iter().any(|dependency| match &dependency.source {
                    DependencySource::Scope => true,
                    DependencySource::Inline(instance) | DependencySource::Decorated(instance) => instance.requires_quick_build(graph),
                    DependencySource::Graph { .. } | DependencySource::Absent => false,
                })
            }
        }
    }

    /// Builds and arranges the frame chain that produces this instance. Cached, including failures.
    pub(crate) fn build_method(self: &Arc<Self>, graph: &ServiceGraph) -> Result<Arc<GeneratedMethod>, PlanErrorKind> {
        self.method
            .get_or_init(|| {
                let plan = self.create_plan(graph);
                if !plan.is_valid() {
                    return Err(self.unbuildable(plan.errors.clone()));
                }
                graph.ensure_acyclic(self)?;

                let mut method = GeneratedMethod::new(format!("build_{}", self.service_type.variable_name()));
                let scope = method.add_argument(TypeInfo::of::<Scope>(), "scope");
                let mut variables = PlanVariables::new(graph, scope);
                let root = self.create_variable(BuildMode::Build, &mut variables, &mut method)?;
                method.set_return(root);
                crate::plan::arrange(&mut method, &mut variables)?;
                Ok(Arc::new(method))
            })
            .clone()
    }

    pub(crate) fn generated_type(self: &Arc<Self>, graph: &ServiceGraph) -> Result<GeneratedType, PlanErrorKind> {
        let method = self.build_method(graph)?;
        Ok(GeneratedType::new(self.resolver_type_name(), self.clone(), method))
    }

    #[inline]
    pub(crate) fn resolver_type_name(&self) -> String {
        format!("Resolver{:016x}", self.hash)
    }

    /// Checks the plan and picks how this instance gets built: a compiled frame chain or quick build.
    pub(crate) fn resolver(self: &Arc<Self>, graph: &ServiceGraph) -> Result<Resolver, BuildErrorKind> {
        self.resolver.get_or_init(|| self.create_resolver(graph)).clone()
    }

    fn create_resolver(self: &Arc<Self>, graph: &ServiceGraph) -> Result<Resolver, BuildErrorKind> {
        let plan = self.create_plan(graph);
        if !plan.is_valid() {
            return Err(self.unbuildable(plan.errors.clone()).into());
        }
        graph.ensure_acyclic(self)?;

        if !graph.config().compile || self.requires_quick_build(graph) {
            return Ok(Resolver::QuickBuild);
        }

        let mut assembly = GeneratedAssembly::new();
        assembly.add_type(self.generated_type(graph)?);
        let compiled = Compiler::compile(&assembly)?;
        Ok(Resolver::Compiled(compiled.program(&self.resolver_type_name())?))
    }

    /// Stores a resolver compiled ahead of time. Returns `false` when one was already set.
    pub(crate) fn attach_resolver(&self, resolver: Resolver) -> bool {
        self.resolver.set(Ok(resolver)).is_ok()
    }

    #[inline]
    pub(crate) fn has_resolver(&self) -> bool {
        self.resolver.get().is_some()
    }

    /// Whether the instance is built by a compiled program. `false` until its resolver is created.
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        matches!(self.resolver.get(), Some(Ok(resolver)) if resolver.is_compiled())
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("service_type", &self.service_type)
            .field("name", &self.name)
            .field("implementation", &self.implementation)
            .field("lifetime", &self.lifetime)
            .field("kind", &self.kind.describe())
            .field("hash", &format_args!("{:#018x}", self.hash))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use tracing_test::traced_test;

    use super::InstanceKind;
    use crate::{
        any::TypeInfo,
        config::Config,
        errors::InstantiateErrorKind,
        graph::ServiceGraph,
        inject::Inject,
        instantiator::Constructors,
        lifetime::Lifetime,
        plan::{FrameOp, GeneratedMethod},
        registry::Registry,
        scope::Scope,
        wrappers::Lazy,
    };

    struct Missing;
    struct Wheel;
    struct Axle(#[allow(dead_code)] Arc<Wheel>, #[allow(dead_code)] Arc<Wheel>);
    struct Session;
    struct Pair(#[allow(dead_code)] Arc<Session>, #[allow(dead_code)] Arc<Session>);
    struct Clock;
    struct Twins(#[allow(dead_code)] Arc<Clock>, #[allow(dead_code)] Arc<Clock>);

    fn count(method: &GeneratedMethod, predicate: impl Fn(&FrameOp) -> bool) -> usize {
        method.frames.iter().filter(|frame| predicate(&frame.op)).count()
    }

    fn graph(registry: Registry) -> ServiceGraph {
        ServiceGraph::new(registry, Config::default()).unwrap()
    }

    #[test]
    #[traced_test]
    fn test_unresolvable_constructors_collect_errors() {
        struct Needy;

        let graph = graph(Registry::new().construct(
            Constructors::<Needy>::new()
                .with("first", |Inject(_): Inject<Missing>| Ok::<_, InstantiateErrorKind>(Needy))
                .with("second", |Inject(_): Inject<Missing>, Inject(_): Inject<Wheel>| Ok::<_, InstantiateErrorKind>(Needy)),
            Lifetime::Transient,
        ));
        let instance = graph.find_default(&TypeInfo::of::<Needy>()).unwrap();
        let plan = instance.create_plan(&graph);

        assert!(plan.constructor.is_none());
        assert_eq!(plan.errors.len(), 2);
        assert!(plan.errors[0].starts_with("Constructor 'first'"));
        assert!(plan.errors[1].contains("Missing") && plan.errors[1].contains("Wheel"));
        assert!(instance.build_method(&graph).is_err());
    }

    #[test]
    fn test_no_constructors_declared() {
        struct Bare;

        let graph = graph(Registry::new().construct(Constructors::<Bare>::new(), Lifetime::Transient));
        let instance = graph.find_default(&TypeInfo::of::<Bare>()).unwrap();

        let plan = instance.create_plan(&graph);
        assert!(!plan.is_valid());
        assert!(plan.errors[0].starts_with("No constructors declared"));
    }

    #[test]
    fn test_supplied_object_is_singleton() {
        let graph = graph(Registry::new().instance(Wheel));
        let instance = graph.find_default(&TypeInfo::of::<Wheel>()).unwrap();

        assert!(matches!(instance.kind, InstanceKind::Object(_)));
        assert_eq!(instance.lifetime(), Lifetime::Singleton);
    }

    #[test]
    #[traced_test]
    fn test_transient_dependency_inlined_per_use() {
        let graph = graph(
            Registry::new()
                .provide(|| Ok::<_, InstantiateErrorKind>(Wheel), Lifetime::Transient)
                .provide(
                    |Inject(left): Inject<Wheel>, Inject(right): Inject<Wheel>| Ok::<_, InstantiateErrorKind>(Axle(left, right)),
                    Lifetime::Transient,
                ),
        );
        let method = graph.find_default(&TypeInfo::of::<Axle>()).unwrap().build_method(&graph).unwrap();

        assert_eq!(count(&method, |op| matches!(op, FrameOp::Construct { .. })), 3);
        let (_, last) = method.chain().last().unwrap();
        assert!(matches!(&last.op, FrameOp::Construct { instance, .. } if instance.service_type() == &TypeInfo::of::<Axle>()));
    }

    #[test]
    fn test_scoped_dependency_looked_up_once() {
        let graph = graph(
            Registry::new()
                .provide(|| Ok::<_, InstantiateErrorKind>(Session), Lifetime::Scoped)
                .provide(
                    |Inject(first): Inject<Session>, Inject(second): Inject<Session>| Ok::<_, InstantiateErrorKind>(Pair(first, second)),
                    Lifetime::Transient,
                ),
        );
        let method = graph.find_default(&TypeInfo::of::<Pair>()).unwrap().build_method(&graph).unwrap();

        assert_eq!(count(&method, |op| matches!(op, FrameOp::ScopedLookup { .. })), 1);
        assert_eq!(count(&method, |op| matches!(op, FrameOp::Construct { .. })), 1);
    }

    #[test]
    fn test_singleton_dependency_becomes_field() {
        let graph = graph(
            Registry::new()
                .provide(|| Ok::<_, InstantiateErrorKind>(Clock), Lifetime::Singleton)
                .provide(
                    |Inject(first): Inject<Clock>, Inject(second): Inject<Clock>| Ok::<_, InstantiateErrorKind>(Twins(first, second)),
                    Lifetime::Transient,
                ),
        );
        let method = graph.find_default(&TypeInfo::of::<Twins>()).unwrap().build_method(&graph).unwrap();

        assert_eq!(count(&method, |op| matches!(op, FrameOp::Field { .. })), 1);
        assert_eq!(method.fields.len(), 1);
    }

    #[test]
    fn test_scope_and_wrapper_dependencies_need_quick_build() {
        struct Probe;
        struct Holder(#[allow(dead_code)] Lazy<Wheel>);

        let graph = graph(
            Registry::new()
                .provide(|| Ok::<_, InstantiateErrorKind>(Wheel), Lifetime::Transient)
                .provide(|_: Scope| Ok::<_, InstantiateErrorKind>(Probe), Lifetime::Transient)
                .provide(|lazy: Lazy<Wheel>| Ok::<_, InstantiateErrorKind>(Holder(lazy)), Lifetime::Transient),
        );

        let probe = graph.find_default(&TypeInfo::of::<Probe>()).unwrap();
        assert!(probe.requires_quick_build(&graph));

        let holder = graph.find_default(&TypeInfo::of::<Holder>()).unwrap();
        assert!(!holder.requires_quick_build(&graph));
        let method = holder.build_method(&graph).unwrap();
        assert_eq!(count(&method, |op| matches!(op, FrameOp::QuickBuild { .. })), 1);
    }
}
