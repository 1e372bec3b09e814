use std::{collections::BTreeMap, sync::Arc};

use super::{DependencySource, Instance, InstanceKind, PlannedDependency};
use crate::{
    errors::PlanErrorKind,
    graph::ServiceGraph,
    lifetime::Lifetime,
    plan::{FrameOp, GeneratedMethod, Requirement, VariableId, VariableSource},
};

/// How an instance is turned into a variable of the method being planned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BuildMode {
    /// The instance the method is for. Always constructed in place.
    Build,
    /// A dependency found through the graph. Honors the instance lifetime.
    Dependency,
    /// A private dependency of one object, constructed in place and shared within the method.
    Inline,
}

/// Variables known while planning one method.
pub(crate) struct PlanVariables<'g> {
    graph: &'g ServiceGraph,
    scope: VariableId,
    fields: BTreeMap<u64, VariableId>,
    lookups: BTreeMap<u64, VariableId>,
    inline: BTreeMap<usize, VariableId>,
}

impl<'g> PlanVariables<'g> {
    pub(crate) fn new(graph: &'g ServiceGraph, scope: VariableId) -> Self {
        Self {
            graph,
            scope,
            fields: BTreeMap::new(),
            lookups: BTreeMap::new(),
            inline: BTreeMap::new(),
        }
    }
}

impl VariableSource for PlanVariables<'_> {
    fn find_or_create(&mut self, requirement: &Requirement, method: &mut GeneratedMethod) -> Result<VariableId, PlanErrorKind> {
        match requirement {
            Requirement::Scope => Ok(self.scope),
            Requirement::Instance { instance, mode } => instance.create_variable(*mode, self, method),
            Requirement::Absent { service_type } => {
                let frame = method.add_frame(FrameOp::Absent, false, Vec::new());
                Ok(method.add_created(frame, service_type.clone()))
            }
            Requirement::Service {
                service_type,
                name,
                optional,
            } => {
                let found = match name {
                    Some(name) => self.graph.find_instance(service_type, name),
                    None => self.graph.find_default(service_type),
                };
                match found {
                    Some(instance) => instance.create_variable(BuildMode::Dependency, self, method),
                    None if *optional => self.find_or_create(
                        &Requirement::Absent {
                            service_type: service_type.clone(),
                        },
                        method,
                    ),
                    None => Err(PlanErrorKind::UnresolvableVariable {
                        service: service_type.clone(),
                        name: name.as_ref().map(|name| name.to_string()),
                        method: method.name.clone(),
                    }),
                }
            }
        }
    }
}

impl PlannedDependency {
    fn requirement(&self) -> Requirement {
        match &self.source {
            DependencySource::Graph { named, .. } => Requirement::Service {
                service_type: self.parameter.service_type.clone(),
                name: named.clone(),
                optional: self.parameter.optional,
            },
            DependencySource::Inline(instance) | DependencySource::Decorated(instance) => Requirement::Instance {
                instance: instance.clone(),
                mode: BuildMode::Inline,
            },
            DependencySource::Scope => Requirement::Scope,
            DependencySource::Absent => Requirement::Absent {
                service_type: self.parameter.service_type.clone(),
            },
        }
    }
}

impl Instance {
    /// Returns the variable holding this instance in `method`, adding the frames that produce it.
    ///
    /// Singletons and supplied objects become fields, scoped instances a lookup in the scope,
    /// both shared within the method. Transients are constructed at every use.
    pub(crate) fn create_variable(
        self: &Arc<Self>,
        mode: BuildMode,
        variables: &mut PlanVariables<'_>,
        method: &mut GeneratedMethod,
    ) -> Result<VariableId, PlanErrorKind> {
        match mode {
            BuildMode::Build => self.build_frame(variables.graph, method),
            BuildMode::Inline => {
                let key = Arc::as_ptr(self) as usize;
                if let Some(variable) = variables.inline.get(&key) {
                    return Ok(*variable);
                }
                let variable = self.build_frame(variables.graph, method)?;
                variables.inline.insert(key, variable);
                Ok(variable)
            }
            BuildMode::Dependency => {
                let graph = variables.graph;
                if self.requires_quick_build(graph) {
                    if self.lifetime == Lifetime::Transient {
                        return Ok(self.quick_build_frame(graph, method));
                    }
                    return Ok(*variables
                        .lookups
                        .entry(self.hash)
                        .or_insert_with(|| self.quick_build_frame(graph, method)));
                }
                if matches!(self.kind, InstanceKind::Object(_)) || self.lifetime == Lifetime::Singleton {
                    if let Some(variable) = variables.fields.get(&self.hash) {
                        return Ok(*variable);
                    }
                    let variable = self.field_frame(graph, method);
                    variables.fields.insert(self.hash, variable);
                    return Ok(variable);
                }
                if self.lifetime == Lifetime::Scoped {
                    if let Some(variable) = variables.lookups.get(&self.hash) {
                        return Ok(*variable);
                    }
                    let frame = method.add_frame(
                        FrameOp::ScopedLookup { instance: self.clone() },
                        self.is_async(graph),
                        Vec::new(),
                    );
                    let variable = method.add_created(frame, self.service_type.clone());
                    variables.lookups.insert(self.hash, variable);
                    return Ok(variable);
                }
                self.build_frame(graph, method)
            }
        }
    }

    fn field_frame(self: &Arc<Self>, graph: &ServiceGraph, method: &mut GeneratedMethod) -> VariableId {
        method.add_field(self);
        let frame = method.add_frame(FrameOp::Field { instance: self.clone() }, self.is_async(graph), Vec::new());
        method.add_created(frame, self.service_type.clone())
    }

    fn quick_build_frame(self: &Arc<Self>, graph: &ServiceGraph, method: &mut GeneratedMethod) -> VariableId {
        let frame = method.add_frame(FrameOp::QuickBuild { instance: self.clone() }, self.is_async(graph), Vec::new());
        method.add_created(frame, self.service_type.clone())
    }

    /// Frames that construct this instance in place.
    fn build_frame(self: &Arc<Self>, graph: &ServiceGraph, method: &mut GeneratedMethod) -> Result<VariableId, PlanErrorKind> {
        match &self.kind {
            InstanceKind::Factory(_) | InstanceKind::Constructed(_) | InstanceKind::Decorated { .. } => {
                let plan = self.create_plan(graph);
                let Some(constructor) = plan.constructor.clone() else {
                    return Err(self.unbuildable(plan.errors.clone()));
                };
                let requirements = plan.dependencies.iter().map(PlannedDependency::requirement).collect();
                let is_async = constructor.is_async();
                let frame = method.add_frame(
                    FrameOp::Construct {
                        instance: self.clone(),
                        constructor,
                    },
                    is_async,
                    requirements,
                );
                Ok(method.add_created(frame, self.service_type.clone()))
            }
            InstanceKind::Object(_) => Ok(self.field_frame(graph, method)),
            InstanceKind::Collection { element_type, elements } => {
                let requirements = elements
                    .iter()
                    .map(|element| Requirement::Instance {
                        instance: element.clone(),
                        mode: BuildMode::Dependency,
                    })
                    .collect();
                let frame = method.add_frame(
                    FrameOp::Collect {
                        element_type: element_type.clone(),
                    },
                    false,
                    requirements,
                );
                Ok(method.add_created(frame, self.service_type.clone()))
            }
            InstanceKind::Lazy { .. } | InstanceKind::Provider { .. } => Ok(self.quick_build_frame(graph, method)),
        }
    }
}
