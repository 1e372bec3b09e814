use std::sync::Arc;
use tracing::debug;

use super::{DependencySource, Instance, InstanceKind, InstancePlan, PlannedDependency};
use crate::{
    any::TypeInfo, dependency_resolver::Parameter, errors::named, graph::ServiceGraph, instantiator::Constructor, scope::Scope,
};

pub(super) fn plan(instance: &Instance, graph: &ServiceGraph) -> InstancePlan {
    match &instance.kind {
        InstanceKind::Factory(constructor) => select(instance, graph, core::slice::from_ref(constructor)),
        InstanceKind::Constructed(constructors) if constructors.is_empty() => InstancePlan {
            errors: vec![format!(
                "No constructors declared for {}",
                instance.implementation.as_ref().unwrap_or(&instance.service_type)
            )],
            ..InstancePlan::default()
        },
        InstanceKind::Constructed(constructors) => select(instance, graph, constructors),
        InstanceKind::Decorated { decorator, .. } => select(instance, graph, core::slice::from_ref(&decorator.constructor)),
        InstanceKind::Collection { element_type, elements } => InstancePlan {
            dependencies: elements
                .iter()
                .map(|element| PlannedDependency {
                    parameter: Parameter::required(element_type.clone()),
                    source: DependencySource::Graph {
                        instance: element.clone(),
                        named: Some(element.name.clone()),
                    },
                })
                .collect(),
            ..InstancePlan::default()
        },
        InstanceKind::Object(_) | InstanceKind::Lazy { .. } | InstanceKind::Provider { .. } => InstancePlan::default(),
    }
}

struct Candidate<'a> {
    constructor: &'a Constructor,
    resolvable: usize,
    unresolvable: Vec<&'a Parameter>,
}

/// Picks the constructor to build `instance` with.
///
/// Candidates whose unresolvable parameters are all optional come first. Only when there are none,
/// parameters of ignorable types are tolerated too. Among candidates, an explicitly marked default wins,
/// then the most resolvable parameters, then declaration order.
fn select(instance: &Instance, graph: &ServiceGraph, constructors: &[Constructor]) -> InstancePlan {
    let candidates: Vec<Candidate<'_>> = constructors
        .iter()
        .map(|constructor| {
            let unresolvable: Vec<_> = constructor
                .parameters()
                .iter()
                .filter(|parameter| !can_resolve(instance, graph, parameter))
                .collect();
            Candidate {
                constructor,
                resolvable: constructor.parameters().len() - unresolvable.len(),
                unresolvable,
            }
        })
        .collect();

    let strict: Vec<&Candidate<'_>> = candidates
        .iter()
        .filter(|candidate| candidate.unresolvable.iter().all(|parameter| parameter.optional))
        .collect();
    let pool = if strict.is_empty() {
        candidates
            .iter()
            .filter(|candidate| {
                candidate
                    .unresolvable
                    .iter()
                    .all(|parameter| parameter.optional || graph.config().is_ignorable(&parameter.service_type))
            })
            .collect()
    } else {
        strict
    };

    let Some(selected) = choose(&pool) else {
        return InstancePlan {
            errors: candidates.iter().map(|candidate| describe_failure(instance, candidate)).collect(),
            ..InstancePlan::default()
        };
    };

    debug!(
        service = %instance.service_type,
        name = %instance.name,
        constructor = selected.label(),
        "Constructor selected"
    );

    InstancePlan {
        constructor: Some(selected.clone()),
        dependencies: selected
            .parameters()
            .iter()
            .map(|parameter| PlannedDependency {
                parameter: parameter.clone(),
                source: source_of(instance, graph, parameter),
            })
            .collect(),
        errors: Vec::new(),
    }
}

fn choose<'a>(pool: &[&Candidate<'a>]) -> Option<&'a Constructor> {
    if let Some(candidate) = pool.iter().find(|candidate| candidate.constructor.is_default) {
        return Some(candidate.constructor);
    }

    let mut best: Option<&Candidate<'a>> = None;
    for candidate in pool {
        if best.map_or(true, |best| candidate.resolvable > best.resolvable) {
            best = Some(candidate);
        }
    }
    best.map(|candidate| candidate.constructor)
}

fn describe_failure(instance: &Instance, candidate: &Candidate<'_>) -> String {
    let parameters: Vec<String> = candidate
        .unresolvable
        .iter()
        .map(|parameter| {
            let name = instance.named_for(&parameter.service_type).map(|name| name.to_string());
            format!("{}{}", parameter.service_type, named(&name))
        })
        .collect();
    format!(
        "Constructor '{}' has unresolvable parameters: {}",
        candidate.constructor.label(),
        parameters.join(", ")
    )
}

fn is_scope(service_type: &TypeInfo) -> bool {
    *service_type == TypeInfo::of::<Scope>()
}

fn can_resolve(instance: &Instance, graph: &ServiceGraph, parameter: &Parameter) -> bool {
    if parameter.decorated {
        return matches!(&instance.kind, InstanceKind::Decorated { inner, .. } if inner.service_type == parameter.service_type);
    }
    if is_scope(&parameter.service_type) || instance.inline_for(&parameter.service_type).is_some() {
        return true;
    }
    match instance.named_for(&parameter.service_type) {
        Some(name) => graph.find_instance(&parameter.service_type, name).is_some(),
        None => graph.could_resolve(&parameter.service_type),
    }
}

fn source_of(instance: &Instance, graph: &ServiceGraph, parameter: &Parameter) -> DependencySource {
    if parameter.decorated {
        if let InstanceKind::Decorated { inner, .. } = &instance.kind {
            return DependencySource::Decorated(inner.clone());
        }
    }
    if is_scope(&parameter.service_type) {
        return DependencySource::Scope;
    }
    if let Some(inline) = instance.inline_for(&parameter.service_type) {
        return DependencySource::Inline(inline.clone());
    }

    let named: Option<Arc<str>> = instance.named_for(&parameter.service_type).cloned();
    let found = match &named {
        Some(name) => graph.find_instance(&parameter.service_type, name),
        None => graph.find_default(&parameter.service_type),
    };
    match found {
        Some(found) => DependencySource::Graph { instance: found, named },
        None => DependencySource::Absent,
    }
}
