use core::fmt::Write as _;
use std::sync::Arc;

use crate::{
    any::TypeInfo,
    codegen::SourceWriter,
    graph::{ServiceFamily, ServiceGraph},
    instance::Instance,
};

/// What [`Container::what_do_i_have`](crate::Container::what_do_i_have) puts in its report.
#[derive(Debug, Clone, Default)]
pub struct WhatDoIHaveOptions {
    /// Only report families of this service type
    pub service_type: Option<TypeInfo>,
    /// Only report families whose service type belongs to this crate
    pub assembly: Option<String>,
    /// Append the generated build plan of every instance
    pub build_plans: bool,
}

impl WhatDoIHaveOptions {
    #[must_use]
    pub fn for_service<T: ?Sized + 'static>() -> Self {
        Self {
            service_type: Some(TypeInfo::of::<T>()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_build_plans(mut self) -> Self {
        self.build_plans = true;
        self
    }

    fn matches(&self, family: &ServiceFamily) -> bool {
        self.service_type.as_ref().map_or(true, |ty| ty == family.service_type())
            && self.assembly.as_deref().map_or(true, |assembly| family.service_type().assembly() == assembly)
    }
}

fn describe_instance(report: &mut String, instance: &Instance, is_default: bool) {
    let marker = if is_default { "default" } else { "alternate" };
    let _ = write!(
        report,
        "  - '{}' [{marker}] {} {}",
        instance.name(),
        instance.lifetime(),
        instance.kind_name()
    );
    if let Some(implementation) = instance.implementation() {
        let _ = write!(report, " -> {implementation}");
    }
    if instance.is_compiled() {
        report.push_str(" (compiled)");
    }
    report.push('\n');
}

/// Generated source of one instance, or the reason there is none.
pub(crate) fn build_plan(instance: &Arc<Instance>, graph: &ServiceGraph) -> String {
    if instance.requires_quick_build(graph) {
        return format!("// {} is built without a compiled plan\n", instance.describe());
    }
    match instance.generated_type(graph) {
        Ok(generated) => {
            let mut writer = SourceWriter::new();
            generated.render(&mut writer);
            writer.build()
        }
        Err(err) => format!("// {err}\n"),
    }
}

pub(crate) fn report(graph: &ServiceGraph, options: &WhatDoIHaveOptions) -> String {
    let families: Vec<_> = graph.families().into_iter().filter(|family| options.matches(family)).collect();

    let mut report = String::new();
    let _ = writeln!(report, "{} service families", families.len());
    for family in &families {
        let default = family.default();
        let _ = writeln!(report, "{}", family.service_type());
        for instance in family.instances() {
            let is_default = default.is_some_and(|default| Arc::ptr_eq(default, instance));
            describe_instance(&mut report, instance, is_default);
            if options.build_plans {
                for line in build_plan(instance, graph).lines() {
                    let _ = writeln!(report, "      {line}");
                }
            }
        }
    }
    report
}

