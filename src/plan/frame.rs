use std::{collections::BTreeSet, sync::Arc};

use super::VariableId;
use crate::{
    any::TypeInfo,
    instance::{BuildMode, Instance},
    lifetime::Lifetime,
    instantiator::Constructor,
};

pub(crate) type FrameId = usize;

#[derive(Clone)]
pub(crate) enum FrameOp {
    /// Calls the selected constructor of `instance`.
    Construct { instance: Arc<Instance>, constructor: Constructor },
    /// Reads a singleton or supplied object held by the generated type.
    Field { instance: Arc<Instance> },
    /// Looks up a scoped object in the requesting scope, building it there on first use.
    ScopedLookup { instance: Arc<Instance> },
    /// Defers to the quick builder for instances that can't be compiled.
    QuickBuild { instance: Arc<Instance> },
    /// Gathers built elements into a `Many<T>`.
    Collect { element_type: TypeInfo },
    /// Placeholder for an unresolved optional parameter.
    Absent,
}

impl FrameOp {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Construct { instance, constructor } => format!("construct {} via {}", instance.describe(), constructor.label()),
            Self::Field { instance } => format!("field {}", instance.describe()),
            Self::ScopedLookup { instance } => format!("scoped lookup {}", instance.describe()),
            Self::QuickBuild { instance } => format!("quick build {}", instance.describe()),
            Self::Collect { element_type } => format!("collect {}", element_type.short_name()),
            Self::Absent => "absent".to_owned(),
        }
    }
}

/// What a frame needs before it can run.
#[derive(Clone)]
pub(crate) enum Requirement {
    /// Default instance of `service_type`, or the named one.
    Service {
        service_type: TypeInfo,
        name: Option<Arc<str>>,
        optional: bool,
    },
    /// A specific instance built in the given mode.
    Instance { instance: Arc<Instance>, mode: BuildMode },
    /// Value that is deliberately not provided.
    Absent { service_type: TypeInfo },
    /// The scope argument of the method.
    Scope,
}

/// One step of a generated method.
#[derive(Clone)]
pub(crate) struct Frame {
    pub(crate) op: FrameOp,
    pub(crate) is_async: bool,
    /// Whether the frame encloses the frames after it, like a `using` block.
    /// Transients with a finalizer are registered with the scope, which sets a disposal boundary.
    pub(crate) wraps: bool,
    pub(crate) creates: Vec<VariableId>,
    pub(crate) requirements: Vec<Requirement>,
    pub(crate) uses: Vec<VariableId>,
    pub(crate) uses_resolved: bool,
    pub(crate) dependencies: BTreeSet<super::FrameId>,
}

impl Frame {
    #[must_use]
    pub(crate) fn new(op: FrameOp, is_async: bool, requirements: Vec<Requirement>) -> Self {
        let wraps = matches!(&op, FrameOp::Construct { instance, .. } if instance.lifetime == Lifetime::Transient && instance.finalizer.is_some());
        Self {
            op,
            is_async,
            wraps,
            creates: Vec::new(),
            requirements,
            uses: Vec::new(),
            uses_resolved: false,
            dependencies: BTreeSet::new(),
        }
    }
}
