use std::{collections::BTreeSet, sync::Arc};

use super::{Frame, FrameId, FrameOp, Requirement, Variable, VariableId};
use crate::{any::TypeInfo, instance::Instance};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum PlanState {
    Unresolved,
    VariablesResolved,
    DependenciesGathered,
    TopologicallySorted,
    Linked,
}

impl PlanState {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Unresolved => "Unresolved",
            Self::VariablesResolved => "VariablesResolved",
            Self::DependenciesGathered => "DependenciesGathered",
            Self::TopologicallySorted => "TopologicallySorted",
            Self::Linked => "Linked",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AsyncMode {
    Synchronous,
    /// Exactly one async frame and it's the last one: its future is returned as is.
    TailAsync,
    AsyncWrapped,
}

/// Arena of frames and variables making up one build method.
#[derive(Clone)]
pub(crate) struct GeneratedMethod {
    pub(crate) name: String,
    pub(crate) frames: Vec<Frame>,
    pub(crate) variables: Vec<Variable>,
    pub(crate) arguments: Vec<VariableId>,
    pub(crate) requested: Vec<FrameId>,
    pub(crate) return_variable: Option<VariableId>,
    /// Singletons and supplied objects read through fields of the generated type.
    pub(crate) fields: Vec<Arc<Instance>>,
    pub(crate) state: PlanState,
    pub(crate) sorted: Vec<FrameId>,
    pub(crate) head: Option<FrameId>,
    pub(crate) next: Vec<Option<FrameId>>,
    pub(crate) async_mode: AsyncMode,
}

impl GeneratedMethod {
    #[must_use]
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: Vec::new(),
            variables: Vec::new(),
            arguments: Vec::new(),
            requested: Vec::new(),
            return_variable: None,
            fields: Vec::new(),
            state: PlanState::Unresolved,
            sorted: Vec::new(),
            head: None,
            next: Vec::new(),
            async_mode: AsyncMode::Synchronous,
        }
    }

    fn unique_usage(&self, base: &str) -> String {
        let taken = |usage: &str| self.variables.iter().any(|variable| variable.usage == usage);
        if !taken(base) {
            return base.to_owned();
        }
        (2..)
            .map(|index| format!("{base}{index}"))
            .find(|usage| !taken(usage))
            .unwrap_or_else(|| base.to_owned())
    }

    pub(crate) fn add_argument(&mut self, ty: TypeInfo, usage: &str) -> VariableId {
        let usage = self.unique_usage(usage);
        self.variables.push(Variable {
            ty,
            usage,
            creator: None,
            dependencies: Vec::new(),
            frames: BTreeSet::new(),
        });
        let id = self.variables.len() - 1;
        self.arguments.push(id);
        id
    }

    /// Adds a frame. New frames are discovered by the arranger, so adding doesn't request them.
    pub(crate) fn add_frame(&mut self, op: FrameOp, is_async: bool, requirements: Vec<Requirement>) -> FrameId {
        self.frames.push(Frame::new(op, is_async, requirements));
        self.next.push(None);
        self.frames.len() - 1
    }

    /// Adds a variable created by `frame`, keeping both sides of the creator link in sync.
    pub(crate) fn add_created(&mut self, frame: FrameId, ty: TypeInfo) -> VariableId {
        let usage = self.unique_usage(&ty.variable_name());
        self.variables.push(Variable {
            ty,
            usage,
            creator: Some(frame),
            dependencies: Vec::new(),
            frames: BTreeSet::new(),
        });
        let id = self.variables.len() - 1;
        self.frames[frame].creates.push(id);
        id
    }

    pub(crate) fn request(&mut self, frame: FrameId) {
        if !self.requested.contains(&frame) {
            self.requested.push(frame);
        }
    }

    /// Sets the value the method returns and requests the frame creating it.
    pub(crate) fn set_return(&mut self, variable: VariableId) {
        self.return_variable = Some(variable);
        if let Some(creator) = self.variables[variable].creator {
            self.request(creator);
        }
    }

    pub(crate) fn add_field(&mut self, instance: &Arc<Instance>) -> usize {
        if let Some(index) = self.fields.iter().position(|field| Arc::ptr_eq(field, instance)) {
            return index;
        }
        self.fields.push(instance.clone());
        self.fields.len() - 1
    }

    pub(crate) fn field_index(&self, instance: &Arc<Instance>) -> Option<usize> {
        self.fields.iter().position(|field| Arc::ptr_eq(field, instance))
    }

    /// Frames in execution order, following the linked chain.
    pub(crate) fn chain(&self) -> Chain<'_> {
        Chain {
            method: self,
            current: self.head,
        }
    }

    pub(crate) fn frame_label(&self, frame: FrameId) -> String {
        let creates: Vec<&str> = self.frames[frame]
            .creates
            .iter()
            .map(|variable| self.variables[*variable].usage.as_str())
            .collect();
        format!("{} -> [{}]", self.frames[frame].op.describe(), creates.join(", "))
    }
}

pub(crate) struct Chain<'a> {
    method: &'a GeneratedMethod,
    current: Option<FrameId>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = (FrameId, &'a Frame);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.method.next[current];
        Some((current, &self.method.frames[current]))
    }
}
