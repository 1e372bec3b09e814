use std::collections::BTreeSet;

use super::FrameId;
use crate::any::TypeInfo;

pub(crate) type VariableId = usize;

/// Named value flowing between frames.
#[derive(Debug, Clone)]
pub(crate) struct Variable {
    pub(crate) ty: TypeInfo,
    /// Identifier in generated source, unique within its method.
    pub(crate) usage: String,
    /// `None` for method arguments.
    pub(crate) creator: Option<FrameId>,
    pub(crate) dependencies: Vec<VariableId>,
    /// Creator plus its transitive frame dependencies, filled in by the arranger.
    pub(crate) frames: BTreeSet<FrameId>,
}
