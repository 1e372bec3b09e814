use super::{CompileErrorKind, PlanErrorKind};

/// Failure to turn an instance into a resolver. Cached on the instance, so it's cheap to clone.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildErrorKind {
    #[error(transparent)]
    Plan(#[from] PlanErrorKind),
    #[error(transparent)]
    Compile(#[from] CompileErrorKind),
}
