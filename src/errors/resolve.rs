use core::any::TypeId;

use super::{plan::named, BuildErrorKind, CompileErrorKind, InstantiateErrorKind, InstantiatorErrorKind, PlanErrorKind};
use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No instance registered for {service}{}", named(.name))]
    NoInstance { service: TypeInfo, name: Option<String> },
    #[error("Scope is disposed")]
    ScopeDisposed,
    #[error("Incorrect instance type. Actual: {actual:?}, expected: {expected}")]
    IncorrectType { expected: TypeInfo, actual: TypeId },
    #[error("Missing argument #{index} of type {expected}")]
    MissingArgument { index: usize, expected: TypeInfo },
    #[error("{service} named '{name}' has an asynchronous build plan and must be resolved asynchronously")]
    AsyncRequired { service: TypeInfo, name: String },
    #[error(transparent)]
    Build(#[from] BuildErrorKind),
    #[error(transparent)]
    Instantiator(InstantiatorErrorKind<Box<ResolveErrorKind>, InstantiateErrorKind>),
}

impl From<PlanErrorKind> for ResolveErrorKind {
    fn from(err: PlanErrorKind) -> Self {
        Self::Build(err.into())
    }
}

impl From<CompileErrorKind> for ResolveErrorKind {
    fn from(err: CompileErrorKind) -> Self {
        Self::Build(err.into())
    }
}

impl From<InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>> for ResolveErrorKind {
    fn from(err: InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>) -> Self {
        match err {
            InstantiatorErrorKind::Deps(err) => Self::Instantiator(InstantiatorErrorKind::Deps(Box::new(err))),
            InstantiatorErrorKind::Factory(err) => Self::Instantiator(InstantiatorErrorKind::Factory(err)),
        }
    }
}
