use futures_core::future::BoxFuture;
use std::sync::Arc;

use crate::{
    any::Object, codegen::Program, errors::ResolveErrorKind, instance::Instance, quick_build::QuickBuilder, scope::Scope,
};

/// How an instance gets built once its plan is known.
#[derive(Clone)]
pub(crate) enum Resolver {
    /// Lowered frame chain of a compiled generated type.
    Compiled(Arc<Program>),
    /// Direct recursion over the instance plan.
    QuickBuild,
}

impl Resolver {
    #[inline]
    pub(crate) fn is_compiled(&self) -> bool {
        matches!(self, Self::Compiled(_))
    }

    pub(crate) fn build(&self, instance: &Arc<Instance>, scope: &Scope) -> Result<Object, ResolveErrorKind> {
        match self {
            Self::Compiled(program) => program.invoke(scope),
            Self::QuickBuild => QuickBuilder::new(scope).build(instance),
        }
    }

    pub(crate) fn build_async<'a>(&'a self, instance: &'a Arc<Instance>, scope: &'a Scope) -> BoxFuture<'a, Result<Object, ResolveErrorKind>> {
        match self {
            Self::Compiled(program) => program.invoke_async(scope),
            Self::QuickBuild => QuickBuilder::new(scope).build_async(instance),
        }
    }
}
