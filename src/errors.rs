mod build;
mod compile;
mod graph;
mod instantiate;
mod instantiator;
mod plan;
mod resolve;
mod scope;

pub use build::BuildErrorKind;
pub use compile::CompileErrorKind;
pub use graph::{ConfigurationError, GraphErrorKind};
pub use instantiate::InstantiateErrorKind;
pub use instantiator::InstantiatorErrorKind;
pub use plan::PlanErrorKind;
pub(crate) use plan::named;
pub use resolve::ResolveErrorKind;
pub use scope::ScopeErrorKind;
