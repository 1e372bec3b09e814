#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod codegen;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod decorator;
pub(crate) mod dependency_resolver;
pub(crate) mod diagnostics;
pub(crate) mod errors;
pub(crate) mod finalizer;
pub(crate) mod graph;
pub(crate) mod inject;
pub(crate) mod instance;
pub(crate) mod instantiator;
pub(crate) mod lifetime;
pub(crate) mod lock;
pub(crate) mod plan;
pub(crate) mod quick_build;
pub(crate) mod registry;
pub(crate) mod resolver;
pub(crate) mod scope;
pub(crate) mod service;
pub(crate) mod wrappers;

pub use any::{Object, TypeInfo};
pub use config::{Config, DefaultValue, LoadMode};
pub use container::{Container, GENERATED_FILE_NAME};
pub use decorator::Decorator;
pub use dependency_resolver::{Arguments, DependencyResolver, Parameter};
pub use diagnostics::WhatDoIHaveOptions;
pub use errors::{
    BuildErrorKind, CompileErrorKind, ConfigurationError, GraphErrorKind, InstantiateErrorKind, InstantiatorErrorKind, PlanErrorKind,
    ResolveErrorKind, ScopeErrorKind,
};
pub use finalizer::Finalizer;
pub use graph::{ServiceFamily, ServiceGraph};
pub use inject::{Decorated, Inject};
pub use instance::Instance;
pub use instantiator::{AsyncInstantiator, Constructor, Constructors, Instantiator};
pub use lifetime::Lifetime;
pub use registry::{Registration, Registry};
pub use scope::{DisposalLock, Scope};
pub use wrappers::{Lazy, Many, Provider};
