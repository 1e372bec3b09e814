use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanErrorKind {
    #[error("Cannot resolve variable of type {service}{} in method {method}", named(.name))]
    UnresolvableVariable {
        service: TypeInfo,
        name: Option<String>,
        method: String,
    },
    #[error("Frame {frame} can't use variable of type {service} it creates itself")]
    SelfReference { frame: String, service: TypeInfo },
    #[error("Cyclic dependency detected: {}", .path.join(" -> "))]
    CyclicDependency { path: Vec<String> },
    #[error("Frame chain of method {method} is already linked")]
    AlreadyLinked { method: String },
    #[error("Method {method} is in state {actual}, expected {expected}")]
    InvalidState {
        method: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("{service} named '{name}' can't be built: {}", .errors.join("; "))]
    Unbuildable {
        service: TypeInfo,
        name: String,
        errors: Vec<String>,
    },
}

pub(crate) fn named(name: &Option<String>) -> String {
    name.as_ref().map(|name| format!(" named '{name}'")).unwrap_or_default()
}
