#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileErrorKind {
    #[error("Type {type_name} references crate {assembly} which isn't in the reference set\n{code}")]
    UnresolvedReference {
        type_name: String,
        assembly: String,
        code: String,
    },
    #[error("Variable {variable} is used before it's defined in method {method}\n{code}")]
    UndefinedVariable { variable: String, method: String, code: String },
    #[error("Method {method} binds `{found}` where `{expected}` is built\n{code}")]
    StatementMismatch {
        method: String,
        expected: String,
        found: String,
        code: String,
    },
    #[error("Method {method} doesn't return a value\n{code}")]
    MissingReturn { method: String, code: String },
    #[error("Generated type with marker `{marker}` not found in compiled output\n{code}")]
    MissingType { marker: String, code: String },
    #[error("Method {method} must be arranged before compiling")]
    NotArranged { method: String },
    #[error("Failed to persist generated code to {path}: {message}")]
    Persist { path: String, message: String },
}
