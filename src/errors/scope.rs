#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeErrorKind {
    #[error("Scope disposal is locked and can't be performed")]
    DisposalLocked,
}
