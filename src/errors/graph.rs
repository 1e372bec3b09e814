use core::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug, Clone)]
pub enum GraphErrorKind {
    #[error("Hash collision {hash:#018x} between {first} and {second}")]
    HashCollision { hash: u64, first: String, second: String },
    #[error("Invalid configuration:\n{}", display_errors(.errors))]
    InvalidConfiguration { errors: Vec<ConfigurationError> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    pub service: TypeInfo,
    pub name: String,
    pub message: String,
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ('{}'): {}", self.service, self.name, self.message)
    }
}

fn display_errors(errors: &[ConfigurationError]) -> String {
    errors.iter().map(|err| format!("- {err}")).collect::<Vec<_>>().join("\n")
}
