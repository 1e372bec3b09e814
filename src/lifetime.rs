use core::fmt::{self, Display, Formatter};

/// How long a built object lives and where it's stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifetime {
    /// One object per root scope.
    Singleton,
    /// One object per scope.
    Scoped,
    /// New object per request.
    #[default]
    Transient,
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lifetime::Singleton => "Singleton",
            Lifetime::Scoped => "Scoped",
            Lifetime::Transient => "Transient",
        })
    }
}
