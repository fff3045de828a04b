use core::fmt::{self, Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifetime {
    /// New instance per resolve call, never cached
    Transient,
    /// One instance per scope
    Scoped,
    /// One instance per declaring scope, shared with its descendants
    Singleton,
}

impl Lifetime {
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Lifetime::Transient => "transient",
            Lifetime::Scoped => "scoped",
            Lifetime::Singleton => "singleton",
        }
    }
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
