use alloc::{boxed::Box, string::String, vec::Vec};
use core::{
    convert::Infallible,
    fmt::{self, Display, Formatter},
};

use super::{instantiate::InstantiateErrorKind, instantiator::InstantiatorErrorKind};
use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Type `{}` is not registered", .type_info.name)]
    TypeNotRegistered { type_info: TypeInfo },
    #[error("Circular dependency detected: {path}")]
    CircularDependency { path: CyclePath },
    #[error(
        "Type `{}` has several constructors and none of them is parameterless or marked for injection",
        .type_info.name
    )]
    AmbiguousConstructor { type_info: TypeInfo },
    #[error("{message}")]
    InvalidOperation { message: String },
    #[error("Incorrect provided type. Actual: `{}`, expected: `{}`", .actual.name, .expected.name)]
    IncorrectType { expected: TypeInfo, actual: TypeInfo },
    #[error(transparent)]
    Instantiator(InstantiatorErrorKind<Box<ResolveErrorKind>, InstantiateErrorKind>),
}

impl ResolveErrorKind {
    #[inline]
    #[must_use]
    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation { message: message.into() }
    }

    /// Skips the wrappers added while the failure propagated through factory dependencies.
    #[must_use]
    pub fn root(&self) -> &Self {
        let mut err = self;
        while let Self::Instantiator(InstantiatorErrorKind::Deps(inner)) = err {
            err = inner;
        }
        err
    }
}

impl From<InstantiateErrorKind> for ResolveErrorKind {
    #[inline]
    fn from(err: InstantiateErrorKind) -> Self {
        Self::Instantiator(InstantiatorErrorKind::Factory(err))
    }
}

impl From<Infallible> for ResolveErrorKind {
    #[inline]
    fn from(err: Infallible) -> Self {
        match err {}
    }
}

/// Ordered types of a detected cycle, the first type repeated at the end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath(pub Vec<TypeInfo>);

impl CyclePath {
    #[inline]
    #[must_use]
    pub fn types(&self) -> &[TypeInfo] {
        &self.0
    }
}

impl Display for CyclePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, type_info) in self.0.iter().enumerate() {
            if index != 0 {
                f.write_str(" -> ")?;
            }
            f.write_str(&type_info.short_name())?;
        }
        Ok(())
    }
}
