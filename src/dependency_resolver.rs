use core::convert::Infallible;

use super::errors::ResolveErrorKind;
use crate::{container::Container, resolver::Resolver};

/// Value a factory takes as an argument
pub trait DependencyResolver: Sized {
    type Error: Into<ResolveErrorKind>;

    fn resolve(resolver: &Resolver) -> Result<Self, Self::Error>;
}

/// Scope the factory is called in
impl DependencyResolver for Container {
    type Error = Infallible;

    #[inline]
    fn resolve(resolver: &Resolver) -> Result<Self, Self::Error> {
        Ok(resolver.scope().clone())
    }
}

/// Current request, dependencies resolved through it take part in cycle detection
impl DependencyResolver for Resolver {
    type Error = Infallible;

    #[inline]
    fn resolve(resolver: &Resolver) -> Result<Self, Self::Error> {
        Ok(resolver.clone())
    }
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            type Error = ResolveErrorKind;

            #[inline]
            #[allow(unused_variables)]
            fn resolve(resolver: &Resolver) -> Result<Self, Self::Error> {
                Ok(($($ty::resolve(resolver).map_err(Into::into)?,)*))
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);
