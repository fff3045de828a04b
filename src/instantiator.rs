use alloc::boxed::Box;
use tracing::debug;

use super::{
    any::BoxedAny,
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    resolver::Resolver,
    service::{service_fn, BoxCloneService},
};

/// Factory delegate. Implemented for closures whose every argument is a [`DependencyResolver`].
pub trait Instantiator<Deps>: Clone + Send + Sync + 'static
where
    Deps: DependencyResolver,
{
    type Provides: Send + Sync + 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&mut self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

pub(crate) type BoxedCloneInstantiator =
    BoxCloneService<Resolver, BoxedAny, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>>;

#[must_use]
pub(crate) fn boxed_instantiator_factory<Inst, Deps>(mut instantiator: Inst) -> BoxedCloneInstantiator
where
    Inst: Instantiator<Deps>,
    Deps: DependencyResolver,
{
    BoxCloneService(Box::new(service_fn({
        move |resolver: Resolver| {
            let dependencies = match Deps::resolve(&resolver) {
                Ok(dependencies) => dependencies,
                Err(err) => return Err(InstantiatorErrorKind::Deps(err.into())),
            };
            let dependency = match instantiator.instantiate(dependencies) {
                Ok(dependency) => dependency,
                Err(err) => return Err(InstantiatorErrorKind::Factory(err.into())),
            };

            debug!("Instantiated");

            Ok(Box::new(dependency) as BoxedAny)
        }
    })))
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + Send + Sync + 'static,
            Response: Send + Sync + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

/// Wraps a value created outside of the container as a factory that hands out its clones
#[inline]
#[must_use]
pub fn instance<T>(value: T) -> impl Instantiator<(), Provides = T, Error = InstantiateErrorKind>
where
    T: Clone + Send + Sync + 'static,
{
    move || Ok(value.clone())
}
