mod args;
mod meta;
mod plan;

pub use args::{Args, InjectParameter};
pub use meta::{Constructor, Field, Method, Property, TypeMeta};

pub(crate) use meta::Param;
pub(crate) use plan::InjectorPlan;

use alloc::sync::Arc;
use tracing::error;

use crate::{
    any::{erase, BoxedAny, Erased, TypeInfo},
    errors::ResolveErrorKind,
    resolver::Resolver,
};

/// Type that describes how the container builds and populates it.
///
/// `reflect` is called once per type, the compiled plan is cached for the whole process.
///
/// ```ignore
/// impl Injectable for Service {
///     fn reflect(meta: &mut TypeMeta<Self>) {
///         meta.constructor(Constructor::new(|args| Ok(Self::new(args.next()?))).param::<Config>())
///             .field(Field::new("logger", |this: &mut Self, logger: Arc<Logger>| this.logger = Some(logger)))
///             .method(Method::new("init", |this: &mut Self, args| this.init(args.next()?)).param::<Clock>());
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    fn reflect(meta: &mut TypeMeta<Self>);
}

/// Builds a fresh instance by the plan of `T`
pub(crate) fn construct<T: Injectable>(resolver: &Resolver) -> Result<Erased, ResolveErrorKind> {
    InjectorPlan::<T>::get()
        .construct(resolver, &[])
        .map(|instance| erase(Arc::new(instance)))
}

/// Runs member injection on a value that was built outside of the container
pub(crate) fn inject_boxed<T: Injectable>(value: &mut BoxedAny, resolver: &Resolver) -> Result<(), ResolveErrorKind> {
    let Some(value) = value.downcast_mut::<T>() else {
        let err = ResolveErrorKind::IncorrectType {
            expected: TypeInfo::of::<T>(),
            actual: TypeInfo::of::<BoxedAny>(),
        };
        error!("{}", err);
        return Err(err);
    };
    InjectorPlan::<T>::get().inject(value, resolver, &[])
}
