use alloc::{boxed::Box, sync::Arc};
use tracing::error;

use crate::{
    any::{unerase, Erased, TypeInfo},
    service::{service_fn, BoxCloneService},
};

/// Disposable capability. Called once, when the scope that cached the instance is disposed.
pub trait Dispose {
    fn dispose(&self);
}

pub trait Finalizer<Dep: ?Sized>: Clone + 'static {
    fn finalize(&mut self, dependency: Arc<Dep>);
}

pub(crate) type BoxedCloneFinalizer = BoxCloneService<Erased, (), ()>;

#[must_use]
pub(crate) fn boxed_finalizer_factory<Dep, Fin>(mut finalizer: Fin) -> BoxedCloneFinalizer
where
    Dep: ?Sized + Send + Sync + 'static,
    Fin: Finalizer<Dep> + Send + Sync,
{
    BoxCloneService(Box::new(service_fn(move |dependency: Erased| {
        let Some(dependency) = unerase::<Dep>(&dependency) else {
            error!(dependency = TypeInfo::of::<Dep>().name, "Finalizer got a value of another type");
            return Err(());
        };
        finalizer.finalize(dependency);
        Ok(())
    })))
}

#[inline]
#[must_use]
pub(crate) fn boxed_dispose_finalizer<Dep>() -> BoxedCloneFinalizer
where
    Dep: Dispose + Send + Sync + 'static,
{
    boxed_finalizer_factory::<Dep, _>(|dependency: Arc<Dep>| dependency.dispose())
}

impl<F, Dep> Finalizer<Dep> for F
where
    F: FnMut(Arc<Dep>) + Clone + 'static,
    Dep: ?Sized,
{
    #[inline]
    fn finalize(&mut self, dependency: Arc<Dep>) {
        self(dependency);
    }
}
