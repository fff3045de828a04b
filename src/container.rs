use alloc::{
    format,
    sync::{Arc, Weak},
    vec::Vec,
};
use core::{
    any::type_name,
    fmt::{self, Debug, Formatter},
    sync::atomic::{AtomicBool, Ordering},
};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, error, info_span, warn};

use crate::{
    any::{Erased, TypeInfo},
    builder::ContainerBuilder,
    cache::{Acquired, Cache, Resolved},
    config::Config,
    errors::ResolveErrorKind,
    generic::ClosedGeneric,
    injector::{InjectParameter, Injectable, InjectorPlan},
    pool::FreeList,
    registry::{Binding, Registration, Registry},
    resolver::Resolver,
    service::Service as _,
};

/// Scope node of the container tree.
///
/// Handles are cheap to clone and share one scope. Requests that the local registrations
/// can't serve go to the parent scope, up to the root.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl Container {
    #[must_use]
    pub(crate) fn new(registry: Registry, parent: Option<Container>, config: Config, tag: Option<TypeInfo>) -> Self {
        // Every scope of one tree serializes child bookkeeping on the same gate
        let gate = parent.as_ref().map_or_else(
            || Arc::new(ReentrantMutex::new(())),
            |parent| parent.inner.children.gate().clone(),
        );

        let inner = Arc::new_cyclic(|weak| {
            let slot = parent.as_ref().map(|parent| parent.inner.children.add(weak.clone()));
            ContainerInner {
                registry,
                parent,
                cache: Mutex::new(Cache::new()),
                children: FreeList::new(gate),
                slot: Mutex::new(slot),
                disposed: AtomicBool::new(false),
                config,
                tag,
            }
        });

        debug!(
            registrations = inner.registry.len(),
            tag = inner.tag.map(|tag| tag.name),
            root = inner.parent.is_none(),
            "Container created"
        );

        Self { inner }
    }

    /// Resolves `T` by the nearest registration along the scope chain
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::TypeNotRegistered`] if no scope of the chain registers `T`
    /// - Returns [`ResolveErrorKind::CircularDependency`] if `T` depends on itself
    /// - Returns [`ResolveErrorKind::InvalidOperation`] if the container is disposed
    /// - Returns any failure of building `T` or its dependencies
    pub fn resolve<T>(&self) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let span = info_span!("resolve", dependency = type_name::<T>());
        let _guard = span.enter();

        Resolver::new(self.clone()).resolve()
    }

    /// Resolves every registration exposed as `I`, in registration order
    ///
    /// # Errors
    /// See [`Self::resolve`]
    pub fn resolve_all<I>(&self) -> Result<Vec<Arc<I>>, ResolveErrorKind>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let span = info_span!("resolve_all", dependency = type_name::<I>());
        let _guard = span.enter();

        Resolver::new(self.clone()).resolve_all()
    }

    /// Same as [`Self::resolve`], but returns `None` if `T` isn't registered.
    ///
    /// # Errors
    /// Returns every other failure of [`Self::resolve`],
    /// including missing registrations of the dependencies of `T`
    pub fn resolve_or_default<T>(&self) -> Result<Option<Arc<T>>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.resolve() {
            Ok(dependency) => Ok(Some(dependency)),
            Err(ResolveErrorKind::TypeNotRegistered { type_info }) if type_info == TypeInfo::of::<T>() => {
                debug!("Not registered, default used");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Resolves a closed generic type, closing its open definition if needed
    ///
    /// # Errors
    /// See [`Self::resolve`]
    pub fn resolve_generic<T: ClosedGeneric>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        let span = info_span!("resolve_generic", dependency = type_name::<T>());
        let _guard = span.enter();

        Resolver::new(self.clone()).resolve_generic()
    }

    /// Injects fields, properties and methods into a value built outside of the container
    ///
    /// # Errors
    /// Returns the first failure of resolving a member dependency.
    /// Members injected before the failure keep their values.
    #[inline]
    pub fn inject<T: Injectable>(&self, instance: &mut T) -> Result<(), ResolveErrorKind> {
        self.inject_with(instance, &[])
    }

    /// Same as [`Self::inject`], method params matching `parameters` take their values
    ///
    /// # Errors
    /// See [`Self::inject`]
    pub fn inject_with<T: Injectable>(
        &self,
        instance: &mut T,
        parameters: &[InjectParameter],
    ) -> Result<(), ResolveErrorKind> {
        let span = info_span!("inject", dependency = type_name::<T>());
        let _guard = span.enter();

        self.ensure_not_disposed()?;

        let resolver = Resolver::new(self.clone());
        let _visit = resolver.enter(TypeInfo::of::<T>())?;
        InjectorPlan::<T>::get().inject(instance, &resolver, parameters)
    }

    /// Builds a new `T` by its plan without registering it.
    /// Constructor and method params matching `parameters` take their values.
    ///
    /// # Errors
    /// See [`Self::resolve`]
    pub fn instantiate<T: Injectable>(&self, parameters: &[InjectParameter]) -> Result<T, ResolveErrorKind> {
        let span = info_span!("instantiate", dependency = type_name::<T>());
        let _guard = span.enter();

        self.ensure_not_disposed()?;

        let resolver = Resolver::new(self.clone());
        let _visit = resolver.enter(TypeInfo::of::<T>())?;
        InjectorPlan::<T>::get().construct(&resolver, parameters)
    }

    /// Creates a child scope with its own registrations, configured by `configure`
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::InvalidOperation`] if the container is disposed
    /// - Returns failures of the build callbacks of the child
    pub fn create_scope<F>(&self, configure: F) -> Result<Container, ResolveErrorKind>
    where
        F: FnOnce(&mut ContainerBuilder),
    {
        self.ensure_not_disposed()?;

        let mut builder = ContainerBuilder::child_of(self.clone());
        configure(&mut builder);
        builder.build()
    }

    /// Calls finalizers of the instances this scope cached in LIFO order,
    /// then disposes the child scopes.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::InvalidOperation`] if the container is already disposed
    pub fn dispose(&self) -> Result<(), ResolveErrorKind> {
        if self.inner.dispose() {
            return Ok(());
        }

        let err = ResolveErrorKind::invalid_operation("Container is already disposed");
        error!("{}", err);
        Err(err)
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    /// Tag type of the scope, see [`ContainerBuilder::tagged`]
    #[inline]
    #[must_use]
    pub fn tag(&self) -> Option<TypeInfo> {
        self.inner.tag
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Container {
    #[inline]
    #[must_use]
    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn ensure_not_disposed(&self) -> Result<(), ResolveErrorKind> {
        if !self.is_disposed() {
            return Ok(());
        }

        let err = ResolveErrorKind::invalid_operation(format!(
            "Container{} is disposed",
            self.inner.tag.map(|tag| format!(" `{}`", tag.name)).unwrap_or_default()
        ));
        error!("{}", err);
        Err(err)
    }

    /// Nearest scope declaring `type_info`, starting from this one
    #[must_use]
    pub(crate) fn find(&self, type_info: TypeInfo) -> Option<(Container, Binding)> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(binding) = current.inner.registry.get(type_info) {
                return Some((current.clone(), binding));
            }
            scope = current.parent();
        }
        None
    }

    /// Same as [`Self::find`], an open generic definition on the way is closed for `T`
    #[must_use]
    pub(crate) fn find_generic<T: ClosedGeneric>(&self) -> Option<(Container, Binding)> {
        let type_info = TypeInfo::of::<T>();

        let mut scope = Some(self);
        while let Some(current) = scope {
            let registry = &current.inner.registry;
            if let Some(binding) = registry.get(type_info).or_else(|| registry.close::<T>()) {
                return Some((current.clone(), binding));
            }
            scope = current.parent();
        }
        None
    }

    /// Gets the instance of the registration cached in this scope or builds and caches it.
    /// Concurrent callers for the same registration wait for the first one to finish,
    /// unless the builder waits for them in turn.
    pub(crate) fn get_or_create<F>(
        &self,
        registration: &Registration,
        resolver: &Resolver,
        create: F,
    ) -> Result<Erased, ResolveErrorKind>
    where
        F: FnOnce() -> Result<Erased, ResolveErrorKind>,
    {
        let slot = self.inner.cache.lock().slot(registration.id);
        let build = match slot.acquire(registration.implementation) {
            Ok(Acquired::Cached(dependency)) => {
                debug!("Found in cache");
                return Ok(dependency);
            }
            Ok(Acquired::Build(build)) => build,
            Err(chain) => return Err(resolver.wait_cycle(&chain)),
        };
        debug!("Not found in cache");

        let dependency = create()?;
        build.finish(dependency.clone());
        debug!("Cached");

        if let Some(finalizer) = &registration.finalizer {
            self.inner.cache.lock().push_resolved(Resolved {
                type_info: registration.implementation,
                dependency: dependency.clone(),
                finalizer: finalizer.clone(),
            });
            debug!("Pushed to resolved set");
        }
        Ok(dependency)
    }
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("tag", &self.inner.tag.map(|tag| tag.name))
            .field("root", &self.inner.parent.is_none())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

pub(crate) struct ContainerInner {
    registry: Registry,
    parent: Option<Container>,
    cache: Mutex<Cache>,
    children: FreeList<Weak<ContainerInner>>,
    /// Index in the children of the parent, taken once the scope detaches
    slot: Mutex<Option<usize>>,
    disposed: AtomicBool,
    config: Config,
    tag: Option<TypeInfo>,
}

impl ContainerInner {
    /// Returns `false` if the container was already disposed
    fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let mut resolved_set = self.cache.lock().take();
        while let Some(Resolved {
            type_info,
            dependency,
            mut finalizer,
        }) = resolved_set.pop()
        {
            if finalizer.call(dependency).is_ok() {
                debug!(dependency = type_info.name, "Finalizer called");
            } else {
                warn!(dependency = type_info.name, "Finalizer skipped");
            }
        }

        {
            let _gate = self.children.gate().lock();
            for child in self.children.snapshot().iter() {
                if let Some(child) = child.upgrade() {
                    child.dispose();
                    debug!("Child container disposed");
                }
            }
        }

        self.detach();
        debug!(tag = self.tag.map(|tag| tag.name), "Container disposed");
        true
    }

    fn detach(&self) {
        let Some(slot) = self.slot.lock().take() else {
            return;
        };
        if let Some(parent) = &self.parent {
            let _ = parent.inner.children.remove(slot);
        }
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if self.config.dispose_on_drop && self.dispose() {
            debug!("Container disposed on drop");
        } else {
            self.detach();
        }
    }
}
