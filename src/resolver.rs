use alloc::{rc::Rc, sync::Arc, vec::Vec};
use core::{any::type_name, cell::RefCell, mem};
use tracing::{debug, error, warn};

use crate::{
    any::{erase, unerase, Erased, TypeInfo},
    container::Container,
    errors::{CyclePath, ResolveErrorKind},
    generic::ClosedGeneric,
    lifetime::Lifetime,
    pool::ListPool,
    provider::InstanceProvider as _,
    registry::Binding,
};

static PATHS: ListPool<TypeInfo> = ListPool::new();

/// Types under construction in one resolve call, outermost first
pub(crate) struct ResolvePath {
    stack: Vec<TypeInfo>,
}

impl ResolvePath {
    #[inline]
    #[must_use]
    fn new() -> Self {
        Self { stack: PATHS.get() }
    }
}

impl Drop for ResolvePath {
    fn drop(&mut self) {
        PATHS.release(mem::take(&mut self.stack));
    }
}

pub(crate) struct PathGuard {
    path: Rc<RefCell<ResolvePath>>,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        self.path.borrow_mut().stack.pop();
    }
}

/// Handle of one resolve call.
///
/// Carries the scope the call resolves in and the chain of types under construction,
/// so dependencies requested through it take part in cycle detection.
/// Factories receive it as their request.
#[derive(Clone)]
pub struct Resolver {
    scope: Container,
    path: Rc<RefCell<ResolvePath>>,
}

impl Resolver {
    #[inline]
    #[must_use]
    pub(crate) fn new(scope: Container) -> Self {
        Self {
            scope,
            path: Rc::new(RefCell::new(ResolvePath::new())),
        }
    }

    /// Same call, continued in another scope
    #[inline]
    #[must_use]
    pub(crate) fn with_scope(&self, scope: Container) -> Self {
        Self {
            scope,
            path: self.path.clone(),
        }
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> &Container {
        &self.scope
    }

    /// # Errors
    /// See [`Container::resolve`]
    pub fn resolve<T>(&self) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let erased = self.resolve_type(TypeInfo::of::<T>())?;
        downcast(&erased)
    }

    /// # Errors
    /// See [`Container::resolve_all`]
    pub fn resolve_all<I>(&self) -> Result<Vec<Arc<I>>, ResolveErrorKind>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.resolve::<Vec<Arc<I>>>().map(Arc::unwrap_or_clone)
    }

    /// # Errors
    /// See [`Container::resolve_generic`]
    pub fn resolve_generic<T: ClosedGeneric>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        let erased = self.resolve_generic_type::<T>()?;
        downcast(&erased)
    }

    pub(crate) fn resolve_type(&self, type_info: TypeInfo) -> Result<Erased, ResolveErrorKind> {
        if type_info == TypeInfo::of::<Container>() {
            return Ok(erase(Arc::new(self.scope.clone())));
        }
        self.scope.ensure_not_disposed()?;

        let Some((owner, binding)) = self.scope.find(type_info) else {
            let err = ResolveErrorKind::TypeNotRegistered { type_info };
            warn!("{}", err);
            return Err(err);
        };
        self.resolve_binding(&owner, &binding)
    }

    pub(crate) fn resolve_generic_type<T: ClosedGeneric>(&self) -> Result<Erased, ResolveErrorKind> {
        self.scope.ensure_not_disposed()?;

        let Some((owner, binding)) = self.scope.find_generic::<T>() else {
            let err = ResolveErrorKind::TypeNotRegistered {
                type_info: TypeInfo::of::<T>(),
            };
            warn!("{}", err);
            return Err(err);
        };
        self.resolve_binding(&owner, &binding)
    }

    /// Resolves a registration declared in `owner` and casts it to the bound interface
    pub(crate) fn resolve_binding(&self, owner: &Container, binding: &Binding) -> Result<Erased, ResolveErrorKind> {
        let registration = &binding.registration;
        let interface = binding.interface();

        let instance = {
            let _visit = self.enter(registration.implementation)?;
            match registration.lifetime {
                Lifetime::Transient => registration.provider.produce(self)?,
                Lifetime::Scoped => self
                    .scope
                    .get_or_create(registration, self, || registration.provider.produce(self))?,
                Lifetime::Singleton => {
                    let resolver = self.with_scope(owner.clone());
                    owner.get_or_create(registration, &resolver, || registration.provider.produce(&resolver))?
                }
            }
        };

        (interface.cast)(&instance).ok_or_else(|| {
            let err = ResolveErrorKind::IncorrectType {
                expected: interface.type_info,
                actual: registration.implementation,
            };
            error!("{}", err);
            err
        })
    }

    /// Pushes the type onto the path, failing if it's already under construction
    pub(crate) fn enter(&self, type_info: TypeInfo) -> Result<PathGuard, ResolveErrorKind> {
        let mut path = self.path.borrow_mut();
        if let Some(start) = path.stack.iter().position(|visited| *visited == type_info) {
            let mut cycle = Vec::with_capacity(path.stack.len() - start + 1);
            cycle.extend_from_slice(&path.stack[start..]);
            cycle.push(type_info);

            let err = ResolveErrorKind::CircularDependency { path: CyclePath(cycle) };
            error!("{}", err);
            return Err(err);
        }
        path.stack.push(type_info);
        debug!(dependency = type_info.name, depth = path.stack.len(), "Entered");

        Ok(PathGuard {
            path: self.path.clone(),
        })
    }

    /// Builds the cycle error for a cached type whose builder waits, directly or through other threads, for this call.
    /// `chain` starts with the requested type and ends with the type this thread builds.
    pub(crate) fn wait_cycle(&self, chain: &[TypeInfo]) -> ResolveErrorKind {
        let path = self.path.borrow();
        let (Some(requested), Some(built)) = (chain.first(), chain.last()) else {
            return ResolveErrorKind::invalid_operation("Empty wait chain");
        };
        let start = path.stack.iter().position(|visited| visited == built).unwrap_or(0);

        let mut cycle = Vec::with_capacity(path.stack.len() - start + chain.len());
        cycle.extend_from_slice(&path.stack[start..]);
        if path.stack.last() != Some(requested) {
            cycle.push(*requested);
        }
        cycle.extend_from_slice(&chain[1..]);
        if chain.len() == 1 {
            cycle.push(*built);
        }

        let err = ResolveErrorKind::CircularDependency { path: CyclePath(cycle) };
        error!("{}", err);
        err
    }
}

fn downcast<T>(erased: &Erased) -> Result<Arc<T>, ResolveErrorKind>
where
    T: ?Sized + 'static,
{
    unerase::<T>(erased).ok_or_else(|| {
        let err = ResolveErrorKind::IncorrectType {
            expected: TypeInfo::of::<T>(),
            actual: TypeInfo {
                name: type_name::<Erased>(),
                id: (**erased).type_id(),
            },
        };
        error!("{}", err);
        err
    })
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::Resolver;
    use crate::{
        any::TypeInfo,
        builder::ContainerBuilder,
        errors::{CyclePath, ResolveErrorKind},
    };

    use alloc::{
        format,
        string::{String, ToString as _},
        vec,
    };
    use tracing_test::traced_test;

    struct A;
    struct B;

    #[test]
    #[traced_test]
    fn test_enter_detects_cycle() {
        let container = ContainerBuilder::new().build().unwrap();
        let resolver = Resolver::new(container);

        let _a = resolver.enter(TypeInfo::of::<A>()).unwrap();
        {
            let _b = resolver.enter(TypeInfo::of::<B>()).unwrap();
            let err = resolver.enter(TypeInfo::of::<A>()).err().unwrap();

            let ResolveErrorKind::CircularDependency { path } = &err else {
                panic!("unexpected error: {err}");
            };
            assert_eq!(
                *path,
                CyclePath(vec![TypeInfo::of::<A>(), TypeInfo::of::<B>(), TypeInfo::of::<A>()])
            );
        }
        // B left the path with its guard
        let _b = resolver.enter(TypeInfo::of::<B>()).unwrap();
    }

    #[test]
    #[traced_test]
    fn test_path_shared_between_scopes() {
        let root = ContainerBuilder::new().build().unwrap();
        let child = root.create_scope(|_| {}).unwrap();

        let resolver = Resolver::new(child);
        let _a = resolver.enter(TypeInfo::of::<A>()).unwrap();

        let in_root = resolver.with_scope(root);
        assert!(in_root.enter(TypeInfo::of::<A>()).is_err());
        assert!(in_root.clone().enter(TypeInfo::of::<B>()).is_ok());
    }

    #[test]
    #[traced_test]
    fn test_container_always_resolvable() {
        let container = ContainerBuilder::new().build().unwrap();
        let resolver = Resolver::new(container.clone());

        let resolved = resolver.resolve::<crate::Container>().unwrap();
        assert!(resolved.ptr_eq(&container));

        assert!(matches!(
            resolver.resolve::<A>(),
            Err(ResolveErrorKind::TypeNotRegistered { type_info }) if type_info == TypeInfo::of::<A>()
        ));
    }
}
