use alloc::{boxed::Box, collections::BTreeMap, sync::Arc, vec, vec::Vec};
use core::marker::PhantomData;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    any::{seal, BoxedAny, TypeInfo},
    config::Config,
    container::Container,
    dependency_resolver::DependencyResolver,
    errors::ResolveErrorKind,
    finalizer::{boxed_dispose_finalizer, boxed_finalizer_factory, BoxedCloneFinalizer, Dispose, Finalizer},
    injector::{inject_boxed, Injectable, InjectorPlan},
    instantiator::{boxed_instantiator_factory, Instantiator},
    lifetime::Lifetime,
    provider::{ExistingProvider, FactoryProvider, Provider, ScopeLocalProvider},
    registry::{InterfaceBinding, Registration, RegistrationId, Registry},
    scope::{wrap_scope_local, ScopeLocal},
};

type BuildCallback = Box<dyn FnOnce(&Container) -> Result<(), ResolveErrorKind>>;

struct Draft {
    registration: Registration,
    /// Whether the interfaces were declared explicitly, otherwise the registration is bound to itself
    declared: bool,
}

impl Draft {
    fn new<T>(lifetime: Lifetime, provider: Provider, finalizer: Option<BoxedCloneFinalizer>) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::from(Registration {
            id: RegistrationId::next(),
            implementation: TypeInfo::of::<T>(),
            lifetime,
            interfaces: vec![InterfaceBinding::of_self::<T>()],
            provider,
            finalizer,
        })
    }

    fn declares(&self, type_info: TypeInfo) -> bool {
        self.registration
            .interfaces
            .iter()
            .any(|interface| interface.type_info == type_info)
    }
}

impl From<Registration> for Draft {
    fn from(registration: Registration) -> Self {
        Self {
            registration,
            declared: false,
        }
    }
}

/// Accumulates registrations of one scope and compiles them with [`ContainerBuilder::build`].
///
/// The builder is consumed by the build, registrations never change afterwards.
pub struct ContainerBuilder {
    parent: Option<Container>,
    config: Option<Config>,
    tag: Option<TypeInfo>,
    drafts: Vec<Draft>,
    open_generics: BTreeMap<TypeInfo, Lifetime>,
    callbacks: Vec<BuildCallback>,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    /// Builder of a root container
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: None,
            config: None,
            tag: None,
            drafts: Vec::new(),
            open_generics: BTreeMap::new(),
            callbacks: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn child_of(parent: Container) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new()
        }
    }

    /// Overrides the config, otherwise it's inherited from the parent
    #[inline]
    pub fn with_config(&mut self, config: Config) -> &mut Self {
        self.config = Some(config);
        self
    }

    /// Marks the scope with the tag type `S`, see [`crate::ParentReference`]
    #[inline]
    pub fn tagged<S: 'static>(&mut self) -> &mut Self {
        self.tag = Some(TypeInfo::of::<S>());
        self
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Container> {
        self.parent.as_ref()
    }

    /// Registers `T`, built by its injector plan
    pub fn register<T: Injectable>(&mut self, lifetime: Lifetime) -> RegistrationBuilder<'_, T> {
        self.push(Draft::from(Registration::construct::<T>(lifetime)))
    }

    /// Registers a value built outside of the container as a singleton
    pub fn register_instance<T>(&mut self, value: T) -> RegistrationBuilder<'_, T>
    where
        T: Send + Sync + 'static,
    {
        let provider = Provider::Existing(ExistingProvider {
            type_info: TypeInfo::of::<T>(),
            value: Mutex::new(Some(Box::new(value) as BoxedAny)),
            inject: None,
            seal: seal::<T>,
        });
        self.push(Draft::new::<T>(Lifetime::Singleton, provider, None))
    }

    /// Same as [`Self::register_instance`], but members of the value are injected on the first resolve
    pub fn register_injected_instance<T: Injectable>(&mut self, value: T) -> RegistrationBuilder<'_, T> {
        let provider = Provider::Existing(ExistingProvider {
            type_info: TypeInfo::of::<T>(),
            value: Mutex::new(Some(Box::new(value) as BoxedAny)),
            inject: Some(inject_boxed::<T>),
            seal: seal::<T>,
        });
        let finalizer = InjectorPlan::<T>::get().dispose.map(|dispose| dispose());
        self.push(Draft::new::<T>(Lifetime::Singleton, provider, finalizer))
    }

    /// Registers a factory delegate, see [`Instantiator`]
    pub fn register_factory<Inst, Deps>(
        &mut self,
        instantiator: Inst,
        lifetime: Lifetime,
    ) -> RegistrationBuilder<'_, Inst::Provides>
    where
        Inst: Instantiator<Deps>,
        Deps: DependencyResolver,
    {
        let provider = Provider::Factory(FactoryProvider {
            type_info: TypeInfo::of::<Inst::Provides>(),
            instantiator: boxed_instantiator_factory(instantiator),
            seal: seal::<Inst::Provides>,
        });
        self.push(Draft::new::<Inst::Provides>(lifetime, provider, None))
    }

    /// Registers [`ScopeLocal<T>`]: the nearest registration of `T` resolved from the requesting scope.
    /// Singletons are left out when `T` is a collection.
    ///
    /// # Warning
    /// Resolving it from a root container fails with [`ResolveErrorKind::InvalidOperation`]
    pub fn register_scope_local<T>(&mut self) -> RegistrationBuilder<'_, ScopeLocal<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let provider = Provider::ScopeLocal(ScopeLocalProvider {
            target: TypeInfo::of::<T>(),
            wrap: wrap_scope_local::<T>,
        });
        self.push(Draft::new::<ScopeLocal<T>>(Lifetime::Scoped, provider, None))
    }

    /// Registers the open generic definition `D`.
    /// Every closed type with `D` as its [`crate::ClosedGeneric::Definition`] is registered on its first request.
    pub fn register_open_generic<D: 'static>(&mut self, lifetime: Lifetime) -> &mut Self {
        self.open_generics.insert(TypeInfo::of::<D>(), lifetime);
        self
    }

    /// Adds a callback called with the container right after it's built, in the order of adding.
    /// Failure of a callback fails the build.
    pub fn register_build_callback<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(&Container) -> Result<(), ResolveErrorKind> + 'static,
    {
        self.callbacks.push(Box::new(callback));
        self
    }

    /// Checks if `T` is already registered in this builder or, with `include_parent`, in the ancestors
    #[must_use]
    pub fn exists<T>(&self, include_parent: bool) -> bool
    where
        T: ?Sized + 'static,
    {
        let type_info = TypeInfo::of::<T>();
        if self.drafts.iter().any(|draft| draft.declares(type_info)) || self.open_generics.contains_key(&type_info) {
            return true;
        }
        if !include_parent {
            return false;
        }

        let mut scope = self.parent.as_ref();
        while let Some(current) = scope {
            if current.registry().contains(type_info) {
                return true;
            }
            scope = current.parent();
        }
        false
    }

    /// Compiles the registrations and calls the build callbacks
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::InvalidOperation`] if the parent container is disposed
    /// - Returns the first failure of a build callback
    pub fn build(self) -> Result<Container, ResolveErrorKind> {
        if let Some(parent) = &self.parent {
            parent.ensure_not_disposed()?;
        }

        let config = self
            .config
            .or_else(|| self.parent.as_ref().map(|parent| *parent.config()))
            .unwrap_or_default();
        let registrations = self.drafts.into_iter().map(|draft| draft.registration).collect();
        let container = Container::new(
            Registry::new(registrations, self.open_generics),
            self.parent,
            config,
            self.tag,
        );

        let callbacks = self.callbacks.len();
        for callback in self.callbacks {
            callback(&container)?;
        }
        if callbacks != 0 {
            debug!(callbacks, "Build callbacks called");
        }

        Ok(container)
    }

    fn push<T>(&mut self, draft: Draft) -> RegistrationBuilder<'_, T> {
        debug!(
            dependency = draft.registration.implementation.name,
            lifetime = %draft.registration.lifetime,
            "Registered"
        );

        self.drafts.push(draft);
        let index = self.drafts.len() - 1;
        RegistrationBuilder {
            draft: &mut self.drafts[index],
            _marker: PhantomData,
        }
    }
}

/// Draft of one registration.
///
/// Without declared interfaces the registration is resolvable as `T` only.
/// Declaring any interface replaces that, use [`Self::as_self`] to keep `T` resolvable.
pub struct RegistrationBuilder<'a, T> {
    draft: &'a mut Draft,
    _marker: PhantomData<fn() -> T>,
}

impl<T> RegistrationBuilder<'_, T>
where
    T: Send + Sync + 'static,
{
    /// Exposes the registration as `I`
    pub fn as_<I>(&mut self, cast: fn(Arc<T>) -> Arc<I>) -> &mut Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.declare(InterfaceBinding::new::<T, I>(cast))
    }

    pub fn as_self(&mut self) -> &mut Self {
        self.declare(InterfaceBinding::of_self::<T>())
    }

    /// Exposes the registration as every interface `T` declares with [`crate::TypeMeta::implements`]
    pub fn as_implemented_interfaces(&mut self) -> &mut Self
    where
        T: Injectable,
    {
        for interface in &InjectorPlan::<T>::get().interfaces {
            self.declare(interface.clone());
        }
        self
    }

    /// Calls [`Dispose::dispose`] when the scope that cached the instance is disposed
    pub fn disposable(&mut self) -> &mut Self
    where
        T: Dispose,
    {
        self.set_finalizer(boxed_dispose_finalizer::<T>())
    }

    /// Calls `finalizer` when the scope that cached the instance is disposed.
    /// Finalizers run in LIFO order of caching, not of registration.
    ///
    /// # Warning
    /// Transient instances aren't cached, so their finalizers are never called
    pub fn finalizer<F>(&mut self, finalizer: F) -> &mut Self
    where
        F: Finalizer<T> + Send + Sync,
    {
        self.set_finalizer(boxed_finalizer_factory::<T, F>(finalizer))
    }

    #[inline]
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.draft.registration.lifetime
    }

    fn set_finalizer(&mut self, finalizer: BoxedCloneFinalizer) -> &mut Self {
        if self.draft.registration.lifetime == Lifetime::Transient {
            warn!(
                dependency = self.draft.registration.implementation.name,
                "Finalizer of a transient registration is never called"
            );
        }
        self.draft.registration.finalizer = Some(finalizer);
        self
    }

    fn declare(&mut self, interface: InterfaceBinding) -> &mut Self {
        if !self.draft.declared {
            self.draft.registration.interfaces.clear();
            self.draft.declared = true;
        }
        if !self.draft.declares(interface.type_info) {
            self.draft.registration.interfaces.push(interface);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::ContainerBuilder;
    use crate::{
        errors::ResolveErrorKind,
        injector::{Constructor, Injectable, TypeMeta},
        instance, Container, Lifetime,
    };

    use alloc::{
        format,
        string::{String, ToString as _},
        sync::Arc,
        vec::Vec,
    };
    use core::sync::atomic::{AtomicU8, Ordering};
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    trait Shape: Send + Sync {
        fn sides(&self) -> u8;
    }

    trait Named: Send + Sync {
        fn name(&self) -> &'static str;
    }

    #[derive(Clone, Default)]
    struct Square;

    impl Shape for Square {
        fn sides(&self) -> u8 {
            4
        }
    }

    impl Named for Square {
        fn name(&self) -> &'static str {
            "square"
        }
    }

    impl Injectable for Square {
        fn reflect(meta: &mut TypeMeta<Self>) {
            meta.constructor(Constructor::from_default())
                .implements::<dyn Shape>(|square| square as Arc<dyn Shape>)
                .implements::<dyn Named>(|square| square as Arc<dyn Named>);
        }
    }

    #[test]
    #[traced_test]
    fn test_as_replaces_self_binding() {
        let mut builder = ContainerBuilder::new();
        builder.register::<Square>(Lifetime::Singleton).as_::<dyn Shape>(|square| square as Arc<dyn Shape>);
        let container = builder.build().unwrap();

        assert_eq!(container.resolve::<dyn Shape>().unwrap().sides(), 4);
        assert!(matches!(
            container.resolve::<Square>(),
            Err(ResolveErrorKind::TypeNotRegistered { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_as_self_shares_instance() {
        let mut builder = ContainerBuilder::new();
        builder
            .register::<Square>(Lifetime::Singleton)
            .as_::<dyn Shape>(|square| square as Arc<dyn Shape>)
            .as_self();
        let container = builder.build().unwrap();

        let square = container.resolve::<Square>().unwrap();
        let shape = container.resolve::<dyn Shape>().unwrap();
        assert!(core::ptr::addr_eq(Arc::as_ptr(&square), Arc::as_ptr(&shape)));
    }

    #[test]
    #[traced_test]
    fn test_as_implemented_interfaces() {
        let mut builder = ContainerBuilder::new();
        builder.register::<Square>(Lifetime::Transient).as_implemented_interfaces();
        let container = builder.build().unwrap();

        assert_eq!(container.resolve::<dyn Shape>().unwrap().sides(), 4);
        assert_eq!(container.resolve::<dyn Named>().unwrap().name(), "square");
        assert!(container.resolve_or_default::<Square>().unwrap().is_none());
    }

    #[test]
    #[traced_test]
    fn test_exists() {
        let mut builder = ContainerBuilder::new();
        builder.register_instance(1u8);
        builder.register_factory(instance(Square), Lifetime::Scoped).as_::<dyn Shape>(|square| square as Arc<dyn Shape>);
        let root = builder.build().unwrap();

        let child = root
            .create_scope(|builder| {
                assert!(!builder.exists::<u8>(false));
                assert!(builder.exists::<u8>(true));
                assert!(builder.exists::<dyn Shape>(true));
                assert!(!builder.exists::<Square>(true));

                if !builder.exists::<u16>(true) {
                    builder.register_instance(2u16);
                }
                assert!(builder.exists::<u16>(false));
            })
            .unwrap();

        assert_eq!(*child.resolve::<u16>().unwrap(), 2);
    }

    #[test]
    #[traced_test]
    fn test_build_callbacks_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let built = Arc::new(AtomicU8::new(0));

        let mut builder = ContainerBuilder::new();
        builder.register_factory(
            {
                let built = built.clone();
                move || {
                    built.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(Square)
                }
            },
            Lifetime::Singleton,
        );
        builder
            .register_build_callback({
                let order = order.clone();
                move |container: &Container| {
                    order.lock().push(1);
                    container.resolve::<Square>().map(drop)
                }
            })
            .register_build_callback({
                let order = order.clone();
                move |_: &Container| {
                    order.lock().push(2);
                    Ok(())
                }
            });
        let container = builder.build().unwrap();

        assert_eq!(*order.lock(), [1, 2]);
        assert_eq!(built.load(Ordering::SeqCst), 1);
        container.resolve::<Square>().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_failed_callback_fails_build() {
        let mut builder = ContainerBuilder::new();
        builder.register_build_callback(|container: &Container| container.resolve::<Square>().map(drop));

        assert!(matches!(
            builder.build(),
            Err(ResolveErrorKind::TypeNotRegistered { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_existing_instance_injected_once() {
        #[derive(Default)]
        struct Holder {
            square: Option<Arc<Square>>,
        }

        impl Injectable for Holder {
            fn reflect(meta: &mut TypeMeta<Self>) {
                meta.field(crate::Field::new("square", |this: &mut Self, square| this.square = Some(square)));
            }
        }

        let mut builder = ContainerBuilder::new();
        builder.register::<Square>(Lifetime::Singleton);
        builder.register_injected_instance(Holder::default());
        let container = builder.build().unwrap();

        let holder_1 = container.resolve::<Holder>().unwrap();
        let holder_2 = container.resolve::<Holder>().unwrap();
        assert!(holder_1.square.is_some());
        assert!(Arc::ptr_eq(&holder_1, &holder_2));
    }

    #[test]
    #[traced_test]
    fn test_existing_instance_kept_after_failed_injection() {
        struct Flaky;

        #[derive(Default)]
        struct Holder {
            flaky: Option<Arc<Flaky>>,
        }

        impl Injectable for Holder {
            fn reflect(meta: &mut TypeMeta<Self>) {
                meta.field(crate::Field::new("flaky", |this: &mut Self, flaky| this.flaky = Some(flaky)));
            }
        }

        let attempts = Arc::new(AtomicU8::new(0));

        let mut builder = ContainerBuilder::new();
        builder.register_factory(
            {
                let attempts = attempts.clone();
                move || {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err(anyhow::anyhow!("not ready yet"));
                    }
                    Ok(Flaky)
                }
            },
            Lifetime::Transient,
        );
        builder.register_injected_instance(Holder::default());
        let container = builder.build().unwrap();

        assert!(container.resolve::<Holder>().is_err());
        let holder = container.resolve::<Holder>().unwrap();
        assert!(holder.flaky.is_some());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(!logs_contain("already handed out"));
    }

    #[test]
    #[traced_test]
    fn test_child_of_disposed_parent() {
        let root = ContainerBuilder::new().build().unwrap();
        let builder = ContainerBuilder::child_of(root.clone());
        root.dispose().unwrap();

        assert!(matches!(
            builder.build(),
            Err(ResolveErrorKind::InvalidOperation { .. })
        ));
    }
}
