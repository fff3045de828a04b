use alloc::{boxed::Box, format, vec::Vec};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::{
    any::{BoxedAny, Erased, TypeInfo},
    container::Container,
    errors::{InstantiatorErrorKind, ResolveErrorKind},
    instantiator::BoxedCloneInstantiator,
    lifetime::Lifetime,
    pool::ListPool,
    registry::{Binding, Collect},
    resolver::Resolver,
    service::Service as _,
};

static ELEMENTS: ListPool<Erased> = ListPool::new();

/// Produces one instance of a registration
pub(crate) trait InstanceProvider {
    fn produce(&self, resolver: &Resolver) -> Result<Erased, ResolveErrorKind>;
}

pub(crate) enum Provider {
    /// Builds a new instance by the injector plan
    Construct {
        construct: fn(&Resolver) -> Result<Erased, ResolveErrorKind>,
    },
    Existing(ExistingProvider),
    Factory(FactoryProvider),
    Collection(CollectionProvider),
    ScopeLocal(ScopeLocalProvider),
}

impl InstanceProvider for Provider {
    #[inline]
    fn produce(&self, resolver: &Resolver) -> Result<Erased, ResolveErrorKind> {
        match self {
            Self::Construct { construct } => construct(resolver),
            Self::Existing(provider) => provider.produce(resolver),
            Self::Factory(provider) => provider.produce(resolver),
            Self::Collection(provider) => provider.produce(resolver),
            Self::ScopeLocal(provider) => provider.produce(resolver),
        }
    }
}

/// Hands out a value supplied at registration, injecting its members first if configured.
/// The value is consumed by the first call, so it's always registered as a singleton.
pub(crate) struct ExistingProvider {
    pub(crate) type_info: TypeInfo,
    pub(crate) value: Mutex<Option<BoxedAny>>,
    pub(crate) inject: Option<fn(&mut BoxedAny, &Resolver) -> Result<(), ResolveErrorKind>>,
    pub(crate) seal: fn(BoxedAny) -> Option<Erased>,
}

impl InstanceProvider for ExistingProvider {
    fn produce(&self, resolver: &Resolver) -> Result<Erased, ResolveErrorKind> {
        let Some(mut value) = self.value.lock().take() else {
            let err = ResolveErrorKind::invalid_operation(format!(
                "Instance of `{}` was already handed out",
                self.type_info.name
            ));
            error!("{}", err);
            return Err(err);
        };
        if let Some(inject) = self.inject {
            if let Err(err) = inject(&mut value, resolver) {
                // Put the value back so a later resolve can retry the injection
                *self.value.lock() = Some(value);
                return Err(err);
            }
            debug!("Members injected into existing instance");
        }
        (self.seal)(value).ok_or_else(|| incorrect_type(self.type_info))
    }
}

pub(crate) struct FactoryProvider {
    pub(crate) type_info: TypeInfo,
    pub(crate) instantiator: BoxedCloneInstantiator,
    pub(crate) seal: fn(BoxedAny) -> Option<Erased>,
}

impl InstanceProvider for FactoryProvider {
    fn produce(&self, resolver: &Resolver) -> Result<Erased, ResolveErrorKind> {
        match self.instantiator.clone().call(resolver.clone()) {
            Ok(value) => (self.seal)(value).ok_or_else(|| incorrect_type(self.type_info)),
            Err(InstantiatorErrorKind::Deps(err)) => {
                error!("{}", err);
                Err(ResolveErrorKind::Instantiator(InstantiatorErrorKind::Deps(Box::new(err))))
            }
            Err(InstantiatorErrorKind::Factory(err)) => {
                error!("{}", err);
                Err(ResolveErrorKind::Instantiator(InstantiatorErrorKind::Factory(err)))
            }
        }
    }
}

/// Resolves every registration of the element type, in registration order.
/// With [`crate::Config::inherit_parent_collections`] the elements of the ancestors go first.
pub(crate) struct CollectionProvider {
    pub(crate) collection: TypeInfo,
    pub(crate) collect: Collect,
}

impl CollectionProvider {
    pub(crate) fn collect(&self, resolver: &Resolver, exclude_singletons: bool) -> Result<Erased, ResolveErrorKind> {
        let inherit = resolver.scope().config().inherit_parent_collections;

        let mut levels: Vec<(&Container, &[Binding])> = Vec::new();
        let mut scope = Some(resolver.scope());
        while let Some(current) = scope {
            if let Some(elements) = current.registry().collection(self.collection) {
                levels.push((current, elements));
                if !inherit {
                    break;
                }
            }
            scope = current.parent();
        }

        let mut values = ELEMENTS.get_scoped();
        for (owner, elements) in levels.into_iter().rev() {
            for binding in elements {
                if exclude_singletons && binding.registration.lifetime == Lifetime::Singleton {
                    debug!(
                        dependency = binding.registration.implementation.name,
                        "Singleton excluded from scope local collection"
                    );
                    continue;
                }
                values.push(resolver.resolve_binding(owner, binding)?);
            }
        }

        debug!(collection = self.collection.name, len = values.len(), "Collection resolved");
        (self.collect)(&values).ok_or_else(|| incorrect_type(self.collection))
    }
}

impl InstanceProvider for CollectionProvider {
    #[inline]
    fn produce(&self, resolver: &Resolver) -> Result<Erased, ResolveErrorKind> {
        self.collect(resolver, false)
    }
}

/// Resolves the nearest registration of the wrapped type from the current scope and wraps the value.
/// Collections resolved this way don't include singletons.
pub(crate) struct ScopeLocalProvider {
    pub(crate) target: TypeInfo,
    pub(crate) wrap: fn(Erased) -> Option<Erased>,
}

impl InstanceProvider for ScopeLocalProvider {
    fn produce(&self, resolver: &Resolver) -> Result<Erased, ResolveErrorKind> {
        let scope = resolver.scope();
        if scope.parent().is_none() {
            let err = ResolveErrorKind::invalid_operation(format!(
                "Scope local `{}` can't be resolved in a root container",
                self.target.name
            ));
            error!("{}", err);
            return Err(err);
        }

        let Some((owner, binding)) = scope.find(self.target) else {
            let err = ResolveErrorKind::TypeNotRegistered { type_info: self.target };
            error!("{}", err);
            return Err(err);
        };

        let value = match &binding.registration.provider {
            Provider::Collection(collection) => collection.collect(resolver, true)?,
            _ => resolver.resolve_binding(&owner, &binding)?,
        };
        (self.wrap)(value).ok_or_else(|| incorrect_type(self.target))
    }
}

fn incorrect_type(expected: TypeInfo) -> ResolveErrorKind {
    let err = ResolveErrorKind::IncorrectType {
        expected,
        actual: TypeInfo::of::<BoxedAny>(),
    };
    error!("{}", err);
    err
}
