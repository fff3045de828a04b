use alloc::{collections::BTreeMap, sync::Arc, vec, vec::Vec};
use core::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    any::{erase, unerase, Erased, TypeInfo},
    finalizer::BoxedCloneFinalizer,
    generic::ClosedGeneric,
    injector::{construct, InjectorPlan, Injectable},
    lifetime::Lifetime,
    provider::{CollectionProvider, Provider},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct RegistrationId(usize);

impl RegistrationId {
    #[must_use]
    pub(crate) fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) type Cast = Arc<dyn Fn(&Erased) -> Option<Erased> + Send + Sync>;

/// Builds the collection value out of erased elements
pub(crate) type Collect = fn(&[Erased]) -> Option<Erased>;

#[derive(Clone, Copy)]
pub(crate) struct CollectionKey {
    pub(crate) type_info: TypeInfo,
    pub(crate) collect: Collect,
}

impl CollectionKey {
    #[inline]
    #[must_use]
    pub(crate) fn of<I>() -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        Self {
            type_info: TypeInfo::of::<Vec<Arc<I>>>(),
            collect: collect::<I>,
        }
    }
}

fn collect<I>(elements: &[Erased]) -> Option<Erased>
where
    I: ?Sized + Send + Sync + 'static,
{
    elements
        .iter()
        .map(unerase::<I>)
        .collect::<Option<Vec<_>>>()
        .map(|elements| erase(Arc::new(elements)))
}

/// Type a registration can be resolved as
#[derive(Clone)]
pub(crate) struct InterfaceBinding {
    pub(crate) type_info: TypeInfo,
    pub(crate) cast: Cast,
    pub(crate) collection: Option<CollectionKey>,
}

impl InterfaceBinding {
    #[must_use]
    pub(crate) fn new<T, I>(cast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        I: ?Sized + Send + Sync + 'static,
    {
        Self {
            type_info: TypeInfo::of::<I>(),
            cast: Arc::new(move |instance: &Erased| unerase::<T>(instance).map(|instance| erase(cast(instance)))),
            collection: Some(CollectionKey::of::<I>()),
        }
    }

    #[must_use]
    pub(crate) fn of_self<T>() -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            collection: Some(CollectionKey::of::<T>()),
            ..Self::identity(TypeInfo::of::<T>())
        }
    }

    /// Binding without a collection, used by collections themselves
    #[must_use]
    pub(crate) fn identity(type_info: TypeInfo) -> Self {
        Self {
            type_info,
            cast: Arc::new(|instance: &Erased| Some(instance.clone())),
            collection: None,
        }
    }
}

pub(crate) struct Registration {
    pub(crate) id: RegistrationId,
    pub(crate) implementation: TypeInfo,
    pub(crate) lifetime: Lifetime,
    pub(crate) interfaces: Vec<InterfaceBinding>,
    pub(crate) provider: Provider,
    pub(crate) finalizer: Option<BoxedCloneFinalizer>,
}

impl Registration {
    /// Registration of `T` built by its injector plan and bound to itself
    #[must_use]
    pub(crate) fn construct<T: Injectable>(lifetime: Lifetime) -> Self {
        let plan = InjectorPlan::<T>::get();
        Self {
            id: RegistrationId::next(),
            implementation: TypeInfo::of::<T>(),
            lifetime,
            interfaces: vec![InterfaceBinding::of_self::<T>()],
            provider: Provider::Construct { construct: construct::<T> },
            finalizer: plan.dispose.map(|dispose| dispose()),
        }
    }
}

/// Registration found for a requested type, with the index of the matched interface binding
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) registration: Arc<Registration>,
    pub(crate) index: usize,
}

impl Binding {
    #[inline]
    #[must_use]
    pub(crate) fn interface(&self) -> &InterfaceBinding {
        &self.registration.interfaces[self.index]
    }
}

/// Compiled registration table of one scope.
/// Entries never change after the build, only closed generic registrations are added lazily.
pub(crate) struct Registry {
    entries: BTreeMap<TypeInfo, Binding>,
    collections: BTreeMap<TypeInfo, Vec<Binding>>,
    open_generics: BTreeMap<TypeInfo, Lifetime>,
    closed: Mutex<BTreeMap<TypeInfo, Binding>>,
}

impl Registry {
    #[must_use]
    pub(crate) fn new(registrations: Vec<Registration>, open_generics: BTreeMap<TypeInfo, Lifetime>) -> Self {
        let mut entries = BTreeMap::new();
        let mut collections: BTreeMap<TypeInfo, Vec<Binding>> = BTreeMap::new();
        let mut collection_keys = Vec::new();

        for registration in registrations {
            let registration = Arc::new(registration);
            for (index, interface) in registration.interfaces.iter().enumerate() {
                let binding = Binding {
                    registration: registration.clone(),
                    index,
                };
                // The last registration of a type wins for single resolution
                entries.insert(interface.type_info, binding.clone());

                if let Some(key) = interface.collection {
                    let elements = collections.entry(key.type_info).or_default();
                    if elements.is_empty() {
                        collection_keys.push(key);
                    }
                    elements.push(binding);
                }
            }
        }

        for CollectionKey { type_info, collect } in collection_keys {
            if entries.contains_key(&type_info) {
                continue;
            }
            let registration = Arc::new(Registration {
                id: RegistrationId::next(),
                implementation: type_info,
                lifetime: Lifetime::Transient,
                interfaces: vec![InterfaceBinding::identity(type_info)],
                provider: Provider::Collection(CollectionProvider {
                    collection: type_info,
                    collect,
                }),
                finalizer: None,
            });
            entries.insert(type_info, Binding { registration, index: 0 });
        }

        debug!(
            entries = entries.len(),
            collections = collections.len(),
            open_generics = open_generics.len(),
            "Registry compiled"
        );

        Self {
            entries,
            collections,
            open_generics,
            closed: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub(crate) fn get(&self, type_info: TypeInfo) -> Option<Binding> {
        if let Some(binding) = self.entries.get(&type_info) {
            return Some(binding.clone());
        }
        if self.open_generics.is_empty() {
            return None;
        }
        self.closed.lock().get(&type_info).cloned()
    }

    /// Elements registered for the collection type in registration order
    #[inline]
    #[must_use]
    pub(crate) fn collection(&self, type_info: TypeInfo) -> Option<&[Binding]> {
        self.collections.get(&type_info).map(Vec::as_slice)
    }

    #[inline]
    #[must_use]
    pub(crate) fn contains(&self, type_info: TypeInfo) -> bool {
        self.entries.contains_key(&type_info) || self.open_generics.contains_key(&type_info)
    }

    /// Closes the open generic definition of `T`, if this table declares it.
    /// The closed registration is created once and shared by every later request.
    #[must_use]
    pub(crate) fn close<T: ClosedGeneric>(&self) -> Option<Binding> {
        let lifetime = *self.open_generics.get(&TypeInfo::of::<T::Definition>())?;

        let mut closed = self.closed.lock();
        let binding = closed.entry(TypeInfo::of::<T>()).or_insert_with(|| {
            debug!(dependency = TypeInfo::of::<T>().name, %lifetime, "Open generic closed");
            Binding {
                registration: Arc::new(Registration::construct::<T>(lifetime)),
                index: 0,
            }
        });
        Some(binding.clone())
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
