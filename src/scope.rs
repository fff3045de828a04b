use alloc::{string::String, sync::Arc};
use core::ops::Deref;
use tracing::debug;

use crate::{
    any::{erase, unerase, Erased, TypeInfo},
    container::Container,
};

/// Value of `T` resolved from the scope it's requested in, see
/// [`crate::ContainerBuilder::register_scope_local`]
pub struct ScopeLocal<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> Deref for ScopeLocal<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub(crate) fn wrap_scope_local<T>(value: Erased) -> Option<Erased>
where
    T: ?Sized + Send + Sync + 'static,
{
    unerase::<T>(&value).map(|value| erase(Arc::new(ScopeLocal(value))))
}

/// Reference to the scope a new scope should be created under.
///
/// Declared by the tag type of the parent, or by its name when the type isn't reachable.
/// The container itself is bound lazily, once it exists.
#[derive(Clone, Debug, Default)]
pub struct ParentReference {
    pub type_info: Option<TypeInfo>,
    pub type_name: Option<String>,
    pub object: Option<Container>,
}

impl ParentReference {
    #[inline]
    #[must_use]
    pub fn of<S: 'static>() -> Self {
        let type_info = TypeInfo::of::<S>();
        Self {
            type_info: Some(type_info),
            type_name: Some(String::from(type_info.name)),
            object: None,
        }
    }

    /// Reference by the full or the short name of the tag type
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            type_info: None,
            type_name: Some(name.into()),
            object: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.object.is_some()
    }

    #[must_use]
    pub fn matches(&self, container: &Container) -> bool {
        let Some(tag) = container.tag() else {
            return false;
        };
        if let Some(type_info) = self.type_info {
            return type_info == tag;
        }
        self.type_name
            .as_deref()
            .is_some_and(|name| name == tag.name || name == tag.short_name())
    }

    /// Binds the first live candidate the reference matches, unless it's already bound
    pub fn bind<'a>(&mut self, candidates: impl IntoIterator<Item = &'a Container>) -> Option<&Container> {
        if self.object.is_none() {
            self.object = candidates
                .into_iter()
                .find(|candidate| !candidate.is_disposed() && self.matches(candidate))
                .cloned();

            if let Some(object) = &self.object {
                debug!(tag = object.tag().map(|tag| tag.name), "Parent reference bound");
            }
        }
        self.object.as_ref()
    }
}
