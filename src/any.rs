use alloc::{borrow::Cow, boxed::Box, format, sync::Arc, vec::Vec};
use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};

#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Name without the module path, generic arguments keep their paths.
    /// Trait objects keep the `dyn` keyword and shorten every bound.
    #[must_use]
    pub fn short_name(&self) -> Cow<'static, str> {
        match self.name.strip_prefix("dyn ") {
            Some(bounds) => {
                let bounds = bounds.split(" + ").map(short_path).collect::<Vec<_>>();
                Cow::Owned(format!("dyn {}", bounds.join(" + ")))
            }
            None => Cow::Borrowed(short_path(self.name)),
        }
    }
}

fn short_path(path: &'static str) -> &'static str {
    let base = path.split_once('<').map_or(path, |(base, _)| base);
    match base.rsplit_once("::") {
        Some((prefix, _)) => &path[prefix.len() + 2..],
        None => path,
    }
}

/// Type-erased shared instance. The concrete payload is always `Arc<T>` for the provided `T`,
/// which keeps unsized interfaces (`dyn Trait`) representable.
pub(crate) type Erased = Arc<dyn Any + Send + Sync>;

/// Value produced by constructors and factories before it's shared.
pub(crate) type BoxedAny = Box<dyn Any + Send + Sync>;

#[inline]
#[must_use]
pub(crate) fn erase<T>(value: Arc<T>) -> Erased
where
    T: ?Sized + Send + Sync + 'static,
{
    Arc::new(value)
}

#[inline]
#[must_use]
pub(crate) fn unerase<T>(erased: &Erased) -> Option<Arc<T>>
where
    T: ?Sized + 'static,
{
    erased.downcast_ref::<Arc<T>>().cloned()
}

/// Moves a freshly produced value behind an `Arc` and erases it.
#[must_use]
pub(crate) fn seal<T>(value: BoxedAny) -> Option<Erased>
where
    T: Send + Sync + 'static,
{
    value.downcast::<T>().ok().map(|value| erase(Arc::<T>::from(value)))
}
