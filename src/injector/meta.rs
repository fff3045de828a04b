use alloc::{sync::Arc, vec, vec::Vec};

use super::{Args, Injectable};
use crate::{
    any::{Erased, TypeInfo},
    errors::{InstantiateErrorKind, ResolveErrorKind},
    finalizer::{boxed_dispose_finalizer, BoxedCloneFinalizer, Dispose},
    generic::ClosedGeneric,
    registry::InterfaceBinding,
    resolver::Resolver,
};

pub(crate) type ConstructFn<T> = Arc<dyn Fn(&mut Args) -> Result<T, InstantiateErrorKind> + Send + Sync>;
pub(crate) type ApplyFn<T> = Arc<dyn Fn(&mut T, &mut Args) -> Result<(), InstantiateErrorKind> + Send + Sync>;

/// Single value the container has to supply
#[derive(Clone, Copy)]
pub(crate) struct Param {
    pub(crate) type_info: TypeInfo,
    pub(crate) name: Option<&'static str>,
    pub(crate) resolve: fn(&Resolver) -> Result<Erased, ResolveErrorKind>,
}

impl Param {
    #[inline]
    #[must_use]
    pub(crate) fn of<V>(name: Option<&'static str>) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        Self {
            type_info: TypeInfo::of::<V>(),
            name,
            resolve: resolve_by_type::<V>,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn generic<V: ClosedGeneric>() -> Self {
        Self {
            type_info: TypeInfo::of::<V>(),
            name: None,
            resolve: Resolver::resolve_generic_type::<V>,
        }
    }
}

fn resolve_by_type<V>(resolver: &Resolver) -> Result<Erased, ResolveErrorKind>
where
    V: ?Sized + 'static,
{
    resolver.resolve_type(TypeInfo::of::<V>())
}

pub struct Constructor<T> {
    pub(crate) params: Vec<Param>,
    pub(crate) marked: bool,
    pub(crate) body: ConstructFn<T>,
}

impl<T: 'static> Constructor<T> {
    /// Constructor taking its arguments from [`Args`] in the order the params are declared
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&mut Args) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self {
            params: Vec::new(),
            marked: false,
            body: Arc::new(body),
        }
    }

    #[must_use]
    pub fn param<V>(mut self) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        self.params.push(Param::of::<V>(None));
        self
    }

    /// Param that can be overridden by name with [`super::InjectParameter::named`]
    #[must_use]
    pub fn named_param<V>(mut self, name: &'static str) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        self.params.push(Param::of::<V>(Some(name)));
        self
    }

    #[must_use]
    pub fn generic_param<V: ClosedGeneric>(mut self) -> Self {
        self.params.push(Param::generic::<V>());
        self
    }

    /// Marks the constructor as the one to use
    #[must_use]
    pub fn inject(mut self) -> Self {
        self.marked = true;
        self
    }
}

impl<T: Default + 'static> Constructor<T> {
    #[must_use]
    pub fn from_default() -> Self {
        Self::new(|_| Ok(T::default()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum MemberKind {
    Field,
    Property,
    Method,
}

pub(crate) struct Member<T> {
    pub(crate) kind: MemberKind,
    pub(crate) name: &'static str,
    /// Distance from the concrete type, base members have a greater depth
    pub(crate) depth: usize,
    pub(crate) marked: bool,
    pub(crate) overridable: bool,
    pub(crate) params: Vec<Param>,
    pub(crate) apply: ApplyFn<T>,
}

impl<T: 'static> Member<T> {
    fn setter<V, F>(kind: MemberKind, name: &'static str, setter: F) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        Self {
            kind,
            name,
            depth: 0,
            marked: true,
            overridable: false,
            params: vec![Param::of::<V>(None)],
            apply: Arc::new(move |instance: &mut T, args: &mut Args| {
                setter(instance, args.next::<V>()?);
                Ok(())
            }),
        }
    }

    /// Moves the member one level down the hierarchy, onto the type that embeds `T`
    fn lift<D>(self) -> Member<D>
    where
        D: AsMut<T> + 'static,
    {
        let apply = self.apply;
        Member {
            kind: self.kind,
            name: self.name,
            depth: self.depth + 1,
            marked: self.marked,
            overridable: self.overridable,
            params: self.params,
            apply: Arc::new(move |derived: &mut D, args: &mut Args| apply(derived.as_mut(), args)),
        }
    }
}

/// Field populated after construction
pub struct Field<T>(pub(crate) Member<T>);

impl<T: 'static> Field<T> {
    pub fn new<V, F>(name: &'static str, setter: F) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        Self(Member::setter(MemberKind::Field, name, setter))
    }
}

/// Property populated after every field
pub struct Property<T>(pub(crate) Member<T>);

impl<T: 'static> Property<T> {
    pub fn new<V, F>(name: &'static str, setter: F) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        Self(Member::setter(MemberKind::Property, name, setter))
    }
}

/// Method called after every field and property
pub struct Method<T>(pub(crate) Member<T>);

impl<T: 'static> Method<T> {
    pub fn new<F>(name: &'static str, body: F) -> Self
    where
        F: Fn(&mut T, &mut Args) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self(Member {
            kind: MemberKind::Method,
            name,
            depth: 0,
            marked: true,
            overridable: false,
            params: Vec::new(),
            apply: Arc::new(body),
        })
    }

    #[must_use]
    pub fn param<V>(mut self) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        self.0.params.push(Param::of::<V>(None));
        self
    }

    #[must_use]
    pub fn named_param<V>(mut self, name: &'static str) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        self.0.params.push(Param::of::<V>(Some(name)));
        self
    }

    #[must_use]
    pub fn generic_param<V: ClosedGeneric>(mut self) -> Self {
        self.0.params.push(Param::generic::<V>());
        self
    }
}

macro_rules! impl_member_modifiers {
    ($($member:ident),*) => {
        $(
            impl<T> $member<T> {
                /// Overridable slot. Declarations with the same name on several levels of the
                /// hierarchy are injected once, through the most derived one.
                /// Overrides have to be declared as virtual slots too.
                #[must_use]
                pub fn virtual_slot(mut self) -> Self {
                    self.0.overridable = true;
                    self
                }

                /// Declaration without the injection marker, e.g. an override of a marked slot
                #[must_use]
                pub fn unmarked(mut self) -> Self {
                    self.0.marked = false;
                    self
                }
            }
        )*
    };
}

impl_member_modifiers!(Field, Property, Method);

/// Injection metadata of `T`, filled by [`Injectable::reflect`]
pub struct TypeMeta<T> {
    pub(crate) constructors: Vec<Constructor<T>>,
    pub(crate) members: Vec<Member<T>>,
    pub(crate) ignored: bool,
    pub(crate) base: Option<TypeInfo>,
    pub(crate) interfaces: Vec<InterfaceBinding>,
    pub(crate) dispose: Option<fn() -> BoxedCloneFinalizer>,
}

impl<T: Send + Sync + 'static> TypeMeta<T> {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self {
            constructors: Vec::new(),
            members: Vec::new(),
            ignored: false,
            base: None,
            interfaces: Vec::new(),
            dispose: None,
        }
    }

    #[must_use]
    pub(crate) fn reflect() -> Self
    where
        T: Injectable,
    {
        let mut meta = Self::new();
        T::reflect(&mut meta);
        meta
    }

    pub fn constructor(&mut self, constructor: Constructor<T>) -> &mut Self {
        self.constructors.push(constructor);
        self
    }

    pub fn field(&mut self, field: Field<T>) -> &mut Self {
        self.members.push(field.0);
        self
    }

    pub fn property(&mut self, property: Property<T>) -> &mut Self {
        self.members.push(property.0);
        self
    }

    pub fn method(&mut self, method: Method<T>) -> &mut Self {
        self.members.push(method.0);
        self
    }

    /// Declares `B` as the base of `T`.
    /// Members of `B` and of its own bases are injected through `AsMut<B>`,
    /// and an ignored base makes `T` ignored as well.
    pub fn base<B>(&mut self) -> &mut Self
    where
        T: AsMut<B>,
        B: Injectable,
    {
        let base = TypeMeta::<B>::reflect();
        self.ignored |= base.ignored;
        self.members.extend(base.members.into_iter().map(Member::lift));
        self.base = Some(TypeInfo::of::<B>());
        self
    }

    /// Never inject members into instances of `T`
    pub fn ignore(&mut self) -> &mut Self {
        self.ignored = true;
        self
    }

    pub fn implements<I>(&mut self, cast: fn(Arc<T>) -> Arc<I>) -> &mut Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.interfaces.push(InterfaceBinding::new::<T, I>(cast));
        self
    }

    pub fn disposable(&mut self) -> &mut Self
    where
        T: Dispose,
    {
        self.dispose = Some(boxed_dispose_finalizer::<T>);
        self
    }
}
