use alloc::{sync::Arc, vec::Vec};

use crate::{dependency_resolver::DependencyResolver, resolver::Resolver, ResolveErrorKind};

/// Factory argument resolved by its registration, honoring its lifetime
pub struct Inject<Dep: ?Sized>(pub Arc<Dep>);

impl<Dep> DependencyResolver for Inject<Dep>
where
    Dep: ?Sized + Send + Sync + 'static,
{
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(resolver: &Resolver) -> Result<Self, Self::Error> {
        resolver.resolve().map(Self)
    }
}

/// Factory argument with every registration exposed as `I`, in registration order
pub struct InjectAll<I: ?Sized>(pub Vec<Arc<I>>);

impl<I> DependencyResolver for InjectAll<I>
where
    I: ?Sized + Send + Sync + 'static,
{
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(resolver: &Resolver) -> Result<Self, Self::Error> {
        resolver.resolve_all().map(Self)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{Inject, InjectAll};
    use crate::{dependency_resolver::DependencyResolver as _, instance, resolver::Resolver, ContainerBuilder, Lifetime};

    use alloc::{
        format,
        string::{String, ToString as _},
        sync::Arc,
        vec::Vec,
    };
    use tracing_test::traced_test;

    trait Plugin: Send + Sync {
        fn name(&self) -> &'static str;
    }

    #[derive(Clone)]
    struct Audio;

    impl Plugin for Audio {
        fn name(&self) -> &'static str {
            "audio"
        }
    }

    #[derive(Clone)]
    struct Video;

    impl Plugin for Video {
        fn name(&self) -> &'static str {
            "video"
        }
    }

    #[test]
    #[traced_test]
    fn test_inject_all_in_registration_order() {
        let mut builder = ContainerBuilder::new();
        builder
            .register_factory(instance(Video), Lifetime::Singleton)
            .as_::<dyn Plugin>(|plugin| plugin as Arc<dyn Plugin>);
        builder
            .register_factory(instance(Audio), Lifetime::Transient)
            .as_::<dyn Plugin>(|plugin| plugin as Arc<dyn Plugin>);
        let resolver = Resolver::new(builder.build().unwrap());

        let InjectAll(plugins) = InjectAll::<dyn Plugin>::resolve(&resolver).unwrap();
        assert_eq!(plugins.iter().map(|plugin| plugin.name()).collect::<Vec<_>>(), ["video", "audio"]);

        // The last registration wins for a single value
        let Inject(plugin) = Inject::<dyn Plugin>::resolve(&resolver).unwrap();
        assert_eq!(plugin.name(), "audio");
    }

    #[test]
    #[traced_test]
    fn test_inject_all_empty_is_not_registered() {
        let resolver = Resolver::new(ContainerBuilder::new().build().unwrap());

        assert!(InjectAll::<dyn Plugin>::resolve(&resolver).is_err());
    }
}
