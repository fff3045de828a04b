use ivy::{
    Constructor, ContainerBuilder, Field, InjectParameter, Injectable, Lifetime, Method, Property, ResolveErrorKind,
    TypeMeta,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        42
    }
}

struct Logger {
    prefix: &'static str,
}

impl Injectable for Logger {
    fn reflect(meta: &mut TypeMeta<Self>) {
        meta.constructor(Constructor::new(|_| Ok(Self { prefix: "app" })));
    }
}

struct Storage;

impl Injectable for Storage {
    fn reflect(meta: &mut TypeMeta<Self>) {
        meta.constructor(Constructor::new(|_| Ok(Self)));
    }
}

/// Takes its dependencies through every kind of injection point
#[derive(Default)]
struct AllFeatures {
    port: u16,
    logger: Option<Arc<Logger>>,
    storage: Option<Arc<Storage>>,
    clock: Option<Arc<dyn Clock>>,
    started_at: Option<u64>,
    steps: Vec<&'static str>,
}

impl Injectable for AllFeatures {
    fn reflect(meta: &mut TypeMeta<Self>) {
        meta.constructor(
            Constructor::new(|args| {
                Ok(Self {
                    port: *args.next::<u16>()?,
                    steps: vec!["constructor"],
                    ..Self::default()
                })
            })
            .named_param::<u16>("port")
            .inject(),
        )
        .constructor(Constructor::from_default())
        .method(
            Method::new("start", |this: &mut Self, args| {
                this.started_at = Some(args.next::<dyn Clock>()?.now());
                this.steps.push("method");
                Ok(())
            })
            .param::<dyn Clock>(),
        )
        .property(Property::new("clock", |this: &mut Self, clock: Arc<dyn Clock>| {
            this.clock = Some(clock);
            this.steps.push("property");
        }))
        .field(Field::new("logger", |this: &mut Self, logger: Arc<Logger>| {
            this.logger = Some(logger);
            this.steps.push("field");
        }))
        .field(Field::new("storage", |this: &mut Self, storage: Arc<Storage>| {
            this.storage = Some(storage);
            this.steps.push("field");
        }));
    }
}

fn services() -> ContainerBuilder {
    let mut builder = ContainerBuilder::new();
    builder.register::<Logger>(Lifetime::Singleton);
    builder.register::<Storage>(Lifetime::Scoped);
    builder
        .register_factory(|| Ok::<_, anyhow::Error>(FixedClock), Lifetime::Singleton)
        .as_::<dyn Clock>(|clock| clock as Arc<dyn Clock>);
    builder.register_instance(8080u16);
    builder
}

#[test]
fn test_all_features_in_order() {
    let mut builder = services();
    builder.register::<AllFeatures>(Lifetime::Transient);
    let container = builder.build().unwrap();

    let service = container.resolve::<AllFeatures>().unwrap();

    assert_eq!(service.port, 8080);
    assert_eq!(service.logger.as_ref().unwrap().prefix, "app");
    assert!(Arc::ptr_eq(
        service.storage.as_ref().unwrap(),
        &container.resolve::<Storage>().unwrap()
    ));
    assert_eq!(service.clock.as_ref().unwrap().now(), 42);
    assert_eq!(service.started_at, Some(42));
    assert_eq!(service.steps, ["constructor", "field", "field", "property", "method"]);
}

#[test]
fn test_custom_parameters() {
    let container = services().build().unwrap();

    let service = container
        .instantiate::<AllFeatures>(&[InjectParameter::named("port", Arc::new(9090u16))])
        .unwrap();
    assert_eq!(service.port, 9090);

    let service = container
        .instantiate::<AllFeatures>(&[InjectParameter::typed(Arc::new(7070u16))])
        .unwrap();
    assert_eq!(service.port, 7070);
}

#[test]
fn test_inject_existing() {
    let container = services().build().unwrap();

    let mut service = AllFeatures::default();
    container.inject(&mut service).unwrap();

    assert_eq!(service.port, 0);
    assert!(service.logger.is_some());
    assert_eq!(service.steps, ["field", "field", "property", "method"]);
}

#[test]
fn test_failed_member_aborts_injection() {
    let mut builder = ContainerBuilder::new();
    builder.register::<Logger>(Lifetime::Singleton);
    let container = builder.build().unwrap();

    let mut service = AllFeatures::default();
    let err = container.inject(&mut service).unwrap_err();

    assert!(matches!(err, ResolveErrorKind::TypeNotRegistered { .. }));
    assert!(err.to_string().contains("Storage"));
    assert_eq!(service.steps, ["field"]);
}

mod base {
    use ivy::{Constructor, Field, Injectable, Method, Property, TypeMeta};
    use std::sync::Arc;

    use super::{Logger, Storage};

    /// Keeps its injected members private
    #[derive(Default)]
    pub struct Component {
        logger: Option<Arc<Logger>>,
        storage: Option<Arc<Storage>>,
        awake: bool,
    }

    impl Component {
        pub fn is_ready(&self) -> bool {
            self.logger.is_some() && self.storage.is_some() && self.awake
        }
    }

    impl Injectable for Component {
        fn reflect(meta: &mut TypeMeta<Self>) {
            meta.constructor(Constructor::from_default())
                .field(Field::new("logger", |this: &mut Self, logger: Arc<Logger>| {
                    this.logger = Some(logger);
                }))
                .property(Property::new("storage", |this: &mut Self, storage: Arc<Storage>| {
                    this.storage = Some(storage);
                }))
                .method(Method::new("awake", |this: &mut Self, _| {
                    this.awake = true;
                    Ok(())
                }));
        }
    }
}

#[derive(Default)]
struct Player {
    component: base::Component,
}

impl AsMut<base::Component> for Player {
    fn as_mut(&mut self) -> &mut base::Component {
        &mut self.component
    }
}

impl Injectable for Player {
    fn reflect(meta: &mut TypeMeta<Self>) {
        meta.constructor(Constructor::from_default()).base::<base::Component>();
    }
}

#[test]
fn test_base_private_members_injected() {
    let mut builder = services();
    builder.register::<Player>(Lifetime::Transient);
    let container = builder.build().unwrap();

    assert!(container.resolve::<Player>().unwrap().component.is_ready());
}

#[derive(Default)]
struct Widget {
    base_calls: AtomicUsize,
    override_calls: AtomicUsize,
}

impl Injectable for Widget {
    fn reflect(meta: &mut TypeMeta<Self>) {
        meta.constructor(Constructor::from_default()).method(
            Method::new("refresh", |this: &mut Self, _| {
                this.base_calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .param::<Logger>()
            .virtual_slot(),
        );
    }
}

#[derive(Default)]
struct Button {
    widget: Widget,
}

impl AsMut<Widget> for Button {
    fn as_mut(&mut self) -> &mut Widget {
        &mut self.widget
    }
}

impl Injectable for Button {
    fn reflect(meta: &mut TypeMeta<Self>) {
        meta.constructor(Constructor::from_default())
            .method(
                Method::new("refresh", |this: &mut Self, _| {
                    this.widget.override_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .param::<Logger>()
                .virtual_slot()
                .unmarked(),
            )
            .base::<Widget>();
    }
}

#[test]
fn test_virtual_member_injected_once() {
    let mut builder = services();
    builder.register::<Button>(Lifetime::Transient);
    let container = builder.build().unwrap();

    let button = container.resolve::<Button>().unwrap();
    assert_eq!(button.widget.base_calls.load(Ordering::SeqCst), 0);
    assert_eq!(button.widget.override_calls.load(Ordering::SeqCst), 1);
}

struct Untouched {
    logger: Option<Arc<Logger>>,
}

impl Injectable for Untouched {
    fn reflect(meta: &mut TypeMeta<Self>) {
        meta.constructor(Constructor::new(|_| Ok(Self { logger: None })))
            .field(Field::new("logger", |this: &mut Self, logger: Arc<Logger>| {
                this.logger = Some(logger);
            }))
            .ignore();
    }
}

#[test]
fn test_ignored_type_not_injected() {
    let mut builder = services();
    builder.register::<Untouched>(Lifetime::Transient);
    let container = builder.build().unwrap();

    assert!(container.resolve::<Untouched>().unwrap().logger.is_none());
}

struct Ambiguous;

impl Injectable for Ambiguous {
    fn reflect(meta: &mut TypeMeta<Self>) {
        meta.constructor(Constructor::new(|_| Ok(Self)).param::<Logger>())
            .constructor(Constructor::new(|_| Ok(Self)).param::<Storage>());
    }
}

#[test]
fn test_ambiguous_constructor() {
    let mut builder = services();
    builder.register::<Ambiguous>(Lifetime::Transient);
    let container = builder.build().unwrap();

    let err = container.resolve::<Ambiguous>().err().unwrap();
    assert!(matches!(err, ResolveErrorKind::AmbiguousConstructor { .. }));
    assert!(err.to_string().contains("Ambiguous"));
}
