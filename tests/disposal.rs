use ivy::{Config, Constructor, ContainerBuilder, Dispose, Injectable, Lifetime, ResolveErrorKind, TypeMeta};
use std::sync::{Arc, Mutex};

type Journal = Arc<Mutex<Vec<&'static str>>>;

struct Connection {
    name: &'static str,
    journal: Journal,
}

impl Dispose for Connection {
    fn dispose(&self) {
        self.journal.lock().unwrap().push(self.name);
    }
}

/// Declares its disposable capability through its metadata
struct Cursor {
    journal: Arc<Journal>,
}

impl Dispose for Cursor {
    fn dispose(&self) {
        self.journal.lock().unwrap().push("cursor");
    }
}

impl Injectable for Cursor {
    fn reflect(meta: &mut TypeMeta<Self>) {
        meta.constructor(Constructor::new(|args| Ok(Self { journal: args.next()? })).param::<Journal>())
            .disposable();
    }
}

fn connection(name: &'static str, journal: &Journal) -> impl Fn() -> Result<Connection, anyhow::Error> + Clone {
    let journal = journal.clone();
    move || {
        Ok(Connection {
            name,
            journal: journal.clone(),
        })
    }
}

#[test]
fn test_scope_disposes_own_instances_once() {
    let journal = Journal::default();

    let mut builder = ContainerBuilder::new();
    builder.register_instance(journal.clone());
    builder.register::<Cursor>(Lifetime::Scoped);
    let root = builder.build().unwrap();

    let child = root
        .create_scope(|builder| {
            builder
                .register_factory(connection("session", &journal), Lifetime::Scoped)
                .disposable();
        })
        .unwrap();

    child.resolve::<Connection>().unwrap();
    child.resolve::<Connection>().unwrap();
    child.resolve::<Cursor>().unwrap();

    child.dispose().unwrap();
    assert_eq!(*journal.lock().unwrap(), ["cursor", "session"]);

    assert!(matches!(child.dispose(), Err(ResolveErrorKind::InvalidOperation { .. })));
    assert!(matches!(
        child.resolve::<Connection>(),
        Err(ResolveErrorKind::InvalidOperation { .. })
    ));
    assert_eq!(journal.lock().unwrap().len(), 2);
}

#[test]
fn test_parent_disposes_children() {
    let journal = Journal::default();

    let mut builder = ContainerBuilder::new();
    builder
        .register_factory(connection("app", &journal), Lifetime::Singleton)
        .disposable();
    let root = builder.build().unwrap();

    let child = root
        .create_scope(|builder| {
            builder
                .register_factory(connection("request", &journal), Lifetime::Scoped)
                .disposable();
        })
        .unwrap();
    let grandchild = child
        .create_scope(|builder| {
            builder
                .register_factory(connection("step", &journal), Lifetime::Scoped)
                .disposable();
        })
        .unwrap();

    assert_eq!(grandchild.resolve::<Connection>().unwrap().name, "step");
    assert_eq!(child.resolve::<Connection>().unwrap().name, "request");
    assert_eq!(root.resolve::<Connection>().unwrap().name, "app");

    root.dispose().unwrap();

    assert_eq!(*journal.lock().unwrap(), ["app", "request", "step"]);
    assert!(child.is_disposed());
    assert!(grandchild.is_disposed());
}

#[test]
fn test_child_disposal_keeps_ancestor_singletons() {
    let journal = Journal::default();

    let mut builder = ContainerBuilder::new();
    builder
        .register_factory(connection("app", &journal), Lifetime::Singleton)
        .disposable();
    let root = builder.build().unwrap();

    let child = root.create_scope(|_| {}).unwrap();
    let from_child = child.resolve::<Connection>().unwrap();
    child.dispose().unwrap();

    assert!(journal.lock().unwrap().is_empty());
    assert!(Arc::ptr_eq(&from_child, &root.resolve::<Connection>().unwrap()));
}

#[test]
fn test_transient_never_disposed() {
    let journal = Journal::default();

    let mut builder = ContainerBuilder::new();
    builder
        .register_factory(connection("transient", &journal), Lifetime::Transient)
        .disposable();
    let container = builder.build().unwrap();

    container.resolve::<Connection>().unwrap();
    container.dispose().unwrap();

    assert!(journal.lock().unwrap().is_empty());
}

#[test]
fn test_dropped_scope_disposed() {
    let journal = Journal::default();

    let mut builder = ContainerBuilder::new();
    builder.register_instance(journal.clone());
    builder.register::<Cursor>(Lifetime::Scoped);
    let root = builder.build().unwrap();

    {
        let child = root.create_scope(|_| {}).unwrap();
        child.resolve::<Cursor>().unwrap();
    }
    assert_eq!(*journal.lock().unwrap(), ["cursor"]);

    let mut builder = ContainerBuilder::new();
    builder.with_config(Config {
        dispose_on_drop: false,
        ..Config::default()
    });
    builder.register_instance(journal.clone());
    builder.register::<Cursor>(Lifetime::Scoped);
    let kept = builder.build().unwrap();
    kept.resolve::<Cursor>().unwrap();
    drop(kept);

    assert_eq!(journal.lock().unwrap().len(), 1);
}
