#![no_std]

extern crate alloc;

#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod builder;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod finalizer;
pub(crate) mod generic;
pub(crate) mod inject;
pub(crate) mod injector;
pub(crate) mod instantiator;
pub(crate) mod lifetime;
pub(crate) mod provider;
pub(crate) mod registry;
pub(crate) mod resolver;
pub(crate) mod scope;
pub(crate) mod service;

pub mod pool;

pub use any::TypeInfo;
pub use builder::{ContainerBuilder, RegistrationBuilder};
pub use config::Config;
pub use container::Container;
pub use context::{ActionInstaller, BuildContext, ExtraInstallationGuard, Installer, ParentOverrideGuard};
pub use dependency_resolver::DependencyResolver;
pub use errors::{CyclePath, InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind};
pub use finalizer::{Dispose, Finalizer};
pub use generic::ClosedGeneric;
pub use inject::{Inject, InjectAll};
pub use injector::{Args, Constructor, Field, InjectParameter, Injectable, Method, Property, TypeMeta};
pub use instantiator::{instance, Instantiator};
pub use lifetime::Lifetime;
pub use resolver::Resolver;
pub use scope::{ParentReference, ScopeLocal};
