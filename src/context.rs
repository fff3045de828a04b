use alloc::{boxed::Box, vec::Vec};
use core::ops::{Deref, DerefMut};
use tracing::debug;

use crate::{builder::ContainerBuilder, container::Container, errors::ResolveErrorKind};

/// Reusable part of a container configuration
pub trait Installer {
    fn install(&self, builder: &mut ContainerBuilder);
}

/// Installer made of a closure
pub struct ActionInstaller {
    action: Box<dyn Fn(&mut ContainerBuilder)>,
}

impl ActionInstaller {
    #[inline]
    #[must_use]
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&mut ContainerBuilder) + 'static,
    {
        Self {
            action: Box::new(action),
        }
    }
}

impl Installer for ActionInstaller {
    #[inline]
    fn install(&self, builder: &mut ContainerBuilder) {
        (self.action)(builder);
    }
}

/// Overrides applied to the scopes created through it: the parent to create them under
/// and extra installers to run after their own configuration.
///
/// Overrides are pushed with [`Self::enqueue_parent`] and [`Self::enqueue_installer`]
/// and popped when the returned guards are dropped, so they nest.
#[derive(Default)]
pub struct BuildContext {
    parents: Vec<Container>,
    installers: Vec<Box<dyn Installer>>,
}

impl BuildContext {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_parent(&mut self, parent: Container) -> ParentOverrideGuard<'_> {
        self.parents.push(parent);
        ParentOverrideGuard { context: self }
    }

    pub fn enqueue_installer<I>(&mut self, installer: I) -> ExtraInstallationGuard<'_>
    where
        I: Installer + 'static,
    {
        self.installers.push(Box::new(installer));
        ExtraInstallationGuard { context: self }
    }

    #[inline]
    pub fn enqueue_action<F>(&mut self, action: F) -> ExtraInstallationGuard<'_>
    where
        F: Fn(&mut ContainerBuilder) + 'static,
    {
        self.enqueue_installer(ActionInstaller::new(action))
    }

    /// Innermost parent override
    #[inline]
    #[must_use]
    pub fn current_parent(&self) -> Option<&Container> {
        self.parents.last()
    }

    /// Creates a scope under the innermost parent override, or under `default_parent` without one.
    /// A root container is built when there's neither.
    ///
    /// `configure` runs first, then the extra installers, the most recently enqueued first.
    ///
    /// # Errors
    /// See [`ContainerBuilder::build`]
    pub fn create_scope<F>(&self, default_parent: Option<&Container>, configure: F) -> Result<Container, ResolveErrorKind>
    where
        F: FnOnce(&mut ContainerBuilder),
    {
        let mut builder = match self.current_parent().or(default_parent) {
            Some(parent) => ContainerBuilder::child_of(parent.clone()),
            None => ContainerBuilder::new(),
        };

        configure(&mut builder);
        for installer in self.installers.iter().rev() {
            installer.install(&mut builder);
        }

        debug!(
            overridden = !self.parents.is_empty(),
            installers = self.installers.len(),
            "Scope configured"
        );

        builder.build()
    }
}

/// Pops the parent override on drop
pub struct ParentOverrideGuard<'a> {
    context: &'a mut BuildContext,
}

impl Deref for ParentOverrideGuard<'_> {
    type Target = BuildContext;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl DerefMut for ParentOverrideGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl Drop for ParentOverrideGuard<'_> {
    fn drop(&mut self) {
        self.context.parents.pop();
    }
}

/// Pops the extra installer on drop
pub struct ExtraInstallationGuard<'a> {
    context: &'a mut BuildContext,
}

impl Deref for ExtraInstallationGuard<'_> {
    type Target = BuildContext;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl DerefMut for ExtraInstallationGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl Drop for ExtraInstallationGuard<'_> {
    fn drop(&mut self) {
        self.context.installers.pop();
    }
}
