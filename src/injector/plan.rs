use alloc::{collections::BTreeMap, format, sync::Arc, vec::Vec};
use core::{
    any::{Any, TypeId},
    cmp::Reverse,
};
use parking_lot::Mutex;
use tracing::{debug, error};

use super::{
    meta::{Constructor, Member, MemberKind},
    Args, InjectParameter, Injectable, TypeMeta,
};
use crate::{
    any::TypeInfo, errors::ResolveErrorKind, finalizer::BoxedCloneFinalizer, registry::InterfaceBinding,
    resolver::Resolver,
};

/// Compiled plans by the type they build, never invalidated
static PLANS: Mutex<BTreeMap<TypeId, Arc<dyn Any + Send + Sync>>> = Mutex::new(BTreeMap::new());

pub(crate) enum ConstructorSelection<T> {
    Selected(Constructor<T>),
    Ambiguous,
    Missing,
}

/// What has to be supplied to build and populate `T`, and in which order
pub(crate) struct InjectorPlan<T> {
    pub(crate) type_info: TypeInfo,
    pub(crate) constructor: ConstructorSelection<T>,
    /// Fields, then properties, then methods. Base members go first within each kind.
    pub(crate) members: Vec<Member<T>>,
    pub(crate) interfaces: Vec<InterfaceBinding>,
    pub(crate) dispose: Option<fn() -> BoxedCloneFinalizer>,
}

impl<T: Injectable> InjectorPlan<T> {
    /// Gets the cached plan of `T`, compiling it on first use
    #[must_use]
    pub(crate) fn get() -> Arc<Self> {
        let type_id = TypeId::of::<T>();

        let cached = PLANS.lock().get(&type_id).cloned();
        if let Some(plan) = cached.and_then(|plan| plan.downcast::<Self>().ok()) {
            return plan;
        }

        // Reflection may compile base plans, so it runs without the lock held
        let compiled = Arc::new(Self::compile(TypeMeta::reflect()));
        let shared = PLANS
            .lock()
            .entry(type_id)
            .or_insert_with(|| compiled.clone() as Arc<dyn Any + Send + Sync>)
            .clone();
        shared.downcast::<Self>().unwrap_or(compiled)
    }

    fn compile(meta: TypeMeta<T>) -> Self {
        let TypeMeta {
            constructors,
            members,
            ignored,
            base,
            interfaces,
            dispose,
        } = meta;

        let type_info = TypeInfo::of::<T>();
        let members = if ignored { Vec::new() } else { flatten_members(members) };

        debug!(
            dependency = type_info.name,
            base = base.map(|base| base.name),
            members = members.len(),
            ignored,
            "Injector plan compiled"
        );

        Self {
            type_info,
            constructor: select_constructor(constructors),
            members,
            interfaces,
            dispose,
        }
    }

    /// Calls the selected constructor, then injects members into the new instance
    pub(crate) fn construct(&self, resolver: &Resolver, parameters: &[InjectParameter]) -> Result<T, ResolveErrorKind> {
        let constructor = match &self.constructor {
            ConstructorSelection::Selected(constructor) => constructor,
            ConstructorSelection::Ambiguous => {
                let err = ResolveErrorKind::AmbiguousConstructor { type_info: self.type_info };
                error!("{}", err);
                return Err(err);
            }
            ConstructorSelection::Missing => {
                let err = ResolveErrorKind::invalid_operation(format!(
                    "Type `{}` declares no constructor",
                    self.type_info.name
                ));
                error!("{}", err);
                return Err(err);
            }
        };

        let mut instance = {
            let mut args = Args::resolve(&constructor.params, resolver, parameters)?;
            (constructor.body)(&mut args).map_err(|err| {
                error!(dependency = self.type_info.name, "{}", err);
                ResolveErrorKind::from(err)
            })?
        };
        self.inject(&mut instance, resolver, parameters)?;

        Ok(instance)
    }

    /// Injects fields, properties and methods in that order
    pub(crate) fn inject(
        &self,
        instance: &mut T,
        resolver: &Resolver,
        parameters: &[InjectParameter],
    ) -> Result<(), ResolveErrorKind> {
        for member in &self.members {
            let parameters = match member.kind {
                MemberKind::Method => parameters,
                MemberKind::Field | MemberKind::Property => &[],
            };
            let mut args = Args::resolve(&member.params, resolver, parameters)?;
            (member.apply)(instance, &mut args).map_err(|err| {
                error!(dependency = self.type_info.name, member = member.name, "{}", err);
                ResolveErrorKind::from(err)
            })?;
            debug!(member = member.name, "Injected");
        }
        Ok(())
    }
}

pub(crate) fn select_constructor<T>(mut constructors: Vec<Constructor<T>>) -> ConstructorSelection<T> {
    match constructors.iter().filter(|constructor| constructor.marked).count() {
        0 => {}
        1 => {
            return constructors
                .into_iter()
                .find(|constructor| constructor.marked)
                .map_or(ConstructorSelection::Missing, ConstructorSelection::Selected)
        }
        _ => return ConstructorSelection::Ambiguous,
    }

    if constructors.len() <= 1 {
        return constructors
            .pop()
            .map_or(ConstructorSelection::Missing, ConstructorSelection::Selected);
    }

    constructors
        .into_iter()
        .find(|constructor| constructor.params.is_empty())
        .map_or(ConstructorSelection::Ambiguous, ConstructorSelection::Selected)
}

/// Orders members base first and collapses virtual slots.
/// A virtual slot keeps the position of its base declaration, takes the setter of its most derived
/// declaration and is injected if any of its declarations is marked.
pub(crate) fn flatten_members<T>(mut members: Vec<Member<T>>) -> Vec<Member<T>> {
    members.sort_by_key(|member| Reverse(member.depth));

    let mut flattened: Vec<Member<T>> = Vec::with_capacity(members.len());
    let mut slots = BTreeMap::new();
    for member in members {
        if member.overridable {
            let key = (member.kind, member.name);
            if let Some(&index) = slots.get(&key) {
                let slot: &mut Member<T> = &mut flattened[index];
                let marked = slot.marked || member.marked;
                *slot = Member { marked, ..member };
                continue;
            }
            slots.insert(key, flattened.len());
        }
        flattened.push(member);
    }

    flattened.retain(|member| member.marked);
    flattened.sort_by_key(|member| member.kind);
    flattened
}
