use alloc::{boxed::Box, string::String, sync::Arc};
use core::{any::type_name, mem};

use super::Param;
use crate::{
    any::{erase, unerase, Erased, TypeInfo},
    errors::{InstantiateErrorKind, ResolveErrorKind},
    pool::CappedArrayPool,
    resolver::Resolver,
};

static ARGUMENTS: CappedArrayPool<Erased, 8> = CappedArrayPool::new();

/// Resolved arguments of a constructor, a member setter or a method.
/// Values are taken with [`Args::next`] in the order the params were declared.
pub struct Args {
    values: Box<[Option<Erased>]>,
    cursor: usize,
}

impl Args {
    pub(crate) fn resolve(
        params: &[Param],
        resolver: &Resolver,
        parameters: &[InjectParameter],
    ) -> Result<Self, ResolveErrorKind> {
        let mut args = Self {
            values: ARGUMENTS.rent(params.len()),
            cursor: 0,
        };
        for (slot, param) in args.values.iter_mut().zip(params) {
            let value = match parameters.iter().find(|parameter| parameter.matches(param)) {
                Some(parameter) => parameter.value.clone(),
                None => (param.resolve)(resolver)?,
            };
            *slot = Some(value);
        }
        Ok(args)
    }

    /// Takes the next argument
    ///
    /// # Errors
    /// Returns [`InstantiateErrorKind::Argument`] if the arguments are exhausted
    /// or the argument isn't of type `V`
    pub fn next<V>(&mut self) -> Result<Arc<V>, InstantiateErrorKind>
    where
        V: ?Sized + 'static,
    {
        let index = self.cursor;
        self.cursor += 1;

        let value = self.values.get_mut(index).and_then(Option::take);
        value.as_ref().and_then(unerase::<V>).ok_or(InstantiateErrorKind::Argument {
            index,
            expected: type_name::<V>(),
        })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Drop for Args {
    fn drop(&mut self) {
        ARGUMENTS.give_back(mem::take(&mut self.values));
    }
}

#[derive(Clone)]
enum ParameterTarget {
    Type(TypeInfo),
    Name(String),
}

/// Caller supplied value that takes precedence over the container
/// for matching constructor and method params
#[derive(Clone)]
pub struct InjectParameter {
    target: ParameterTarget,
    value: Erased,
}

impl InjectParameter {
    /// Matches params of type `V`
    #[must_use]
    pub fn typed<V>(value: Arc<V>) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        Self {
            target: ParameterTarget::Type(TypeInfo::of::<V>()),
            value: erase(value),
        }
    }

    /// Matches params declared with the same name
    #[must_use]
    pub fn named<V>(name: impl Into<String>, value: Arc<V>) -> Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        Self {
            target: ParameterTarget::Name(name.into()),
            value: erase(value),
        }
    }

    #[must_use]
    pub(crate) fn matches(&self, param: &Param) -> bool {
        match &self.target {
            ParameterTarget::Type(type_info) => *type_info == param.type_info,
            ParameterTarget::Name(name) => param.name == Some(name.as_str()),
        }
    }
}
