//! Hooks a value type implements to be stored in, and rebuilt from, an archive.
//!
//! Writing looks at what an [`Object`](super::Value::Object) exposes:
//!
//! - [`SelfWriter`]: the value writes itself into a fresh child group.
//! - [`Reducible`]: the value decomposes into a non-empty [`Mapping`] of
//!   named components, each stored through the normal write path.
//!
//! Reading goes through the [`SchemeRegistry`](super::SchemeRegistry), whose
//! entries carry the type-level counterparts: [`ReadSelf`], [`FromArchive`]
//! and [`FromMapping`].

use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use super::{ArchiveGroup, Value};
use crate::core::Key;
use crate::util::{Error, Result};

/// Decomposed form of a composite value: component key to component value.
pub type Mapping = BTreeMap<Key, Value>;

/// A value type that can be stored as an [`Object`](super::Value::Object).
///
/// Implementors are cloneable and comparable through [`PersistDyn`], which is
/// provided for every `Clone + PartialEq` type.
pub trait Persist: PersistDyn + fmt::Debug + Send + Sync + 'static {
    /// Tag written with the value and looked up in the registry on read.
    /// [`SchemeEntry::of`](super::SchemeEntry::of) registers under the same tag.
    ///
    /// Defaults to the plain type name (the last path segment, without
    /// generic arguments).
    fn declared_scheme_name() -> Cow<'static, str>
    where
        Self: Sized,
    {
        Cow::Borrowed(plain_type_name(std::any::type_name::<Self>()))
    }

    /// The self-serialization capability, if the type has one.
    fn as_self_writer(&self) -> Option<&dyn SelfWriter> {
        None
    }

    /// The reduction capability, if the type has one.
    fn as_reducible(&self) -> Option<&dyn Reducible> {
        None
    }
}

/// Object-safe plumbing for [`Persist`], implemented automatically.
pub trait PersistDyn {
    fn clone_box(&self) -> Box<dyn Persist>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn eq_dyn(&self, other: &dyn Any) -> bool;
    fn type_name(&self) -> &'static str;
    /// The tag of the concrete type, see [`Persist::declared_scheme_name`].
    fn scheme_name(&self) -> Cow<'static, str>;
}

impl<T: Persist + Clone + PartialEq> PersistDyn for T {
    fn clone_box(&self) -> Box<dyn Persist> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn eq_dyn(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|o| o == self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn scheme_name(&self) -> Cow<'static, str> {
        T::declared_scheme_name()
    }
}

impl Clone for Box<dyn Persist> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Writes the value directly into a group created for it.
pub trait SelfWriter {
    fn write_self(&self, group: &ArchiveGroup) -> Result<()>;
}

/// Fills a default-constructed value from its group. Counterpart of [`SelfWriter`].
pub trait ReadSelf: Default {
    fn read_self(&mut self, group: &ArchiveGroup) -> Result<()>;
}

/// Decomposes the value into named components.
///
/// The mapping must not be empty; an empty reduction fails the write.
pub trait Reducible {
    fn reduce_to_mapping(&self) -> Result<Mapping>;
}

/// Rebuilds a value from the components produced by [`Reducible`].
pub trait FromMapping: Sized {
    fn reconstruct_from_mapping(mapping: Mapping) -> Result<Self>;
}

/// Builds a value straight from its group.
pub trait FromArchive: Sized {
    fn construct_from_archive(group: &ArchiveGroup) -> Result<Self>;
}

/// Remove a string-keyed component from a mapping.
pub fn take_component(mapping: &mut Mapping, name: &str) -> Result<Value> {
    mapping
        .remove(&Key::from(name))
        .ok_or_else(|| Error::KeyNotFound(name.to_string()))
}

/// Last path segment of a type name, generic arguments dropped.
pub(crate) fn plain_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Namespace part of a type name (everything before the last segment).
pub(crate) fn type_namespace(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(pos) => &base[..pos],
        None => "",
    }
}
