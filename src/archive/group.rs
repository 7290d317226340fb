//! Dict-like view onto one group of an archive.
//!
//! A view is a shared handle to the archive plus a path. Views are cheap to
//! create and clone; the archive root owns the backend and every call locks
//! it only for the duration of one backend operation.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::containers::{DictWrap, ListWrap, TupleWrap};
use super::options::{ArchiveOptions, OverwritePolicy};
use super::protocol::{Mapping, Reducible, SelfWriter};
use super::scheme::{SchemeEntry, SchemeRef, SchemeRegistry};
use super::Value;
use crate::core::{Array, Attributes, Backend, Dataset, Key, KeyCodec, NodePath, Scalar};
use crate::util::{Error, Result};

/// State shared by an archive and all views derived from it.
pub(crate) struct Shared {
    backend: Mutex<Option<Box<dyn Backend>>>,
    options: ArchiveOptions,
    codec: KeyCodec,
    /// Bumped on every mutation; cached key listings from older
    /// generations are stale.
    generation: AtomicU64,
    /// Mutations in progress. The last one to finish flushes.
    in_flight: AtomicUsize,
    label: String,
}

impl Shared {
    pub(crate) fn new(backend: Box<dyn Backend>, options: ArchiveOptions, label: String) -> Arc<Self> {
        Arc::new(Self {
            backend: Mutex::new(Some(backend)),
            codec: KeyCodec::new(options.key_mode),
            options,
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            label,
        })
    }

    /// Flush and release the backend. Later calls are no-ops.
    pub(crate) fn close(&self) -> Result<()> {
        let mut guard = self.backend.lock();
        let result = match guard.as_mut() {
            Some(backend) => backend.flush(),
            None => return Ok(()),
        };
        *guard = None;
        self.generation.fetch_add(1, Ordering::AcqRel);
        result
    }

    pub(crate) fn is_open(&self) -> bool {
        self.backend.lock().is_some()
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeKind {
    Group,
    Dataset,
    Missing,
}

/// What the callback of [`ArchiveGroup::apply_on_leaves`] wants done with a leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum LeafAction {
    Keep,
    Delete,
    Replace(Value),
}

/// A view onto one group of an archive.
pub struct ArchiveGroup {
    shared: Arc<Shared>,
    path: NodePath,
    cache: Mutex<Option<(u64, Arc<Vec<String>>)>>,
}

impl ArchiveGroup {
    pub(crate) fn new(shared: Arc<Shared>, path: NodePath) -> Self {
        Self {
            shared,
            path,
            cache: Mutex::new(None),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Path of this group from the archive root.
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Storage name of this group, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.path.name()
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.shared.options
    }

    /// False once the owning archive has been closed.
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// True if both views address the same group of the same archive.
    pub fn same_node(&self, other: &ArchiveGroup) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.path == other.path
    }

    fn backend<R>(&self, f: impl FnOnce(&mut dyn Backend) -> Result<R>) -> Result<R> {
        let mut guard = self.shared.backend.lock();
        match guard.as_mut() {
            Some(backend) => f(backend.as_mut()),
            None => Err(Error::Closed),
        }
    }

    fn child(&self, name: &str) -> ArchiveGroup {
        ArchiveGroup::new(self.shared.clone(), self.path.child(name))
    }

    fn invalidate(&self) {
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Run one mutation. Listings are invalidated whatever the outcome.
    ///
    /// Nested mutations (a self-writer calling `set`, `update` storing many
    /// entries) do not flush; the outermost one flushes once on success.
    fn mutate<R>(&self, op: impl FnOnce() -> Result<R>) -> Result<R> {
        self.shared.in_flight.fetch_add(1, Ordering::AcqRel);
        let result = op();
        let outermost = self.shared.in_flight.fetch_sub(1, Ordering::AcqRel) == 1;
        self.invalidate();
        let value = result?;
        if outermost {
            self.flush()?;
        }
        Ok(value)
    }

    fn kind_of(&self, name: &str) -> Result<NodeKind> {
        self.backend(|b| {
            Ok(if b.is_group(&self.path, name) {
                NodeKind::Group
            } else if b.is_dataset(&self.path, name) {
                NodeKind::Dataset
            } else {
                NodeKind::Missing
            })
        })
    }

    /// Storage names of the children, cached until the next mutation.
    fn names(&self) -> Result<Arc<Vec<String>>> {
        let generation = self.shared.generation.load(Ordering::Acquire);
        if let Some((cached_gen, names)) = self.cache.lock().as_ref() {
            if *cached_gen == generation {
                return Ok(names.clone());
            }
        }
        let names = Arc::new(self.backend(|b| b.list_children(&self.path))?);
        *self.cache.lock() = Some((generation, names.clone()));
        Ok(names)
    }

    /// Storage names of the children, in backend order.
    pub fn storage_names(&self) -> Result<Vec<String>> {
        Ok(self.names()?.as_ref().clone())
    }

    /// Keys of the children, in backend order.
    pub fn keys(&self) -> Result<Vec<Key>> {
        self.names()?
            .iter()
            .map(|name| self.shared.codec.decode(name))
            .collect()
    }

    /// True if `key` names a child. Keys the codec rejects are never present.
    pub fn contains(&self, key: impl Into<Key>) -> Result<bool> {
        let name = match self.shared.codec.encode(&key.into()) {
            Ok(name) => name,
            Err(e) if e.is_key_error() => return Ok(false),
            Err(e) => return Err(e),
        };
        Ok(self.names()?.iter().any(|n| *n == name))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.names()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// True if `key` names a subgroup.
    pub fn is_group(&self, key: impl Into<Key>) -> Result<bool> {
        let name = self.shared.codec.encode(&key.into())?;
        Ok(self.kind_of(&name)? == NodeKind::Group)
    }

    /// True if `key` names a dataset.
    pub fn is_dataset(&self, key: impl Into<Key>) -> Result<bool> {
        let name = self.shared.codec.encode(&key.into())?;
        Ok(self.kind_of(&name)? == NodeKind::Dataset)
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    /// Read an entry, rebuilding tagged groups when the archive options ask for it.
    pub fn get(&self, key: impl Into<Key>) -> Result<Value> {
        self.get_with(key, self.shared.options.reconstruct)
    }

    /// Read an entry without rebuilding: groups always come back as views.
    pub fn get_raw(&self, key: impl Into<Key>) -> Result<Value> {
        self.get_with(key, false)
    }

    /// Read an entry, choosing whether tagged groups are rebuilt.
    pub fn get_with(&self, key: impl Into<Key>, reconstruct: bool) -> Result<Value> {
        let key = key.into();
        let name = self.shared.codec.encode(&key)?;
        self.read_entry(&key, &name, reconstruct)
    }

    /// View of the subgroup `key`.
    pub fn group(&self, key: impl Into<Key>) -> Result<ArchiveGroup> {
        let key = key.into();
        let name = self.shared.codec.encode(&key)?;
        match self.kind_of(&name)? {
            NodeKind::Group => Ok(self.child(&name)),
            NodeKind::Dataset => Err(Error::mismatch("group", format!("dataset {}", key.plain()))),
            NodeKind::Missing => Err(Error::KeyNotFound(key.plain())),
        }
    }

    fn read_entry(&self, key: &Key, name: &str, reconstruct: bool) -> Result<Value> {
        match self.kind_of(name)? {
            NodeKind::Dataset => Ok(Value::from(self.backend(|b| b.read_dataset(&self.path, name))?)),
            NodeKind::Missing => Err(Error::KeyNotFound(key.plain())),
            NodeKind::Group => {
                let child = self.child(name);
                if reconstruct {
                    child.reconstruct(key)
                } else {
                    Ok(Value::Group(child))
                }
            }
        }
    }

    fn reconstruct(self, key: &Key) -> Result<Value> {
        let attrs = self.backend(|b| b.attributes(&self.path))?;
        let registry = SchemeRegistry::global();

        match SchemeRef::from_attributes(&attrs) {
            SchemeRef::Untagged => Ok(Value::Group(self)),
            SchemeRef::Current(tag) => match registry.lookup(&tag) {
                Ok(entry) => self.rebuild(&entry, key),
                Err(_) => {
                    tracing::warn!(scheme = %tag, path = %self.path, "data scheme is not recognized, returning the group");
                    Ok(Value::Group(self))
                }
            },
            SchemeRef::Legacy { class, module } => match registry.lookup_legacy(&module, &class) {
                Some(entry) => self.rebuild(&entry, key),
                None => Err(Error::LegacyClassNotFound { module, class }),
            },
        }
    }

    fn rebuild(&self, entry: &SchemeEntry, key: &Key) -> Result<Value> {
        tracing::trace!(path = %self.path, scheme = entry.tag(), "rebuilding value");
        if let Some(read_self) = entry.read_self() {
            return read_self(self);
        }
        if let Some(factory) = entry.archive_factory() {
            return factory(self);
        }
        if let Some(factory) = entry.mapping_factory() {
            return factory(self.read_mapping()?);
        }
        Err(Error::CannotReconstruct {
            type_name: entry.qualified_name(),
            key: key.plain(),
        })
    }

    /// Every entry of this group, rebuilt, keyed by decoded key.
    pub fn read_mapping(&self) -> Result<Mapping> {
        let mut mapping = Mapping::new();
        for name in self.names()?.iter() {
            let key = self.shared.codec.decode(name)?;
            let value = self.read_entry(&key, name, true)?;
            mapping.insert(key, value);
        }
        Ok(mapping)
    }

    /// Iterate `(key, value)` pairs. Each call starts from the current listing.
    pub fn iter(&self) -> Entries<'_> {
        Entries {
            group: self,
            names: None,
            pos: 0,
            done: false,
        }
    }

    /// Same as [`iter`](Self::iter).
    pub fn items(&self) -> Entries<'_> {
        self.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = Result<Value>> + '_ {
        self.iter().map(|entry| entry.map(|(_, v)| v))
    }

    // ------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------

    /// Write `value` under `key`.
    ///
    /// Values are stored by the first capability that applies: self-writing
    /// objects, reducible objects and containers (as tagged subgroups), raw
    /// arrays, nested archive groups (deep-copied), then scalars. Values
    /// must not contain themselves.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        self.mutate(|| self.store(&key, &value))
    }

    /// Write every pair of `entries`, flushing once at the end.
    pub fn update<I, K, V>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        self.mutate(|| {
            for (k, v) in entries {
                self.store(&k.into(), &v.into())?;
            }
            Ok(())
        })
    }

    /// Create an empty subgroup, following the overwrite policy.
    pub fn create_group(&self, key: impl Into<Key>) -> Result<ArchiveGroup> {
        let key = key.into();
        let name = self.shared.codec.encode(&key)?;
        self.clear_slot(&key, &name)?;
        self.mutate(|| self.create_child(&name))
    }

    /// Remove an entry (recursively for groups).
    pub fn delete(&self, key: impl Into<Key>) -> Result<()> {
        let key = key.into();
        let name = self.shared.codec.encode(&key)?;
        if self.kind_of(&name)? == NodeKind::Missing {
            return Err(Error::KeyNotFound(key.plain()));
        }
        self.mutate(|| self.backend(|b| b.delete_child(&self.path, &name)))
    }

    /// Flush pending changes to the backend's stable storage.
    pub fn flush(&self) -> Result<()> {
        self.backend(|b| b.flush())
    }

    /// Fail or clear the way for a new entry under `name`.
    fn clear_slot(&self, key: &Key, name: &str) -> Result<bool> {
        if self.kind_of(name)? == NodeKind::Missing {
            return Ok(false);
        }
        if self.shared.options.overwrite == OverwritePolicy::Reject {
            return Err(Error::KeyExists(key.plain()));
        }
        Ok(true)
    }

    fn store(&self, key: &Key, value: &Value) -> Result<()> {
        let name = self.shared.codec.encode(key)?;
        let existing = self.clear_slot(key, &name)?;
        // everything that can fail without touching storage happens first
        let plan = WritePlan::for_value(value)?;
        if existing {
            self.backend(|b| b.delete_child(&self.path, &name))?;
        }
        tracing::trace!(path = %self.path, key = %name, plan = plan.label(), "writing entry");
        self.execute(&name, plan)
    }

    fn create_child(&self, name: &str) -> Result<ArchiveGroup> {
        self.backend(|b| b.create_group(&self.path, name))?;
        Ok(self.child(name))
    }

    fn execute(&self, name: &str, plan: WritePlan<'_>) -> Result<()> {
        match plan {
            WritePlan::SelfWrite { writer, tag } => {
                let child = self.create_child(name)?;
                writer.write_self(&child)?;
                child.backend(|b| b.write_attr(&child.path, Attributes::SCHEME_KEY, &tag))
            }
            WritePlan::Composite { mapping, tag } => {
                let child = self.create_child(name)?;
                for (k, v) in &mapping {
                    child.store(k, v)?;
                }
                child.backend(|b| b.write_attr(&child.path, Attributes::SCHEME_KEY, &tag))
            }
            WritePlan::Array(array) => self.backend(|b| b.write_array(&self.path, name, &array)),
            WritePlan::Nested(snapshot) => self.restore(name, &snapshot),
            WritePlan::Scalar(scalar) => self.backend(|b| b.write_scalar(&self.path, name, scalar)),
        }
    }

    /// Read the whole subtree, attributes included, without rebuilding anything.
    fn snapshot(&self) -> Result<Snapshot> {
        let attrs = self.backend(|b| b.attributes(&self.path))?;
        let names = self.backend(|b| b.list_children(&self.path))?;
        let mut children = Vec::with_capacity(names.len());
        for name in names {
            let node = match self.kind_of(&name)? {
                NodeKind::Group => self.child(&name).snapshot()?,
                NodeKind::Dataset => Snapshot::Data(self.backend(|b| b.read_dataset(&self.path, &name))?),
                NodeKind::Missing => continue,
            };
            children.push((name, node));
        }
        Ok(Snapshot::Group { attrs, children })
    }

    fn restore(&self, name: &str, snapshot: &Snapshot) -> Result<()> {
        match snapshot {
            Snapshot::Data(Dataset::Scalar(s)) => self.backend(|b| b.write_scalar(&self.path, name, s)),
            Snapshot::Data(Dataset::Array(a)) => self.backend(|b| b.write_array(&self.path, name, a)),
            Snapshot::Group { attrs, children } => {
                let child = self.create_child(name)?;
                child.backend(|b| {
                    for (k, v) in attrs.iter() {
                        b.write_attr(&child.path, k, v)?;
                    }
                    Ok(())
                })?;
                for (child_name, node) in children {
                    child.restore(child_name, node)?;
                }
                Ok(())
            }
        }
    }

    /// Visit every leaf below this group, depth first.
    ///
    /// Each group's listing is taken before its entries are visited, so
    /// deleting or replacing the current leaf never skips or repeats a
    /// sibling. Replacements are not visited again.
    pub fn apply_on_leaves<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&Key, Value) -> Result<LeafAction>,
    {
        self.mutate(|| self.visit_leaves(&mut f))
    }

    fn visit_leaves(&self, f: &mut dyn FnMut(&Key, Value) -> Result<LeafAction>) -> Result<()> {
        let names = self.names()?;
        for name in names.iter() {
            match self.kind_of(name)? {
                NodeKind::Group => self.child(name).visit_leaves(f)?,
                NodeKind::Missing => {}
                NodeKind::Dataset => {
                    let key = self.shared.codec.decode(name)?;
                    let value = Value::from(self.backend(|b| b.read_dataset(&self.path, name))?);
                    match f(&key, value)? {
                        LeafAction::Keep => {}
                        LeafAction::Delete => {
                            self.backend(|b| b.delete_child(&self.path, name))?;
                            self.invalidate();
                        }
                        LeafAction::Replace(value) => {
                            let plan = WritePlan::for_value(&value)?;
                            self.backend(|b| b.delete_child(&self.path, name))?;
                            let result = self.execute(name, plan);
                            self.invalidate();
                            result?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Read an attribute of this group.
    pub fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.backend(|b| b.read_attr(&self.path, name))
    }

    /// Set an attribute of this group.
    pub fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        self.mutate(|| self.backend(|b| b.write_attr(&self.path, name, value)))
    }

    /// How this group is tagged.
    pub fn scheme(&self) -> Result<SchemeRef> {
        let attrs = self.backend(|b| b.attributes(&self.path))?;
        Ok(SchemeRef::from_attributes(&attrs))
    }

    fn describe(&self, name: &str) -> Result<String> {
        Ok(match self.kind_of(name)? {
            NodeKind::Dataset => format!("{} : data", name),
            NodeKind::Missing => format!("{} : missing", name),
            NodeKind::Group => match self.child(name).scheme()? {
                SchemeRef::Current(tag) => format!("{} : object {}", name, tag),
                SchemeRef::Legacy { class, module } => format!("{} : object {}.{}", name, module, class),
                SchemeRef::Untagged => format!("{} : subgroup", name),
            },
        })
    }
}

impl Clone for ArchiveGroup {
    fn clone(&self) -> Self {
        Self::new(self.shared.clone(), self.path.clone())
    }
}

impl fmt::Debug for ArchiveGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveGroup")
            .field("archive", &self.shared.label)
            .field("path", &self.path)
            .finish()
    }
}

impl fmt::Display for ArchiveGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "Archive {} with the following content:", self.shared.label)?;
        } else {
            write!(
                f,
                "Archive {} (partial view at {}) with the following content:",
                self.shared.label, self.path
            )?;
        }
        let names = match self.names() {
            Ok(names) => names,
            Err(e) => return write!(f, "\n  <{}>", e),
        };
        for name in names.iter() {
            match self.describe(name) {
                Ok(line) => write!(f, "\n  {}", line)?,
                Err(e) => write!(f, "\n  {} : <{}>", name, e)?,
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ArchiveGroup {
    type Item = Result<(Key, Value)>;
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a group.
///
/// The listing is taken on the first call to `next`; entries removed
/// meanwhile are skipped.
pub struct Entries<'a> {
    group: &'a ArchiveGroup,
    names: Option<Arc<Vec<String>>>,
    pos: usize,
    done: bool,
}

impl Entries<'_> {
    fn entry(&self, name: &str) -> Result<Option<(Key, Value)>> {
        if self.group.kind_of(name)? == NodeKind::Missing {
            return Ok(None);
        }
        let key = self.group.shared.codec.decode(name)?;
        let value = self
            .group
            .read_entry(&key, name, self.group.shared.options.reconstruct)?;
        Ok(Some((key, value)))
    }
}

impl Iterator for Entries<'_> {
    type Item = Result<(Key, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let names = match &self.names {
            Some(names) => names.clone(),
            None => match self.group.names() {
                Ok(names) => {
                    self.names = Some(names.clone());
                    names
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            },
        };

        while self.pos < names.len() {
            let name = &names[self.pos];
            self.pos += 1;
            match self.entry(name) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        self.done = true;
        None
    }
}

/// Deep copy of a subtree, taken before anything is written.
enum Snapshot {
    Group {
        attrs: Attributes,
        children: Vec<(String, Snapshot)>,
    },
    Data(Dataset),
}

/// The write path chosen for a value.
enum WritePlan<'a> {
    SelfWrite { writer: &'a dyn SelfWriter, tag: String },
    Composite { mapping: Mapping, tag: String },
    Array(Cow<'a, Array>),
    Nested(Snapshot),
    Scalar(&'a Scalar),
}

impl<'a> WritePlan<'a> {
    /// Pick the first capability of `value` that applies, in fixed order.
    fn for_value(value: &'a Value) -> Result<Self> {
        match value {
            Value::Object(obj) => {
                let type_name = obj.type_name();
                if let Some(writer) = obj.as_self_writer() {
                    let tag = registered_tag(type_name, &obj.scheme_name())?;
                    Ok(WritePlan::SelfWrite { writer, tag })
                } else if let Some(reducible) = obj.as_reducible() {
                    let tag = registered_tag(type_name, &obj.scheme_name())?;
                    Self::composite(type_name, reducible, tag)
                } else {
                    Err(Error::NotArchivable(type_name.to_string()))
                }
            }
            Value::List(items) => Self::composite("list", &ListWrap(items), registered_tag("list", ListWrap::TAG)?),
            Value::Tuple(items) => Self::composite("tuple", &TupleWrap(items), registered_tag("tuple", TupleWrap::TAG)?),
            Value::Dict(map) => Self::composite("dict", &DictWrap(map), registered_tag("dict", DictWrap::TAG)?),
            Value::Array(array) if array.is_contiguous() => Ok(WritePlan::Array(Cow::Borrowed(array))),
            Value::Array(array) => Ok(WritePlan::Array(Cow::Owned(array.to_contiguous()))),
            // taken up front so a group can be copied over itself or into itself
            Value::Group(group) => Ok(WritePlan::Nested(group.snapshot()?)),
            Value::Scalar(scalar) => Ok(WritePlan::Scalar(scalar)),
        }
    }

    fn composite(type_name: &str, reducible: &dyn Reducible, tag: String) -> Result<Self> {
        let mapping = reducible.reduce_to_mapping()?;
        if mapping.is_empty() {
            return Err(Error::EmptyReduction(type_name.to_string()));
        }
        Ok(WritePlan::Composite { mapping, tag })
    }

    fn label(&self) -> &'static str {
        match self {
            WritePlan::SelfWrite { .. } => "self-writer",
            WritePlan::Composite { .. } => "reducible",
            WritePlan::Array(_) => "array",
            WritePlan::Nested(_) => "nested",
            WritePlan::Scalar(_) => "scalar",
        }
    }
}

/// The tag, if the registry knows it. Unregistered tags could not be read back.
fn registered_tag(type_name: &str, tag: &str) -> Result<String> {
    if SchemeRegistry::global().contains(tag) {
        Ok(tag.to_string())
    } else {
        Err(Error::SchemeNotRegistered {
            type_name: type_name.to_string(),
            scheme: tag.to_string(),
        })
    }
}
