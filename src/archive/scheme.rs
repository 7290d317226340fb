//! Process-wide registry of data schemes.
//!
//! A scheme tag is the short string stored on a group to say which type it
//! holds. The registry maps each tag to the owning namespace and type name
//! plus the hooks that can rebuild the value.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::containers::{DictWrap, ListWrap, TupleWrap};
use super::protocol::{plain_type_name, type_namespace, FromArchive, FromMapping, Mapping, Persist, ReadSelf};
use super::{ArchiveGroup, Value};
use crate::core::Attributes;
use crate::util::{Error, Result};

/// Rebuilds a value from its group.
pub type GroupFn = fn(&ArchiveGroup) -> Result<Value>;

/// Rebuilds a value from its decomposed components.
pub type MappingFn = fn(Mapping) -> Result<Value>;

/// One registered scheme.
#[derive(Clone)]
pub struct SchemeEntry {
    tag: String,
    namespace: String,
    type_name: String,
    read_self: Option<GroupFn>,
    archive_factory: Option<GroupFn>,
    mapping_factory: Option<MappingFn>,
}

impl SchemeEntry {
    /// Entry with explicit names and no hooks.
    pub fn new(tag: impl Into<String>, namespace: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            namespace: namespace.into(),
            type_name: type_name.into(),
            read_self: None,
            archive_factory: None,
            mapping_factory: None,
        }
    }

    /// Entry for `T`, named after its Rust path and tagged with the tag `T`
    /// writes ([`Persist::declared_scheme_name`]).
    pub fn of<T: Persist>() -> Self {
        let full = std::any::type_name::<T>();
        Self::new(T::declared_scheme_name(), type_namespace(full), plain_type_name(full))
    }

    /// Register under an extra tag, e.g. one older files were written with.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Rebuild by filling `T::default()` through [`ReadSelf`].
    pub fn with_read_self<T: Persist + ReadSelf>(mut self) -> Self {
        self.read_self = Some(read_self_hook::<T>);
        self
    }

    /// Rebuild through [`FromArchive`].
    pub fn with_archive_factory<T: Persist + FromArchive>(mut self) -> Self {
        self.archive_factory = Some(archive_factory_hook::<T>);
        self
    }

    /// Rebuild through [`FromMapping`].
    pub fn with_mapping_factory<T: Persist + FromMapping>(mut self) -> Self {
        self.mapping_factory = Some(mapping_factory_hook::<T>);
        self
    }

    pub fn read_self_fn(mut self, f: GroupFn) -> Self {
        self.read_self = Some(f);
        self
    }

    pub fn archive_factory_fn(mut self, f: GroupFn) -> Self {
        self.archive_factory = Some(f);
        self
    }

    pub fn mapping_factory_fn(mut self, f: MappingFn) -> Self {
        self.mapping_factory = Some(f);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn read_self(&self) -> Option<GroupFn> {
        self.read_self
    }

    pub fn archive_factory(&self) -> Option<GroupFn> {
        self.archive_factory
    }

    pub fn mapping_factory(&self) -> Option<MappingFn> {
        self.mapping_factory
    }

    /// "namespace::type_name", or just the type name without a namespace.
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.type_name.clone()
        } else {
            format!("{}::{}", self.namespace, self.type_name)
        }
    }

    fn same_target(&self, other: &SchemeEntry) -> bool {
        self.namespace == other.namespace && self.type_name == other.type_name
    }
}

impl fmt::Debug for SchemeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeEntry")
            .field("tag", &self.tag)
            .field("target", &self.qualified_name())
            .field("read_self", &self.read_self.is_some())
            .field("archive_factory", &self.archive_factory.is_some())
            .field("mapping_factory", &self.mapping_factory.is_some())
            .finish()
    }
}

fn read_self_hook<T: Persist + ReadSelf>(group: &ArchiveGroup) -> Result<Value> {
    let mut value = T::default();
    value.read_self(group)?;
    Ok(Value::object(value))
}

fn archive_factory_hook<T: Persist + FromArchive>(group: &ArchiveGroup) -> Result<Value> {
    Ok(Value::object(T::construct_from_archive(group)?))
}

fn mapping_factory_hook<T: Persist + FromMapping>(mapping: Mapping) -> Result<Value> {
    Ok(Value::object(T::reconstruct_from_mapping(mapping)?))
}

/// Tag to scheme table. Entries are never removed.
pub struct SchemeRegistry {
    entries: RwLock<HashMap<String, Arc<SchemeEntry>>>,
}

impl SchemeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// A registry holding the built-in container adapters.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for entry in [ListWrap::scheme(), TupleWrap::scheme(), DictWrap::scheme()] {
            registry.entries.write().insert(entry.tag.clone(), Arc::new(entry));
        }
        registry
    }

    /// The process-wide registry.
    pub fn global() -> &'static SchemeRegistry {
        static GLOBAL: OnceLock<SchemeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SchemeRegistry::with_builtins)
    }

    /// Register a scheme.
    ///
    /// Registering the same target under the same tag again replaces the
    /// hooks; a different target under an existing tag is refused.
    pub fn register(&self, entry: SchemeEntry) -> Result<()> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&entry.tag) {
            if !existing.same_target(&entry) {
                return Err(Error::SchemeConflict {
                    scheme: entry.tag.clone(),
                    existing: existing.qualified_name(),
                    requested: entry.qualified_name(),
                });
            }
        }
        tracing::debug!(tag = %entry.tag, target = %entry.qualified_name(), "registering data scheme");
        entries.insert(entry.tag.clone(), Arc::new(entry));
        Ok(())
    }

    /// Look a tag up.
    pub fn lookup(&self, tag: &str) -> Result<Arc<SchemeEntry>> {
        self.entries
            .read()
            .get(tag)
            .cloned()
            .ok_or_else(|| Error::SchemeNotRecognized(tag.to_string()))
    }

    /// Resolve a legacy namespace / type name pair.
    ///
    /// Matches either the full namespace or its last segment, so archives
    /// written with a short module name still resolve.
    pub fn lookup_legacy(&self, namespace: &str, type_name: &str) -> Option<Arc<SchemeEntry>> {
        let entries = self.entries.read();
        let mut fallback = None;
        for entry in entries.values().filter(|e| e.type_name == type_name) {
            if entry.namespace == namespace {
                return Some(entry.clone());
            }
            if fallback.is_none() && plain_type_name(&entry.namespace) == namespace {
                fallback = Some(entry.clone());
            }
        }
        fallback
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.read().contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.entries.read().keys().cloned().collect();
        tags.sort();
        tags
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// How a stored group says what it holds, resolved once per read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemeRef {
    /// Current format: a registry tag.
    Current(String),
    /// Archives written before the registry existed: a bare type name and
    /// the namespace owning it.
    Legacy { class: String, module: String },
    /// A plain group.
    Untagged,
}

impl SchemeRef {
    /// Read the tag attributes of a group.
    pub fn from_attributes(attrs: &Attributes) -> Self {
        if let Some(tag) = attrs.scheme() {
            return SchemeRef::Current(tag.to_string());
        }
        match (
            attrs.get(Attributes::LEGACY_CLASS_KEY),
            attrs.get(Attributes::LEGACY_NAMESPACE_KEY),
        ) {
            (Some(class), Some(module)) if !class.is_empty() && !module.is_empty() => SchemeRef::Legacy {
                class: class.to_string(),
                module: module.to_string(),
            },
            _ => SchemeRef::Untagged,
        }
    }
}

/// Register a scheme in the process-wide registry.
pub fn register(entry: SchemeEntry) -> Result<()> {
    SchemeRegistry::global().register(entry)
}
