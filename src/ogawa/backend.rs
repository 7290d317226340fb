//! File backend storing an archive as an Ogawa file.
//!
//! The tree is loaded into memory on open and rewritten as a whole on flush
//! whenever something changed since the last flush. A rewrite goes to a
//! temporary file next to the archive which then replaces it, so the file on
//! disk is always either the previous or the new archive.

use std::path::{Path, PathBuf};

use super::{IArchive, OArchive};
use crate::core::{Array, Attributes, Backend, Dataset, MemoryBackend, NodePath, Scalar};
use crate::util::{Error, Result};

/// [`Backend`] over an Ogawa file.
pub struct OgawaBackend {
    memory: MemoryBackend,
    path: PathBuf,
    label: String,
    writable: bool,
    dirty: bool,
}

impl OgawaBackend {
    /// Create a new empty archive file, truncating any existing one.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let mut backend = Self::with_memory(path.as_ref(), MemoryBackend::new(), true);
        backend.dirty = true;
        backend.flush()?;
        Ok(backend)
    }

    /// Open an existing archive file read-only.
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        let tree = IArchive::open(path.as_ref())?.load_tree()?;
        Ok(Self::with_memory(path.as_ref(), MemoryBackend::from_tree(tree), false))
    }

    /// Open an archive file for reading and writing, creating it if missing.
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Self::create(path);
        }
        let tree = IArchive::open(path)?.load_tree()?;
        Ok(Self::with_memory(path, MemoryBackend::from_tree(tree), true))
    }

    fn with_memory(path: &Path, memory: MemoryBackend, writable: bool) -> Self {
        Self {
            memory,
            path: path.to_path_buf(),
            label: format!("ogawa:{}", path.display()),
            writable,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    fn mutate(&mut self) -> Result<&mut MemoryBackend> {
        if !self.writable {
            return Err(Error::ReadOnly);
        }
        self.dirty = true;
        Ok(&mut self.memory)
    }
}

impl Backend for OgawaBackend {
    fn name(&self) -> &str {
        &self.label
    }

    fn create_group(&mut self, parent: &NodePath, name: &str) -> Result<()> {
        self.mutate()?.create_group(parent, name)
    }

    fn is_group(&self, parent: &NodePath, name: &str) -> bool {
        self.memory.is_group(parent, name)
    }

    fn is_dataset(&self, parent: &NodePath, name: &str) -> bool {
        self.memory.is_dataset(parent, name)
    }

    fn list_children(&self, group: &NodePath) -> Result<Vec<String>> {
        self.memory.list_children(group)
    }

    fn delete_child(&mut self, group: &NodePath, name: &str) -> Result<()> {
        self.mutate()?.delete_child(group, name)
    }

    fn read_dataset(&self, group: &NodePath, name: &str) -> Result<Dataset> {
        self.memory.read_dataset(group, name)
    }

    fn write_scalar(&mut self, group: &NodePath, name: &str, value: &Scalar) -> Result<()> {
        self.mutate()?.write_scalar(group, name, value)
    }

    fn write_array(&mut self, group: &NodePath, name: &str, value: &Array) -> Result<()> {
        self.mutate()?.write_array(group, name, value)
    }

    fn attributes(&self, group: &NodePath) -> Result<Attributes> {
        self.memory.attributes(group)
    }

    fn write_attr(&mut self, group: &NodePath, name: &str, value: &str) -> Result<()> {
        self.mutate()?.write_attr(group, name, value)
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty || !self.writable {
            return Ok(());
        }
        tracing::trace!(path = %self.path.display(), nodes = self.memory.tree().len(), "rewriting archive file");
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staged = tempfile::Builder::new().prefix(".objarchive-").suffix(".tmp").tempfile_in(dir)?;
        OArchive::create(staged.path())?.write_tree(self.memory.tree())?;
        if let Ok(meta) = std::fs::metadata(&self.path) {
            staged.as_file().set_permissions(meta.permissions())?;
        }
        staged.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        self.dirty = false;
        Ok(())
    }
}
