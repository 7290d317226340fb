//! The storage backend interface consumed by the archive layer.
//!
//! A backend is a hierarchy of named groups and datasets. Groups carry
//! string attributes; datasets hold a scalar or a row-major array. The
//! archive layer never looks behind this trait.

use crate::core::{Array, Attributes, Dataset, NodePath, Scalar};
use crate::util::{Error, Result};

/// Hierarchical storage used by an archive.
pub trait Backend: Send {
    /// Short description used in logs and `Display`.
    fn name(&self) -> &str;

    /// Create an empty group `name` inside `parent`.
    fn create_group(&mut self, parent: &NodePath, name: &str) -> Result<()>;

    /// True if `name` inside `parent` is a group.
    fn is_group(&self, parent: &NodePath, name: &str) -> bool;

    /// True if `name` inside `parent` is a dataset.
    fn is_dataset(&self, parent: &NodePath, name: &str) -> bool;

    /// Names of the children of `group`, sorted by name.
    fn list_children(&self, group: &NodePath) -> Result<Vec<String>>;

    /// Remove a child (recursively for groups).
    fn delete_child(&mut self, group: &NodePath, name: &str) -> Result<()>;

    /// Read the dataset `name` inside `group`.
    fn read_dataset(&self, group: &NodePath, name: &str) -> Result<Dataset>;

    /// Write a scalar dataset.
    fn write_scalar(&mut self, group: &NodePath, name: &str, value: &Scalar) -> Result<()>;

    /// Write an array dataset. The array must be row-major contiguous.
    fn write_array(&mut self, group: &NodePath, name: &str, value: &Array) -> Result<()>;

    /// All attributes of `group`.
    fn attributes(&self, group: &NodePath) -> Result<Attributes>;

    /// Set one attribute of `group`.
    fn write_attr(&mut self, group: &NodePath, name: &str, value: &str) -> Result<()>;

    /// Push pending changes to stable storage.
    fn flush(&mut self) -> Result<()>;

    /// Read one attribute of `group`, if present.
    fn read_attr(&self, group: &NodePath, name: &str) -> Result<Option<String>> {
        Ok(self.attributes(group)?.get(name).map(str::to_string))
    }

    /// Read a scalar dataset.
    fn read_scalar(&self, group: &NodePath, name: &str) -> Result<Scalar> {
        match self.read_dataset(group, name)? {
            Dataset::Scalar(s) => Ok(s),
            Dataset::Array(_) => Err(Error::mismatch("scalar", "array")),
        }
    }

    /// Read an array dataset.
    fn read_array(&self, group: &NodePath, name: &str) -> Result<Array> {
        match self.read_dataset(group, name)? {
            Dataset::Array(a) => Ok(a),
            Dataset::Scalar(_) => Err(Error::mismatch("array", "scalar")),
        }
    }
}
