//! In-memory node tree and the memory backend built on it.
//!
//! Nodes live in an arena indexed by [`NodeId`]; groups map child names to
//! ids. Paths are resolved by walking from the root, so any number of views
//! can address the same node without holding references into the arena.

use std::collections::BTreeMap;
use std::fmt;

use smallvec::SmallVec;

use crate::core::{Array, Attributes, Backend, Dataset, Scalar};
use crate::util::{Error, Result};

/// Path of a group from the root, one segment per level.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
    segments: SmallVec<[String; 4]>,
}

impl NodePath {
    /// The root path "/".
    pub fn root() -> Self {
        Self::default()
    }

    /// Path of the child `name` of this path.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for s in &self.segments {
            write!(f, "/{}", s)?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePath({})", self)
    }
}

/// Index of a node in a [`NodeTree`].
pub type NodeId = usize;

/// A group node: attributes plus named children.
#[derive(Clone, Debug, Default)]
pub struct GroupNode {
    pub attrs: Attributes,
    pub children: BTreeMap<String, NodeId>,
}

/// One node of the tree.
#[derive(Clone, Debug)]
pub enum TreeNode {
    Group(GroupNode),
    Dataset(Dataset),
}

/// Arena of nodes rooted at a single group.
#[derive(Clone, Debug)]
pub struct NodeTree {
    nodes: Vec<Option<TreeNode>>,
    free: Vec<NodeId>,
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTree {
    /// Id of the root group.
    pub const ROOT: NodeId = 0;

    /// Create a tree holding only an empty root group.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(TreeNode::Group(GroupNode::default()))],
            free: Vec::new(),
        }
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    fn group_by_id(&self, id: NodeId) -> Option<&GroupNode> {
        match self.node(id) {
            Some(TreeNode::Group(g)) => Some(g),
            _ => None,
        }
    }

    fn group_by_id_mut(&mut self, id: NodeId) -> Option<&mut GroupNode> {
        match self.nodes.get_mut(id).and_then(Option::as_mut) {
            Some(TreeNode::Group(g)) => Some(g),
            _ => None,
        }
    }

    /// Replace the attributes of the group `id`.
    pub fn set_attributes(&mut self, id: NodeId, attrs: Attributes) -> Result<()> {
        let group = self
            .group_by_id_mut(id)
            .ok_or_else(|| Error::invalid(format!("node {} is not a group", id)))?;
        group.attrs = attrs;
        Ok(())
    }

    /// Resolve a group path to its id.
    pub fn resolve(&self, path: &NodePath) -> Result<NodeId> {
        let mut id = Self::ROOT;
        for segment in path.segments() {
            id = self
                .group_by_id(id)
                .and_then(|g| g.children.get(segment))
                .copied()
                .ok_or_else(|| Error::KeyNotFound(path.to_string()))?;
        }
        match self.node(id) {
            Some(TreeNode::Group(_)) => Ok(id),
            _ => Err(Error::mismatch("group", format!("dataset at {}", path))),
        }
    }

    /// The group at `path`.
    pub fn group(&self, path: &NodePath) -> Result<&GroupNode> {
        let id = self.resolve(path)?;
        self.group_by_id(id)
            .ok_or_else(|| Error::KeyNotFound(path.to_string()))
    }

    /// The group at `path`, mutably.
    pub fn group_mut(&mut self, path: &NodePath) -> Result<&mut GroupNode> {
        let id = self.resolve(path)?;
        self.group_by_id_mut(id)
            .ok_or_else(|| Error::KeyNotFound(path.to_string()))
    }

    /// The child `name` of the group at `parent`.
    pub fn child(&self, parent: &NodePath, name: &str) -> Option<&TreeNode> {
        let group = self.group(parent).ok()?;
        group.children.get(name).and_then(|&id| self.node(id))
    }

    /// Insert a node under the group `parent_id`, replacing any previous child.
    pub fn insert(&mut self, parent_id: NodeId, name: &str, node: TreeNode) -> Result<NodeId> {
        if self.group_by_id(parent_id).is_none() {
            return Err(Error::invalid(format!("node {} is not a group", parent_id)));
        }
        let previous = self
            .group_by_id(parent_id)
            .and_then(|g| g.children.get(name))
            .copied();
        if let Some(old) = previous {
            self.free_subtree(old);
        }

        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        if let Some(group) = self.group_by_id_mut(parent_id) {
            group.children.insert(name.to_string(), id);
        }
        Ok(id)
    }

    /// Insert under a group path.
    pub fn insert_at(&mut self, parent: &NodePath, name: &str, node: TreeNode) -> Result<NodeId> {
        let parent_id = self.resolve(parent)?;
        self.insert(parent_id, name, node)
    }

    /// Remove the child `name` of `parent` and everything below it.
    pub fn remove(&mut self, parent: &NodePath, name: &str) -> Result<()> {
        let group = self.group_mut(parent)?;
        let id = group
            .children
            .remove(name)
            .ok_or_else(|| Error::KeyNotFound(parent.child(name).to_string()))?;
        self.free_subtree(id);
        Ok(())
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(TreeNode::Group(g)) = self.nodes[id].take() {
                stack.extend(g.children.values().copied());
            }
            self.free.push(id);
        }
    }
}

/// Backend keeping everything in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tree: NodeTree,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing tree (used by file backends after loading).
    pub fn from_tree(tree: NodeTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn create_group(&mut self, parent: &NodePath, name: &str) -> Result<()> {
        self.tree
            .insert_at(parent, name, TreeNode::Group(GroupNode::default()))?;
        Ok(())
    }

    fn is_group(&self, parent: &NodePath, name: &str) -> bool {
        matches!(self.tree.child(parent, name), Some(TreeNode::Group(_)))
    }

    fn is_dataset(&self, parent: &NodePath, name: &str) -> bool {
        matches!(self.tree.child(parent, name), Some(TreeNode::Dataset(_)))
    }

    fn list_children(&self, group: &NodePath) -> Result<Vec<String>> {
        Ok(self.tree.group(group)?.children.keys().cloned().collect())
    }

    fn delete_child(&mut self, group: &NodePath, name: &str) -> Result<()> {
        self.tree.remove(group, name)
    }

    fn read_dataset(&self, group: &NodePath, name: &str) -> Result<Dataset> {
        match self.tree.child(group, name) {
            Some(TreeNode::Dataset(d)) => Ok(d.clone()),
            Some(TreeNode::Group(_)) => Err(Error::mismatch("dataset", "group")),
            None => Err(Error::KeyNotFound(group.child(name).to_string())),
        }
    }

    fn write_scalar(&mut self, group: &NodePath, name: &str, value: &Scalar) -> Result<()> {
        self.tree
            .insert_at(group, name, TreeNode::Dataset(Dataset::Scalar(value.clone())))?;
        Ok(())
    }

    fn write_array(&mut self, group: &NodePath, name: &str, value: &Array) -> Result<()> {
        if !value.is_contiguous() {
            return Err(Error::invalid("array datasets must be row-major contiguous"));
        }
        self.tree
            .insert_at(group, name, TreeNode::Dataset(Dataset::Array(value.clone())))?;
        Ok(())
    }

    fn attributes(&self, group: &NodePath) -> Result<Attributes> {
        Ok(self.tree.group(group)?.attrs.clone())
    }

    fn write_attr(&mut self, group: &NodePath, name: &str, value: &str) -> Result<()> {
        self.tree.group_mut(group)?.attrs.set(name, value);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> NodePath {
        segments.iter().fold(NodePath::root(), |p, s| p.child(s))
    }

    #[test]
    fn test_path_display() {
        assert_eq!(NodePath::root().to_string(), "/");
        assert_eq!(path(&["a", "b"]).to_string(), "/a/b");
        assert_eq!(path(&["a", "b"]).name(), Some("b"));
        assert!(NodePath::root().name().is_none());
    }

    #[test]
    fn test_groups_and_datasets() {
        let mut b = MemoryBackend::new();
        let root = NodePath::root();
        b.create_group(&root, "g").unwrap();
        b.write_scalar(&path(&["g"]), "x", &Scalar::I32(1)).unwrap();

        assert!(b.is_group(&root, "g"));
        assert!(!b.is_dataset(&root, "g"));
        assert!(b.is_dataset(&path(&["g"]), "x"));
        assert_eq!(b.read_scalar(&path(&["g"]), "x").unwrap(), Scalar::I32(1));
        assert!(b.read_array(&path(&["g"]), "x").is_err());
    }

    #[test]
    fn test_children_sorted() {
        let mut b = MemoryBackend::new();
        let root = NodePath::root();
        for name in ["b", "c", "a"] {
            b.write_scalar(&root, name, &Scalar::Bool(true)).unwrap();
        }
        assert_eq!(b.list_children(&root).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_delete_frees_subtree() {
        let mut b = MemoryBackend::new();
        let root = NodePath::root();
        b.create_group(&root, "g").unwrap();
        b.create_group(&path(&["g"]), "h").unwrap();
        b.write_scalar(&path(&["g", "h"]), "x", &Scalar::U8(1)).unwrap();
        assert_eq!(b.tree().len(), 4);

        b.delete_child(&root, "g").unwrap();
        assert!(b.tree().is_empty());
        assert!(b.delete_child(&root, "g").is_err());

        // freed slots are reused
        b.create_group(&root, "again").unwrap();
        assert_eq!(b.tree().len(), 2);
    }

    #[test]
    fn test_attributes() {
        let mut b = MemoryBackend::new();
        let root = NodePath::root();
        b.create_group(&root, "g").unwrap();
        b.write_attr(&path(&["g"]), Attributes::SCHEME_KEY, "ListWrap").unwrap();
        assert_eq!(
            b.read_attr(&path(&["g"]), Attributes::SCHEME_KEY).unwrap().as_deref(),
            Some("ListWrap")
        );
        assert_eq!(b.read_attr(&path(&["g"]), "missing").unwrap(), None);
        assert!(b.attributes(&path(&["nope"])).is_err());
    }

    #[test]
    fn test_rejects_strided_array() {
        let mut b = MemoryBackend::new();
        let a = Array::from_column_major(crate::util::Dimensions::d2(2, 2), vec![1i32, 2, 3, 4]).unwrap();
        assert!(b.write_array(&NodePath::root(), "a", &a).is_err());
        b.write_array(&NodePath::root(), "a", &a.to_contiguous()).unwrap();
    }
}
