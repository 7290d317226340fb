//! Core layer - storage-facing types and the backend interface.
//!
//! This module provides:
//! - [`Key`] / [`KeyCodec`] - application keys and their storage names
//! - [`Attributes`] - string metadata attached to groups
//! - [`Scalar`] / [`Array`] / [`Dataset`] - leaf payloads
//! - [`Backend`] - the hierarchical storage interface
//! - [`NodeTree`] / [`MemoryBackend`] - in-memory storage addressed by [`NodePath`]

mod attributes;
mod dataset;
mod key;
mod traits;
mod tree;

pub use attributes::Attributes;
pub use dataset::{Array, Dataset, Scalar};
pub use key::{Key, KeyCodec, KeyMode, MAX_KEY_LENGTH, RESERVED_NAMES};
pub use traits::Backend;
pub use tree::{GroupNode, MemoryBackend, NodeId, NodePath, NodeTree, TreeNode};
