//! Ogawa format writer implementation.
//!
//! Archives are written bottom-up: children before the group table that
//! points at them, the root table last. The header's root position is
//! patched in and the frozen flag set once everything is on disk.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::format::*;
use crate::core::{NodeId, NodeTree, TreeNode};
use crate::util::{Error, Result};

/// Output stream for writing Ogawa data.
pub struct OStream {
    writer: BufWriter<File>,
    pos: u64,
}

impl OStream {
    /// Create a new output stream for the given file path.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: BufWriter::with_capacity(256 * 1024, file),
            pos: 0,
        })
    }

    /// Get the current write position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Write bytes and advance position.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(())
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(())
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.pos += 1;
        Ok(())
    }

    /// Seek to a position and return the current position.
    pub fn seek(&mut self, pos: u64) -> Result<u64> {
        self.writer.flush()?;
        let new_pos = self.writer.seek(SeekFrom::Start(pos))?;
        self.pos = new_pos;
        Ok(new_pos)
    }

    /// Seek to end and return the position.
    pub fn seek_end(&mut self) -> Result<u64> {
        self.writer.flush()?;
        let new_pos = self.writer.seek(SeekFrom::End(0))?;
        self.pos = new_pos;
        Ok(new_pos)
    }

    /// Flush the buffer and sync the file to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

/// Ogawa archive writer.
pub struct OArchive {
    stream: OStream,
    frozen: bool,
}

impl OArchive {
    /// Create a new archive file, truncating any existing one.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let mut stream = OStream::create(path)?;

        stream.write_bytes(OGAWA_MAGIC)?;
        stream.write_u8(NOT_FROZEN_FLAG)?;
        stream.write_bytes(&CURRENT_VERSION.to_be_bytes())?;
        stream.write_u64(0)?; // root position placeholder

        Ok(Self { stream, frozen: false })
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Write raw data block and return its position.
    pub fn write_data(&mut self, data: &[u8]) -> Result<u64> {
        if self.frozen {
            return Err(Error::invalid("archive is already finalized"));
        }
        if data.is_empty() {
            return Ok(0); // empty data marker
        }

        let pos = self.stream.pos();
        self.stream.write_u64(data.len() as u64)?;
        self.stream.write_bytes(data)?;
        Ok(pos)
    }

    /// Write a group table and return its position.
    pub fn write_group(&mut self, children: &[u64]) -> Result<u64> {
        if self.frozen {
            return Err(Error::invalid("archive is already finalized"));
        }
        if children.is_empty() {
            return Ok(0); // empty group marker
        }

        let pos = self.stream.pos();
        self.stream.write_u64(children.len() as u64)?;
        for &child in children {
            self.stream.write_u64(child)?;
        }
        Ok(pos)
    }

    /// Write the whole node tree and finalize the file.
    pub fn write_tree(mut self, tree: &NodeTree) -> Result<()> {
        let layout_pos = self.write_data(&ARCHIVE_LAYOUT_VERSION.to_le_bytes())?;
        let top_pos = self.write_node_group(tree, NodeTree::ROOT)?;
        let root_pos = self.write_group(&[make_data_offset(layout_pos), make_group_offset(top_pos)])?;
        self.close(root_pos)
    }

    /// Write one archive group: children first, then its header block,
    /// then the table pointing at both.
    fn write_node_group(&mut self, tree: &NodeTree, id: NodeId) -> Result<u64> {
        let group = match tree.node(id) {
            Some(TreeNode::Group(g)) => g,
            _ => return Err(Error::invalid(format!("node {} is not a group", id))),
        };

        let mut children = Vec::with_capacity(group.children.len() + 1);
        children.push(0);
        for &child in group.children.values() {
            let offset = match tree.node(child) {
                Some(TreeNode::Group(_)) => make_group_offset(self.write_node_group(tree, child)?),
                Some(TreeNode::Dataset(d)) => make_data_offset(self.write_data(&encode_dataset(d)?)?),
                None => return Err(Error::invalid(format!("dangling node {}", child))),
            };
            children.push(offset);
        }

        let header = encode_group_header(group.children.keys().map(String::as_str), &group.attrs)?;
        children[0] = make_data_offset(self.write_data(&header)?);
        self.write_group(&children)
    }

    /// Patch the root position into the header and mark the file frozen.
    fn close(mut self, root_pos: u64) -> Result<()> {
        self.frozen = true;

        self.stream.seek(FROZEN_OFFSET as u64)?;
        self.stream.write_u8(FROZEN_FLAG)?;
        self.stream.seek(ROOT_POS_OFFSET as u64)?;
        self.stream.write_u64(root_pos)?;

        self.stream.seek_end()?;
        self.stream.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Array, Attributes, Backend, MemoryBackend, NodePath, Scalar};
    use crate::ogawa::IArchive;
    use std::io::Read;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_empty_archive() -> crate::util::Result<()> {
        let temp = NamedTempFile::new()?;
        let path = temp.path();

        OArchive::create(path)?.write_tree(&NodeTree::new())?;

        let mut file = File::open(path)?;
        let mut header = [0u8; HEADER_SIZE];
        file.read_exact(&mut header)?;

        assert_eq!(&header[0..5], OGAWA_MAGIC);
        assert_eq!(header[FROZEN_OFFSET], FROZEN_FLAG);
        assert_eq!(header[VERSION_OFFSET], 0);
        assert_eq!(header[VERSION_OFFSET + 1], 1);

        let tree = IArchive::open(path)?.load_tree()?;
        assert!(tree.is_empty());
        Ok(())
    }

    #[test]
    fn test_write_and_read_tree() -> crate::util::Result<()> {
        let temp = NamedTempFile::new()?;
        let path = temp.path();

        let mut mem = MemoryBackend::new();
        let root = NodePath::root();
        mem.write_scalar(&root, "x", &Scalar::I64(42))?;
        mem.create_group(&root, "lst")?;
        let lst = root.child("lst");
        mem.write_attr(&lst, Attributes::SCHEME_KEY, "ListWrap")?;
        mem.write_scalar(&lst, "0000000000", &Scalar::Str("a".into()))?;
        mem.write_array(&root, "arr", &Array::identity(2))?;
        OArchive::create(path)?.write_tree(mem.tree())?;

        let loaded = MemoryBackend::from_tree(IArchive::open(path)?.load_tree()?);
        assert_eq!(loaded.list_children(&root)?, vec!["arr", "lst", "x"]);
        assert_eq!(loaded.read_scalar(&root, "x")?, Scalar::I64(42));
        assert_eq!(loaded.read_array(&root, "arr")?, Array::identity(2));
        assert_eq!(loaded.attributes(&lst)?.scheme(), Some("ListWrap"));
        assert_eq!(loaded.read_scalar(&lst, "0000000000")?, Scalar::Str("a".into()));
        Ok(())
    }

    #[test]
    fn test_unfinalized_file_rejected() -> crate::util::Result<()> {
        let temp = NamedTempFile::new()?;
        let archive = OArchive::create(temp.path())?;
        drop(archive);
        // header only, frozen flag never set
        assert!(IArchive::open(temp.path()).is_err());
        Ok(())
    }
}
