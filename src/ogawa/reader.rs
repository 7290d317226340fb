//! Ogawa format reader implementation.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::Mutex;

use super::format::*;
use crate::core::{GroupNode, NodeId, NodeTree, TreeNode};
use crate::util::{Error, Result};

/// Input streams for reading Ogawa data.
/// Supports both memory-mapped and buffered I/O modes.
pub struct IStreams {
    inner: StreamsInner,
    version: u16,
    frozen: bool,
    size: u64,
}

enum StreamsInner {
    /// Memory-mapped file (preferred)
    Mmap(Mmap),
    /// Buffered file access (fallback)
    File(Mutex<File>),
}

impl IStreams {
    /// Open a file for reading, memory-mapped when the `mmap` feature is on.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, cfg!(feature = "mmap"))
    }

    /// Open a file with optional memory mapping.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        let inner = if use_mmap {
            // Safety: the file is opened read-only and the map is dropped with
            // the streams; nothing in this process writes to it meanwhile.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            StreamsInner::Mmap(mmap)
        } else {
            StreamsInner::File(Mutex::new(file))
        };

        let mut streams = Self { inner, version: 0, frozen: false, size };
        let mut header = [0u8; HEADER_SIZE];
        streams.read_into(0, &mut header)?;
        let (version, frozen) = Self::parse_header(&header)?;
        streams.version = version;
        streams.frozen = frozen;
        Ok(streams)
    }

    /// Parse and validate the Ogawa header.
    fn parse_header(data: &[u8]) -> Result<(u16, bool)> {
        if data.len() < HEADER_SIZE {
            return Err(Error::UnexpectedEof(data.len() as u64));
        }
        if &data[0..5] != OGAWA_MAGIC {
            return Err(Error::InvalidMagic);
        }

        let frozen = data[FROZEN_OFFSET] == FROZEN_FLAG;
        let version = u16::from_be_bytes([data[VERSION_OFFSET], data[VERSION_OFFSET + 1]]);
        if version != CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        Ok((version, frozen))
    }

    /// Check if the archive is frozen (finalized).
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Get the format version.
    #[inline]
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Get the total file size.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the root group position from the header.
    pub fn root_pos(&self) -> Result<u64> {
        self.read_u64(ROOT_POS_OFFSET as u64)
    }

    /// Read bytes at a specific position.
    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }

    /// Read bytes into an existing buffer.
    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let end = pos
            .checked_add(buf.len() as u64)
            .ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > self.size {
            return Err(Error::UnexpectedEof(end));
        }

        match &self.inner {
            StreamsInner::Mmap(mmap) => {
                buf.copy_from_slice(&mmap[pos as usize..end as usize]);
                Ok(())
            }
            StreamsInner::File(file) => {
                let mut f = file.lock();
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
                Ok(())
            }
        }
    }

    /// Read a u64 value at the given position.
    pub fn read_u64(&self, pos: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_into(pos, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

/// A group in the Ogawa hierarchy.
/// Groups contain children which can be either data or other groups.
#[derive(Clone)]
pub struct IGroup {
    streams: Arc<IStreams>,
    pos: u64,
    child_offsets: Vec<u64>,
}

impl IGroup {
    /// Create a new group reader at the given position.
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let num_children = if pos == 0 { 0 } else { streams.read_u64(pos)? };

        // each child pointer takes 8 bytes; reject counts the file can't hold
        if num_children > streams.size() / 8 {
            return Err(Error::invalid(format!(
                "group at {} claims {} children",
                pos, num_children
            )));
        }

        let mut child_offsets = Vec::with_capacity(num_children as usize);
        for i in 0..num_children {
            child_offsets.push(streams.read_u64(pos + 8 + i * 8)?);
        }
        Ok(Self { streams, pos, child_offsets })
    }

    /// Get the position of this group in the file.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Get the number of children.
    #[inline]
    pub fn num_children(&self) -> usize {
        self.child_offsets.len()
    }

    /// Get the raw offset for a child (with group/data flag).
    pub fn child_offset(&self, index: usize) -> Result<u64> {
        self.child_offsets
            .get(index)
            .copied()
            .ok_or(Error::ChildOutOfBounds { index, count: self.child_offsets.len() })
    }

    /// Get a child group.
    pub fn group(&self, index: usize) -> Result<IGroup> {
        let offset = self.child_offset(index)?;
        if !is_group_offset(offset) {
            return Err(Error::mismatch("group", "data"));
        }
        IGroup::new(self.streams.clone(), extract_offset(offset))
    }

    /// Get child data.
    pub fn data(&self, index: usize) -> Result<IData> {
        let offset = self.child_offset(index)?;
        if !is_data_offset(offset) {
            return Err(Error::mismatch("data", "group"));
        }
        IData::new(self.streams.clone(), extract_offset(offset))
    }

    /// Get a child of either kind.
    pub fn child(&self, index: usize) -> Result<IChild> {
        let offset = self.child_offset(index)?;
        let pos = extract_offset(offset);
        if is_group_offset(offset) {
            Ok(IChild::Group(IGroup::new(self.streams.clone(), pos)?))
        } else {
            Ok(IChild::Data(IData::new(self.streams.clone(), pos)?))
        }
    }
}

/// A child in the Ogawa hierarchy - either a Group or Data.
pub enum IChild {
    Group(IGroup),
    Data(IData),
}

/// Data block in the Ogawa hierarchy.
pub struct IData {
    streams: Arc<IStreams>,
    pos: u64,
    size: u64,
}

impl IData {
    /// Create a new data reader at the given position.
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let size = if pos == 0 { 0 } else { streams.read_u64(pos)? };
        Ok(Self { streams, pos, size })
    }

    /// Get the size of the data in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Read all data as bytes.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        if self.size > self.streams.size() {
            return Err(Error::UnexpectedEof(self.pos + self.size));
        }
        self.streams.read_bytes(self.pos + 8, self.size as usize)
    }
}

/// Ogawa archive reader.
pub struct IArchive {
    streams: Arc<IStreams>,
    root: IGroup,
}

impl IArchive {
    /// Open an archive file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let streams = Arc::new(IStreams::open(path)?);
        if !streams.is_frozen() {
            return Err(Error::invalid("archive was not finalized"));
        }
        let root_pos = streams.root_pos()?;
        let root = IGroup::new(streams.clone(), root_pos)?;
        Ok(Self { streams, root })
    }

    #[inline]
    pub fn version(&self) -> u16 {
        self.streams.version()
    }

    /// Get the root group.
    #[inline]
    pub fn root(&self) -> &IGroup {
        &self.root
    }

    /// Load the whole archive into a node tree.
    ///
    /// The file root holds a layout version block and the root archive group.
    pub fn load_tree(&self) -> Result<NodeTree> {
        if self.root.num_children() != 2 {
            return Err(Error::invalid(format!(
                "root group has {} children, expected 2",
                self.root.num_children()
            )));
        }
        let layout = self.root.data(0)?.read_all()?;
        let layout = match <[u8; 4]>::try_from(layout.as_slice()) {
            Ok(bytes) => u32::from_le_bytes(bytes),
            Err(_) => return Err(Error::invalid("layout version block")),
        };
        if layout != ARCHIVE_LAYOUT_VERSION {
            return Err(Error::invalid(format!("unsupported layout version {}", layout)));
        }

        let mut tree = NodeTree::new();
        let top = self.root.group(1)?;
        load_group(&top, &mut tree, NodeTree::ROOT)?;
        Ok(tree)
    }
}

/// Read an archive group (header block plus children) into `tree` below `id`.
fn load_group(group: &IGroup, tree: &mut NodeTree, id: NodeId) -> Result<()> {
    let (names, attrs) = decode_group_header(&group.data(0)?.read_all()?)?;
    if names.len() + 1 != group.num_children() {
        return Err(Error::invalid(format!(
            "group at {} lists {} names for {} children",
            group.pos(),
            names.len(),
            group.num_children() - 1
        )));
    }

    tree.set_attributes(id, attrs)?;

    for (i, name) in names.iter().enumerate() {
        match group.child(i + 1)? {
            IChild::Group(g) => {
                let child = tree.insert(id, name, TreeNode::Group(GroupNode::default()))?;
                load_group(&g, tree, child)?;
            }
            IChild::Data(d) => {
                let dataset = decode_dataset(&d.read_all()?)?;
                tree.insert(id, name, TreeNode::Dataset(dataset))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parsing() {
        let mut header = [0u8; 16];
        header[0..5].copy_from_slice(OGAWA_MAGIC);
        header[FROZEN_OFFSET] = FROZEN_FLAG;
        header[VERSION_OFFSET] = 0;
        header[VERSION_OFFSET + 1] = 1;

        let (version, frozen) = IStreams::parse_header(&header).unwrap();
        assert_eq!(version, 1);
        assert!(frozen);
    }

    #[test]
    fn test_invalid_magic() {
        let header = [0u8; 16];
        let result = IStreams::parse_header(&header);
        assert!(matches!(result, Err(Error::InvalidMagic)));
    }

    #[test]
    fn test_unsupported_version() {
        let mut header = [0u8; 16];
        header[0..5].copy_from_slice(OGAWA_MAGIC);
        header[VERSION_OFFSET + 1] = 9;
        assert!(matches!(
            IStreams::parse_header(&header),
            Err(Error::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_truncated_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), b"Ogawa").unwrap();
        assert!(matches!(IStreams::open(temp.path()), Err(Error::UnexpectedEof(5))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.oga");
        assert!(matches!(IArchive::open(&missing), Err(Error::FileNotFound(_))));
    }
}
