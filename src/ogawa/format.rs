//! Ogawa format constants and the block layouts stored inside it.
//!
//! Besides the container constants this module defines the two payload
//! layouts the archive stores in data blocks:
//!
//! ```text
//! group header block:  u32 child count
//!                      (u32 len, utf-8 name) per child
//!                      u32 len, serialized attributes
//!
//! dataset block:       u8 kind (0 = scalar, 1 = array)
//!                      u8 element type
//!                      u8 rank, u64 extent per axis
//!                      payload (little-endian, row-major)
//! ```

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::core::{Array, Attributes, Dataset, Scalar};
use crate::util::{Dimensions, Error, PlainOldDataType, Result};

/// Magic bytes at the start of an Ogawa file.
pub const OGAWA_MAGIC: &[u8; 5] = b"Ogawa";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Offset of the frozen flag in the header.
pub const FROZEN_OFFSET: usize = 5;

/// Offset of the version in the header.
pub const VERSION_OFFSET: usize = 6;

/// Offset of the root group position in the header.
pub const ROOT_POS_OFFSET: usize = 8;

/// Current Ogawa format version, stored big-endian as `{0, 1}`.
pub const CURRENT_VERSION: u16 = 1;

/// Version of the archive layout written inside the container.
pub const ARCHIVE_LAYOUT_VERSION: u32 = 1;

/// Frozen flag value when archive is frozen (finalized).
pub const FROZEN_FLAG: u8 = 0xFF;

/// Frozen flag value when archive is not frozen (still being written).
pub const NOT_FROZEN_FLAG: u8 = 0x00;

/// Bit mask for the type flag in child offsets.
/// MSB set = data, MSB clear = group.
pub const TYPE_FLAG_MASK: u64 = 1 << 63;

/// Mask to extract the actual offset from a child pointer.
pub const OFFSET_MASK: u64 = !(1 << 63);

/// Dataset kind byte for scalars.
pub const DATASET_SCALAR: u8 = 0;

/// Dataset kind byte for arrays.
pub const DATASET_ARRAY: u8 = 1;

/// Check if a child offset represents a group (MSB clear).
#[inline]
pub const fn is_group_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) == 0
}

/// Check if a child offset represents data (MSB set).
#[inline]
pub const fn is_data_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) != 0
}

/// Extract the actual position from a child offset.
#[inline]
pub const fn extract_offset(offset: u64) -> u64 {
    offset & OFFSET_MASK
}

/// Create a group child offset (MSB clear).
#[inline]
pub const fn make_group_offset(pos: u64) -> u64 {
    pos & OFFSET_MASK
}

/// Create a data child offset (MSB set).
#[inline]
pub const fn make_data_offset(pos: u64) -> u64 {
    pos | TYPE_FLAG_MASK
}

/// Check if an offset is the "empty" marker for groups or data.
#[inline]
pub const fn is_empty_offset(offset: u64) -> bool {
    extract_offset(offset) == 0
}

/// Encode the header block of an archive group.
pub fn encode_group_header<'a>(
    names: impl ExactSizeIterator<Item = &'a str>,
    attrs: &Attributes,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(names.len() as u32)?;
    for name in names {
        write_str(&mut buf, name)?;
    }
    write_str(&mut buf, &attrs.serialize())?;
    Ok(buf)
}

/// Decode the header block of an archive group.
pub fn decode_group_header(bytes: &[u8]) -> Result<(Vec<String>, Attributes)> {
    let mut cur = Cursor::new(bytes);
    let count = read_u32(&mut cur)? as usize;
    let mut names = Vec::with_capacity(count.min(bytes.len()));
    for _ in 0..count {
        names.push(read_str(&mut cur)?);
    }
    let attrs = Attributes::parse(&read_str(&mut cur)?);
    Ok((names, attrs))
}

/// Encode a dataset block.
pub fn encode_dataset(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match dataset {
        Dataset::Scalar(s) => {
            buf.write_u8(DATASET_SCALAR)?;
            buf.write_u8(s.pod().to_u8())?;
            buf.write_u8(0)?;
            buf.extend_from_slice(&s.to_le_bytes());
        }
        Dataset::Array(a) => {
            let sizes = a.dims().sizes();
            buf.write_u8(DATASET_ARRAY)?;
            buf.write_u8(a.pod().to_u8())?;
            buf.write_u8(sizes.len() as u8)?;
            for &n in sizes {
                buf.write_u64::<LittleEndian>(n as u64)?;
            }
            buf.extend_from_slice(&a.row_major_bytes());
        }
    }
    Ok(buf)
}

/// Decode a dataset block.
pub fn decode_dataset(bytes: &[u8]) -> Result<Dataset> {
    let mut cur = Cursor::new(bytes);
    let kind = read_u8(&mut cur)?;
    let pod = PlainOldDataType::from_u8(read_u8(&mut cur)?);
    let rank = read_u8(&mut cur)? as usize;
    let mut sizes = Vec::with_capacity(rank);
    for _ in 0..rank {
        let n = cur
            .read_u64::<LittleEndian>()
            .map_err(|_| Error::UnexpectedEof(cur.position()))?;
        let n = usize::try_from(n).map_err(|_| Error::invalid(format!("dimension {} does not fit in memory", n)))?;
        sizes.push(n);
    }
    let payload = &bytes[cur.position() as usize..];

    match kind {
        DATASET_SCALAR if rank == 0 => Ok(Dataset::Scalar(Scalar::from_le_bytes(pod, payload)?)),
        DATASET_ARRAY => Ok(Dataset::Array(Array::from_raw(
            pod,
            Dimensions::from_slice(&sizes),
            payload.to_vec(),
        )?)),
        other => Err(Error::invalid(format!(
            "dataset block of kind {} with rank {}",
            other, rank
        ))),
    }
}

fn write_str(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    buf.write_u32::<LittleEndian>(s.len() as u32)?;
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn read_u8(cur: &mut Cursor<&[u8]>) -> Result<u8> {
    cur.read_u8().map_err(|_| Error::UnexpectedEof(cur.position()))
}

fn read_u32(cur: &mut Cursor<&[u8]>) -> Result<u32> {
    cur.read_u32::<LittleEndian>()
        .map_err(|_| Error::UnexpectedEof(cur.position()))
}

fn read_str(cur: &mut Cursor<&[u8]>) -> Result<String> {
    let len = read_u32(cur)? as usize;
    let remaining = cur.get_ref().len() - cur.position() as usize;
    if len > remaining {
        return Err(Error::UnexpectedEof(cur.position() + len as u64));
    }
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic() {
        assert_eq!(OGAWA_MAGIC, b"Ogawa");
        assert_eq!(OGAWA_MAGIC.len(), 5);
    }

    #[test]
    fn test_offsets() {
        let group_offset = make_group_offset(0x1234);
        assert!(is_group_offset(group_offset));
        assert!(!is_data_offset(group_offset));
        assert_eq!(extract_offset(group_offset), 0x1234);
        assert_eq!(group_offset, 0x1234);

        let data_offset = make_data_offset(0x5678);
        assert!(is_data_offset(data_offset));
        assert!(!is_group_offset(data_offset));
        assert_eq!(extract_offset(data_offset), 0x5678);
        assert_eq!(data_offset, 0x8000000000005678);
    }

    #[test]
    fn test_empty_offset() {
        assert!(is_empty_offset(0));
        assert!(is_empty_offset(TYPE_FLAG_MASK));
        assert!(!is_empty_offset(0x100));
    }

    #[test]
    fn test_group_header() {
        let mut attrs = Attributes::new();
        attrs.set(Attributes::SCHEME_KEY, "DictWrap");
        let names = ["a", "b c"];
        let bytes = encode_group_header(names.iter().copied(), &attrs).unwrap();

        let (back, back_attrs) = decode_group_header(&bytes).unwrap();
        assert_eq!(back, vec!["a", "b c"]);
        assert_eq!(back_attrs, attrs);

        assert!(matches!(
            decode_group_header(&bytes[..bytes.len() - 2]),
            Err(Error::UnexpectedEof(_))
        ));
    }

    #[test]
    fn test_dataset_blocks() {
        let scalar = Dataset::Scalar(Scalar::Str("x".into()));
        assert_eq!(decode_dataset(&encode_dataset(&scalar).unwrap()).unwrap(), scalar);

        let array = Dataset::Array(Array::identity(3));
        let bytes = encode_dataset(&array).unwrap();
        assert_eq!(bytes.len(), 3 + 2 * 8 + 9 * 8);
        assert_eq!(decode_dataset(&bytes).unwrap(), array);
    }

    #[test]
    fn test_dataset_bad_kind() {
        assert!(decode_dataset(&[7, 0, 0]).is_err());
        assert!(decode_dataset(&[]).is_err());
    }

    #[test]
    fn test_dataset_dims_overflow() {
        let mut bytes = vec![DATASET_ARRAY, PlainOldDataType::Float64.to_u8(), 2];
        bytes.extend_from_slice(&(1u64 << 40).to_le_bytes());
        bytes.extend_from_slice(&(1u64 << 40).to_le_bytes());
        bytes.extend_from_slice(&[0; 16]);
        assert!(matches!(decode_dataset(&bytes), Err(Error::InvalidStructure(_))));
    }
}
