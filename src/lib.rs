//! # objarchive
//!
//! Hierarchical, self-describing object archives.
//!
//! An archive is a tree of groups and datasets stored in an Ogawa file (or
//! in memory). Each group is exposed as a dict-like [`ArchiveGroup`]: keys
//! map to scalars, arrays, subgroups, or composite values that are stored as
//! tagged subgroups and rebuilt on read through a registry of data schemes.
//!
//! ## Modules
//!
//! - [`util`] - Element types, shapes, errors
//! - [`core`] - Keys, attributes, datasets and the storage backend interface
//! - [`ogawa`] - Ogawa file format and the file backend
//! - [`archive`] - Archive lifecycle, group views, scheme registry
//!
//! ## Example
//!
//! ```no_run
//! use objarchive::prelude::*;
//!
//! # fn main() -> objarchive::Result<()> {
//! let ar = Archive::open("results.oga", "w")?;
//! ar.set("iterations", 42i64)?;
//! ar.set("energies", vec![-1.5f64, -1.25, -1.0])?;
//!
//! let sub = ar.create_group("params")?;
//! sub.set("beta", 10.0f64)?;
//! ar.close()?;
//!
//! let ar = Archive::open("results.oga", "r")?;
//! assert_eq!(ar.get("iterations")?.as_i64(), Some(42));
//! # Ok(())
//! # }
//! ```

pub mod util;
pub mod core;
pub mod ogawa;
pub mod archive;

// Re-export commonly used types
pub use util::{Error, PlainOldDataType, Result};
pub use archive::{Archive, ArchiveGroup, ArchiveInert, Value};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result};
    pub use crate::core::{Array, Key, KeyMode, Scalar};
    pub use crate::archive::{
        Archive, ArchiveAccess, ArchiveGroup, ArchiveInert, ArchiveOptions, FromArchive, FromMapping, LeafAction,
        Mapping, OpenMode, OverwritePolicy, Persist, ReadSelf, Reducible, SchemeEntry, SelfWriter, Value,
    };
}
