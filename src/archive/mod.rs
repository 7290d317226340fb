//! Dict-like archive layer on top of a storage [`Backend`](crate::core::Backend).
//!
//! An [`Archive`] owns the backend; [`ArchiveGroup`] views address one group
//! each and map keys to [`Value`]s. Composite values are stored as tagged
//! subgroups and rebuilt through the [`SchemeRegistry`] on read.

mod containers;
mod group;
mod inert;
mod location;
mod options;
mod protocol;
mod root;
mod scheme;
mod value;

pub use containers::{index_name, DictWrap, ListWrap, TupleWrap, INDEX_WIDTH};
pub use group::{ArchiveGroup, Entries, LeafAction};
pub use inert::{ArchiveAccess, ArchiveInert};
pub use location::{FileFetcher, Fetcher, Location};
pub use options::{ArchiveOptions, OpenMode, OverwritePolicy};
pub use protocol::{
    take_component, FromArchive, FromMapping, Mapping, Persist, PersistDyn, ReadSelf, Reducible, SelfWriter,
};
pub use root::Archive;
pub use scheme::{register, GroupFn, MappingFn, SchemeEntry, SchemeRef, SchemeRegistry};
pub use value::Value;
