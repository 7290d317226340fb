//! A stand-in that accepts every archive operation and does nothing.
//!
//! Code that writes results on one node of a parallel job and skips the
//! archive elsewhere can take an [`ArchiveAccess`] and be handed either a
//! real group or an [`ArchiveInert`].

use super::{Archive, ArchiveGroup, Value};
use crate::core::Key;
use crate::util::Result;

/// Accepts any read or write. Reads return the stand-in itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArchiveInert;

impl ArchiveInert {
    pub fn new() -> Self {
        ArchiveInert
    }

    /// Returns the stand-in, so chained lookups keep working.
    pub fn get(&self, _key: impl Into<Key>) -> ArchiveInert {
        *self
    }

    /// Discards the value.
    pub fn set(&self, _key: impl Into<Key>, _value: impl Into<Value>) {}
}

/// The read/write surface shared by archive groups and the inert stand-in.
pub trait ArchiveAccess {
    /// What a read returns.
    type Entry;

    fn read<K: Into<Key>>(&self, key: K) -> Result<Self::Entry>;

    fn write<K: Into<Key>, V: Into<Value>>(&self, key: K, value: V) -> Result<()>;
}

impl ArchiveAccess for ArchiveGroup {
    type Entry = Value;

    fn read<K: Into<Key>>(&self, key: K) -> Result<Value> {
        self.get(key)
    }

    fn write<K: Into<Key>, V: Into<Value>>(&self, key: K, value: V) -> Result<()> {
        self.set(key, value)
    }
}

impl ArchiveAccess for Archive {
    type Entry = Value;

    fn read<K: Into<Key>>(&self, key: K) -> Result<Value> {
        self.root().get(key)
    }

    fn write<K: Into<Key>, V: Into<Value>>(&self, key: K, value: V) -> Result<()> {
        self.root().set(key, value)
    }
}

impl ArchiveAccess for ArchiveInert {
    type Entry = ArchiveInert;

    fn read<K: Into<Key>>(&self, key: K) -> Result<ArchiveInert> {
        Ok(self.get(key))
    }

    fn write<K: Into<Key>, V: Into<Value>>(&self, key: K, value: V) -> Result<()> {
        self.set(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveOptions;

    fn store_result<A: ArchiveAccess>(target: &A) -> Result<()> {
        target.write("energy", -1.5f64)?;
        target.write("iterations", 12i64)
    }

    #[test]
    fn test_inert_absorbs_everything() {
        let inert = ArchiveInert::new();
        inert.set("x", 1i64);
        assert_eq!(inert.get("anything").get("deeper"), ArchiveInert);
        store_result(&inert).unwrap();
        assert_eq!(inert.read("energy").unwrap(), ArchiveInert);
    }

    #[test]
    fn test_same_code_writes_real_archive() {
        let ar = Archive::in_memory(ArchiveOptions::default());
        store_result(&ar).unwrap();
        assert_eq!(ar.read("iterations").unwrap().as_i64(), Some(12));
        assert_eq!(ar.root().read("energy").unwrap().as_f64(), Some(-1.5));
    }
}
