//! Reduction adapters for the built-in container shapes.
//!
//! Sequences are stored as groups whose children are named by zero-padded
//! element index, so lexical and numeric order agree. Mappings are stored
//! under the plain text of each key; two keys with the same plain text
//! (`Str("1")` and `Int(1)`) collapse into one entry and the later one in key
//! order wins.

use std::collections::BTreeMap;

use super::protocol::{Mapping, Reducible};
use super::scheme::SchemeEntry;
use super::Value;
use crate::core::Key;
use crate::util::{Error, Result};

/// Width of sequence index names.
pub const INDEX_WIDTH: usize = 10;

/// Name of the element at `index`.
pub fn index_name(index: usize) -> String {
    format!("{:0width$}", index, width = INDEX_WIDTH)
}

/// Adapter for lists.
pub struct ListWrap<'a>(pub &'a [Value]);

/// Adapter for tuples.
pub struct TupleWrap<'a>(pub &'a [Value]);

/// Adapter for dicts.
pub struct DictWrap<'a>(pub &'a BTreeMap<Key, Value>);

impl ListWrap<'_> {
    pub const TAG: &'static str = "ListWrap";

    pub fn scheme() -> SchemeEntry {
        SchemeEntry::new(Self::TAG, module_path!(), "ListWrap").mapping_factory_fn(|m| {
            Ok(Value::List(elements_in_order(m)?))
        })
    }
}

impl TupleWrap<'_> {
    pub const TAG: &'static str = "TupleWrap";

    pub fn scheme() -> SchemeEntry {
        SchemeEntry::new(Self::TAG, module_path!(), "TupleWrap").mapping_factory_fn(|m| {
            Ok(Value::Tuple(elements_in_order(m)?))
        })
    }
}

impl DictWrap<'_> {
    pub const TAG: &'static str = "DictWrap";

    pub fn scheme() -> SchemeEntry {
        SchemeEntry::new(Self::TAG, module_path!(), "DictWrap").mapping_factory_fn(|m| Ok(Value::Dict(m)))
    }
}

impl Reducible for ListWrap<'_> {
    fn reduce_to_mapping(&self) -> Result<Mapping> {
        Ok(reduce_elements(self.0))
    }
}

impl Reducible for TupleWrap<'_> {
    fn reduce_to_mapping(&self) -> Result<Mapping> {
        Ok(reduce_elements(self.0))
    }
}

impl Reducible for DictWrap<'_> {
    fn reduce_to_mapping(&self) -> Result<Mapping> {
        Ok(self
            .0
            .iter()
            .map(|(k, v)| (Key::Str(k.plain()), v.clone()))
            .collect())
    }
}

fn reduce_elements(elements: &[Value]) -> Mapping {
    elements
        .iter()
        .enumerate()
        .map(|(i, v)| (Key::Str(index_name(i)), v.clone()))
        .collect()
}

/// Elements of a reduced sequence, ordered by numeric index.
fn elements_in_order(mapping: Mapping) -> Result<Vec<Value>> {
    let mut indexed = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let index = key
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| Error::invalid(format!("sequence index {} is not numeric", key)))?;
        indexed.push((index, value));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}
