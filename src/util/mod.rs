//! Utility types shared across the crate.
//!
//! - [`PlainOldDataType`] / [`PodElement`] - dataset element types
//! - [`Dimensions`] - array shapes
//! - [`Error`] / [`Result`] - Error handling

mod pod;
mod error;
mod dimensions;

pub use pod::*;
pub use error::*;
pub use dimensions::*;
