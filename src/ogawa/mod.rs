//! Ogawa binary container used as the on-disk archive backend.
//!
//! ## File Structure
//!
//! ```text
//! +------------------+
//! | Magic: "Ogawa"   |  5 bytes
//! +------------------+
//! | Frozen flag      |  1 byte (0x00 or 0xFF)
//! +------------------+
//! | Version          |  2 bytes ({0, 1})
//! +------------------+
//! | Root Group Pos   |  8 bytes (u64 LE)
//! +------------------+
//! | ... Data ...     |
//! +------------------+
//! ```
//!
//! The root table holds a layout version block and the top archive group.
//! Every archive group is a table whose first child is a header block
//! (child names and attributes) followed by one entry per child.

mod backend;
mod format;
mod reader;
mod writer;

pub use backend::OgawaBackend;
pub use format::*;
pub use reader::*;
pub use writer::*;
