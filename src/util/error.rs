//! Error types for archive operations.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for archive operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Key is one of the reserved names
    #[error("Key {0} is reserved")]
    KeyReserved(String),

    /// Archive was opened with string-only keys and got something else
    #[error("Key must be a string, got {0}")]
    KeyNotString(String),

    /// Canonical text of the key exceeds the storage name limit
    #[error("Key is too large: {len} characters (max {max})")]
    KeyTooLong { len: usize, max: usize },

    /// Canonical text of the key does not parse back to the same key
    #[error("Key {0} can not be serialized reversibly")]
    KeyNotReversible(String),

    /// No child with this key
    #[error("Key {0} does not exist")]
    KeyNotFound(String),

    /// Child already present and the archive rejects overwrites
    #[error("Key {0} already exists")]
    KeyExists(String),

    /// Writing a value whose scheme tag is not registered
    #[error(
        "Value of type {type_name} has scheme {scheme}, which is not registered; \
         it could not be read back. Register it with SchemeRegistry::register"
    )]
    SchemeNotRegistered { type_name: String, scheme: String },

    /// Registry lookup of an unknown tag
    #[error("Scheme {0} is not recognized")]
    SchemeNotRecognized(String),

    /// Tag registered twice with different targets
    #[error("Scheme {scheme} already registered for {existing}, refusing {requested}")]
    SchemeConflict {
        scheme: String,
        existing: String,
        requested: String,
    },

    /// Reduction hook returned an empty mapping
    #[error("Reduction of {0} is empty")]
    EmptyReduction(String),

    /// Object value exposes neither a self-writer nor a reduction hook
    #[error("Value of type {0} has no archive representation")]
    NotArchivable(String),

    /// Resolved scheme exposes no reconstruction hook
    #[error("Cannot reconstruct {type_name} stored at {key}")]
    CannotReconstruct { type_name: String, key: String },

    /// Legacy class/module attributes name an unknown type
    #[error("Cannot find type {module}::{class} to reconstruct the object")]
    LegacyClassNotFound { module: String, class: String },

    /// Open mode text is not one of r, w, a
    #[error("Invalid open mode: {0}")]
    InvalidMode(String),

    /// Remote archives can only be opened read-only
    #[error("Remote location {0} must be opened read-only")]
    RemoteNotReadOnly(String),

    /// Location string is not usable
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// No fetcher is configured for a remote scheme
    #[error("No fetcher configured for {0}")]
    NoFetcher(String),

    /// Archive has been closed
    #[error("Archive is closed")]
    Closed,

    /// Archive is not writable (opened read-only)
    #[error("Archive is read-only")]
    ReadOnly,

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of file
    #[error("Invalid archive file: expected Ogawa magic bytes")]
    InvalidMagic,

    /// Unsupported file format version
    #[error("Unsupported archive version: {0}")]
    UnsupportedVersion(u16),

    /// File is truncated or corrupted
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Type mismatch when reading data
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Child index out of bounds
    #[error("Child index {index} out of bounds (count: {count})")]
    ChildOutOfBounds { index: usize, count: usize },

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create a type mismatch error.
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// True for the key-level failures (reserved, malformed, missing, duplicate).
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            Self::KeyReserved(_)
                | Self::KeyNotString(_)
                | Self::KeyTooLong { .. }
                | Self::KeyNotReversible(_)
                | Self::KeyNotFound(_)
                | Self::KeyExists(_)
        )
    }
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
