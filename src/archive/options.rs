//! Per-archive configuration fixed at open time.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::location::Fetcher;
use crate::core::KeyMode;
use crate::util::{Error, Result};

/// How an archive file is opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing archive, no writes.
    Read,
    /// Fresh archive; any existing file is removed first.
    Write,
    /// Existing archive extended in place, created when missing.
    #[default]
    Append,
}

impl OpenMode {
    pub fn is_read_only(self) -> bool {
        self == OpenMode::Read
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpenMode::Read => "r",
            OpenMode::Write => "w",
            OpenMode::Append => "a",
        }
    }
}

impl FromStr for OpenMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(OpenMode::Read),
            "w" => Ok(OpenMode::Write),
            "a" => Ok(OpenMode::Append),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `set` does when the key already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Remove the existing entry and write the new one.
    #[default]
    Replace,
    /// Fail with [`Error::KeyExists`].
    Reject,
}

/// Options shared by an archive and every view derived from it.
#[derive(Clone)]
pub struct ArchiveOptions {
    pub key_mode: KeyMode,
    pub overwrite: OverwritePolicy,
    /// Rebuild tagged groups into values on `get`.
    pub reconstruct: bool,
    /// Retrieves remote locations; `None` handles `file://` only.
    pub fetcher: Option<Arc<dyn Fetcher>>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            key_mode: KeyMode::StringOnly,
            overwrite: OverwritePolicy::Replace,
            reconstruct: true,
            fetcher: None,
        }
    }
}

impl ArchiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_mode(mut self, mode: KeyMode) -> Self {
        self.key_mode = mode;
        self
    }

    pub fn overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    pub fn reconstruct(mut self, reconstruct: bool) -> Self {
        self.reconstruct = reconstruct;
        self
    }

    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }
}

impl fmt::Debug for ArchiveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveOptions")
            .field("key_mode", &self.key_mode)
            .field("overwrite", &self.overwrite)
            .field("reconstruct", &self.reconstruct)
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mode_parse() {
        assert_eq!("r".parse::<OpenMode>().unwrap(), OpenMode::Read);
        assert_eq!("w".parse::<OpenMode>().unwrap(), OpenMode::Write);
        assert_eq!("a".parse::<OpenMode>().unwrap(), OpenMode::Append);
        assert!(matches!("rw".parse::<OpenMode>(), Err(Error::InvalidMode(m)) if m == "rw"));
        assert!("".parse::<OpenMode>().is_err());
        assert_eq!(OpenMode::Write.to_string(), "w");
    }

    #[test]
    fn test_defaults() {
        let o = ArchiveOptions::default();
        assert_eq!(o.key_mode, KeyMode::StringOnly);
        assert_eq!(o.overwrite, OverwritePolicy::Replace);
        assert!(o.reconstruct);
        assert!(o.fetcher.is_none());

        let o = ArchiveOptions::new().overwrite(OverwritePolicy::Reject).reconstruct(false);
        assert_eq!(o.overwrite, OverwritePolicy::Reject);
        assert!(!o.reconstruct);
    }
}
