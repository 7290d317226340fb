//! Archive lifecycle: open a location in a mode, hand out the root view,
//! flush and release on close.

use std::fmt;
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use tempfile::TempPath;

use super::group::{ArchiveGroup, Shared};
use super::location::Location;
use super::options::{ArchiveOptions, OpenMode};
use super::Value;
use crate::core::{Backend, Key, MemoryBackend, NodePath};
use crate::ogawa::OgawaBackend;
use crate::util::{Error, Result};

/// An open archive. Dereferences to its root [`ArchiveGroup`].
///
/// Dropping an archive closes it; errors from that final flush are logged.
/// Call [`close`](Archive::close) to observe them.
pub struct Archive {
    root: ArchiveGroup,
    location: Option<Location>,
    mode: OpenMode,
    /// Local copy of a remote archive, removed when the archive goes away.
    transient: Option<TempPath>,
}

impl Archive {
    /// Open `location` with a mode string (`"r"`, `"w"` or `"a"`).
    pub fn open(location: &str, mode: &str) -> Result<Self> {
        let mode: OpenMode = mode.parse()?;
        Self::open_with(location, mode, ArchiveOptions::default())
    }

    /// Open `location` with explicit options.
    pub fn open_with(location: &str, mode: OpenMode, options: ArchiveOptions) -> Result<Self> {
        let location = Location::parse(location)?;

        let (backend, transient) = match &location {
            Location::Remote { .. } => {
                if !mode.is_read_only() {
                    return Err(Error::RemoteNotReadOnly(location.to_string()));
                }
                let temp = location.fetch_transient(options.fetcher.as_deref())?;
                let backend = OgawaBackend::open_read(&temp)?;
                (backend, Some(temp))
            }
            Location::Local(path) => (Self::open_local(path, mode)?, None),
        };

        tracing::debug!(%location, %mode, "opened archive");
        let shared = Shared::new(Box::new(backend), options, location.to_string());
        Ok(Self {
            root: ArchiveGroup::new(shared, NodePath::root()),
            location: Some(location),
            mode,
            transient,
        })
    }

    fn open_local(path: &Path, mode: OpenMode) -> Result<OgawaBackend> {
        match mode {
            OpenMode::Read => OgawaBackend::open_read(path),
            OpenMode::Write => {
                // a fresh archive; a missing file is not an error
                let _ = fs::remove_file(path);
                OgawaBackend::create(path)
            }
            OpenMode::Append => OgawaBackend::open_append(path),
        }
    }

    /// Open `location` and write every pair of `init` into the root.
    pub fn open_init<I, K, V>(location: &str, mode: OpenMode, options: ArchiveOptions, init: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        let archive = Self::open_with(location, mode, options)?;
        archive.root.update(init)?;
        Ok(archive)
    }

    /// A writable archive kept entirely in memory.
    pub fn in_memory(options: ArchiveOptions) -> Self {
        Self::from_backend(Box::new(MemoryBackend::new()), OpenMode::Append, options)
    }

    /// Wrap any backend.
    pub fn from_backend(backend: Box<dyn Backend>, mode: OpenMode, options: ArchiveOptions) -> Self {
        let label = backend.name().to_string();
        tracing::debug!(backend = %label, %mode, "opened archive");
        Self {
            root: ArchiveGroup::new(Shared::new(backend, options, label), NodePath::root()),
            location: None,
            mode,
            transient: None,
        }
    }

    /// Where the archive was opened from, `None` for in-memory archives.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// The file actually backing the archive (the transient copy for remote ones).
    pub fn local_path(&self) -> Option<PathBuf> {
        match (&self.transient, &self.location) {
            (Some(temp), _) => Some(temp.to_path_buf()),
            (None, Some(Location::Local(path))) => Some(path.clone()),
            _ => None,
        }
    }

    /// The root view.
    pub fn root(&self) -> &ArchiveGroup {
        &self.root
    }

    /// Flush and release the backend. Views still held fail with
    /// [`Error::Closed`] afterwards.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let shared = self.root.shared();
        if !shared.is_open() {
            return Ok(());
        }
        let result = shared.close();
        tracing::debug!(archive = shared.label(), ok = result.is_ok(), "closed archive");
        result
    }
}

impl Deref for Archive {
    type Target = ArchiveGroup;

    fn deref(&self) -> &ArchiveGroup {
        &self.root
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "failed to flush archive on drop");
        }
    }
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("location", &self.location)
            .field("mode", &self.mode)
            .field("open", &self.root.is_open())
            .finish()
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.root, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_lifecycle() {
        let ar = Archive::in_memory(ArchiveOptions::default());
        ar.set("x", 1i64).unwrap();
        let view = ar.root().clone();
        assert!(view.is_open());
        ar.close().unwrap();
        assert!(!view.is_open());
        assert!(matches!(view.get("x"), Err(Error::Closed)));
    }

    #[test]
    fn test_invalid_mode() {
        assert!(matches!(Archive::open("a.oga", "x"), Err(Error::InvalidMode(_))));
    }

    #[test]
    fn test_remote_must_be_read_only() {
        let err = Archive::open("http://example.invalid/a.oga", "a").unwrap_err();
        assert!(matches!(err, Error::RemoteNotReadOnly(_)));
    }

    #[test]
    fn test_display_lists_children() {
        let ar = Archive::in_memory(ArchiveOptions::default());
        ar.set("n", 3i64).unwrap();
        ar.create_group("sub").unwrap();
        ar.set("l", vec![1i64, 2]).unwrap();
        let text = ar.to_string();
        assert!(text.starts_with("Archive memory"));
        assert!(text.contains("n : data"));
        assert!(text.contains("sub : subgroup"));
        assert!(text.contains("l : object ListWrap"));
    }
}
