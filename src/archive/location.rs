//! Where an archive lives: a local path, or a remote URL fetched to a
//! transient local copy before opening.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};

use crate::util::{Error, Result};

/// Retrieves remote archives.
pub trait Fetcher: Send + Sync {
    /// Copy the resource at `url` into `dest`.
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> Result<()>;
}

/// Fetcher for `file://` URLs.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> Result<()> {
        let path = url
            .strip_prefix("file://")
            .ok_or_else(|| Error::InvalidLocation(url.to_string()))?;
        let mut src = File::open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::FileNotFound(PathBuf::from(path))
            } else {
                Error::Io(e)
            }
        })?;
        io::copy(&mut src, dest)?;
        Ok(())
    }
}

/// A parsed archive location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote { scheme: String, url: String },
}

impl Location {
    /// Parse a location: `scheme://...` is remote, anything else a local path.
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::InvalidLocation("empty location".into()));
        }
        if let Some(pos) = text.find("://") {
            let scheme = &text[..pos];
            let valid = !scheme.is_empty()
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c));
            if !valid {
                return Err(Error::InvalidLocation(text.to_string()));
            }
            return Ok(Location::Remote {
                scheme: scheme.to_ascii_lowercase(),
                url: text.to_string(),
            });
        }
        Ok(Location::Local(PathBuf::from(text)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote { .. })
    }

    /// Fetch a remote location into a temporary file removed when dropped.
    pub(crate) fn fetch_transient(&self, fetcher: Option<&dyn Fetcher>) -> Result<TempPath> {
        let (scheme, url) = match self {
            Location::Remote { scheme, url } => (scheme, url),
            Location::Local(p) => return Err(Error::InvalidLocation(p.display().to_string())),
        };
        let builtin = FileFetcher;
        let fetcher: &dyn Fetcher = match fetcher {
            Some(f) => f,
            None if scheme == "file" => &builtin,
            None => return Err(Error::NoFetcher(scheme.clone())),
        };

        let mut temp = NamedTempFile::new()?;
        fetcher.fetch(url, temp.as_file_mut())?;
        temp.as_file_mut().flush()?;
        tracing::debug!(%url, local = %temp.path().display(), "fetched remote archive");
        Ok(temp.into_temp_path())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(p) => write!(f, "{}", p.display()),
            Location::Remote { url, .. } => f.write_str(url),
        }
    }
}

impl From<&Path> for Location {
    fn from(p: &Path) -> Self {
        Location::Local(p.to_path_buf())
    }
}

impl From<PathBuf> for Location {
    fn from(p: PathBuf) -> Self {
        Location::Local(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Location::parse("a/b.oga").unwrap(), Location::Local("a/b.oga".into()));
        assert!(Location::parse("https://host/x.oga").unwrap().is_remote());
        assert!(matches!(Location::parse(""), Err(Error::InvalidLocation(_))));
        assert!(matches!(Location::parse("://x"), Err(Error::InvalidLocation(_))));
    }

    #[test]
    fn test_fetch_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        std::fs::write(&src, b"payload").unwrap();

        let loc = Location::parse(&format!("file://{}", src.display())).unwrap();
        let temp = loc.fetch_transient(None).unwrap();
        assert_eq!(std::fs::read(&temp).unwrap(), b"payload");

        let local = temp.to_path_buf();
        drop(temp);
        assert!(!local.exists());
    }

    #[test]
    fn test_unknown_scheme_needs_fetcher() {
        let loc = Location::parse("http://example.invalid/a.oga").unwrap();
        assert!(matches!(loc.fetch_transient(None), Err(Error::NoFetcher(s)) if s == "http"));
    }

    struct Fixed(&'static [u8]);

    impl Fetcher for Fixed {
        fn fetch(&self, _url: &str, dest: &mut dyn Write) -> Result<()> {
            dest.write_all(self.0)?;
            Ok(())
        }
    }

    #[test]
    fn test_custom_fetcher() {
        let loc = Location::parse("http://example.invalid/a.oga").unwrap();
        let fetcher = Fixed(b"abc");
        let temp = loc.fetch_transient(Some(&fetcher)).unwrap();
        assert_eq!(std::fs::read(&temp).unwrap(), b"abc");
    }
}
