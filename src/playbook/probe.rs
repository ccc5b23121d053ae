//! Filesystem stat capability.
//!
//! The resolver never touches the filesystem directly; every existence
//! check goes through a [`StatProbe`]. [`FsProbe`] asks the OS,
//! [`FixtureProbe`] answers from an in-memory tree for tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// What a successful stat found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    pub fn is_dir(self) -> bool {
        self == Self::Dir
    }
}

/// Answers "does this path exist, and what is it".
///
/// Errors carry an [`io::ErrorKind`] so callers can tell `NotFound` from
/// `PermissionDenied`.
pub trait StatProbe: Send + Sync {
    fn stat(&self, path: &Path) -> io::Result<EntryKind>;
}

/// Probe backed by `std::fs::metadata`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl StatProbe for FsProbe {
    fn stat(&self, path: &Path) -> io::Result<EntryKind> {
        let meta = std::fs::metadata(path)?;
        Ok(if meta.is_dir() { EntryKind::Dir } else { EntryKind::File })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FixtureEntry {
    File,
    Dir,
    Denied,
}

/// In-memory probe. Adding a file implicitly adds all of its ancestors as
/// directories.
#[derive(Debug, Clone, Default)]
pub struct FixtureProbe {
    entries: HashMap<PathBuf, FixtureEntry>,
}

impl FixtureProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a regular file.
    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.add_ancestors(path);
        self.entries.insert(path.to_path_buf(), FixtureEntry::File);
        self
    }

    /// Add a directory.
    #[must_use]
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.add_ancestors(path);
        self.entries.insert(path.to_path_buf(), FixtureEntry::Dir);
        self
    }

    /// Make stat on `path` fail with `PermissionDenied`.
    #[must_use]
    pub fn with_denied(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.add_ancestors(path);
        self.entries.insert(path.to_path_buf(), FixtureEntry::Denied);
        self
    }

    fn add_ancestors(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            self.entries.entry(ancestor.to_path_buf()).or_insert(FixtureEntry::Dir);
        }
    }
}

impl StatProbe for FixtureProbe {
    fn stat(&self, path: &Path) -> io::Result<EntryKind> {
        match self.entries.get(path) {
            Some(FixtureEntry::File) => Ok(EntryKind::File),
            Some(FixtureEntry::Dir) => Ok(EntryKind::Dir),
            Some(FixtureEntry::Denied) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", path.display()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file or directory: {}", path.display()),
            )),
        }
    }
}
