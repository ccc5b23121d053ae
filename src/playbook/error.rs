//! Playbook error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for name resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors that can occur while resolving a playbook name to a file.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Target playbook file does not exist.
    #[error("playbook not found '{name}' (resolved to '{}')", .resolved.display())]
    NotFound { name: String, resolved: PathBuf },

    /// No `scripthaus.md` marker in any parent directory.
    #[error("cannot find scripthaus root (scripthaus.md file) in any parent directory above '{}'", .start.display())]
    RootNotFound { start: PathBuf },

    /// No marker at the requested nesting depth.
    #[error("cannot find scripthaus root (scripthaus.md file) above '{}' (depth = {depth})", .start.display())]
    NestedRootNotFound { start: PathBuf, depth: usize },

    /// The playbook (or a probed marker, in strict mode) could not be accessed.
    #[error("playbook '{name}' (resolved to '{}'), permission error: {source}", .resolved.display())]
    PermissionDenied {
        name: String,
        resolved: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other stat failure.
    #[error("playbook '{name}' (resolved to '{}'), stat error: {source}", .resolved.display())]
    Stat {
        name: String,
        resolved: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Resolution ended on a directory.
    #[error("playbook '{name}' (resolved to '{}'), is a directory not a file", .resolved.display())]
    IsDirectory { name: String, resolved: PathBuf },

    /// `@`-prefixed names are reserved.
    #[error("cannot resolve playbook '{0}', @-prefix not supported")]
    NamespaceNotSupported(String),

    /// Prefix contained something other than dots.
    #[error("cannot resolve directory for playbook '{name}': invalid prefix character '{ch}'")]
    InvalidPrefix { name: String, ch: char },

    /// Name does not fit the grammar at all.
    #[error("invalid playbook name '{0}'")]
    InvalidName(String),

    /// Neither `SCRIPTHAUS_HOME` nor `HOME` is set.
    #[error("cannot resolve scripthaus home directory (SCRIPTHAUS_HOME and HOME not set)")]
    HomeNotSet,

    /// Working directory unavailable.
    #[error("cannot get current working directory: {0}")]
    CurrentDir(#[source] io::Error),
}

/// Errors that abort command extraction.
///
/// Malformed blocks never end up here; they become warnings.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Playbook bytes are not valid UTF-8.
    #[error("playbook '{name}' is not valid UTF-8 (byte offset {offset})")]
    InvalidUtf8 { name: String, offset: usize },
}
