//! Playbook name resolution.
//!
//! Turns what the user typed (`^`, `.build.md`, `..`, `./ops/deploy.md`, ...)
//! into an absolute playbook path by walking up the directory tree looking
//! for `scripthaus.md` project markers.

use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use super::environment::{scripthaus_home, Environment, ProcessEnvironment};
use super::error::{ResolveError, ResolveResult};
use super::probe::{EntryKind, FsProbe, StatProbe};

/// Marker file for project roots, and the playbook used when none is named.
pub const DEFAULT_PLAYBOOK_FILE: &str = "scripthaus.md";

/// Sentinel for a playbook read from standard input.
pub const STDIN_PLAYBOOK: &str = "-";

/// The outcome of resolving a playbook name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPlaybook {
    /// Exactly what the user typed
    pub orig_name: String,

    /// Normalized name for display and history grouping
    pub canonical_name: String,

    /// Absolute path of the playbook, or `-` for stdin
    pub resolved_file: PathBuf,

    /// Project root, only set when a `.` prefix was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<PathBuf>,

    /// Reserved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

impl ResolvedPlaybook {
    /// Playbook read from standard input.
    pub fn stdin(orig_name: impl Into<String>) -> Self {
        Self {
            orig_name: orig_name.into(),
            canonical_name: STDIN_PLAYBOOK.to_string(),
            resolved_file: PathBuf::from(STDIN_PLAYBOOK),
            project_dir: None,
            project_name: None,
        }
    }

    pub fn is_stdin(&self) -> bool {
        self.resolved_file.as_os_str() == STDIN_PLAYBOOK
    }

    /// Directory holding the playbook file (`None` for stdin).
    pub fn playbook_dir(&self) -> Option<&Path> {
        if self.is_stdin() {
            return None;
        }
        self.resolved_file.parent()
    }
}

/// Resolves playbook names against a [`StatProbe`] and an [`Environment`].
pub struct NameResolver {
    probe: Box<dyn StatProbe>,
    env: Box<dyn Environment>,
    strict_permissions: bool,
}

impl std::fmt::Debug for NameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameResolver")
            .field("strict_permissions", &self.strict_permissions)
            .finish_non_exhaustive()
    }
}

impl NameResolver {
    /// Create a resolver with explicit capabilities.
    pub fn new(probe: Box<dyn StatProbe>, env: Box<dyn Environment>) -> Self {
        Self { probe, env, strict_permissions: false }
    }

    /// Resolver over the real filesystem and process environment.
    pub fn system() -> Self {
        Self::new(Box::new(FsProbe), Box::new(ProcessEnvironment))
    }

    /// Fail on permission errors during the upward walk instead of
    /// treating them as "marker not present".
    #[must_use]
    pub fn strict_permissions(mut self, strict: bool) -> Self {
        self.strict_permissions = strict;
        self
    }

    /// The injected environment.
    pub fn environment(&self) -> &dyn Environment {
        self.env.as_ref()
    }

    /// Resolve a playbook name.
    pub fn resolve(&self, name: &str) -> ResolveResult<ResolvedPlaybook> {
        if name == STDIN_PLAYBOOK {
            return Ok(ResolvedPlaybook::stdin(name));
        }
        if name.starts_with('@') {
            return Err(ResolveError::NamespaceNotSupported(name.to_string()));
        }
        if name.starts_with("./") || name.starts_with('/') || name.starts_with("../") {
            return self.resolve_literal_path(name);
        }
        if let Some(rest) = name.strip_prefix('^') {
            if rest.starts_with('/') {
                return Err(ResolveError::InvalidName(name.to_string()));
            }
            let home = scripthaus_home(self.env.as_ref())?;
            let resolved = self.resolve_in_dir(name, &home, rest)?;
            return Ok(ResolvedPlaybook {
                orig_name: name.to_string(),
                canonical_name: format!("^{rest}"),
                resolved_file: resolved,
                project_dir: None,
                project_name: None,
            });
        }

        if name.ends_with('/') && name.trim_end_matches('/').chars().all(|c| c == '.') {
            return Err(ResolveError::InvalidName(name.to_string()));
        }

        let prefix_len = name.find(|c: char| c.is_ascii_alphabetic() || c == '_').unwrap_or(name.len());
        let (prefix, rest) = name.split_at(prefix_len);
        if let Some(ch) = prefix.chars().find(|&c| c != '.') {
            return Err(ResolveError::InvalidPrefix { name: name.to_string(), ch });
        }
        if prefix.is_empty() && !rest.is_empty() {
            let cwd = self.current_dir()?;
            let literal = normalize(&cwd.join(rest));
            if matches!(self.probe.stat(&literal), Ok(EntryKind::File)) {
                tracing::debug!(file = %literal.display(), "bare playbook name matched a local file");
                let resolved = self.resolve_in_dir(name, &cwd, rest)?;
                return Ok(ResolvedPlaybook {
                    orig_name: name.to_string(),
                    canonical_name: resolved.display().to_string(),
                    resolved_file: resolved,
                    project_dir: None,
                    project_name: None,
                });
            }
        }

        let depth = prefix.len().max(1);
        let project_dir = self.find_project_dir(depth)?;
        let resolved = self.resolve_in_dir(name, &project_dir, rest)?;
        Ok(ResolvedPlaybook {
            orig_name: name.to_string(),
            canonical_name: format!("{}{rest}", ".".repeat(depth)),
            resolved_file: resolved,
            project_dir: Some(project_dir),
            project_name: None,
        })
    }

    fn resolve_literal_path(&self, name: &str) -> ResolveResult<ResolvedPlaybook> {
        let split = name.rfind('/').map_or(0, |idx| idx + 1);
        let (dir, base) = name.split_at(split);
        let dir = Path::new(dir);
        let dir = if dir.is_absolute() { dir.to_path_buf() } else { self.current_dir()?.join(dir) };
        let resolved = self.resolve_in_dir(name, &dir, base)?;
        Ok(ResolvedPlaybook {
            orig_name: name.to_string(),
            canonical_name: resolved.display().to_string(),
            resolved_file: resolved,
            project_dir: None,
            project_name: None,
        })
    }

    fn current_dir(&self) -> ResolveResult<PathBuf> {
        self.env.current_dir().map_err(ResolveError::CurrentDir)
    }

    /// Walk up `depth` project roots from the working directory.
    fn find_project_dir(&self, depth: usize) -> ResolveResult<PathBuf> {
        let mut cur_dir = self.current_dir()?;
        for level in 0..depth {
            let start = cur_dir.clone();
            match self.find_root_dir(&cur_dir, level == 0)? {
                Some(found) => cur_dir = found,
                None if level == 0 => return Err(ResolveError::RootNotFound { start }),
                None => return Err(ResolveError::NestedRootNotFound { start, depth: level + 1 }),
            }
        }
        Ok(cur_dir)
    }

    /// Nearest directory at or above `start` holding a marker file.
    fn find_root_dir(&self, start: &Path, allow_current: bool) -> ResolveResult<Option<PathBuf>> {
        let mut candidate =
            if allow_current { Some(start.to_path_buf()) } else { parent_dir(start) };
        while let Some(dir) = candidate {
            let marker = dir.join(DEFAULT_PLAYBOOK_FILE);
            tracing::trace!(marker = %marker.display(), "probing for project root");
            if self.marker_present(&marker)? {
                tracing::debug!(root = %dir.display(), "found project root");
                return Ok(Some(dir));
            }
            candidate = parent_dir(&dir);
        }
        Ok(None)
    }

    fn marker_present(&self, marker: &Path) -> ResolveResult<bool> {
        match self.probe.stat(marker) {
            Ok(kind) => Ok(kind == EntryKind::File),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                if self.strict_permissions {
                    return Err(ResolveError::PermissionDenied {
                        name: DEFAULT_PLAYBOOK_FILE.to_string(),
                        resolved: marker.to_path_buf(),
                        source: err,
                    });
                }
                tracing::debug!(marker = %marker.display(), "permission denied, continuing upward");
                Ok(false)
            }
            Err(err) => Err(ResolveError::Stat {
                name: DEFAULT_PLAYBOOK_FILE.to_string(),
                resolved: marker.to_path_buf(),
                source: err,
            }),
        }
    }

    /// Locate `playbook` inside `dir`, falling back to the default file.
    fn resolve_in_dir(&self, orig_name: &str, dir: &Path, playbook: &str) -> ResolveResult<PathBuf> {
        let playbook = if playbook.is_empty() {
            DEFAULT_PLAYBOOK_FILE.to_string()
        } else if playbook.ends_with('/') {
            format!("{playbook}{DEFAULT_PLAYBOOK_FILE}")
        } else {
            playbook.to_string()
        };
        let mut full_path = normalize(&dir.join(playbook));
        let mut stat = self.probe.stat(&full_path);
        if matches!(stat, Ok(EntryKind::Dir)) {
            full_path = full_path.join(DEFAULT_PLAYBOOK_FILE);
            stat = self.probe.stat(&full_path);
        }

        let name = if orig_name.is_empty() { "<default>" } else { orig_name }.to_string();
        match stat {
            Ok(EntryKind::File) => Ok(full_path),
            Ok(EntryKind::Dir) => Err(ResolveError::IsDirectory { name, resolved: full_path }),
            Err(err) => Err(match err.kind() {
                io::ErrorKind::NotFound => ResolveError::NotFound { name, resolved: full_path },
                io::ErrorKind::PermissionDenied => {
                    ResolveError::PermissionDenied { name, resolved: full_path, source: err }
                }
                _ => ResolveError::Stat { name, resolved: full_path, source: err },
            }),
        }
    }
}

/// Parent of an absolute directory; `None` at `/` or for relative paths.
fn parent_dir(dir: &Path) -> Option<PathBuf> {
    if !dir.is_absolute() {
        return None;
    }
    dir.parent().map(Path::to_path_buf)
}

/// Lexically remove `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::environment::{FixedEnvironment, HOME_VAR, SC_HOME_VAR};
    use crate::playbook::probe::FixtureProbe;

    fn resolver(probe: FixtureProbe, cwd: &str) -> NameResolver {
        let env = FixedEnvironment::new(cwd)
            .with_var(HOME_VAR, "/home/mike")
            .with_var(SC_HOME_VAR, "/sc");
        NameResolver::new(Box::new(probe), Box::new(env))
    }

    fn nested_tree() -> FixtureProbe {
        FixtureProbe::new()
            .with_file("/work/scripthaus.md")
            .with_file("/work/build.md")
            .with_file("/work/app/scripthaus.md")
            .with_file("/work/app/test.md")
            .with_dir("/work/app/src/deep")
            .with_file("/sc/scripthaus.md")
            .with_file("/sc/ops.md")
    }

    #[test]
    fn test_stdin_needs_no_filesystem() {
        let r = resolver(FixtureProbe::new(), "/nowhere");
        let pb = r.resolve("-").unwrap();
        assert!(pb.is_stdin());
        assert_eq!(pb.resolved_file, PathBuf::from("-"));
        assert!(pb.playbook_dir().is_none());
    }

    #[test]
    fn test_at_prefix_always_fails() {
        let r = resolver(nested_tree(), "/work");
        for name in ["@sawka", "@sawka::foo", "@", "@./x.md"] {
            assert!(matches!(r.resolve(name), Err(ResolveError::NamespaceNotSupported(_))));
        }
    }

    #[test]
    fn test_global_root() {
        let r = resolver(nested_tree(), "/work/app/src");
        let pb = r.resolve("^").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/sc/scripthaus.md"));
        assert_eq!(pb.canonical_name, "^");
        assert!(pb.project_dir.is_none());

        let pb = r.resolve("^ops.md").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/sc/ops.md"));
        assert_eq!(pb.canonical_name, "^ops.md");
    }

    #[test]
    fn test_global_root_uses_home_fallback() {
        let probe = FixtureProbe::new().with_file("/home/mike/scripthaus/scripthaus.md");
        let env = FixedEnvironment::new("/").with_var(HOME_VAR, "/home/mike");
        let r = NameResolver::new(Box::new(probe), Box::new(env));
        let pb = r.resolve("^").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/home/mike/scripthaus/scripthaus.md"));
    }

    #[test]
    fn test_single_dot_finds_nearest_root() {
        let r = resolver(nested_tree(), "/work/app/src/deep");
        let pb = r.resolve(".").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/app/scripthaus.md"));
        assert_eq!(pb.project_dir, Some(PathBuf::from("/work/app")));
        assert_eq!(pb.canonical_name, ".");
    }

    #[test]
    fn test_current_dir_is_eligible_at_depth_one() {
        let r = resolver(nested_tree(), "/work/app");
        let pb = r.resolve(".test.md").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/app/test.md"));
        assert_eq!(pb.canonical_name, ".test.md");
    }

    #[test]
    fn test_double_dot_resolves_outer_root() {
        let r = resolver(nested_tree(), "/work/app/src");
        let pb = r.resolve("..").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/scripthaus.md"));
        assert_eq!(pb.project_dir, Some(PathBuf::from("/work")));

        let pb = r.resolve("..build.md").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/build.md"));
        assert_eq!(pb.canonical_name, "..build.md");
    }

    #[test]
    fn test_double_dot_from_root_dir_skips_itself() {
        // Starting inside the inner root, depth 2 must still reach /work.
        let r = resolver(nested_tree(), "/work/app");
        let pb = r.resolve("..").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/scripthaus.md"));
    }

    #[test]
    fn test_too_many_dots() {
        let r = resolver(nested_tree(), "/work/app");
        let err = r.resolve("...").unwrap_err();
        assert!(matches!(err, ResolveError::NestedRootNotFound { depth: 3, .. }));
    }

    #[test]
    fn test_no_root_anywhere() {
        let r = resolver(FixtureProbe::new().with_dir("/tmp/x"), "/tmp/x");
        let err = r.resolve(".").unwrap_err();
        assert!(matches!(err, ResolveError::RootNotFound { .. }));
        assert!(err.to_string().contains("/tmp/x"));
    }

    #[test]
    fn test_bare_name_skips_same_named_directory() {
        let probe = FixtureProbe::new()
            .with_file("/w/scripthaus.md")
            .with_file("/w/ops.md")
            .with_dir("/w/sub/ops.md");
        let r = resolver(probe, "/w/sub");
        let pb = r.resolve("ops.md").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/w/ops.md"));
        assert_eq!(pb.canonical_name, ".ops.md");
        assert_eq!(pb.project_dir, Some(PathBuf::from("/w")));
    }

    #[test]
    fn test_trailing_slash_alone_is_invalid() {
        let r = resolver(nested_tree(), "/work/app");
        for name in [".../", "...//", "^/", "^//"] {
            assert!(
                matches!(r.resolve(name), Err(ResolveError::InvalidName(_))),
                "resolving {name}"
            );
        }
        assert!(r.resolve(".test.md").is_ok());
    }

    #[test]
    fn test_bare_name_prefers_literal_file() {
        let probe = nested_tree().with_file("/work/app/src/build.md");
        let r = resolver(probe, "/work/app/src");
        let pb = r.resolve("build.md").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/app/src/build.md"));
        assert_eq!(pb.canonical_name, "/work/app/src/build.md");
        assert!(pb.project_dir.is_none());
    }

    #[test]
    fn test_bare_name_falls_back_to_project() {
        let r = resolver(nested_tree(), "/work/app/src");
        let pb = r.resolve("test.md").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/app/test.md"));
        assert_eq!(pb.canonical_name, ".test.md");
        assert_eq!(pb.project_dir, Some(PathBuf::from("/work/app")));
    }

    #[test]
    fn test_empty_name_is_project_default() {
        let r = resolver(nested_tree(), "/work/app/src");
        let pb = r.resolve("").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/app/scripthaus.md"));
        assert_eq!(pb.canonical_name, ".");
    }

    #[test]
    fn test_invalid_prefix_character() {
        let r = resolver(nested_tree(), "/work");
        match r.resolve(".*foo") {
            Err(ResolveError::InvalidPrefix { ch, .. }) => assert_eq!(ch, '*'),
            other => panic!("expected invalid prefix, got {other:?}"),
        }
        assert!(matches!(r.resolve("9lives.md"), Err(ResolveError::InvalidPrefix { ch: '9', .. })));
    }

    #[test]
    fn test_literal_paths() {
        let r = resolver(nested_tree(), "/work/app");
        let pb = r.resolve("./test.md").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/app/test.md"));
        assert_eq!(pb.canonical_name, "/work/app/test.md");

        let pb = r.resolve("../build.md").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/build.md"));

        let pb = r.resolve("/sc/ops.md").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/sc/ops.md"));

        let pb = r.resolve("../").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/scripthaus.md"));
    }

    #[test]
    fn test_directory_retries_default_file() {
        let r = resolver(nested_tree(), "/work");
        let pb = r.resolve("./app").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/app/scripthaus.md"));

        let pb = r.resolve(".app/").unwrap();
        assert_eq!(pb.resolved_file, PathBuf::from("/work/app/scripthaus.md"));
    }

    #[test]
    fn test_directory_without_default_is_error() {
        let probe = nested_tree().with_dir("/work/empty/inner");
        let r = resolver(probe, "/work");
        let err = r.resolve("./empty").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));

        let probe = nested_tree().with_dir("/work/odd/scripthaus.md");
        let r = resolver(probe, "/work");
        assert!(matches!(r.resolve("./odd"), Err(ResolveError::IsDirectory { .. })));
    }

    #[test]
    fn test_missing_playbook_reports_both_names() {
        let r = resolver(nested_tree(), "/work/app");
        let err = r.resolve(".nope.md").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(".nope.md"));
        assert!(msg.contains("/work/app/nope.md"));
    }

    #[test]
    fn test_permission_denied_on_target() {
        let probe = nested_tree().with_denied("/work/secret.md");
        let r = resolver(probe, "/work");
        assert!(matches!(r.resolve("./secret.md"), Err(ResolveError::PermissionDenied { .. })));
    }

    #[test]
    fn test_walk_continues_past_denied_marker() {
        let probe = nested_tree().with_denied("/work/app/src/scripthaus.md");
        let r = resolver(probe, "/work/app/src");
        let pb = r.resolve(".").unwrap();
        assert_eq!(pb.project_dir, Some(PathBuf::from("/work/app")));
    }

    #[test]
    fn test_strict_walk_reports_denied_marker() {
        let probe = nested_tree().with_denied("/work/app/src/scripthaus.md");
        let r = resolver(probe, "/work/app/src").strict_permissions(true);
        assert!(matches!(r.resolve("."), Err(ResolveError::PermissionDenied { .. })));
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("/a/b/")), Some(PathBuf::from("/a")));
        assert_eq!(parent_dir(Path::new("/a")), Some(PathBuf::from("/")));
        assert_eq!(parent_dir(Path::new("/")), None);
        assert_eq!(parent_dir(Path::new("rel/dir")), None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c.md")), PathBuf::from("/a/c.md"));
        assert_eq!(normalize(Path::new("/a/b/")), PathBuf::from("/a/b"));
    }
}
