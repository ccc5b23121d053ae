//! Resolver Integration Tests
//!
//! Resolves names against a real directory tree on disk, then extracts the
//! commands from the file that was found.

use std::fs;
use std::path::Path;

use scripthaus::playbook::{
    extract_commands, FixedEnvironment, FsProbe, NameResolver, ResolveError, SC_HOME_VAR,
};
use tempfile::{tempdir, TempDir};

/// outer/scripthaus.md
/// outer/inner/scripthaus.md
/// outer/inner/ops.md
/// outer/inner/docs/scripthaus.md
/// outer/inner/src/
/// home/scripthaus.md
fn tree() -> TempDir {
    let root = tempdir().unwrap();
    let write = |rel: &str, body: &str| {
        let path = root.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    };
    write("outer/scripthaus.md", "```sh\n# @scripthaus command outer-cmd\necho outer\n```\n");
    write("outer/inner/scripthaus.md", "```sh\n# @scripthaus command inner-cmd\necho inner\n```\n");
    write("outer/inner/ops.md", "```bash\n# @scripthaus command up - bring it up\necho up\n```\n");
    write("outer/inner/docs/scripthaus.md", "```sh\n# @scripthaus command docs\necho docs\n```\n");
    write("home/scripthaus.md", "```sh\n# @scripthaus command global\necho global\n```\n");
    fs::create_dir_all(root.path().join("outer/inner/src")).unwrap();
    root
}

fn resolver(root: &Path, cwd: &str) -> NameResolver {
    let env = FixedEnvironment::new(root.join(cwd))
        .with_var(SC_HOME_VAR, root.join("home").display().to_string());
    NameResolver::new(Box::new(FsProbe), Box::new(env))
}

#[test]
fn test_default_playbook_from_nested_dir() {
    let root = tree();
    let pb = resolver(root.path(), "outer/inner/src").resolve("").unwrap();

    assert_eq!(pb.resolved_file, root.path().join("outer/inner/scripthaus.md"));
    assert_eq!(pb.project_dir.as_deref(), Some(root.path().join("outer/inner").as_path()));
    assert_eq!(pb.canonical_name, ".");

    let source = fs::read(&pb.resolved_file).unwrap();
    let extraction = extract_commands(&pb, &source).unwrap();
    assert_eq!(extraction.commands[0].full_script_name(), ".inner-cmd");
}

#[test]
fn test_double_dot_walks_to_outer_root() {
    let root = tree();
    let pb = resolver(root.path(), "outer/inner/src").resolve("..").unwrap();

    assert_eq!(pb.resolved_file, root.path().join("outer/scripthaus.md"));
    assert_eq!(pb.canonical_name, "..");
}

#[test]
fn test_three_dots_past_the_last_root() {
    let root = tree();
    let err = resolver(root.path(), "outer/inner").resolve("...").unwrap_err();
    assert!(matches!(err, ResolveError::NestedRootNotFound { depth: 3, .. }), "{err:?}");
}

#[test]
fn test_named_playbook_in_project() {
    let root = tree();
    let pb = resolver(root.path(), "outer/inner/src").resolve(".ops.md").unwrap();

    assert_eq!(pb.resolved_file, root.path().join("outer/inner/ops.md"));
    let source = fs::read(&pb.resolved_file).unwrap();
    let extraction = extract_commands(&pb, &source).unwrap();
    let up = extraction.command("up").unwrap();
    assert_eq!(up.short_text, "bring it up");
    assert_eq!(up.full_script_name(), ".ops.md::up");
}

#[test]
fn test_directory_falls_back_to_default_file() {
    let root = tree();
    let pb = resolver(root.path(), "outer/inner").resolve(".docs").unwrap();
    assert_eq!(pb.resolved_file, root.path().join("outer/inner/docs/scripthaus.md"));

    let pb = resolver(root.path(), "outer/inner").resolve(".docs/").unwrap();
    assert_eq!(pb.resolved_file, root.path().join("outer/inner/docs/scripthaus.md"));
}

#[test]
fn test_global_playbook() {
    let root = tree();
    let pb = resolver(root.path(), "outer").resolve("^").unwrap();

    assert_eq!(pb.resolved_file, root.path().join("home/scripthaus.md"));
    assert_eq!(pb.canonical_name, "^");
    assert!(pb.project_dir.is_none());
}

#[test]
fn test_relative_and_absolute_paths() {
    let root = tree();
    let pb = resolver(root.path(), "outer/inner/src").resolve("../ops.md").unwrap();
    assert_eq!(pb.resolved_file, root.path().join("outer/inner/ops.md"));

    let abs = root.path().join("outer/scripthaus.md");
    let pb = resolver(root.path(), "home").resolve(&abs.display().to_string()).unwrap();
    assert_eq!(pb.resolved_file, abs);
}

#[test]
fn test_missing_playbook() {
    let root = tree();
    let err = resolver(root.path(), "outer/inner").resolve(".nope.md").unwrap_err();
    assert!(matches!(err, ResolveError::NotFound { .. }), "{err:?}");
}
