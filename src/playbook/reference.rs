//! Script references as typed on the command line.
//!
//! `run`, `show` and `add` all take one argument naming what to act on.
//! [`parse_script_reference`] turns it (plus the global `--playbook`
//! option) into a [`ScriptReference`].

use std::path::PathBuf;

use anyhow::bail;
use once_cell::sync::Lazy;
use regex::Regex;

use super::resolver::STDIN_PLAYBOOK;

static DOT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\.+)[a-zA-Z_]").unwrap());

static COMMAND_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_/-]*$").unwrap());

/// Extensions run as standalone scripts rather than looked up in a playbook.
const SCRIPT_EXTENSIONS: &[&str] = &[".sh", ".py", ".js"];

/// Whether `name` is a valid playbook command name.
pub fn is_valid_command_name(name: &str) -> bool {
    COMMAND_NAME_RE.is_match(name)
}

/// Split a script name into `(playbook, command)`.
///
/// ```
/// use scripthaus::playbook::split_script_name;
///
/// assert_eq!(split_script_name("^foo"), ("^".to_string(), "foo".to_string()));
/// assert_eq!(split_script_name(".hello.md::test"), (".hello.md".to_string(), "test".to_string()));
/// ```
pub fn split_script_name(script_name: &str) -> (String, String) {
    if let Some((playbook, command)) = script_name.split_once("::") {
        return (playbook.to_string(), command.to_string());
    }
    if let Some(rest) = script_name.strip_prefix('^') {
        return ("^".to_string(), rest.to_string());
    }
    if let Some(caps) = DOT_PREFIX_RE.captures(script_name) {
        let dots = &caps[1];
        return (dots.to_string(), script_name[dots.len()..].to_string());
    }
    (String::new(), script_name.to_string())
}

/// What a command-line argument refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptReference {
    /// Playbook read from standard input.
    Stdin { command: Option<String> },

    /// A standalone script file (`.sh`, `.py`, `.js`).
    LiteralPath(PathBuf),

    /// A command inside a playbook; `command` is `None` for a bare playbook.
    PlaybookScript { file: String, command: Option<String> },
}

impl ScriptReference {
    /// The playbook name and command, if this refers to a playbook.
    pub fn playbook(&self) -> Option<(&str, Option<&str>)> {
        match self {
            Self::Stdin { command } => Some((STDIN_PLAYBOOK, command.as_deref())),
            Self::PlaybookScript { file, command } => Some((file.as_str(), command.as_deref())),
            Self::LiteralPath(_) => None,
        }
    }

    fn for_playbook(file: &str, command: Option<String>) -> Self {
        if file == STDIN_PLAYBOOK {
            Self::Stdin { command }
        } else {
            Self::PlaybookScript { file: file.to_string(), command }
        }
    }
}

/// Parse a script argument.
///
/// `playbook_opt` is the global `--playbook` value; when present the
/// argument is a bare command name. `allow_bare_playbook` lets a playbook
/// without a command through (`show`, `list`).
pub fn parse_script_reference(
    arg: &str,
    playbook_opt: Option<&str>,
    allow_bare_playbook: bool,
) -> anyhow::Result<ScriptReference> {
    if arg.ends_with('/') {
        bail!("invalid script '{arg}', cannot have a trailing slash");
    }

    if let Some(playbook) = playbook_opt {
        if arg.contains("::") {
            bail!("invalid script '{arg}', no '::' allowed when --playbook '{playbook}' is specified");
        }
        check_command_name(arg)?;
        return Ok(ScriptReference::for_playbook(playbook, Some(arg.to_string())));
    }

    if arg == STDIN_PLAYBOOK {
        if !allow_bare_playbook {
            bail!("no playbook command specified, usage: -::[command]");
        }
        return Ok(ScriptReference::Stdin { command: None });
    }

    if let Some((file, command)) = arg.split_once("::") {
        if command.is_empty() {
            if !allow_bare_playbook {
                bail!("no playbook command specified in '{arg}', usage: {file}::[command]");
            }
            return Ok(ScriptReference::for_playbook(file, None));
        }
        check_command_name(command)?;
        return Ok(ScriptReference::for_playbook(file, Some(command.to_string())));
    }

    if SCRIPT_EXTENSIONS.iter().any(|ext| arg.ends_with(ext)) {
        return Ok(ScriptReference::LiteralPath(PathBuf::from(arg)));
    }

    if arg.ends_with(".md") {
        if !allow_bare_playbook {
            bail!("no playbook command specified, usage: {arg}::[command]");
        }
        return Ok(ScriptReference::PlaybookScript { file: arg.to_string(), command: None });
    }

    let (file, command) = split_script_name(arg);
    if command.is_empty() {
        if !allow_bare_playbook {
            bail!("no playbook command specified, usage: {arg}[command]");
        }
        return Ok(ScriptReference::PlaybookScript { file, command: None });
    }
    check_command_name(&command)?;
    Ok(ScriptReference::PlaybookScript { file, command: Some(command) })
}

fn check_command_name(name: &str) -> anyhow::Result<()> {
    if !is_valid_command_name(name) {
        bail!("invalid characters in playbook command name '{name}'");
    }
    Ok(())
}
