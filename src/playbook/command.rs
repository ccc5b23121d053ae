//! Command definitions extracted from a playbook.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::directive::{RawDirective, COMMAND_DIRECTIVE};
use super::resolver::ResolvedPlaybook;

/// Languages a command fence may declare.
pub const ALLOWED_LANGS: &[&str] =
    &["sh", "bash", "zsh", "tcsh", "ksh", "fish", "python", "python2", "python3", "js", "node"];

static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap());

/// Whether `lang` may be used for a command.
pub fn is_allowed_lang(lang: &str) -> bool {
    ALLOWED_LANGS.contains(&lang)
}

/// A runnable command found in a playbook.
#[derive(Debug, Clone, Serialize)]
pub struct CommandDef<'a> {
    /// Playbook the command was found in
    #[serde(skip)]
    pub playbook: &'a ResolvedPlaybook,

    pub name: String,

    /// Interpreter, from the fence info string
    pub lang: String,

    /// Inner fence text, directives included
    pub script_text: String,

    /// Whole fence, backticks and info line included
    pub raw_code_text: String,

    /// Markdown prose preceding the fence
    pub help_text: String,

    /// Description from the `command` directive
    pub short_text: String,

    /// Byte offset of the fence info line
    pub start_index: usize,

    /// 1-indexed line of the fence info line
    pub start_line_no: usize,

    pub raw_directives: Vec<RawDirective>,

    pub require_env_vars: Vec<String>,

    /// Working directory override; `None` runs in the caller's directory
    pub change_dir: Option<PathBuf>,

    pub no_log: bool,

    pub warnings: Vec<String>,

    #[serde(skip)]
    directives_processed: bool,
}

impl<'a> CommandDef<'a> {
    /// A command with no prose, position or directives yet.
    pub fn new(
        playbook: &'a ResolvedPlaybook,
        name: impl Into<String>,
        lang: impl Into<String>,
        script_text: impl Into<String>,
    ) -> Self {
        Self {
            playbook,
            name: name.into(),
            lang: lang.into(),
            script_text: script_text.into(),
            raw_code_text: String::new(),
            help_text: String::new(),
            short_text: String::new(),
            start_index: 0,
            start_line_no: 0,
            raw_directives: Vec::new(),
            require_env_vars: Vec::new(),
            change_dir: None,
            no_log: false,
            warnings: Vec::new(),
            directives_processed: false,
        }
    }

    /// Name as the user would type it (`^deploy`, `.test`, `ops.md::up`).
    pub fn orig_script_name(&self) -> String {
        join_script_name(&self.playbook.orig_name, &self.name)
    }

    /// Name used for display and history (`^deploy`, `.test`, `/abs/ops.md::up`).
    pub fn full_script_name(&self) -> String {
        join_script_name(&self.playbook.canonical_name, &self.name)
    }

    pub fn directives_processed(&self) -> bool {
        self.directives_processed
    }

    /// Apply `require`, `cd` and `nolog` directives.
    ///
    /// Runs at most once. Problems become entries in `warnings`.
    pub fn process_directives(&mut self) {
        if self.directives_processed {
            return;
        }
        self.directives_processed = true;

        let directives = std::mem::take(&mut self.raw_directives);
        for directive in &directives {
            match directive.directive_type.as_str() {
                COMMAND_DIRECTIVE => {}
                "require" => self.apply_require(directive),
                "cd" => self.apply_cd(directive.data.trim()),
                "nolog" => self.no_log = true,
                other => self.warn(format!(
                    "invalid directive '{other}' (ignoring) (line {})",
                    directive.line_no
                )),
            }
        }
        self.raw_directives = directives;
        tracing::trace!(
            command = %self.name,
            requires = self.require_env_vars.len(),
            no_log = self.no_log,
            "processed directives"
        );
    }

    fn apply_require(&mut self, directive: &RawDirective) {
        let mut names = directive.data.split_whitespace().peekable();
        if names.peek().is_none() {
            self.warn(format!("'require' directive needs a variable name (line {})", directive.line_no));
            return;
        }
        for name in names {
            if !ENV_VAR_RE.is_match(name) {
                self.warn(format!("invalid environment variable name '{name}' in 'require' directive (ignoring)"));
                continue;
            }
            if !self.require_env_vars.iter().any(|v| v == name) {
                self.require_env_vars.push(name.to_string());
            }
        }
    }

    fn apply_cd(&mut self, dir_name: &str) {
        match dir_name {
            ":playbook" => match self.playbook.playbook_dir() {
                Some(dir) => self.change_dir = Some(dir.to_path_buf()),
                None => self.warn("'cd :playbook' is not available for a playbook read from stdin (ignoring)".to_string()),
            },
            ":current" => self.change_dir = None,
            _ if dir_name.starts_with('~') => match dirs::home_dir() {
                Some(home) => {
                    let rest = dir_name[1..].trim_start_matches('/');
                    self.change_dir = Some(if rest.is_empty() { home } else { home.join(rest) });
                }
                None => self.warn(format!("cannot resolve home directory for 'cd {dir_name}' (ignoring)")),
            },
            _ if Path::new(dir_name).is_absolute() => self.change_dir = Some(PathBuf::from(dir_name)),
            _ => self.warn(format!("'cd' directive must be absolute, got '{dir_name}' (ignoring)")),
        }
    }

    fn warn(&mut self, message: String) {
        tracing::debug!(command = %self.name, "{message}");
        self.warnings.push(message);
    }
}

fn join_script_name(playbook: &str, command: &str) -> String {
    if playbook.is_empty() || playbook == "^" || playbook.chars().all(|c| c == '.') {
        format!("{playbook}{command}")
    } else {
        format!("{playbook}::{command}")
    }
}
