//! Command execution module.
//!
//! Builds interpreter processes for playbook commands and standalone
//! scripts, then runs them with stdio passed through to the terminal.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, ExitStatus, Stdio};
use std::sync::Once;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::playbook::CommandDef;

/// Shells run as `<lang> -c <script> <name> args...`.
const SHELL_LANGS: &[&str] = &["sh", "bash", "zsh", "tcsh", "ksh", "fish"];

/// Interpreters run as `<lang> -c <script> args...`.
const PYTHON_LANGS: &[&str] = &["python", "python2", "python3"];

/// Longest first line still considered for a shebang.
const MAX_SHEBANG_LINE: usize = 100;

static SHEBANG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/[a-zA-Z0-9/_-]+$").unwrap());

/// Per-run options from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunSpec {
    /// Arguments passed through to the script
    pub args: Vec<String>,

    /// Extra environment variables, applied in order
    pub env: Vec<(String, String)>,

    /// `--nolog`
    pub no_log: bool,

    /// `--log`
    pub force_log: bool,
}

impl RunSpec {
    /// Whether a run should be recorded, given the command's `nolog` directive.
    pub fn should_log(&self, directive_no_log: bool) -> bool {
        if self.no_log {
            false
        } else if self.force_log {
            true
        } else {
            !directive_no_log
        }
    }

    /// Value `key` will have in the child's environment.
    pub fn lookup_env(&self, key: &str) -> Option<String> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .or_else(|| std::env::var(key).ok())
            .filter(|v| !v.is_empty())
    }
}

/// Parse `--env 'A=1;B=2'`. Blank segments are skipped.
pub fn parse_env_assignments(value: &str) -> anyhow::Result<Vec<(String, String)>> {
    let mut vars = Vec::new();
    for pair in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, val)) = pair.split_once('=') else {
            bail!("invalid --env value '{pair}', expected VAR=VALUE");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid --env value '{pair}', missing variable name");
        }
        vars.push((key.to_string(), val.to_string()));
    }
    Ok(vars)
}

/// Read variables from a dotenv file.
pub fn load_env_file(path: &Path) -> anyhow::Result<Vec<(String, String)>> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("cannot read env file '{}'", path.display()))?;
    let mut vars = Vec::new();
    for item in iter {
        vars.push(item.with_context(|| format!("invalid env file '{}'", path.display()))?);
    }
    Ok(vars)
}

/// Fail if any `require`d variable is unset in the child's environment.
pub fn check_required_env(cmd: &CommandDef<'_>, spec: &RunSpec) -> anyhow::Result<()> {
    let missing: Vec<&str> = cmd
        .require_env_vars
        .iter()
        .filter(|var| spec.lookup_env(var).is_none())
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        bail!(
            "command '{}' requires environment variable(s) that are not set: {}",
            cmd.orig_script_name(),
            missing.join(", ")
        );
    }
    Ok(())
}

/// Build the interpreter process for a playbook command.
///
/// Directives must already be processed.
pub fn build_command(cmd: &CommandDef<'_>, spec: &RunSpec) -> anyhow::Result<ProcessCommand> {
    let lang = cmd.lang.as_str();
    let mut process = if SHELL_LANGS.contains(&lang) {
        let mut p = ProcessCommand::new(lang);
        p.arg("-c").arg(&cmd.script_text).arg(cmd.orig_script_name());
        p
    } else if PYTHON_LANGS.contains(&lang) {
        let mut p = ProcessCommand::new(lang);
        p.arg("-c").arg(&cmd.script_text);
        p
    } else if lang == "js" || lang == "node" {
        let mut p = ProcessCommand::new("node");
        p.arg("--eval").arg(&cmd.script_text).arg("--");
        p
    } else {
        bail!("invalid command language '{lang}', not supported");
    };
    process.args(&spec.args);
    if let Some(dir) = &cmd.change_dir {
        process.current_dir(dir);
    }
    apply_env(&mut process, spec);
    Ok(process)
}

/// A standalone script, ready to run.
#[derive(Debug)]
pub struct ScriptCommand {
    pub process: ProcessCommand,
    /// Interpreter name, for history
    pub script_type: String,
}

/// Interpreter from a `#!/abs/path` first line; no arguments allowed.
pub fn read_shebang(data: &[u8]) -> Option<String> {
    let newline = data.iter().position(|&b| b == b'\n')?;
    if newline > MAX_SHEBANG_LINE {
        return None;
    }
    let line = std::str::from_utf8(&data[..newline]).ok()?;
    let interpreter = line.strip_prefix("#!")?.trim();
    SHEBANG_RE.is_match(interpreter).then(|| interpreter.to_string())
}

/// Build the process for a standalone script file.
///
/// A shebang line wins; otherwise the extension picks the interpreter.
pub fn build_script_command(path: &Path, spec: &RunSpec) -> anyhow::Result<ScriptCommand> {
    let data = fs::read(path).with_context(|| format!("cannot read script '{}'", path.display()))?;
    let (program, script_type) = match read_shebang(&data) {
        Some(interpreter) => {
            let name = Path::new(&interpreter)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (PathBuf::from(interpreter), name)
        }
        None => {
            let lang = match path.extension().and_then(|e| e.to_str()) {
                Some("sh") => "sh",
                Some("py") => "python3",
                Some("js") => "node",
                _ => bail!("cannot determine how to run '{}' (no shebang line)", path.display()),
            };
            (PathBuf::from(lang), lang.to_string())
        }
    };
    let mut process = ProcessCommand::new(program);
    process.arg(path).args(&spec.args);
    apply_env(&mut process, spec);
    Ok(ScriptCommand { process, script_type })
}

fn apply_env(process: &mut ProcessCommand, spec: &RunSpec) {
    for (key, value) in &spec.env {
        process.env(key, value);
    }
}

/// Result of executing a command.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Exit status of the command
    pub status: ExitStatus,

    /// Standard output (if captured)
    pub stdout: Option<String>,

    /// Standard error (if captured)
    pub stderr: Option<String>,

    /// Time taken to execute
    pub duration: Duration,
}

impl ExecutionResult {
    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code; 1 when the child was killed by a signal.
    pub fn exit_code(&self) -> i32 {
        self.status.code().unwrap_or(1)
    }
}

static IGNORE_INTERRUPT: Once = Once::new();

/// Command executor.
#[derive(Debug, Default)]
pub struct Executor {
    /// Whether to capture output (vs pass through to terminal)
    pub capture_output: bool,
}

impl Executor {
    /// Create a new executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to capture output.
    #[must_use]
    pub fn capture(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    /// Run `process` to completion.
    ///
    /// In pass-through mode Ctrl-C is left to the child; the parent keeps
    /// running so it can report and log the result.
    pub fn execute(&self, mut process: ProcessCommand) -> anyhow::Result<ExecutionResult> {
        let program = process.get_program().to_string_lossy().into_owned();

        if self.capture_output {
            process.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            IGNORE_INTERRUPT.call_once(|| {
                if let Err(err) = ctrlc::set_handler(|| {}) {
                    tracing::warn!("cannot install interrupt handler: {err}");
                }
            });
            process.stdin(Stdio::inherit()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        tracing::debug!(program = %program, cwd = ?process.get_current_dir(), "spawning");
        let start = Instant::now();
        let output = process
            .output()
            .with_context(|| format!("cannot start command '{program}'"))?;
        let duration = start.elapsed();

        let (stdout, stderr) = if self.capture_output {
            (
                Some(String::from_utf8_lossy(&output.stdout).to_string()),
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
            )
        } else {
            (None, None)
        };

        Ok(ExecutionResult { status: output.status, stdout, stderr, duration })
    }
}
