//! ScriptHaus - run commands from Markdown playbooks.
//!
//! Resolves a short script name to a playbook, extracts the command from
//! its fenced code block and runs it with the right interpreter.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scripthaus::core::{
    append_to_playbook, build_command, build_script_command, check_required_env, load_env_file,
    parse_env_assignments, read_playbook, Config, Executor, HistoryEntry, HistoryManager,
    NewCommand, RunSpec, RunType,
};
use scripthaus::playbook::{
    extract_commands, parse_script_reference, scripthaus_home, CommandDef, NameResolver,
    ResolvedPlaybook, ScriptReference,
};

/// Run commands from Markdown playbooks
#[derive(Parser)]
#[command(name = "scripthaus")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress [^scripthaus] status output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Playbook to use; script arguments become bare command names
    #[arg(short, long, global = true, value_name = "PLAYBOOK")]
    playbook: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a playbook command or a standalone script
    Run {
        /// Do not record this run in history
        #[arg(long, conflicts_with = "log")]
        nolog: bool,

        /// Record this run even if the command has a nolog directive
        #[arg(long)]
        log: bool,

        /// Extra environment variables ('A=1;B=2')
        #[arg(long, value_name = "VARS")]
        env: Vec<String>,

        /// Load environment variables from a dotenv file
        #[arg(long, value_name = "FILE")]
        env_file: Vec<PathBuf>,

        /// Script to run ([playbook]::[command], ^command, .command, script.sh)
        script: String,

        /// Arguments passed to the script
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List the commands in a playbook
    List {
        /// Playbook to list (defaults to the project playbook)
        #[arg(value_name = "PLAYBOOK")]
        name: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ListFormat::Text)]
        format: ListFormat,
    },

    /// Show the help text and code of a command
    Show {
        /// Command or playbook to show
        script: String,
    },

    /// Append a new command to a playbook
    Add {
        /// Where to add it ([playbook]::[command])
        script: String,

        /// Script language
        #[arg(short = 't', long = "type", value_name = "LANG")]
        lang: String,

        /// Help text placed above the command
        #[arg(short, long)]
        message: Option<String>,

        /// Script text
        #[arg(short = 'c', value_name = "TEXT", conflicts_with_all = ["stdin", "text"])]
        command_text: Option<String>,

        /// Pass '-' to read the script text from stdin
        #[arg(value_parser = ["-"], conflicts_with = "text")]
        stdin: Option<String>,

        /// Show what would be added without modifying the playbook
        #[arg(long)]
        dry_run: bool,

        /// Script text, after '--'
        #[arg(last = true)]
        text: Vec<String>,
    },

    /// Show run history
    History {
        /// Number of entries to show
        #[arg(short = 'n', default_value_t = 20)]
        num: usize,

        /// Show all entries
        #[arg(long)]
        all: bool,

        /// Show timestamps, directories, durations and exit codes
        #[arg(long, conflicts_with = "json")]
        full: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the history file
    Manage {
        #[command(subcommand)]
        operation: ManageOperation,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Subcommand)]
enum ManageOperation {
    /// Remove every history entry
    ClearHistory,

    /// Remove history entries with ids in [start, end]
    RemoveHistoryRange { start: u64, end: u64 },

    /// Renumber history entries from 1
    RenumberHistory,

    /// Delete the history file
    DeleteHistory,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListFormat {
    Text,
    Json,
}

/// Shared state for subcommands.
struct Ctx {
    config: Config,
    resolver: NameResolver,
    quiet: bool,
    playbook: Option<String>,
}

impl Ctx {
    fn status(&self, message: &str) {
        if !self.quiet {
            println!("[^scripthaus] {message}");
        }
    }

    fn print_warnings(&self, warnings: &[String]) {
        if self.quiet || !self.config.general.show_warnings || warnings.is_empty() {
            return;
        }
        for warning in warnings {
            eprintln!("WARNING: {warning}");
        }
        eprintln!();
    }

    fn history_path(&self) -> Result<PathBuf> {
        let home = scripthaus_home(self.resolver.environment())?;
        self.config.history_path(&home)
    }

    fn open_history(&self) -> Result<HistoryManager> {
        HistoryManager::with_path(self.history_path()?, self.config.history.max_entries)
    }
}

fn main() {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("[^scripthaus] ERROR {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = Config::load()?;
    let resolver = NameResolver::system().strict_permissions(config.resolver.strict_permissions);
    let ctx = Ctx { quiet: cli.quiet || config.general.quiet, config, resolver, playbook: cli.playbook };

    match cli.command {
        Commands::Run { nolog, log, env, env_file, script, args } => {
            let mut spec = RunSpec { args, no_log: nolog, force_log: log, env: Vec::new() };
            for path in &env_file {
                spec.env.extend(load_env_file(path)?);
            }
            for value in &env {
                spec.env.extend(parse_env_assignments(value)?);
            }
            cmd_run(&ctx, &script, &spec)
        }
        Commands::List { name, format } => {
            let name = name.or_else(|| ctx.playbook.clone()).unwrap_or_default();
            cmd_list(&ctx, &name, format)
        }
        Commands::Show { script } => cmd_show(&ctx, &script),
        Commands::Add { script, lang, message, command_text, stdin, dry_run, text } => {
            let script_text = match (command_text, stdin) {
                (Some(text), _) => text,
                (None, Some(_)) => read_stdin_text()?,
                (None, None) => text.join(" "),
            };
            let (file, name) = add_target(&ctx, &script)?;
            let new_command = NewCommand { name, lang, message, script_text };
            cmd_add(&ctx, &file, &new_command, dry_run)
        }
        Commands::History { num, all, full, json } => cmd_history(&ctx, num, all, full, json),
        Commands::Manage { operation } => cmd_manage(&ctx, operation),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(0)
        }
        Commands::Config { path } => cmd_config(&ctx, path),
    }
}

/// Resolve, read and extract a playbook.
fn load_playbook(ctx: &Ctx, name: &str) -> Result<(ResolvedPlaybook, Vec<u8>)> {
    let playbook = ctx.resolver.resolve(name)?;
    tracing::debug!(file = %playbook.resolved_file.display(), canonical = %playbook.canonical_name, "resolved playbook");
    let source = read_playbook(&playbook)?;
    Ok((playbook, source))
}

/// Run a playbook command or standalone script.
fn cmd_run(ctx: &Ctx, script: &str, spec: &RunSpec) -> Result<i32> {
    let reference = parse_script_reference(script, ctx.playbook.as_deref(), false)?;
    let (file, command) = match &reference {
        ScriptReference::LiteralPath(path) => return run_script(ctx, script, path, spec),
        ScriptReference::Stdin { command } => ("-", command.as_deref()),
        ScriptReference::PlaybookScript { file, command } => (file.as_str(), command.as_deref()),
    };
    let Some(command) = command else {
        bail!("no playbook command specified in '{script}'");
    };

    let (playbook, source) = load_playbook(ctx, file)?;
    let extraction = extract_commands(&playbook, &source)?;
    let warnings = extraction.warnings.clone();
    let Some(mut cmd) = extraction.into_command(command) else {
        ctx.print_warnings(&warnings);
        bail!(
            "could not find command '{command}' inside of playbook '{}'",
            playbook.resolved_file.display()
        );
    };

    cmd.process_directives();
    let mut all_warnings = warnings;
    all_warnings.extend(cmd.warnings.iter().cloned());
    ctx.print_warnings(&all_warnings);

    check_required_env(&cmd, spec)?;
    let process = build_command(&cmd, spec)?;
    let entry = (ctx.config.history.enabled && spec.should_log(cmd.no_log))
        .then(|| playbook_history_entry(&cmd, spec));
    let label = format!("{} {}", process.get_program().to_string_lossy(), cmd.orig_script_name());
    execute_and_record(ctx, process, &label, entry, !all_warnings.is_empty())
}

fn playbook_history_entry(cmd: &CommandDef<'_>, spec: &RunSpec) -> HistoryEntry {
    let playbook = cmd.playbook;
    let mut entry =
        HistoryEntry::new(RunType::Playbook, playbook.resolved_file.clone(), &playbook.canonical_name);
    entry.script_name = cmd.name.clone();
    entry.script_type = cmd.lang.clone();
    entry.project_dir = playbook.project_dir.clone();
    entry.args = spec.args.clone();
    if let Some(dir) = &cmd.change_dir {
        entry.cwd = dir.clone();
    }
    entry
}

/// Run a standalone script file.
fn run_script(ctx: &Ctx, orig: &str, path: &Path, spec: &RunSpec) -> Result<i32> {
    if !path.is_file() {
        bail!("script '{orig}' not found");
    }
    let script = build_script_command(path, spec)?;
    let entry = (ctx.config.history.enabled && spec.should_log(false)).then(|| {
        let full_path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut entry = HistoryEntry::new(RunType::Script, full_path, orig);
        entry.script_type = script.script_type.clone();
        entry.args = spec.args.clone();
        entry
    });
    let label = format!("{} {orig}", script.script_type);
    execute_and_record(ctx, script.process, &label, entry, false)
}

fn execute_and_record(
    ctx: &Ctx,
    process: ProcessCommand,
    label: &str,
    entry: Option<HistoryEntry>,
    has_warnings: bool,
) -> Result<i32> {
    let result = Executor::new().execute(process)?;
    let exit_code = result.exit_code();

    if let Some(mut entry) = entry {
        entry.finish(result.duration, exit_code);
        if let Err(err) = record_history(ctx, entry) {
            eprintln!("[^scripthaus] error trying to add run to history: {err:#}");
        }
    }

    if !ctx.quiet {
        let warning_note = if has_warnings { " (has warnings)" } else { "" };
        println!();
        ctx.status(&format!(
            "ran '{label}', duration={:.3}s, exitcode={exit_code}{warning_note}",
            result.duration.as_secs_f64()
        ));
    }
    Ok(exit_code)
}

fn record_history(ctx: &Ctx, entry: HistoryEntry) -> Result<()> {
    let mut history = ctx.open_history()?;
    let id = history.record(entry);
    history.save()?;
    tracing::debug!(id, path = %history.path().display(), "recorded run");
    Ok(())
}

#[derive(Serialize)]
struct PlaybookListing<'a> {
    playbook: &'a ResolvedPlaybook,
    commands: &'a [CommandDef<'a>],
    warnings: &'a [String],
}

/// List the commands in a playbook.
fn cmd_list(ctx: &Ctx, name: &str, format: ListFormat) -> Result<i32> {
    let (playbook, source) = load_playbook(ctx, name)?;
    let extraction = extract_commands(&playbook, &source)?;

    match format {
        ListFormat::Json => {
            let listing = PlaybookListing {
                playbook: &playbook,
                commands: &extraction.commands,
                warnings: &extraction.warnings,
            };
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        ListFormat::Text => {
            ctx.print_warnings(&extraction.warnings);
            println!("{}", playbook.resolved_file.display());
            for cmd in &extraction.commands {
                if cmd.short_text.is_empty() {
                    println!("  {}", cmd.full_script_name());
                } else {
                    println!("  {:<30} - {}", cmd.full_script_name(), cmd.short_text);
                }
            }
        }
    }
    Ok(0)
}

/// Show a command's help text and code.
fn cmd_show(ctx: &Ctx, script: &str) -> Result<i32> {
    let reference = parse_script_reference(script, ctx.playbook.as_deref(), true)?;
    let Some((file, command)) = reference.playbook() else {
        bail!("cannot show '{script}', show only works with playbook commands");
    };
    let Some(command) = command else {
        return cmd_list(ctx, file, ListFormat::Text);
    };

    let (playbook, source) = load_playbook(ctx, file)?;
    let extraction = extract_commands(&playbook, &source)?;
    let Some(cmd) = extraction.command(command) else {
        ctx.print_warnings(&extraction.warnings);
        bail!(
            "could not find command '{command}' inside of playbook '{}'",
            playbook.resolved_file.display()
        );
    };
    ctx.status(&format!("show '{}'\n", cmd.full_script_name()));
    if !cmd.help_text.is_empty() {
        println!("{}\n", cmd.help_text);
    }
    println!("{}\n", cmd.raw_code_text);
    Ok(0)
}

/// Playbook and command name for `add`.
fn add_target(ctx: &Ctx, script: &str) -> Result<(String, String)> {
    match parse_script_reference(script, ctx.playbook.as_deref(), false)? {
        ScriptReference::PlaybookScript { file, command: Some(command) } => Ok((file, command)),
        ScriptReference::PlaybookScript { command: None, .. } => {
            bail!("no command name specified, usage: scripthaus add [playbook]::[command]")
        }
        ScriptReference::Stdin { .. } => bail!("playbook cannot be '-' (<stdin>) for 'add' command"),
        ScriptReference::LiteralPath(_) => {
            bail!("invalid playbook '{script}' specified (make sure it is a playbook '.md' file)")
        }
    }
}

fn read_stdin_text() -> Result<String> {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text).context("cannot read script text from <stdin>")?;
    if text.is_empty() {
        bail!("reading script text from <stdin>, but got empty string");
    }
    Ok(text)
}

/// Append a new command to a playbook.
fn cmd_add(ctx: &Ctx, file: &str, new_command: &NewCommand, dry_run: bool) -> Result<i32> {
    new_command.validate()?;
    let (playbook, source) = load_playbook(ctx, file)?;
    let extraction = extract_commands(&playbook, &source)?;
    if extraction.command(&new_command.name).is_some() {
        bail!(
            "command '{}' already exists in playbook '{}'",
            new_command.name,
            playbook.resolved_file.display()
        );
    }

    let block = new_command.render();
    ctx.status(&format!(
        "adding command '{}' to {}:",
        new_command.name,
        playbook.resolved_file.display()
    ));
    println!("{block}");
    if dry_run {
        ctx.status("not modifying file, --dry-run specified");
        return Ok(0);
    }
    append_to_playbook(&playbook.resolved_file, &block)?;
    Ok(0)
}

/// Show run history.
fn cmd_history(ctx: &Ctx, num: usize, all: bool, full: bool, json: bool) -> Result<i32> {
    let history = ctx.open_history()?;
    let entries = if all { history.entries() } else { history.recent(num) };

    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else if full {
        for entry in entries {
            println!("{}", entry.full_string());
        }
    } else {
        for entry in entries {
            println!("{}", entry.compact_string());
        }
    }
    Ok(0)
}

/// Handle history management commands.
fn cmd_manage(ctx: &Ctx, operation: ManageOperation) -> Result<i32> {
    match operation {
        ManageOperation::ClearHistory => {
            let mut history = ctx.open_history()?;
            let removed = history.clear();
            history.save()?;
            ctx.status(&format!("all {removed} history items removed"));
        }
        ManageOperation::RemoveHistoryRange { start, end } => {
            let mut history = ctx.open_history()?;
            let removed = history.remove_range(start, end)?;
            history.save()?;
            ctx.status(&format!("{removed} history items removed"));
        }
        ManageOperation::RenumberHistory => {
            let mut history = ctx.open_history()?;
            history.renumber();
            history.save()?;
            ctx.status("history items renumbered");
        }
        ManageOperation::DeleteHistory => {
            let path = ctx.history_path()?;
            if HistoryManager::delete_file(&path)? {
                ctx.status(&format!("history file '{}' deleted", path.display()));
            } else {
                ctx.status("no history file to delete");
            }
        }
    }
    Ok(0)
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "scripthaus", &mut io::stdout());
}

/// Show configuration.
fn cmd_config(ctx: &Ctx, show_path: bool) -> Result<i32> {
    if show_path {
        if let Some(path) = Config::locate().or_else(Config::global_path) {
            println!("{}", path.display());
        }
        return Ok(0);
    }

    let toml = toml::to_string_pretty(&ctx.config)?;
    println!("{toml}");
    Ok(0)
}
