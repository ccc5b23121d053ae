//! Playbook resolution and command extraction.
//!
//! A playbook is a Markdown file whose fenced code blocks carry
//! `@scripthaus` directives. [`NameResolver`] turns a short name into a
//! file, [`extract_commands`] turns the file into [`CommandDef`]s.

mod command;
mod directive;
mod environment;
mod error;
mod extractor;
mod probe;
mod reference;
mod resolver;

pub use command::{is_allowed_lang, CommandDef, ALLOWED_LANGS};
pub use directive::{command_directive, extract_directives, RawDirective, COMMAND_DIRECTIVE};
pub use environment::{
    scripthaus_home, Environment, FixedEnvironment, ProcessEnvironment, HOME_VAR, SC_HOME_DIR_NAME,
    SC_HOME_VAR,
};
pub use error::{ExtractError, ResolveError, ResolveResult};
pub use extractor::{extract_commands, Extraction};
pub use probe::{EntryKind, FixtureProbe, FsProbe, StatProbe};
pub use reference::{is_valid_command_name, parse_script_reference, split_script_name, ScriptReference};
pub use resolver::{NameResolver, ResolvedPlaybook, DEFAULT_PLAYBOOK_FILE, STDIN_PLAYBOOK};
