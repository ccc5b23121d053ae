//! Core functionality around the playbook engine.
//!
//! Configuration, playbook I/O, process execution and run history. The
//! resolver and extractor in [`crate::playbook`] never touch these.

mod add;
mod config;
mod executor;
mod history;
mod source;

pub use add::{append_to_playbook, NewCommand, MAX_SCRIPT_TEXT};
pub use config::{Config, GeneralConfig, HistoryConfig, ResolverConfig, LOCAL_CONFIG_FILE};
pub use executor::{
    build_command, build_script_command, check_required_env, load_env_file, parse_env_assignments,
    read_shebang, ExecutionResult, Executor, RunSpec, ScriptCommand,
};
pub use history::{HistoryEntry, HistoryManager, RunType};
pub use source::read_playbook;
