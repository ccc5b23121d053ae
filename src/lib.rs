#![allow(clippy::format_push_string)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::case_sensitive_file_extension_comparisons)]

//! # ScriptHaus
//!
//! Run the shell, Python and Node snippets stored in your Markdown files.
//!
//! Commands live in fenced code blocks of a Markdown "playbook", tagged with
//! a directive comment:
//!
//! ````markdown
//! Build the release binary.
//!
//! ```bash
//! # @scripthaus command build - release build
//! cargo build --release
//! ```
//! ````
//!
//! and are invoked by a short name that encodes where the playbook lives:
//!
//! ```bash
//! scripthaus run build          # scripthaus.md in the nearest project root
//! scripthaus run ^deploy        # the global playbook in $SCRIPTHAUS_HOME
//! scripthaus run .ops.md::up    # ops.md in the project root
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::redundant_else)]
#![allow(clippy::if_not_else)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unnecessary_debug_formatting)]

pub mod core;
pub mod playbook;

// Re-export commonly used types
pub use crate::core::Config;
pub use playbook::{extract_commands, CommandDef, NameResolver, ResolvedPlaybook};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "scripthaus";
