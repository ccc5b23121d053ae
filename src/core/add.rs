//! Appending new commands to a playbook.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context};

use crate::playbook::{is_allowed_lang, is_valid_command_name, ALLOWED_LANGS};

/// Largest script text `add` accepts.
pub const MAX_SCRIPT_TEXT: usize = 5000;

/// A command to append.
#[derive(Debug, Clone)]
pub struct NewCommand {
    pub name: String,
    pub lang: String,
    /// Optional prose placed above the fence
    pub message: Option<String>,
    pub script_text: String,
}

impl NewCommand {
    /// Check the name, language and text before anything is written.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_valid_command_name(&self.name) {
            bail!("invalid characters in playbook command name '{}'", self.name);
        }
        if self.lang.is_empty() {
            bail!("must specify a script type using '-t'");
        }
        if !is_allowed_lang(&self.lang) {
            bail!(
                "must specify a valid script type ('{}' is not valid), must be one of: {}",
                self.lang,
                ALLOWED_LANGS.join(", ")
            );
        }
        if self.script_text.trim().is_empty() {
            bail!("no script text passed to 'add' command, use '-c [script-text]', '--' for rest of arguments, or '-' for stdin");
        }
        if self.script_text.len() > MAX_SCRIPT_TEXT {
            bail!("script text too long, max size for add is 5k (edit the file manually if this was not a mistake)");
        }
        if self.script_text.contains("```") {
            bail!("script text cannot contain the markdown code fence characters \"```\", this block must be added to the .md file manually");
        }
        Ok(())
    }

    /// The Markdown appended to the playbook.
    pub fn render(&self) -> String {
        let comment = if self.lang == "js" || self.lang == "node" { "//" } else { "#" };
        let mut block = String::from("\n");
        if let Some(message) = self.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            block.push_str(message);
            block.push_str("\n\n");
        }
        block.push_str(&format!("```{}\n{comment} @scripthaus command {}\n", self.lang, self.name));
        block.push_str(self.script_text.trim_end_matches('\n'));
        block.push_str("\n```\n");
        block
    }
}

/// Append `block` to the playbook at `path`.
pub fn append_to_playbook(path: &Path, block: &str) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open playbook '{}' for append", path.display()))?;
    file.write_all(block.as_bytes())
        .with_context(|| format!("cannot write to playbook '{}'", path.display()))?;
    Ok(())
}
