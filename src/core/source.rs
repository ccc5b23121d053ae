//! Reading playbook bytes.

use std::io::Read;

use anyhow::Context;

use crate::playbook::ResolvedPlaybook;

/// Contents of a resolved playbook, from its file or from stdin.
pub fn read_playbook(playbook: &ResolvedPlaybook) -> anyhow::Result<Vec<u8>> {
    if playbook.is_stdin() {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("cannot read playbook from <stdin>")?;
        return Ok(buf);
    }
    std::fs::read(&playbook.resolved_file).with_context(|| {
        format!(
            "cannot read playbook '{}' ({})",
            playbook.orig_name,
            playbook.resolved_file.display()
        )
    })
}
