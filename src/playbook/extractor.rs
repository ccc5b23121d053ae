//! Markdown command extraction.
//!
//! Walks the top-level blocks of a playbook and turns every fenced code
//! block carrying a `@scripthaus command` directive into a [`CommandDef`].
//! The prose since the last section break becomes the command's help text.
//!
//! Section breaks are thematic breaks (`---`) and headings of level 1-3. A
//! level 4 heading starts a new help region at the heading itself. Any
//! other block starts a help region when none is open.
//!
//! Malformed blocks never fail the whole parse; they are reported in
//! [`Extraction::warnings`] and skipped.

use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};

use super::command::{is_allowed_lang, CommandDef, ALLOWED_LANGS};
use super::directive::{command_directive, extract_directives};
use super::error::ExtractError;
use super::reference::is_valid_command_name;
use super::resolver::ResolvedPlaybook;

/// Commands found in one playbook, in document order.
#[derive(Debug, Clone, Default)]
pub struct Extraction<'a> {
    pub commands: Vec<CommandDef<'a>>,
    pub warnings: Vec<String>,
}

impl<'a> Extraction<'a> {
    /// Look up a command by name.
    pub fn command(&self, name: &str) -> Option<&CommandDef<'a>> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Take ownership of a command by name.
    pub fn into_command(self, name: &str) -> Option<CommandDef<'a>> {
        self.commands.into_iter().find(|c| c.name == name)
    }
}

/// Byte offsets of line starts, for offset/line conversions.
struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(idx, _)| idx + 1));
        Self { starts, len: text.len() }
    }

    /// 1-indexed line containing `offset`.
    fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }

    /// Start of the line containing `offset`.
    fn line_start(&self, offset: usize) -> usize {
        self.starts[self.line_of(offset) - 1]
    }

    /// End of 1-indexed `line_no`, excluding its newline; clamps to the text.
    fn line_end(&self, line_no: usize) -> usize {
        match self.starts.get(line_no) {
            Some(&next) => next - 1,
            None => self.len,
        }
    }
}

/// A top-level fenced code block.
struct Fence {
    info: String,
    range: Range<usize>,
    text: String,
    last_text_end: Option<usize>,
}

enum Block {
    Break,
    Anchor(usize),
    Fence(Fence),
    Other(usize),
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Flatten the event stream into top-level blocks.
fn top_level_blocks(source: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut fence: Option<Fence> = None;

    for (event, range) in Parser::new_ext(source, markdown_options()).into_offset_iter() {
        match event {
            Event::Start(tag) => {
                if depth == 0 {
                    match tag {
                        Tag::Heading { level, .. } => blocks.push(match level {
                            HeadingLevel::H1 | HeadingLevel::H2 | HeadingLevel::H3 => Block::Break,
                            HeadingLevel::H4 => Block::Anchor(range.start),
                            _ => Block::Other(range.start),
                        }),
                        Tag::CodeBlock(CodeBlockKind::Fenced(info)) if !info.trim().is_empty() => {
                            fence = Some(Fence {
                                info: info.trim().to_string(),
                                range: range.clone(),
                                text: String::new(),
                                last_text_end: None,
                            });
                        }
                        _ => blocks.push(Block::Other(range.start)),
                    }
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(done) = fence.take() {
                        blocks.push(Block::Fence(done));
                    }
                }
            }
            Event::Text(text) => {
                if let Some(current) = fence.as_mut() {
                    current.text.push_str(&text);
                    current.last_text_end = Some(range.end);
                }
            }
            Event::Rule if depth == 0 => blocks.push(Block::Break),
            _ if depth == 0 => blocks.push(Block::Other(range.start)),
            _ => {}
        }
    }
    blocks
}

/// Extract every command from `source`.
///
/// Fails only when `source` is not UTF-8.
pub fn extract_commands<'a>(
    playbook: &'a ResolvedPlaybook,
    source: &[u8],
) -> Result<Extraction<'a>, ExtractError> {
    let source = std::str::from_utf8(source).map_err(|err| ExtractError::InvalidUtf8 {
        name: playbook.canonical_name.clone(),
        offset: err.valid_up_to(),
    })?;
    let lines = LineIndex::new(source);
    let mut extraction = Extraction::default();
    let mut break_index: Option<usize> = None;

    for block in top_level_blocks(source) {
        let fence = match block {
            Block::Break => {
                break_index = None;
                continue;
            }
            Block::Anchor(start) => {
                break_index = Some(lines.line_start(start));
                continue;
            }
            Block::Other(start) => {
                if break_index.is_none() {
                    break_index = Some(lines.line_start(start));
                }
                continue;
            }
            Block::Fence(fence) => fence,
        };

        let fence_start = lines.line_start(fence.range.start);
        let line_no = lines.line_of(fence_start);
        let directives = extract_directives(&fence.text);

        let Some((name, short_text)) = command_directive(&directives) else {
            if !directives.is_empty() {
                extraction.warnings.push(format!(
                    "code block (line {line_no}) has scripthaus directives, but no 'command' directive (ignoring)"
                ));
            }
            break_index = None;
            continue;
        };

        let lang = fence.info.split_whitespace().next().unwrap_or_default().to_string();
        if !is_valid_command_name(&name) {
            extraction
                .warnings
                .push(format!("command '{name}' (line {line_no}) has an invalid name (skipping)"));
            continue;
        }
        if !is_allowed_lang(&lang) {
            extraction.warnings.push(format!(
                "command '{name}' (line {line_no}) has invalid language '{lang}', must be one of [{}] (skipping)",
                ALLOWED_LANGS.join(" ")
            ));
            continue;
        }
        if let Some(first_line) = extraction.command(&name).map(|c| c.start_line_no) {
            extraction.warnings.push(format!(
                "duplicate command '{name}' (line {line_no}), already defined on line {first_line} (ignoring)"
            ));
            break_index = None;
            continue;
        }

        let last_code_line = fence.last_text_end.map_or(line_no, |end| lines.line_of(end - 1));
        let raw_end = lines.line_end(last_code_line + 1).max(fence_start);

        let mut cmd = CommandDef::new(playbook, name, lang, fence.text);
        cmd.short_text = short_text;
        cmd.help_text = break_index
            .map(|start| source[start..fence_start].trim().to_string())
            .unwrap_or_default();
        cmd.raw_code_text = source[fence_start..raw_end].trim_end_matches('\r').to_string();
        cmd.start_index = fence_start;
        cmd.start_line_no = line_no;
        cmd.raw_directives = directives;
        tracing::debug!(command = %cmd.name, lang = %cmd.lang, line = line_no, "extracted command");
        extraction.commands.push(cmd);
        break_index = None;
    }

    for warning in &extraction.warnings {
        tracing::debug!(playbook = %playbook.canonical_name, "{warning}");
    }
    Ok(extraction)
}
