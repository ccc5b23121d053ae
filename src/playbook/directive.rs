//! `@scripthaus` directive comments inside code fences.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Directive type that turns a fence into a command.
pub const COMMAND_DIRECTIVE: &str = "command";

static DIRECTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:#|//)\s*@scripthaus[ \t]+(\S+)(?:[ \t]+(.*))?$").unwrap());

/// A single `@scripthaus <type> <data>` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawDirective {
    pub directive_type: String,
    pub data: String,
    /// 1-indexed, relative to the scanned text
    pub line_no: usize,
}

/// Scan `text` for directive comments, in line order.
pub fn extract_directives(text: &str) -> Vec<RawDirective> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let caps = DIRECTIVE_RE.captures(line)?;
            Some(RawDirective {
                directive_type: caps[1].to_string(),
                data: caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
                line_no: idx + 1,
            })
        })
        .collect()
}

/// Name and short description from the first `command` directive.
///
/// `None` means the fence is not a ScriptHaus command.
pub fn command_directive(directives: &[RawDirective]) -> Option<(String, String)> {
    let directive = directives.iter().find(|d| d.directive_type == COMMAND_DIRECTIVE)?;
    let (name, rest) = match directive.data.split_once(' ') {
        Some((name, rest)) => (name, rest.trim()),
        None => (directive.data.as_str(), ""),
    };
    let short_text = rest.strip_prefix("- ").map(str::trim).unwrap_or_default();
    Some((name.to_string(), short_text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_hash_and_slash_comments() {
        let text = "# @scripthaus command build - compile it\necho hi\n  // @scripthaus cd :playbook\n";
        let directives = extract_directives(text);

        assert_eq!(directives.len(), 2);
        assert_eq!(directives[0].directive_type, "command");
        assert_eq!(directives[0].data, "build - compile it");
        assert_eq!(directives[0].line_no, 1);
        assert_eq!(directives[1].directive_type, "cd");
        assert_eq!(directives[1].data, ":playbook");
        assert_eq!(directives[1].line_no, 3);
    }

    #[test]
    fn test_directive_without_data() {
        let directives = extract_directives("#@scripthaus nolog\n");
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].directive_type, "nolog");
        assert_eq!(directives[0].data, "");
    }

    #[test]
    fn test_non_directive_lines_ignored() {
        let text = "echo '# @scripthaus command x'\n# @scripthausx command y\n# @scripthaus\n";
        assert!(extract_directives(text).is_empty());
    }

    #[test]
    fn test_command_directive_with_short_text() {
        let directives = extract_directives("# @scripthaus command foo - does a thing\n");
        assert_eq!(
            command_directive(&directives),
            Some(("foo".to_string(), "does a thing".to_string()))
        );
    }

    #[test]
    fn test_command_directive_without_dash() {
        let directives = extract_directives("# @scripthaus command foo bar\n");
        assert_eq!(command_directive(&directives), Some(("foo".to_string(), String::new())));
    }

    #[test]
    fn test_first_command_wins() {
        let directives =
            extract_directives("# @scripthaus require X\n# @scripthaus command a\n# @scripthaus command b\n");
        assert_eq!(command_directive(&directives).map(|(n, _)| n), Some("a".to_string()));
    }

    #[test]
    fn test_no_command_directive() {
        let directives = extract_directives("# @scripthaus require TOKEN\n");
        assert_eq!(command_directive(&directives), None);
    }
}
