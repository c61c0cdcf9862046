use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};

/// Opening delimiter of a front-matter block.
pub const FRONT_MATTER_START: &str = "---\n";
/// Closing delimiter of a front-matter block.
pub const FRONT_MATTER_END: &str = "\n---";
/// Separator between a rewritten block and the note body.
pub const BODY_SEPARATOR: &str = "\n\n";

static FRONT_MATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A---\r?\n(?s:(.*?))\r?\n---[ \t]*(?:\r?\n|\z)").expect("front-matter pattern")
});

#[derive(Debug, thiserror::Error)]
pub enum FrontMatterError {
    #[error("invalid YAML in front-matter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("front-matter is not a key-value mapping")]
    NotAMapping,
}

/// A front-matter block located at the top of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    /// YAML text between the delimiters
    pub yaml: &'a str,
    /// Everything after the closing delimiter
    pub body: &'a str,
}

/// Locate the front-matter block, if the note starts with one.
pub fn split(content: &str) -> Option<Block<'_>> {
    let caps = FRONT_MATTER_RE.captures(content)?;
    let whole = caps.get(0)?;
    let yaml = caps.get(1).map_or("", |m| m.as_str());
    Some(Block {
        yaml,
        body: &content[whole.end()..],
    })
}

/// Parse block YAML into a mapping. A blank or comment-only block is empty.
pub fn parse_mapping(yaml: &str) -> Result<Mapping, FrontMatterError> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(FrontMatterError::NotAMapping),
    }
}

/// Render a note from a mapping and a body.
///
/// The body loses its leading whitespace and is separated from the block by
/// one blank line.
pub fn render(mapping: &Mapping, body: &str) -> Result<String, FrontMatterError> {
    let yaml = serde_yaml::to_string(mapping)?;
    let mut out = String::with_capacity(yaml.len() + body.len() + 16);
    out.push_str(FRONT_MATTER_START);
    out.push_str(yaml.trim());
    out.push_str(FRONT_MATTER_END);
    out.push_str(BODY_SEPARATOR);
    out.push_str(body.trim_start());
    Ok(out)
}

/// Remove the front-matter block. The remaining content is trimmed.
pub fn strip(content: &str) -> String {
    match split(content) {
        Some(block) => block.body.trim().to_string(),
        None => content.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn split_finds_block_and_body() {
        let content = "---\nnoteID: abc\ncustom-width: 80\n---\n# Title\n\nBody\n";
        let block = split(content).unwrap();
        assert_eq!(block.yaml, "noteID: abc\ncustom-width: 80");
        assert_eq!(block.body, "# Title\n\nBody\n");
    }

    #[test]
    fn split_handles_crlf_and_eof_delimiter() {
        let block = split("---\r\nkey: 1\r\n---\r\nbody").unwrap();
        assert_eq!(block.yaml, "key: 1");
        assert_eq!(block.body, "body");

        let block = split("---\nkey: 1\n---").unwrap();
        assert_eq!(block.body, "");
    }

    #[test]
    fn split_requires_block_at_start() {
        assert!(split("# Title\n---\nkey: 1\n---\n").is_none());
        assert!(split("no front-matter").is_none());
        assert!(split("---\nunterminated: true\n").is_none());
    }

    #[test]
    fn split_ignores_longer_rules() {
        // A horizontal rule of four dashes does not close the block
        assert!(split("---\nkey: 1\n----\n").is_none());
    }

    #[test]
    fn parse_mapping_blank_and_comment_only() {
        assert!(parse_mapping("").unwrap().is_empty());
        assert!(parse_mapping("# just a comment").unwrap().is_empty());
    }

    #[test]
    fn parse_mapping_rejects_sequences_and_bad_yaml() {
        assert!(matches!(
            parse_mapping("- a\n- b"),
            Err(FrontMatterError::NotAMapping)
        ));
        assert!(matches!(
            parse_mapping("key: [unclosed"),
            Err(FrontMatterError::Yaml(_))
        ));
    }

    #[test]
    fn render_places_blank_line_before_body() {
        let mut map = Mapping::new();
        map.insert(Value::String("noteID".into()), Value::String("u1".into()));
        let out = render(&map, "\n\n# Title\n").unwrap();
        assert_eq!(out, "---\nnoteID: u1\n---\n\n# Title\n");
    }

    #[test]
    fn strip_removes_block_and_trims() {
        assert_eq!(strip("---\nnoteID: u1\n---\n\n# Title\n"), "# Title");
        assert_eq!(strip("  plain  \n"), "plain");
    }
}
