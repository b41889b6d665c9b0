//! Front matter extraction for AsciiDoc sources.
//!
//! A document may start with a YAML block between `---` lines. After it, the
//! AsciiDoc header contributes too: a `= Title` line sets `title` when the
//! YAML did not, and `:name: value` attribute lines become string entries.
//!
//! ```text
//! ---
//! description: Release notes
//! tags: [release]
//! ---
//! = Version 2.0
//! :slug: v2
//!
//! Body text...
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

static TITLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^=\s+(.*)$").expect("valid regex"));

static ATTRIBUTE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:([^:]+):\s*(.*)$").expect("valid regex"));

/// Error type for front matter parsing.
#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("invalid YAML front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("front matter must be a mapping")]
    NotAMapping,
}

/// Result of splitting a document into front matter and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFrontmatter {
    /// YAML entries merged with the header title and attributes.
    pub frontmatter: Map<String, Value>,
    /// The document without its YAML block.
    pub body: String,
    /// Raw YAML plus raw attribute lines, if there were any.
    pub raw_frontmatter: Option<String>,
}

/// Parse the front matter of an AsciiDoc document.
pub fn parse(contents: &str) -> Result<ParsedFrontmatter, FrontmatterError> {
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);

    let (mut frontmatter, raw_yaml, body) = match split_yaml(contents) {
        Some((raw, body)) => (parse_yaml(raw)?, Some(raw), body),
        None => (Map::new(), None, contents),
    };

    let lines: Vec<&str> = body.lines().collect();
    let mut index = skip_blank(&lines, 0);

    if let Some(caps) = lines.get(index).and_then(|line| TITLE_LINE.captures(line)) {
        let title = caps[1].trim();
        if !title.is_empty() && !has_title(&frontmatter) {
            frontmatter.insert("title".to_string(), Value::String(title.to_string()));
        }
        index = skip_blank(&lines, index + 1);
    }

    let mut attribute_lines = Vec::new();
    while let Some(line) = lines.get(index) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            index += 1;
            continue;
        }
        let Some(caps) = ATTRIBUTE_LINE.captures(trimmed) else {
            break;
        };
        frontmatter.insert(
            caps[1].trim().to_string(),
            Value::String(caps[2].trim().to_string()),
        );
        attribute_lines.push(*line);
        index += 1;
    }

    let mut raw_parts = Vec::new();
    if let Some(raw) = raw_yaml {
        raw_parts.push(raw.to_string());
    }
    if !attribute_lines.is_empty() {
        raw_parts.push(attribute_lines.join("\n"));
    }
    let raw = raw_parts.join("\n");
    let raw = raw.trim();

    Ok(ParsedFrontmatter {
        frontmatter,
        body: body.to_string(),
        raw_frontmatter: (!raw.is_empty()).then(|| raw.to_string()),
    })
}

/// Whether the mapping has a usable `title`.
pub fn has_title(frontmatter: &Map<String, Value>) -> bool {
    match frontmatter.get("title") {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Split off a leading `---` YAML block. Returns the raw YAML and the rest.
fn split_yaml(contents: &str) -> Option<(&str, &str)> {
    let mut lines = contents.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }

    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == "---" {
            let raw = contents[start..offset].trim_end_matches(['\r', '\n']);
            return Some((raw, &contents[offset + line.len()..]));
        }
        offset += line.len();
    }

    None
}

fn parse_yaml(raw: &str) -> Result<Map<String, Value>, FrontmatterError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_yaml::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(FrontmatterError::NotAMapping),
    }
}

fn skip_blank(lines: &[&str], mut index: usize) -> usize {
    while lines.get(index).is_some_and(|line| line.trim().is_empty()) {
        index += 1;
    }
    index
}
