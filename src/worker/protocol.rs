//! Message types exchanged between the conversion client and its worker.
//!
//! The wire format is NDJSON: one [`ConvertRequest`] per line towards the
//! worker, one [`WorkerMessage`] per line back. Messages carry no request
//! identifier; the client never has more than one request outstanding, so
//! the next reply always belongs to the request in flight.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Requests
// ============================================================================

/// A request to convert one AsciiDoc document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertRequest {
    /// Path (or module id) of the source document.
    pub file: String,
    /// Processor options applied to this conversion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ProcessorOptions>,
}

impl ConvertRequest {
    /// Create a request without processor options.
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            options: None,
        }
    }

    /// Attach processor options.
    pub fn with_options(mut self, options: ProcessorOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Options recognized by the document processor.
///
/// Unknown keys are preserved in `extra` and forwarded untouched, so newer
/// processor options can be passed without changing this type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorOptions {
    /// Document attributes (`-a name=value`).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeValue>,

    /// Safe mode: `unsafe`, `safe`, `server` or `secure`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe: Option<String>,

    /// Document type, e.g. `article` or `book`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctype: Option<String>,

    /// Base directory for resolving includes and images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,

    /// Unrecognized options.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Value of a document attribute.
///
/// `true` sets the attribute with an empty value, `false` unsets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Text(String),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// Options fixed for the whole lifetime of a worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitOptions {
    /// Source highlighters, in order of preference.
    pub highlighters: Vec<String>,

    /// Processor executable to run (defaults to `asciidoctor` on PATH).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
}

// ============================================================================
// Replies
// ============================================================================

/// The converted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertReply {
    /// Rendered HTML body.
    pub html: String,
    /// Front matter; always contains `title`.
    pub frontmatter: Map<String, Value>,
    /// Section headings in document order.
    #[serde(default)]
    pub headings: Vec<Heading>,
    /// Layout module referenced by the document, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    /// Files pulled in through `include::` directives, in discovery order.
    #[serde(default)]
    pub includes: Vec<String>,
}

impl ConvertReply {
    /// The document title from the front matter.
    pub fn title(&self) -> Option<&str> {
        self.frontmatter.get("title").and_then(Value::as_str)
    }
}

/// A section heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading level, 1 through 6.
    pub depth: u8,
    /// Anchor id.
    pub slug: String,
    /// Plain heading text.
    pub text: String,
}

/// One line sent back by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Successful conversion.
    Result(ConvertReply),
    /// The conversion failed.
    Error { message: String },
}
