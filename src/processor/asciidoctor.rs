//! Conversion through the Asciidoctor command-line processor.

use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tracing::debug;

use super::headings::extract_headings;
use super::includes::scan_includes;
use super::{Processor, ProcessorError};
use crate::frontmatter::{self, ParsedFrontmatter};
use crate::worker::{AttributeValue, ConvertReply, ConvertRequest, InitOptions};

/// Executable used when none is configured.
const DEFAULT_COMMAND: &str = "asciidoctor";

/// Runs `asciidoctor` once per document.
///
/// The HTML comes from the processor; front matter, headings and includes
/// are recovered from the source and the produced markup.
#[derive(Debug, Clone)]
pub struct AsciidoctorProcessor {
    command: String,
    highlighter: Option<String>,
}

impl AsciidoctorProcessor {
    /// Create a processor from the worker's init options.
    ///
    /// The first configured highlighter becomes the `source-highlighter`
    /// attribute unless a request sets it explicitly.
    pub fn new(init: InitOptions) -> Self {
        Self {
            command: init
                .processor
                .unwrap_or_else(|| DEFAULT_COMMAND.to_string()),
            highlighter: init.highlighters.into_iter().next(),
        }
    }

    /// The executable this processor runs.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Command-line arguments for a request, excluding the input path.
    pub fn command_args(&self, request: &ConvertRequest) -> Vec<String> {
        let mut args: Vec<String> = ["-b", "html5", "-s", "-o", "-", "-a", "skip-front-matter"]
            .into_iter()
            .map(String::from)
            .collect();

        let options = request.options.as_ref();

        if let Some(safe) = options.and_then(|o| o.safe.as_ref()) {
            args.extend(["-S".to_string(), safe.clone()]);
        }
        if let Some(doctype) = options.and_then(|o| o.doctype.as_ref()) {
            args.extend(["-d".to_string(), doctype.clone()]);
        }
        if let Some(base_dir) = options.and_then(|o| o.base_dir.as_ref()) {
            args.extend(["-B".to_string(), base_dir.clone()]);
        }

        let sets_highlighter = options
            .map(|o| o.attributes.contains_key("source-highlighter"))
            .unwrap_or(false);
        if let (Some(highlighter), false) = (&self.highlighter, sets_highlighter) {
            args.extend(["-a".to_string(), format!("source-highlighter={highlighter}")]);
        }

        if let Some(options) = options {
            for (name, value) in &options.attributes {
                let attribute = match value {
                    AttributeValue::Flag(true) => name.clone(),
                    AttributeValue::Flag(false) => format!("{name}!"),
                    AttributeValue::Text(text) => format!("{name}={text}"),
                };
                args.extend(["-a".to_string(), attribute]);
            }
        }

        args
    }
}

impl Processor for AsciidoctorProcessor {
    fn convert(&self, request: &ConvertRequest) -> Result<ConvertReply, ProcessorError> {
        let path = Path::new(&request.file);
        let source = fs::read_to_string(path).map_err(|source| ProcessorError::ReadSource {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = frontmatter::parse(&source)?;

        let args = self.command_args(request);
        debug!(command = %self.command, ?args, file = %request.file, "running processor");

        let output = Command::new(&self.command)
            .args(&args)
            .arg(path)
            .output()
            .map_err(|source| ProcessorError::Launch {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProcessorError::Failed {
                command: self.command.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let html = String::from_utf8(output.stdout)?;
        Ok(build_reply(path, &source, parsed, html))
    }
}

/// Assemble the reply from the rendered HTML and the parsed source.
fn build_reply(path: &Path, source: &str, parsed: ParsedFrontmatter, html: String) -> ConvertReply {
    let headings = extract_headings(&html);
    let mut frontmatter = parsed.frontmatter;

    if !frontmatter::has_title(&frontmatter) {
        let title = headings
            .iter()
            .find(|h| h.depth == 1)
            .map(|h| h.text.clone())
            .or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_default();
        frontmatter.insert("title".to_string(), Value::String(title));
    }

    let layout = frontmatter
        .get("layout")
        .and_then(Value::as_str)
        .filter(|layout| !layout.is_empty())
        .map(str::to_string);

    ConvertReply {
        html,
        frontmatter,
        headings,
        layout,
        includes: scan_includes(path, source),
    }
}
