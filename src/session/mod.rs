//! A build or dev-server session converting AsciiDoc content.
//!
//! The host pipeline owns one [`Session`] for its whole run. The session owns
//! the conversion client and the include graph, and tears the worker down at
//! the end of the run.

mod include_graph;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::Settings;
use crate::frontmatter::{self, FrontmatterError};
use crate::worker::{AsciidocConverter, ConvertReply, ConvertRequest, ConverterError, ProcessorOptions};

pub use include_graph::IncludeGraph;

/// File extension handled by the session.
pub const ASCIIDOC_EXTENSION: &str = ".adoc";

/// Error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Converter(#[from] ConverterError),

    #[error(transparent)]
    Frontmatter(#[from] FrontmatterError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// How the host is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// One-shot build.
    Build,
    /// Dev server; include edges are tracked for reloads.
    Dev,
}

/// A content-collection entry built from a document's front matter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentEntry {
    pub data: Map<String, Value>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<String>,
}

impl ContentEntry {
    /// Build an entry from raw document contents. No conversion is involved.
    pub fn parse(contents: &str) -> SessionResult<Self> {
        let parsed = frontmatter::parse(contents)?;
        let slug = parsed
            .frontmatter
            .get("slug")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            data: parsed.frontmatter,
            body: parsed.body,
            slug,
            raw_data: parsed.raw_frontmatter,
        })
    }
}

/// Conversion session.
pub struct Session {
    converter: AsciidocConverter,
    options: Option<ProcessorOptions>,
    mode: SessionMode,
    includes: RwLock<IncludeGraph>,
}

impl Session {
    /// Create a session around an existing converter.
    pub fn new(
        converter: AsciidocConverter,
        options: Option<ProcessorOptions>,
        mode: SessionMode,
    ) -> Self {
        Self {
            converter,
            options,
            mode,
            includes: RwLock::new(IncludeGraph::new()),
        }
    }

    /// Spawn the configured worker and start a session.
    pub async fn from_settings(settings: &Settings, mode: SessionMode) -> SessionResult<Self> {
        let converter = AsciidocConverter::spawn_with_settings(settings).await?;
        Ok(Self::new(converter, Some(settings.processor.clone()), mode))
    }

    /// Whether the session handles this module id.
    pub fn handles(id: &str) -> bool {
        id.ends_with(ASCIIDOC_EXTENSION)
    }

    /// Convert the document behind `id`.
    ///
    /// Returns `Ok(None)` for ids that are not AsciiDoc documents. The
    /// reply's `includes` are the files the host should watch.
    pub async fn transform(&self, id: &str) -> SessionResult<Option<ConvertReply>> {
        if !Self::handles(id) {
            return Ok(None);
        }

        let request = ConvertRequest {
            file: id.to_string(),
            options: self.options.clone(),
        };

        info!(file = %id, "transform start");
        let document = self.converter.convert(request).await?;
        info!(file = %id, includes = document.includes.len(), "transform done");

        if self.mode == SessionMode::Dev {
            let mut graph = self.includes.write().await;
            graph.forget(id);
            graph.register(id, &document.includes);
        }

        Ok(Some(document))
    }

    /// Content-collection entry for a document's raw contents.
    pub fn entry_info(&self, contents: &str) -> SessionResult<ContentEntry> {
        ContentEntry::parse(contents)
    }

    /// Documents to reconvert after `path` changed.
    pub async fn on_change(&self, path: &str) -> Vec<String> {
        self.includes.read().await.dependents(path)
    }

    /// Snapshot of the include graph.
    pub async fn include_graph(&self) -> IncludeGraph {
        self.includes.read().await.clone()
    }

    /// The conversion client, e.g. to subscribe to worker exit.
    pub fn converter(&self) -> &AsciidocConverter {
        &self.converter
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// End of a dev-server run.
    pub async fn server_done(&self) -> SessionResult<()> {
        self.finish().await
    }

    /// End of a build.
    pub async fn build_done(&self) -> SessionResult<()> {
        self.finish().await
    }

    async fn finish(&self) -> SessionResult<()> {
        info!(mode = ?self.mode, "session finished, terminating worker");
        self.converter.terminate().await?;
        Ok(())
    }
}
