//! Worker-side document processing.
//!
//! A [`Processor`] turns one [`ConvertRequest`] into a [`ConvertReply`]. It
//! runs inside the worker (a child process via [`serve`], or a
//! [`ThreadWorker`](crate::worker::ThreadWorker)) and may block for as long
//! as the conversion takes.

mod asciidoctor;
mod headings;
mod includes;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

use crate::frontmatter::FrontmatterError;
use crate::worker::{ConvertReply, ConvertRequest, WorkerMessage};

pub use asciidoctor::AsciidoctorProcessor;
pub use headings::extract_headings;
pub use includes::scan_includes;

/// Errors raised while converting a single document.
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// The source document could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The processor executable could not be started.
    #[error("failed to run `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The processor ran but reported failure.
    #[error("`{command}` failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The processor produced something other than UTF-8.
    #[error("processor output is not valid UTF-8")]
    InvalidOutput(#[from] std::string::FromUtf8Error),

    /// The document's front matter could not be parsed.
    #[error(transparent)]
    Frontmatter(#[from] FrontmatterError),

    /// Any other conversion failure.
    #[error("{0}")]
    Other(String),
}

impl ProcessorError {
    /// Create an error from a plain message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Converts documents. Runs on the worker, never on the caller's task.
pub trait Processor: Send {
    /// Convert one document.
    fn convert(&self, request: &ConvertRequest) -> Result<ConvertReply, ProcessorError>;
}

impl<P: Processor + Sync + ?Sized> Processor for std::sync::Arc<P> {
    fn convert(&self, request: &ConvertRequest) -> Result<ConvertReply, ProcessorError> {
        (**self).convert(request)
    }
}

/// Run `processor` on a request and wrap the outcome as a worker message.
pub fn respond<P: Processor + ?Sized>(processor: &P, request: &ConvertRequest) -> WorkerMessage {
    match processor.convert(request) {
        Ok(reply) => {
            debug!(file = %request.file, "converted document");
            WorkerMessage::Result(reply)
        }
        Err(e) => {
            warn!(file = %request.file, error = %e, "failed to convert document");
            WorkerMessage::Error {
                message: e.to_string(),
            }
        }
    }
}

/// Serve the NDJSON worker protocol until `reader` reaches EOF.
///
/// Every non-blank request line gets exactly one reply line. Lines that are
/// not valid requests are answered with an error message.
///
/// Returns the number of requests answered.
pub fn serve<R, W, P>(reader: R, mut writer: W, processor: &P) -> io::Result<usize>
where
    R: BufRead,
    W: Write,
    P: Processor + ?Sized,
{
    let mut answered = 0;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let message = match serde_json::from_str::<ConvertRequest>(&line) {
            Ok(request) => respond(processor, &request),
            Err(e) => {
                warn!(error = %e, "received malformed request");
                WorkerMessage::Error {
                    message: format!("invalid request: {e}"),
                }
            }
        };

        serde_json::to_writer(&mut writer, &message)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        answered += 1;
    }

    Ok(answered)
}
