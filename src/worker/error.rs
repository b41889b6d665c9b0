//! Conversion client error types.

use std::io;
use thiserror::Error;

/// Result type for conversion client operations.
pub type ConverterResult<T> = Result<T, ConverterError>;

/// Errors that can occur while converting through the worker.
#[derive(Error, Debug)]
pub enum ConverterError {
    /// Failed to spawn the worker process or thread.
    #[error("failed to spawn conversion worker: {0}")]
    SpawnFailed(#[source] io::Error),

    /// Failed to write a request to the worker.
    #[error("failed to write to worker: {0}")]
    WriteFailed(#[source] io::Error),

    /// Failed to read a reply from the worker.
    #[error("failed to read from worker: {0}")]
    ReadFailed(#[source] io::Error),

    /// Failed to serialize a request to JSON.
    #[error("failed to serialize request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// Failed to deserialize a reply from JSON.
    #[error("failed to deserialize reply: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// The worker could not convert the requested document.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// The worker's execution unit exited.
    #[error("conversion worker exited (code: {})", display_code(.code))]
    WorkerExited {
        /// Exit code, if the platform reported one.
        code: Option<i32>,
    },

    /// The client was terminated before the call settled.
    #[error("conversion client was terminated")]
    Terminated,

    /// Reply channel was dropped without settling (internal error).
    #[error("reply channel closed unexpectedly")]
    ChannelClosed,
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

impl ConverterError {
    /// Create a conversion error from a worker-reported message.
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion(message.into())
    }

    /// Check if this error indicates the worker is gone.
    pub fn is_worker_exited(&self) -> bool {
        matches!(
            self,
            Self::WorkerExited { .. } | Self::Terminated | Self::ChannelClosed
        )
    }

    /// Check if this error is a transport-level failure on the worker channel.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::WriteFailed(_)
                | Self::ReadFailed(_)
                | Self::SerializeFailed(_)
                | Self::DeserializeFailed(_)
        )
    }

    /// Check if this error was reported by the worker for a single document.
    pub fn is_conversion(&self) -> bool {
        matches!(self, Self::Conversion(_))
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for ConverterError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::ChannelClosed
    }
}
