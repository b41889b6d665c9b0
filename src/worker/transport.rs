//! The worker side of the conversion channel, as seen by the client.

use async_trait::async_trait;

use super::error::{ConverterError, ConverterResult};
use super::protocol::{ConvertReply, ConvertRequest};

/// Something the worker sent back, or a change in its lifecycle.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Successful reply to the outstanding request.
    Reply(ConvertReply),
    /// The outstanding request failed, or the channel reported an error.
    Error(ConverterError),
    /// The execution unit terminated.
    Exit(Option<i32>),
}

/// Lifecycle notification broadcast when the worker terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitEvent {
    /// Exit code, if the platform reported one.
    pub code: Option<i32>,
}

/// A worker that converts one request at a time.
///
/// Implementations must emit exactly one `Reply` or `Error` per request and
/// never emit unsolicited replies. `next_event` is polled inside
/// `tokio::select!` and must be cancel safe.
#[async_trait]
pub trait WorkerTransport: Send + 'static {
    /// Hand a request to the worker.
    async fn send(&mut self, request: ConvertRequest) -> ConverterResult<()>;

    /// Wait for the next event. `None` means the channel is closed.
    async fn next_event(&mut self) -> Option<WorkerEvent>;

    /// Release the worker's execution resources.
    ///
    /// Calling this more than once is allowed and returns the same exit code.
    async fn terminate(&mut self) -> ConverterResult<Option<i32>>;
}

