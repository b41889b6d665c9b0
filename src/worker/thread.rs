//! Worker running a [`Processor`] on a dedicated OS thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc as std_mpsc;
use std::thread;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::error::{ConverterError, ConverterResult};
use super::protocol::{ConvertRequest, WorkerMessage};
use super::transport::{WorkerEvent, WorkerTransport};
use crate::processor::{respond, Processor};

/// Exit code reported when the worker thread cannot be joined cleanly.
const PANIC_EXIT_CODE: i32 = 101;

/// A conversion worker on its own thread.
///
/// The thread shares nothing with the client: requests travel over a
/// channel, replies come back as [`WorkerEvent`]s. A processor panic fails
/// only the request that caused it.
pub struct ThreadWorker {
    /// Request channel; `None` once terminated.
    requests: Option<std_mpsc::Sender<ConvertRequest>>,

    /// Replies and the final exit event.
    events: mpsc::UnboundedReceiver<WorkerEvent>,

    /// Join handle, taken on terminate.
    handle: Option<thread::JoinHandle<i32>>,

    /// Exit code after the thread was joined.
    exit_code: Option<i32>,
}

impl ThreadWorker {
    /// Start a worker thread that owns `processor`.
    pub fn spawn<P: Processor + 'static>(processor: P) -> ConverterResult<Self> {
        let (requests_tx, requests_rx) = std_mpsc::channel::<ConvertRequest>();
        let (events_tx, events) = mpsc::unbounded_channel();

        let handle = thread::Builder::new()
            .name("adoc-worker".to_string())
            .spawn(move || {
                for request in requests_rx {
                    let outcome =
                        panic::catch_unwind(AssertUnwindSafe(|| respond(&processor, &request)));
                    let event = match outcome {
                        Ok(WorkerMessage::Result(reply)) => WorkerEvent::Reply(reply),
                        Ok(WorkerMessage::Error { message }) => {
                            WorkerEvent::Error(ConverterError::Conversion(message))
                        }
                        Err(payload) => {
                            let message = panic_message(payload.as_ref());
                            error!(file = %request.file, %message, "processor panicked");
                            WorkerEvent::Error(ConverterError::Conversion(format!(
                                "processor panicked: {message}"
                            )))
                        }
                    };
                    if events_tx.send(event).is_err() {
                        break;
                    }
                }

                let _ = events_tx.send(WorkerEvent::Exit(Some(0)));
                0
            })
            .map_err(ConverterError::SpawnFailed)?;

        debug!("spawned conversion worker thread");

        Ok(Self {
            requests: Some(requests_tx),
            events,
            handle: Some(handle),
            exit_code: None,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[async_trait]
impl WorkerTransport for ThreadWorker {
    async fn send(&mut self, request: ConvertRequest) -> ConverterResult<()> {
        let requests = self.requests.as_ref().ok_or(ConverterError::Terminated)?;
        requests
            .send(request)
            .map_err(|_| ConverterError::WorkerExited { code: self.exit_code })
    }

    async fn next_event(&mut self) -> Option<WorkerEvent> {
        self.events.recv().await
    }

    /// Closes the request channel and joins the thread.
    ///
    /// A conversion already running is allowed to finish first.
    async fn terminate(&mut self) -> ConverterResult<Option<i32>> {
        self.requests.take();

        let Some(handle) = self.handle.take() else {
            return Ok(self.exit_code);
        };

        let code = tokio::task::spawn_blocking(move || handle.join())
            .await
            .map_err(|e| ConverterError::SpawnFailed(std::io::Error::other(e)))?
            .unwrap_or(PANIC_EXIT_CODE);

        self.exit_code = Some(code);
        Ok(self.exit_code)
    }
}
