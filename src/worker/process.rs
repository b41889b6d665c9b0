//! Worker running as a child process, speaking NDJSON over stdin/stdout.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::{ConverterError, ConverterResult};
use super::protocol::{ConvertRequest, InitOptions, WorkerMessage};
use super::transport::{WorkerEvent, WorkerTransport};

/// Flag used to hand [`InitOptions`] to the worker executable.
pub const INIT_FLAG: &str = "--init";

/// A conversion worker in a child process.
///
/// Requests are written as single JSON lines to the child's stdin; each reply
/// line on stdout becomes a [`WorkerEvent`]. The child's stderr is inherited
/// so its logs end up next to ours.
pub struct ProcessWorker {
    /// Writer for sending requests; `None` once terminated.
    stdin: Option<BufWriter<ChildStdin>>,

    /// Events from the reader and exit watcher tasks.
    events: mpsc::UnboundedReceiver<WorkerEvent>,

    /// Asks the exit watcher to kill the child.
    kill: Option<oneshot::Sender<()>>,

    /// Exit code once the child has been reaped.
    exit: watch::Receiver<Option<Option<i32>>>,

    /// Handle to the background reader task.
    _reader_task: JoinHandle<()>,

    /// Handle to the task that owns the child process.
    _exit_task: JoinHandle<()>,
}

impl ProcessWorker {
    /// Spawn the worker executable.
    ///
    /// # Arguments
    ///
    /// * `worker_path` - Path to the worker executable.
    /// * `args` - Leading arguments, e.g. the `worker` subcommand.
    /// * `init` - Serialized and passed after [`INIT_FLAG`].
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    pub async fn spawn<P: AsRef<Path>>(
        worker_path: P,
        args: &[String],
        init: &InitOptions,
    ) -> ConverterResult<Self> {
        let init = serde_json::to_string(init).map_err(ConverterError::SerializeFailed)?;

        let mut child = Command::new(worker_path.as_ref())
            .args(args)
            .arg(INIT_FLAG)
            .arg(init)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(ConverterError::SpawnFailed)?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;

        debug!(
            worker = %worker_path.as_ref().display(),
            pid = ?child.id(),
            "spawned conversion worker process"
        );

        let (events_tx, events) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel();
        let (exit_tx, exit) = watch::channel(None);

        let reader_task = Self::spawn_reader_task(stdout, events_tx.clone());
        let exit_task = Self::spawn_exit_task(child, kill_rx, exit_tx, events_tx);

        Ok(Self {
            stdin: Some(BufWriter::new(stdin)),
            events,
            kill: Some(kill_tx),
            exit,
            _reader_task: reader_task,
            _exit_task: exit_task,
        })
    }

    /// Spawn the background task that reads replies from the worker.
    fn spawn_reader_task(
        stdout: ChildStdout,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let event = match serde_json::from_str::<WorkerMessage>(&line) {
                            Ok(WorkerMessage::Result(reply)) => WorkerEvent::Reply(reply),
                            Ok(WorkerMessage::Error { message }) => {
                                WorkerEvent::Error(ConverterError::Conversion(message))
                            }
                            Err(e) => WorkerEvent::Error(ConverterError::DeserializeFailed(e)),
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = events.send(WorkerEvent::Error(ConverterError::ReadFailed(e)));
                        break;
                    }
                }
            }
        })
    }

    /// Spawn the task that owns the child and reports its exit.
    ///
    /// The child is killed when asked to, or when the kill handle is dropped.
    fn spawn_exit_task(
        mut child: Child,
        kill: oneshot::Receiver<()>,
        exit: watch::Sender<Option<Option<i32>>>,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill => {
                    if let Err(e) = child.start_kill() {
                        debug!(error = %e, "worker process already gone");
                    }
                    child.wait().await
                }
            };

            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(error = %e, "failed to wait for worker process");
                    None
                }
            };

            exit.send_replace(Some(code));
            let _ = events.send(WorkerEvent::Exit(code));
        })
    }
}

fn missing_pipe(name: &str) -> ConverterError {
    ConverterError::SpawnFailed(std::io::Error::other(format!("{name} not captured")))
}

#[async_trait]
impl WorkerTransport for ProcessWorker {
    async fn send(&mut self, request: ConvertRequest) -> ConverterResult<()> {
        let stdin = self.stdin.as_mut().ok_or(ConverterError::Terminated)?;

        let line = serde_json::to_string(&request).map_err(ConverterError::SerializeFailed)? + "\n";
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(ConverterError::WriteFailed)?;
        stdin.flush().await.map_err(ConverterError::WriteFailed)
    }

    async fn next_event(&mut self) -> Option<WorkerEvent> {
        self.events.recv().await
    }

    async fn terminate(&mut self) -> ConverterResult<Option<i32>> {
        self.stdin.take();
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }

        match self.exit.wait_for(Option::is_some).await {
            Ok(code) => Ok((*code).flatten()),
            Err(_) => Ok(None),
        }
    }
}
