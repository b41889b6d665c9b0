//! Queue-backed async client for the conversion worker.

use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{ConverterError, ConverterResult};
use super::process::ProcessWorker;
use super::protocol::{ConvertReply, ConvertRequest, InitOptions};
use super::thread::ThreadWorker;
use super::transport::{ExitEvent, WorkerEvent, WorkerTransport};
use crate::config::{expand_env_vars, Settings, WorkerMode};
use crate::processor::{AsciidoctorProcessor, Processor};

/// Number of exit notifications buffered for slow subscribers.
const EXIT_CHANNEL_CAPACITY: usize = 4;

/// Async client for the AsciiDoc conversion worker.
///
/// Callers may invoke [`convert`](Self::convert) concurrently; requests are
/// queued and handed to the worker strictly one at a time, in submission
/// order. The reply channel carries no correlation id, so a reply always
/// settles the single request in flight.
///
/// # Example
///
/// ```ignore
/// use adoc_content::worker::{AsciidocConverter, ConvertRequest, InitOptions};
///
/// let args = vec!["worker".to_string()];
/// let converter = AsciidocConverter::spawn_process("adoc-content", &args, &InitOptions::default()).await?;
/// let doc = converter.convert(ConvertRequest::new("src/blog/post.adoc")).await?;
/// converter.terminate().await?;
/// ```
pub struct AsciidocConverter {
    /// Commands for the dispatcher task.
    commands: mpsc::UnboundedSender<Command>,

    /// Exit notifications for subscribers.
    exits: broadcast::Sender<ExitEvent>,

    /// Latest exit state; `None` while the worker runs.
    status: watch::Receiver<Option<ExitEvent>>,

    /// Handle to the dispatcher task.
    dispatcher: JoinHandle<()>,
}

/// Snapshot of the client's queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Calls waiting to be dispatched.
    pub queued: usize,
    /// Whether a call is dispatched but not yet settled.
    pub in_flight: bool,
    /// Calls resolved with a reply.
    pub completed: u64,
    /// Calls rejected with an error.
    pub failed: u64,
}

impl AsciidocConverter {
    /// Start a client on top of an existing worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<T: WorkerTransport>(worker: T) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (exits, _) = broadcast::channel(EXIT_CHANNEL_CAPACITY);
        let (status_tx, status) = watch::channel(None);

        let dispatcher = Dispatcher::new(worker, exits.clone(), status_tx);
        let dispatcher = tokio::spawn(dispatcher.run(rx));

        Self {
            commands,
            exits,
            status,
            dispatcher,
        }
    }

    /// Spawn a worker child process and connect to it.
    ///
    /// # Arguments
    ///
    /// * `worker_path` - Executable that serves the NDJSON worker protocol.
    /// * `args` - Arguments that select worker mode on that executable.
    /// * `init` - Options fixed for the worker's lifetime.
    pub async fn spawn_process<P: AsRef<Path>>(
        worker_path: P,
        args: &[String],
        init: &InitOptions,
    ) -> ConverterResult<Self> {
        let worker = ProcessWorker::spawn(worker_path, args, init).await?;
        Ok(Self::new(worker))
    }

    /// Run `processor` on a dedicated OS thread.
    pub fn spawn_thread<P: Processor + 'static>(processor: P) -> ConverterResult<Self> {
        let worker = ThreadWorker::spawn(processor)?;
        Ok(Self::new(worker))
    }

    /// Spawn a worker as described by the settings.
    ///
    /// In process mode the configured worker executable is used, falling back
    /// to the current executable's hidden `worker` subcommand.
    pub async fn spawn_with_settings(settings: &Settings) -> ConverterResult<Self> {
        let init = settings.worker.init_options();
        match settings.worker.mode {
            WorkerMode::Thread => Self::spawn_thread(AsciidoctorProcessor::new(init)),
            WorkerMode::Process => {
                let worker_path = Self::resolve_worker_path(settings)?;
                Self::spawn_process(&worker_path, &worker_args(settings), &init).await
            }
        }
    }

    /// Resolve the worker executable from settings.
    fn resolve_worker_path(settings: &Settings) -> ConverterResult<PathBuf> {
        if let Some(path) = &settings.worker.path {
            let expanded = expand_env_vars(path).map_err(|e| {
                ConverterError::SpawnFailed(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    e.to_string(),
                ))
            })?;
            return Ok(PathBuf::from(expanded));
        }

        std::env::current_exe().map_err(ConverterError::SpawnFailed)
    }

    /// Queue a conversion and wait for its result.
    ///
    /// The request is queued when this method is called, not when the
    /// returned future is first polled, so submission order is call order.
    /// Dropping the future before dispatch removes the call from the queue.
    pub fn convert(
        &self,
        request: ConvertRequest,
    ) -> impl Future<Output = ConverterResult<ConvertReply>> + Send + 'static {
        let (reply, rx) = oneshot::channel();
        let queued = self
            .commands
            .send(Command::Convert(PendingCall { request, reply }));

        async move {
            if queued.is_err() {
                return Err(ConverterError::Terminated);
            }
            rx.await?
        }
    }

    /// Tear down the worker.
    ///
    /// Calls still queued or in flight are rejected with
    /// [`ConverterError::Terminated`]. Calling this again is a no-op.
    pub async fn terminate(&self) -> ConverterResult<()> {
        let (ack, rx) = oneshot::channel();
        if self.commands.send(Command::Terminate(ack)).is_err() {
            return Ok(());
        }
        rx.await.unwrap_or(Ok(()))
    }

    /// Subscribe to worker exit notifications.
    pub fn subscribe_exit(&self) -> broadcast::Receiver<ExitEvent> {
        self.exits.subscribe()
    }

    /// Wait until the worker has exited.
    pub async fn wait_for_exit(&self) -> ExitEvent {
        let mut status = self.status.clone();
        let exit = match status.wait_for(Option::is_some).await {
            Ok(event) => (*event).unwrap_or(ExitEvent { code: None }),
            Err(_) => ExitEvent { code: None },
        };
        exit
    }

    /// The exit notification, once the worker has exited.
    pub fn exit_status(&self) -> Option<ExitEvent> {
        *self.status.borrow()
    }

    /// Check if the worker is still running.
    pub fn is_alive(&self) -> bool {
        self.status.borrow().is_none() && !self.dispatcher.is_finished()
    }

    /// Current queue statistics.
    pub async fn stats(&self) -> ConverterResult<QueueStats> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Stats(reply))
            .map_err(|_| ConverterError::Terminated)?;
        rx.await.map_err(|_| ConverterError::Terminated)
    }
}

/// Arguments selecting worker mode on our own executable.
///
/// The worker loads the same config file as its parent.
fn worker_args(settings: &Settings) -> Vec<String> {
    let mut args = vec!["worker".to_string()];
    if let Some(source) = &settings.source {
        args.extend(["--config".to_string(), source.display().to_string()]);
    }
    args
}

// ============================================================================
// Dispatcher
// ============================================================================

enum Command {
    Convert(PendingCall),
    Stats(oneshot::Sender<QueueStats>),
    Terminate(oneshot::Sender<ConverterResult<()>>),
}

/// A queued call and the channel that settles it.
struct PendingCall {
    request: ConvertRequest,
    reply: oneshot::Sender<ConverterResult<ConvertReply>>,
}

/// The call currently owned by the worker.
struct InFlight {
    file: String,
    reply: oneshot::Sender<ConverterResult<ConvertReply>>,
}

/// Owns the worker, the queue and the in-flight slot.
///
/// All queue state is mutated from this task only.
struct Dispatcher<T> {
    worker: T,
    queue: VecDeque<PendingCall>,
    in_flight: Option<InFlight>,
    exited: Option<ExitEvent>,
    exits: broadcast::Sender<ExitEvent>,
    status: watch::Sender<Option<ExitEvent>>,
    completed: u64,
    failed: u64,
}

impl<T: WorkerTransport> Dispatcher<T> {
    fn new(
        worker: T,
        exits: broadcast::Sender<ExitEvent>,
        status: watch::Sender<Option<ExitEvent>>,
    ) -> Self {
        Self {
            worker,
            queue: VecDeque::new(),
            in_flight: None,
            exited: None,
            exits,
            status,
            completed: 0,
            failed: 0,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Convert(call)) => self.enqueue(call).await,
                    Some(Command::Stats(reply)) => {
                        let _ = reply.send(self.stats());
                    }
                    Some(Command::Terminate(ack)) => {
                        let result = self.shutdown().await;
                        let _ = ack.send(result);
                        return;
                    }
                    None => {
                        // Every client handle is gone.
                        if let Err(e) = self.shutdown().await {
                            warn!(error = %e, "failed to terminate conversion worker");
                        }
                        return;
                    }
                },
                event = self.worker.next_event(), if self.exited.is_none() => {
                    self.handle_event(event);
                    self.drain().await;
                }
            }
        }
    }

    async fn enqueue(&mut self, call: PendingCall) {
        if let Some(exit) = self.exited {
            let _ = call.reply.send(Err(ConverterError::WorkerExited { code: exit.code }));
            self.failed += 1;
            return;
        }

        self.queue.push_back(call);
        self.drain().await;
    }

    /// Dispatch queued calls until one is in flight or the queue is empty.
    ///
    /// Re-entering while a call is in flight does nothing.
    async fn drain(&mut self) {
        while self.in_flight.is_none() {
            let Some(call) = self.queue.pop_front() else {
                return;
            };

            if call.reply.is_closed() {
                debug!(file = %call.request.file, "caller went away before dispatch");
                continue;
            }

            let file = call.request.file.clone();
            debug!(file = %file, queued = self.queue.len(), "dispatching conversion");

            match self.worker.send(call.request).await {
                Ok(()) => {
                    self.in_flight = Some(InFlight {
                        file,
                        reply: call.reply,
                    });
                }
                Err(e) => {
                    warn!(file = %file, error = %e, "failed to hand request to worker");
                    let _ = call.reply.send(Err(e));
                    self.failed += 1;
                }
            }
        }
    }

    fn handle_event(&mut self, event: Option<WorkerEvent>) {
        match event {
            Some(WorkerEvent::Reply(reply)) => self.settle(Ok(reply)),
            Some(WorkerEvent::Error(e)) => self.settle(Err(e)),
            Some(WorkerEvent::Exit(code)) => self.worker_exited(code),
            None => self.worker_exited(None),
        }
    }

    /// Settle the call in flight with the worker's answer.
    fn settle(&mut self, outcome: ConverterResult<ConvertReply>) {
        let Some(in_flight) = self.in_flight.take() else {
            warn!("dropping worker message with no request in flight");
            return;
        };

        match &outcome {
            Ok(_) => {
                debug!(file = %in_flight.file, "conversion finished");
                self.completed += 1;
            }
            Err(e) => {
                warn!(file = %in_flight.file, error = %e, "conversion failed");
                self.failed += 1;
            }
        }

        let _ = in_flight.reply.send(outcome);
    }

    fn worker_exited(&mut self, code: Option<i32>) {
        let pending = self.queue.len() + usize::from(self.in_flight.is_some());
        warn!(?code, pending, "conversion worker exited");

        self.reject_all(|| ConverterError::WorkerExited { code });
        self.publish_exit(ExitEvent { code });
    }

    async fn shutdown(&mut self) -> ConverterResult<()> {
        self.reject_all(|| ConverterError::Terminated);

        let result = self.worker.terminate().await;
        if self.exited.is_none() {
            let code = result.as_ref().ok().copied().flatten();
            self.publish_exit(ExitEvent { code });
        }

        info!(
            completed = self.completed,
            failed = self.failed,
            "conversion worker terminated"
        );
        result.map(|_| ())
    }

    fn reject_all(&mut self, error: impl Fn() -> ConverterError) {
        if let Some(in_flight) = self.in_flight.take() {
            let _ = in_flight.reply.send(Err(error()));
            self.failed += 1;
        }
        for call in self.queue.drain(..) {
            let _ = call.reply.send(Err(error()));
            self.failed += 1;
        }
    }

    fn publish_exit(&mut self, event: ExitEvent) {
        self.exited = Some(event);
        self.status.send_replace(Some(event));
        // No subscribers is fine.
        let _ = self.exits.send(event);
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            queued: self.queue.len(),
            in_flight: self.in_flight.is_some(),
            completed: self.completed,
            failed: self.failed,
        }
    }
}
