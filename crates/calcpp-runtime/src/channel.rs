#![forbid(unsafe_code)]

//! Compute channel: lifecycle of the isolated engine worker.
//!
//! [`ComputeChannel`] loads the engine once, spawns workers from the loaded
//! [`WorkerFactory`], forwards requests, and queues worker output for the
//! control thread to drain with [`poll`](ComputeChannel::poll) or
//! [`wait`](ComputeChannel::wait).
//!
//! # State Machine
//!
//! ```text
//!            load ok + spawn                 init
//!  Loading ─────────────────► Starting ─────────────► Ready
//!     │                          ▲  │                   │
//!     │ load failed              │  └── reinitialize ◄──┘ (terminate, respawn)
//!     ▼                          │
//!  Unavailable ── reinitialize ──┘ (retry load)
//!
//!  any ── dispose ──► Disposed
//! ```
//!
//! # Invariants
//!
//! 1. At most one worker is alive; reinitializing terminates it before the
//!    replacement is spawned.
//! 2. Every worker message is tagged with the generation of the worker that
//!    produced it. Messages from any other generation are dropped, so a
//!    superseded request's response is never delivered.
//! 3. Requests are only accepted in `Starting` or `Ready`. Transports queue
//!    requests sent before the worker's `init`.
//!
//! # Failure Modes
//!
//! - Load failure is terminal until [`reinitialize`](ComputeChannel::reinitialize)
//!   retries it.
//! - A worker that dies is reported as [`ChannelEvent::WorkerExited`]; the
//!   next request spawns a replacement.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use calcpp_engine::{CalcRequest, CalcResponse, WorkerMessage};
use web_time::Instant;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The engine could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("engine program `{program}` not found: {source}")]
    ProgramNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Engine(String),
}

/// A request could not be handed to a worker.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("engine is still loading")]
    Loading,

    #[error("engine unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("channel has been disposed")]
    Disposed,

    #[error("failed to start worker: {0}")]
    Spawn(String),

    #[error("failed to send request: {0}")]
    Send(String),
}

// ---------------------------------------------------------------------------
// Status and events
// ---------------------------------------------------------------------------

/// Channel lifecycle state, for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Loading,
    /// A worker exists but has not announced `init` yet.
    Starting,
    Ready,
    /// Loading (or spawning) failed; holds the rendered load error.
    Unavailable(String),
    Disposed,
}

impl ChannelStatus {
    /// Whether requests are accepted.
    #[must_use]
    pub const fn can_send(&self) -> bool {
        matches!(self, Self::Starting | Self::Ready)
    }

    #[must_use]
    pub fn load_error(&self) -> Option<&str> {
        match self {
            Self::Unavailable(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Output drained from the channel.
#[derive(Debug)]
pub enum ChannelEvent {
    /// The current worker announced `init`.
    Ready { generation: u64 },
    LoadFailed(LoadError),
    Response(CalcResponse),
    /// The current worker died without being terminated.
    WorkerExited { generation: u64, reason: String },
}

// ---------------------------------------------------------------------------
// Worker seams
// ---------------------------------------------------------------------------

/// Loads the engine once; runs on a background thread.
pub trait EngineLoader: Send + Sync + 'static {
    fn load(&self) -> Result<Box<dyn WorkerFactory>, LoadError>;
}

/// Creates workers from an already loaded engine.
pub trait WorkerFactory: Send {
    /// Start one worker. Everything the worker produces goes through
    /// `outbox`.
    fn spawn(&self, outbox: WorkerOutbox) -> Result<Box<dyn WorkerTransport>, ChannelError>;
}

/// Control-thread handle to one running worker.
pub trait WorkerTransport {
    fn post(&mut self, request: &CalcRequest) -> Result<(), ChannelError>;

    /// Tear the worker down. Must not block on an in-flight computation.
    fn terminate(&mut self);
}

enum WorkerOutput {
    Message(WorkerMessage),
    Exited(String),
}

enum Envelope {
    Loaded {
        attempt: u64,
        result: Result<Box<dyn WorkerFactory>, LoadError>,
    },
    Worker {
        generation: u64,
        output: WorkerOutput,
    },
}

/// Worker-side sender, stamped with the worker's generation.
#[derive(Clone)]
pub struct WorkerOutbox {
    generation: u64,
    sender: mpsc::Sender<Envelope>,
}

impl WorkerOutbox {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Post a message. Returns `false` once the channel is gone.
    pub fn post(&self, message: WorkerMessage) -> bool {
        self.send(WorkerOutput::Message(message))
    }

    /// Report that the worker died.
    pub fn exited(&self, reason: impl Into<String>) -> bool {
        self.send(WorkerOutput::Exited(reason.into()))
    }

    fn send(&self, output: WorkerOutput) -> bool {
        self.sender
            .send(Envelope::Worker {
                generation: self.generation,
                output,
            })
            .is_ok()
    }
}

impl fmt::Debug for WorkerOutbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerOutbox")
            .field("generation", &self.generation)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComputeChannel
// ---------------------------------------------------------------------------

/// Single-slot request channel to an isolated engine worker.
pub struct ComputeChannel {
    loader: Arc<dyn EngineLoader>,
    factory: Option<Box<dyn WorkerFactory>>,
    worker: Option<Box<dyn WorkerTransport>>,
    status: ChannelStatus,
    generation: u64,
    load_attempt: u64,
    reinit_count: u64,
    sender: mpsc::Sender<Envelope>,
    receiver: mpsc::Receiver<Envelope>,
    pending: VecDeque<ChannelEvent>,
}

impl fmt::Debug for ComputeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeChannel")
            .field("status", &self.status)
            .field("generation", &self.generation)
            .field("load_attempt", &self.load_attempt)
            .field("reinit_count", &self.reinit_count)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ComputeChannel {
    /// Create the channel and start loading the engine in the background.
    pub fn start(loader: impl EngineLoader) -> Self {
        let (sender, receiver) = mpsc::channel();
        let mut channel = Self {
            loader: Arc::new(loader),
            factory: None,
            worker: None,
            status: ChannelStatus::Loading,
            generation: 0,
            load_attempt: 0,
            reinit_count: 0,
            sender,
            receiver,
            pending: VecDeque::new(),
        };
        channel.begin_load();
        channel
    }

    #[must_use]
    pub fn status(&self) -> &ChannelStatus {
        &self.status
    }

    /// Generation of the current (or most recent) worker. Zero before the
    /// first spawn.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of worker replacements performed by
    /// [`reinitialize`](Self::reinitialize).
    #[must_use]
    pub const fn reinit_count(&self) -> u64 {
        self.reinit_count
    }

    /// Hand a request to the current worker, spawning one if the previous
    /// worker died.
    pub fn send(&mut self, request: &CalcRequest) -> Result<(), ChannelError> {
        match &self.status {
            ChannelStatus::Starting | ChannelStatus::Ready => {}
            ChannelStatus::Loading => return Err(ChannelError::Loading),
            ChannelStatus::Unavailable(reason) => {
                return Err(ChannelError::Unavailable {
                    reason: reason.clone(),
                });
            }
            ChannelStatus::Disposed => return Err(ChannelError::Disposed),
        }
        if self.worker.is_none() {
            self.spawn_worker()?;
        }
        let worker = self
            .worker
            .as_mut()
            .ok_or_else(|| ChannelError::Spawn("no worker".into()))?;
        worker.post(request)?;
        tracing::debug!(
            target: "calcpp.channel",
            uid = request.uid,
            kind = %request.kind,
            generation = self.generation,
            "request sent"
        );
        Ok(())
    }

    /// Replace the current worker, or retry a failed load.
    ///
    /// The in-flight request of a replaced worker is lost; nothing it
    /// produces is delivered. No-op while loading.
    pub fn reinitialize(&mut self) -> Result<(), ChannelError> {
        match self.status {
            ChannelStatus::Disposed => Err(ChannelError::Disposed),
            ChannelStatus::Loading => Ok(()),
            ChannelStatus::Unavailable(_) => {
                self.begin_load();
                Ok(())
            }
            ChannelStatus::Starting | ChannelStatus::Ready => {
                self.terminate_worker();
                self.reinit_count += 1;
                tracing::debug!(
                    target: "calcpp.channel",
                    superseded = self.generation,
                    "reinitializing worker"
                );
                self.spawn_worker()
            }
        }
    }

    /// Terminate the worker and refuse all further requests.
    pub fn dispose(&mut self) {
        self.terminate_worker();
        self.factory = None;
        self.pending.clear();
        self.status = ChannelStatus::Disposed;
        tracing::debug!(target: "calcpp.channel", "channel disposed");
    }

    /// Next event, without blocking.
    pub fn poll(&mut self) -> Option<ChannelEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let envelope = self.receiver.try_recv().ok()?;
            self.accept(envelope);
        }
    }

    /// Next event, blocking up to `timeout`.
    pub fn wait(&mut self, timeout: Duration) -> Option<ChannelEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let envelope = self.receiver.recv_timeout(remaining).ok()?;
            self.accept(envelope);
        }
    }

    /// Drain every queued event.
    pub fn drain(&mut self) -> Vec<ChannelEvent> {
        std::iter::from_fn(|| self.poll()).collect()
    }

    // --- internals ---

    fn begin_load(&mut self) {
        self.load_attempt += 1;
        self.status = ChannelStatus::Loading;
        let attempt = self.load_attempt;
        let loader = Arc::clone(&self.loader);
        let sender = self.sender.clone();
        tracing::debug!(target: "calcpp.channel", attempt, "loading engine");

        let spawned = thread::Builder::new()
            .name("calcpp-engine-load".into())
            .spawn(move || {
                let result = loader.load();
                let _ = sender.send(Envelope::Loaded { attempt, result });
            });
        if let Err(err) = spawned {
            self.fail_load(LoadError::Io(err));
        }
    }

    fn fail_load(&mut self, error: LoadError) {
        tracing::error!(target: "calcpp.channel", error = %error, "engine load failed");
        self.status = ChannelStatus::Unavailable(error.to_string());
        self.pending.push_back(ChannelEvent::LoadFailed(error));
    }

    fn spawn_worker(&mut self) -> Result<(), ChannelError> {
        let Some(factory) = self.factory.as_ref() else {
            return Err(ChannelError::Loading);
        };
        self.generation += 1;
        let outbox = WorkerOutbox {
            generation: self.generation,
            sender: self.sender.clone(),
        };
        match factory.spawn(outbox) {
            Ok(worker) => {
                self.worker = Some(worker);
                self.status = ChannelStatus::Starting;
                tracing::debug!(target: "calcpp.channel", generation = self.generation, "worker spawned");
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    target: "calcpp.channel",
                    generation = self.generation,
                    error = %err,
                    "worker spawn failed"
                );
                self.factory = None;
                self.status = ChannelStatus::Unavailable(err.to_string());
                Err(err)
            }
        }
    }

    fn terminate_worker(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.terminate();
            tracing::debug!(target: "calcpp.channel", generation = self.generation, "worker terminated");
        }
    }

    fn accept(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Loaded { attempt, result } => {
                if attempt != self.load_attempt || self.status != ChannelStatus::Loading {
                    tracing::debug!(target: "calcpp.channel", attempt, "dropping stale load result");
                    return;
                }
                match result {
                    Ok(factory) => {
                        tracing::debug!(target: "calcpp.channel", attempt, "engine loaded");
                        self.factory = Some(factory);
                        if let Err(err) = self.spawn_worker() {
                            let reason = err.to_string();
                            self.pending.push_back(ChannelEvent::LoadFailed(LoadError::Engine(reason)));
                        }
                    }
                    Err(error) => self.fail_load(error),
                }
            }
            Envelope::Worker { generation, output } => {
                if generation != self.generation || self.worker.is_none() {
                    tracing::debug!(
                        target: "calcpp.channel",
                        generation,
                        current = self.generation,
                        "dropping superseded worker message"
                    );
                    return;
                }
                match output {
                    WorkerOutput::Message(WorkerMessage::Init) => {
                        if self.status == ChannelStatus::Starting {
                            self.status = ChannelStatus::Ready;
                        }
                        self.pending.push_back(ChannelEvent::Ready { generation });
                    }
                    WorkerOutput::Message(WorkerMessage::Response(response)) => {
                        self.pending.push_back(ChannelEvent::Response(response));
                    }
                    WorkerOutput::Exited(reason) => {
                        tracing::warn!(target: "calcpp.channel", generation, reason = %reason, "worker exited");
                        self.terminate_worker();
                        self.pending
                            .push_back(ChannelEvent::WorkerExited { generation, reason });
                    }
                }
            }
        }
    }
}

impl Drop for ComputeChannel {
    fn drop(&mut self) {
        self.terminate_worker();
    }
}
