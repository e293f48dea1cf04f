#![forbid(unsafe_code)]

//! In-process worker: the engine runs on a dedicated thread.
//!
//! Every generation builds a fresh engine on its own named thread, so
//! engine state never leaks across a reinitialization. Terminating a
//! thread worker cancels it cooperatively: the thread may finish its
//! current computation, but it posts nothing afterwards. An engine panic is
//! caught and reported as a worker exit.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, mpsc};
use std::thread;

use calcpp_engine::{CalcRequest, MathEngine, WorkerMessage, handle_request};

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::channel::{
    ChannelError, EngineLoader, LoadError, WorkerFactory, WorkerOutbox, WorkerTransport,
};

type EngineBuilder = Arc<dyn Fn() -> Box<dyn MathEngine> + Send + Sync>;

/// Loader for an engine linked into the process.
pub struct InProcessLoader {
    build: EngineBuilder,
}

impl InProcessLoader {
    /// `build` is called once per worker generation, on the worker thread.
    pub fn new<F, E>(build: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
        E: MathEngine + 'static,
    {
        Self {
            build: Arc::new(move || Box::new(build()) as Box<dyn MathEngine>),
        }
    }
}

impl fmt::Debug for InProcessLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcessLoader").finish_non_exhaustive()
    }
}

impl EngineLoader for InProcessLoader {
    fn load(&self) -> Result<Box<dyn WorkerFactory>, LoadError> {
        Ok(Box::new(ThreadWorkerFactory {
            build: Arc::clone(&self.build),
        }))
    }
}

struct ThreadWorkerFactory {
    build: EngineBuilder,
}

impl WorkerFactory for ThreadWorkerFactory {
    fn spawn(&self, outbox: WorkerOutbox) -> Result<Box<dyn WorkerTransport>, ChannelError> {
        let (requests, inbox) = mpsc::channel::<CalcRequest>();
        let generation = outbox.generation();
        let cancel = CancellationSource::new(generation);
        let token = cancel.token();
        let build = Arc::clone(&self.build);

        thread::Builder::new()
            .name(format!("calcpp-worker-{generation}"))
            .spawn(move || {
                let run = catch_unwind(AssertUnwindSafe(|| {
                    serve_inbox(build.as_ref(), &inbox, &token, &outbox);
                }));
                if let Err(panic) = run
                    && !token.is_cancelled()
                {
                    outbox.exited(format!("engine panicked: {}", panic_message(panic.as_ref())));
                }
            })
            .map_err(|err| ChannelError::Spawn(err.to_string()))?;

        Ok(Box::new(ThreadWorker {
            requests: Some(requests),
            cancel,
        }))
    }
}

fn serve_inbox(
    build: &(dyn Fn() -> Box<dyn MathEngine> + Send + Sync),
    inbox: &mpsc::Receiver<CalcRequest>,
    token: &CancellationToken,
    outbox: &WorkerOutbox,
) {
    let mut engine = build();
    if token.is_cancelled() || !outbox.post(WorkerMessage::Init) {
        return;
    }
    while let Ok(request) = inbox.recv() {
        if token.is_cancelled() {
            return;
        }
        let response = handle_request(&mut engine, &request);
        if token.is_cancelled() || !outbox.post(WorkerMessage::Response(response)) {
            return;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

struct ThreadWorker {
    requests: Option<mpsc::Sender<CalcRequest>>,
    cancel: CancellationSource,
}

impl WorkerTransport for ThreadWorker {
    fn post(&mut self, request: &CalcRequest) -> Result<(), ChannelError> {
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| ChannelError::Send("worker terminated".into()))?;
        requests
            .send(request.clone())
            .map_err(|_| ChannelError::Send("worker thread has exited".into()))
    }

    fn terminate(&mut self) {
        if self.cancel.cancel() {
            tracing::trace!(target: "calcpp.worker", generation = self.cancel.generation(), "worker thread stopped");
        }
        // Closing the inbox ends the worker loop once it is idle.
        self.requests = None;
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}
