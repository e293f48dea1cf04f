#![allow(dead_code)]

//! Shared test doubles for runtime integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use calcpp_engine::{
    AngleUnit, CalcRequest, CalcResponse, EngineError, MathEngine, NumeralBase, WorkerMessage,
};
use calcpp_runtime::{
    ChannelError, ChannelEvent, ComputeChannel, EngineLoader, LoadError, WorkerFactory,
    WorkerOutbox, WorkerTransport,
};

pub const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Manual worker
// ============================================================================

/// Worker-side operations in the order the channel performed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOp {
    Spawned(u64),
    Posted { generation: u64, uid: u32 },
    Terminated(u64),
}

#[derive(Default)]
struct Recorded {
    outboxes: Vec<WorkerOutbox>,
    requests: Vec<(u64, CalcRequest)>,
    ops: Vec<WorkerOp>,
}

/// Handle the test keeps to answer requests by hand.
#[derive(Clone, Default)]
pub struct ManualWorkers {
    inner: Arc<Mutex<Recorded>>,
}

impl ManualWorkers {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap()
    }

    pub fn ops(&self) -> Vec<WorkerOp> {
        self.lock().ops.clone()
    }

    pub fn requests(&self) -> Vec<(u64, CalcRequest)> {
        self.lock().requests.clone()
    }

    pub fn last_request(&self) -> (u64, CalcRequest) {
        self.lock().requests.last().cloned().expect("no request posted")
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Post a response as the worker of `generation`, current or not.
    pub fn respond_as(&self, generation: u64, response: CalcResponse) {
        let outbox = self
            .lock()
            .outboxes
            .iter()
            .find(|o| o.generation() == generation)
            .cloned()
            .expect("unknown generation");
        outbox.post(WorkerMessage::Response(response));
    }

    /// Answer the most recent request with `result`.
    pub fn succeed_last(&self, result: &str) {
        let (generation, request) = self.last_request();
        self.respond_as(generation, CalcResponse::succeeded(&request, result));
    }

    /// Kill the worker of `generation` without the channel asking.
    pub fn crash(&self, generation: u64) {
        let outbox = self
            .lock()
            .outboxes
            .iter()
            .find(|o| o.generation() == generation)
            .cloned()
            .expect("unknown generation");
        outbox.exited("test crash");
    }
}

pub struct ManualLoader {
    workers: ManualWorkers,
}

impl ManualLoader {
    pub fn new() -> (Self, ManualWorkers) {
        let workers = ManualWorkers::default();
        (
            Self {
                workers: workers.clone(),
            },
            workers,
        )
    }
}

impl EngineLoader for ManualLoader {
    fn load(&self) -> Result<Box<dyn WorkerFactory>, LoadError> {
        Ok(Box::new(ManualFactory {
            workers: self.workers.clone(),
        }))
    }
}

struct ManualFactory {
    workers: ManualWorkers,
}

impl WorkerFactory for ManualFactory {
    fn spawn(&self, outbox: WorkerOutbox) -> Result<Box<dyn WorkerTransport>, ChannelError> {
        let generation = outbox.generation();
        outbox.post(WorkerMessage::Init);
        let mut recorded = self.workers.lock();
        recorded.outboxes.push(outbox);
        recorded.ops.push(WorkerOp::Spawned(generation));
        Ok(Box::new(ManualTransport {
            generation,
            workers: self.workers.clone(),
        }))
    }
}

struct ManualTransport {
    generation: u64,
    workers: ManualWorkers,
}

impl WorkerTransport for ManualTransport {
    fn post(&mut self, request: &CalcRequest) -> Result<(), ChannelError> {
        let mut recorded = self.workers.lock();
        recorded.requests.push((self.generation, request.clone()));
        recorded.ops.push(WorkerOp::Posted {
            generation: self.generation,
            uid: request.uid,
        });
        Ok(())
    }

    fn terminate(&mut self) {
        self.workers
            .lock()
            .ops
            .push(WorkerOp::Terminated(self.generation));
    }
}

/// Loader whose load always fails.
pub struct FailingLoader(pub &'static str);

impl EngineLoader for FailingLoader {
    fn load(&self) -> Result<Box<dyn WorkerFactory>, LoadError> {
        Err(LoadError::Engine(self.0.to_string()))
    }
}

/// Loader that fails its first `failures` loads, then hands out manual
/// workers.
pub struct FlakyLoader {
    failures: AtomicUsize,
    inner: ManualLoader,
}

impl FlakyLoader {
    pub fn new(failures: usize) -> (Self, ManualWorkers) {
        let (inner, workers) = ManualLoader::new();
        (
            Self {
                failures: AtomicUsize::new(failures),
                inner,
            },
            workers,
        )
    }
}

impl EngineLoader for FlakyLoader {
    fn load(&self) -> Result<Box<dyn WorkerFactory>, LoadError> {
        let failing = self
            .failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LoadError::Engine("engine fetch failed".to_string()));
        }
        self.inner.load()
    }
}

/// Start a channel and wait for its first worker to announce `init`.
pub fn ready_channel(loader: impl EngineLoader) -> ComputeChannel {
    let mut channel = ComputeChannel::start(loader);
    match channel.wait(WAIT) {
        Some(ChannelEvent::Ready { .. }) => channel,
        other => panic!("channel did not become ready: {other:?}"),
    }
}

// ============================================================================
// Scripted engine
// ============================================================================

/// Engine answering from fixed tables; unknown expressions fail with a
/// plain message.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    evaluate: HashMap<String, Result<String, EngineError>>,
    simplify: HashMap<String, Result<String, EngineError>>,
    units: Arc<Mutex<Vec<(AngleUnit, NumeralBase)>>>,
    angle: AngleUnit,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluates(mut self, expr: &str, result: Result<&str, EngineError>) -> Self {
        self.evaluate
            .insert(expr.to_string(), result.map(str::to_string));
        self
    }

    pub fn simplifies(mut self, expr: &str, result: Result<&str, EngineError>) -> Self {
        self.simplify
            .insert(expr.to_string(), result.map(str::to_string));
        self
    }

    /// Units applied before each request, shared across clones.
    pub fn units_seen(&self) -> Arc<Mutex<Vec<(AngleUnit, NumeralBase)>>> {
        Arc::clone(&self.units)
    }

    fn lookup(
        table: &HashMap<String, Result<String, EngineError>>,
        expr: &str,
    ) -> Result<String, EngineError> {
        table
            .get(expr)
            .cloned()
            .unwrap_or_else(|| Err(EngineError::message(format!("no script for {expr}"))))
    }
}

impl MathEngine for ScriptedEngine {
    fn set_angle_units(&mut self, unit: AngleUnit) {
        self.angle = unit;
    }

    fn set_numeral_base(&mut self, base: NumeralBase) {
        self.units.lock().unwrap().push((self.angle, base));
    }

    fn process_expr(&mut self, expr: &str) -> Result<String, EngineError> {
        Ok(expr.to_string())
    }

    fn evaluate(&mut self, expr: &str) -> Result<String, EngineError> {
        Self::lookup(&self.evaluate, expr)
    }

    fn simplify(&mut self, expr: &str) -> Result<String, EngineError> {
        Self::lookup(&self.simplify, expr)
    }
}
