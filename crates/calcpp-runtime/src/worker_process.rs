#![forbid(unsafe_code)]

//! Child-process worker: the engine runs as an external executable.
//!
//! The engine program is resolved once at load time with `which`. Each
//! worker generation spawns the program with piped stdio and speaks the
//! JSON-lines protocol: requests on stdin, [`WorkerMessage`]s on stdout.
//! Stderr lines are forwarded to the log. Terminating a worker kills the
//! child, which destroys any in-flight computation.
//!
//! # Example
//!
//! ```ignore
//! use calcpp_runtime::{ComputeChannel, ProcessLoader};
//!
//! let channel = ComputeChannel::start(
//!     ProcessLoader::new("calcpp-jscl").arg("--quiet"),
//! );
//! ```

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;

use calcpp_engine::{CalcRequest, WorkerMessage};

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::channel::{
    ChannelError, EngineLoader, LoadError, WorkerFactory, WorkerOutbox, WorkerTransport,
};

/// Loader for an engine executable.
#[derive(Debug, Clone)]
pub struct ProcessLoader {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl ProcessLoader {
    /// `program` is a bare name looked up on `PATH`, or a path.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child process.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl EngineLoader for ProcessLoader {
    fn load(&self) -> Result<Box<dyn WorkerFactory>, LoadError> {
        let path = which::which(&self.program).map_err(|source| LoadError::ProgramNotFound {
            program: self.program.clone(),
            source,
        })?;
        tracing::debug!(target: "calcpp.worker", path = %path.display(), "resolved engine program");
        Ok(Box::new(ProcessWorkerFactory {
            path,
            args: self.args.clone(),
            env: self.env.clone(),
        }))
    }
}

struct ProcessWorkerFactory {
    path: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl WorkerFactory for ProcessWorkerFactory {
    fn spawn(&self, outbox: WorkerOutbox) -> Result<Box<dyn WorkerTransport>, ChannelError> {
        let mut cmd = Command::new(&self.path);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in &self.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .map_err(|err| ChannelError::Spawn(format!("'{}': {err}", self.path.display())))?;
        let generation = outbox.generation();
        let cancel = CancellationSource::new(generation);

        let stdin = child.stdin.take();
        if let Some(stdout) = child.stdout.take() {
            let token = cancel.token();
            let spawned = thread::Builder::new()
                .name(format!("calcpp-worker-{generation}-stdout"))
                .spawn(move || read_stdout(stdout, &outbox, &token));
            if let Err(err) = spawned {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ChannelError::Spawn(err.to_string()));
            }
        }
        if let Some(stderr) = child.stderr.take() {
            // Log forwarding only; a failure to start it is not fatal.
            let _ = thread::Builder::new()
                .name(format!("calcpp-worker-{generation}-stderr"))
                .spawn(move || forward_stderr(stderr, generation));
        }

        tracing::debug!(target: "calcpp.worker", generation, pid = child.id(), "engine process started");
        Ok(Box::new(ProcessWorker {
            child: Some(child),
            stdin,
            cancel,
            generation,
        }))
    }
}

fn read_stdout(stdout: impl std::io::Read, outbox: &WorkerOutbox, token: &CancellationToken) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if token.is_cancelled() {
            return;
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            tracing::warn!(
                target: "calcpp.worker",
                generation = outbox.generation(),
                bytes = buf.len(),
                "skipping non-UTF-8 worker line"
            );
            continue;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match WorkerMessage::from_json_str(trimmed) {
            Ok(message) => {
                if !outbox.post(message) {
                    return;
                }
            }
            Err(err) => tracing::warn!(
                target: "calcpp.worker",
                generation = outbox.generation(),
                error = %err,
                "skipping malformed worker line"
            ),
        }
    }
    if !token.is_cancelled() {
        outbox.exited("engine process closed its output");
    }
}

fn forward_stderr(stderr: impl std::io::Read, generation: u64) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    while matches!(reader.read_until(b'\n', &mut buf), Ok(n) if n > 0) {
        let line = String::from_utf8_lossy(&buf);
        tracing::warn!(target: "calcpp.worker", generation, line = %line.trim_end(), "engine stderr");
        buf.clear();
    }
}

struct ProcessWorker {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    cancel: CancellationSource,
    generation: u64,
}

impl WorkerTransport for ProcessWorker {
    fn post(&mut self, request: &CalcRequest) -> Result<(), ChannelError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ChannelError::Send("worker terminated".into()))?;
        let line = request
            .to_json_string()
            .map_err(|err| ChannelError::Send(err.to_string()))?;
        stdin
            .write_all(line.as_bytes())
            .and_then(|()| stdin.write_all(b"\n"))
            .and_then(|()| stdin.flush())
            .map_err(|err| ChannelError::Send(err.to_string()))
    }

    fn terminate(&mut self) {
        self.cancel.cancel();
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!(target: "calcpp.worker", generation = self.generation, "engine process killed");
        }
    }
}

impl Drop for ProcessWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}
