//! Worker handles and the process-backed worker.
//!
//! The orchestrator talks to exactly one worker at a time through the
//! [`Worker`] trait. Responses flow back on a shared channel as
//! [`WorkerEnvelope`]s tagged with the generation of the worker that sent
//! them, so anything a terminated worker still emits can be discarded.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc as std_mpsc;

use tokio::sync::mpsc;

use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};

use super::protocol::{WorkerCommand, WorkerResponse, read_message, write_message};

/// A response together with the generation of the worker that sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerEnvelope {
    pub generation: u64,
    pub response: WorkerResponse,
}

/// Sending half of the worker response channel.
pub type EnvelopeSender = mpsc::UnboundedSender<WorkerEnvelope>;

/// Receiving half of the worker response channel.
pub type EnvelopeReceiver = mpsc::UnboundedReceiver<WorkerEnvelope>;

/// A live worker of execution.
pub trait Worker: Send {
    /// Send a command to the worker.
    fn send(&mut self, cmd: WorkerCommand) -> Result<()>;

    /// Destroy the worker immediately. No graceful drain.
    fn terminate(&mut self);
}

/// Creates workers for the orchestrator.
pub trait WorkerFactory: Send {
    /// Start a new worker whose responses are sent on `events` tagged with
    /// `generation`.
    fn spawn(&mut self, generation: u64, events: EnvelopeSender) -> Result<Box<dyn Worker>>;
}

/// Worker running as a child process speaking the framed protocol over
/// stdin/stdout.
///
/// Frames are written by a dedicated writer thread and the killed child is
/// reaped off-thread, so neither `send` nor `terminate` blocks the caller.
pub struct ProcessWorker {
    /// The child process, until it is killed.
    child: Option<Child>,
    /// Queue into the writer thread; `None` once killed.
    commands: Option<std_mpsc::Sender<WorkerCommand>>,
    generation: u64,
}

impl ProcessWorker {
    /// Spawn the worker binary at `path`.
    pub fn spawn(path: &Path, generation: u64, events: EnvelopeSender) -> Result<Self> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // Let worker stderr pass through for debugging
            .spawn()
            .map_err(|e| {
                Error::WorkerSpawn(format!(
                    "Failed to spawn worker process '{}': {}",
                    path.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Ipc("Failed to get worker stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Ipc("Failed to get worker stdout".to_string()))?;

        std::thread::Builder::new()
            .name(format!("sheetrun-worker-{}-out", generation))
            .spawn(move || forward_responses(stdout, generation, events))
            .map_err(|e| Error::WorkerSpawn(format!("Failed to start reader thread: {}", e)))?;

        let (tx, rx) = std_mpsc::channel();
        std::thread::Builder::new()
            .name(format!("sheetrun-worker-{}-in", generation))
            .spawn(move || write_commands(stdin, generation, rx))
            .map_err(|e| Error::WorkerSpawn(format!("Failed to start writer thread: {}", e)))?;

        tracing::debug!(
            "Spawned worker process {} (generation {})",
            child.id(),
            generation
        );

        Ok(Self {
            child: Some(child),
            commands: Some(tx),
            generation,
        })
    }
}

/// Decode frames from the worker's stdout until the stream closes.
fn forward_responses(stdout: ChildStdout, generation: u64, events: EnvelopeSender) {
    let mut reader = BufReader::new(stdout);
    loop {
        match read_message::<_, WorkerResponse>(&mut reader) {
            Ok(response) => {
                if events
                    .send(WorkerEnvelope {
                        generation,
                        response,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("Worker generation {} stream closed: {}", generation, e);
                // Dropped as stale if the worker was terminated on purpose.
                let _ = events.send(WorkerEnvelope {
                    generation,
                    response: WorkerResponse::Error {
                        message: Some(format!("worker stream closed: {}", e)),
                    },
                });
                break;
            }
        }
    }
}

/// Encode queued commands onto the worker's stdin until the queue closes.
fn write_commands(stdin: ChildStdin, generation: u64, commands: std_mpsc::Receiver<WorkerCommand>) {
    let mut writer = BufWriter::new(stdin);
    for cmd in commands {
        if let Err(e) = write_message(&mut writer, &cmd) {
            // The reader side reports the dead worker.
            tracing::warn!("Worker generation {} stopped accepting input: {}", generation, e);
            break;
        }
    }
}

impl Worker for ProcessWorker {
    fn send(&mut self, cmd: WorkerCommand) -> Result<()> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| Error::Ipc("Worker has been killed".to_string()))?;
        commands
            .send(cmd)
            .map_err(|_| Error::Ipc("Worker input has closed".to_string()))
    }

    fn terminate(&mut self) {
        self.commands = None;
        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Err(e) = child.kill() {
            // The process may already have exited.
            if e.kind() != std::io::ErrorKind::InvalidInput {
                tracing::warn!("Failed to kill worker: {}", e);
            }
        }

        if let Ok(Some(_)) = child.try_wait() {
            return;
        }

        // Reap the zombie without waiting here.
        let reaper = std::thread::Builder::new()
            .name(format!("sheetrun-worker-{}-reap", self.generation))
            .spawn(move || {
                let _ = child.wait();
            });
        if let Err(e) = reaper {
            tracing::warn!("Failed to start reaper thread: {}", e);
        }
    }
}

impl Drop for ProcessWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Spawns [`ProcessWorker`]s from a binary located via the config.
pub struct ProcessWorkerFactory {
    path: PathBuf,
}

impl ProcessWorkerFactory {
    /// Use the worker binary at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Locate the worker binary using the config's discovery rules.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        Ok(Self::new(config.find_worker_binary()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WorkerFactory for ProcessWorkerFactory {
    fn spawn(&mut self, generation: u64, events: EnvelopeSender) -> Result<Box<dyn Worker>> {
        Ok(Box::new(ProcessWorker::spawn(&self.path, generation, events)?))
    }
}
