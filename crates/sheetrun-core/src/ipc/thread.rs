//! In-process worker running code on a dedicated thread.
//!
//! The thread speaks the same message protocol as a process worker, which
//! makes it usable both for embedding and for exercising the orchestrator
//! without a worker binary. A terminated thread cannot be killed; it is
//! abandoned instead and whatever it still sends carries a stale generation.

use std::sync::Arc;
use std::sync::mpsc as std_mpsc;

use crate::error::{Error, Result};
use crate::grid::{JsonCell, SheetPos};

use super::protocol::{CellsRequest, WorkerCommand, WorkerResponse, WorkerResult};
use super::worker::{EnvelopeSender, Worker, WorkerEnvelope, WorkerFactory};

/// Executes code inside a [`ThreadWorker`].
pub trait CodeRunner: Send + Sync + 'static {
    /// Run `code` attached to `pos`, reading cells through `cells`.
    fn run(&self, code: &str, pos: &SheetPos, cells: &mut CellReader<'_>) -> WorkerResult;
}

impl<F> CodeRunner for F
where
    F: Fn(&str, &SheetPos, &mut CellReader<'_>) -> WorkerResult + Send + Sync + 'static,
{
    fn run(&self, code: &str, pos: &SheetPos, cells: &mut CellReader<'_>) -> WorkerResult {
        self(code, pos, cells)
    }
}

/// Synchronous cell access for running code.
///
/// Each call sends a `get-cells` request and blocks until the orchestrator
/// answers with `cell-data`.
pub struct CellReader<'a> {
    generation: u64,
    commands: &'a std_mpsc::Receiver<WorkerCommand>,
    events: &'a EnvelopeSender,
    /// A new `execute` arrived while waiting, meaning the orchestrator gave
    /// up on the current transaction.
    superseded: Option<WorkerCommand>,
    closed: bool,
}

impl CellReader<'_> {
    /// Read the cells in `request`.
    ///
    /// Returns `None` once the transaction is abandoned (worker terminated
    /// or a newer execution was dispatched); the runner should return.
    pub fn get_cells(&mut self, request: CellsRequest) -> Option<Vec<JsonCell>> {
        if self.is_abandoned() {
            return None;
        }

        let sent = self.events.send(WorkerEnvelope {
            generation: self.generation,
            response: WorkerResponse::GetCells { range: request },
        });
        if sent.is_err() {
            self.closed = true;
            return None;
        }

        match self.commands.recv() {
            Ok(WorkerCommand::CellData { cells }) => Some(cells),
            Ok(cmd @ WorkerCommand::Execute { .. }) => {
                tracing::debug!("Cell read superseded by a new execution");
                self.superseded = Some(cmd);
                None
            }
            Err(_) => {
                self.closed = true;
                None
            }
        }
    }

    /// Whether the current transaction no longer has an audience.
    pub fn is_abandoned(&self) -> bool {
        self.closed || self.superseded.is_some()
    }
}

/// Handle to a worker thread.
pub struct ThreadWorker {
    commands: Option<std_mpsc::Sender<WorkerCommand>>,
}

impl ThreadWorker {
    /// Start a worker thread driving `runner`.
    pub fn spawn(runner: Arc<dyn CodeRunner>, generation: u64, events: EnvelopeSender) -> Result<Self> {
        let (tx, rx) = std_mpsc::channel();

        std::thread::Builder::new()
            .name(format!("sheetrun-worker-{}", generation))
            .spawn(move || worker_loop(runner.as_ref(), generation, rx, events))
            .map_err(|e| Error::WorkerSpawn(format!("Failed to start worker thread: {}", e)))?;

        Ok(Self { commands: Some(tx) })
    }
}

fn worker_loop(
    runner: &dyn CodeRunner,
    generation: u64,
    commands: std_mpsc::Receiver<WorkerCommand>,
    events: EnvelopeSender,
) {
    let emit = |response| events.send(WorkerEnvelope { generation, response }).is_ok();

    if !emit(WorkerResponse::Loaded) {
        return;
    }

    let mut next = commands.recv().ok();
    while let Some(cmd) = next.take() {
        match cmd {
            WorkerCommand::Execute { code, pos } => {
                let mut reader = CellReader {
                    generation,
                    commands: &commands,
                    events: &events,
                    superseded: None,
                    closed: false,
                };
                let results = runner.run(&code, &pos, &mut reader);

                if reader.closed {
                    break;
                }
                if let Some(superseded) = reader.superseded.take() {
                    next = Some(superseded);
                    continue;
                }
                if !emit(WorkerResponse::Result { results }) {
                    break;
                }
            }
            WorkerCommand::CellData { .. } => {
                tracing::warn!("Worker generation {} got cell data with no pending read", generation);
            }
        }
        next = commands.recv().ok();
    }

    tracing::debug!("Worker thread generation {} exiting", generation);
}

impl Worker for ThreadWorker {
    fn send(&mut self, cmd: WorkerCommand) -> Result<()> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| Error::Ipc("Worker has been terminated".to_string()))?;
        commands
            .send(cmd)
            .map_err(|_| Error::Ipc("Worker thread has exited".to_string()))
    }

    fn terminate(&mut self) {
        // Dropping the sender unblocks any pending read; the thread exits
        // once the runner returns.
        self.commands = None;
    }
}

/// Spawns [`ThreadWorker`]s sharing one runner.
#[derive(Clone)]
pub struct ThreadWorkerFactory {
    runner: Arc<dyn CodeRunner>,
}

impl ThreadWorkerFactory {
    pub fn new(runner: impl CodeRunner) -> Self {
        Self {
            runner: Arc::new(runner),
        }
    }
}

impl WorkerFactory for ThreadWorkerFactory {
    fn spawn(&mut self, generation: u64, events: EnvelopeSender) -> Result<Box<dyn Worker>> {
        Ok(Box::new(ThreadWorker::spawn(
            self.runner.clone(),
            generation,
            events,
        )?))
    }
}
