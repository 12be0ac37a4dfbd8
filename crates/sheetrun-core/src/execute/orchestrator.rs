//! Single-flight supervisor for code execution.
//!
//! The orchestrator owns the FIFO queue of pending executions and the one
//! live worker. It is event driven: callers enqueue requests, and worker
//! responses are fed back through [`Orchestrator::handle_envelope`] in the
//! order they were received. Nothing here blocks.

use std::collections::VecDeque;

use tokio::sync::{broadcast, mpsc};

use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::grid::{GridCollaborator, SheetPos};
use crate::ipc::{
    CellsRequest, EnvelopeReceiver, EnvelopeSender, Worker, WorkerCommand, WorkerEnvelope,
    WorkerFactory, WorkerResponse, WorkerResult,
};

use super::events::OrchestratorEvent;
use super::request::{ExecutionRequest, TransactionId};
use super::result::ExecutionResult;

/// Supervises execution of queued code against a grid.
pub struct Orchestrator<G: GridCollaborator> {
    config: OrchestratorConfig,
    /// Creates a fresh worker on initialize/restart.
    factory: Box<dyn WorkerFactory>,
    /// The live worker, if any.
    worker: Option<Box<dyn Worker>>,
    /// Generation of the live worker; older envelopes are stale.
    generation: u64,
    /// The live worker reported `loaded`.
    loaded: bool,
    /// The head of the queue has been sent to the worker.
    running: bool,
    /// Pending executions; only the head may be in flight.
    queue: VecDeque<ExecutionRequest>,
    grid: G,
    /// Handed to each spawned worker for its responses.
    envelopes: EnvelopeSender,
    /// Observer notifications.
    events: broadcast::Sender<OrchestratorEvent>,
}

impl<G: GridCollaborator> Orchestrator<G> {
    /// Create an orchestrator with no worker yet.
    ///
    /// Returns the receiving end of the worker response channel. Every
    /// envelope received on it must be passed to [`handle_envelope`]
    /// (the [`OrchestratorService`](super::OrchestratorService) does this).
    ///
    /// [`handle_envelope`]: Orchestrator::handle_envelope
    pub fn new(
        config: OrchestratorConfig,
        factory: impl WorkerFactory + 'static,
        grid: G,
    ) -> (Self, EnvelopeReceiver) {
        let (envelopes, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let orchestrator = Self {
            config,
            factory: Box::new(factory),
            worker: None,
            generation: 0,
            loaded: false,
            running: false,
            queue: VecDeque::new(),
            grid,
            envelopes,
            events,
        };

        (orchestrator, rx)
    }

    /// Subscribe to observer notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<OrchestratorEvent> {
        self.events.clone()
    }

    /// Spawn a fresh worker.
    ///
    /// The worker starts unloaded; queued work is dispatched once it
    /// reports `loaded`.
    pub fn initialize(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        self.generation += 1;
        self.loaded = false;
        // A new worker has nothing in flight.
        self.running = false;

        let worker = self
            .factory
            .spawn(self.generation, self.envelopes.clone())?;
        self.worker = Some(worker);

        tracing::debug!("Initialized worker generation {}", self.generation);
        Ok(())
    }

    /// Append a request to the queue and dispatch it if the worker is idle.
    pub fn enqueue(&mut self, request: ExecutionRequest) -> Result<()> {
        if self.worker.is_none() {
            return Err(Error::NotInitialized(format!(
                "cannot enqueue transaction {}",
                request.transaction_id
            )));
        }

        tracing::debug!(
            "Enqueued transaction {} at {}",
            request.transaction_id,
            request.sheet_pos
        );
        self.queue.push_back(request);
        self.dispatch(false);
        Ok(())
    }

    /// The transaction at the head of the queue.
    pub fn active_transaction_id(&self) -> Result<&TransactionId> {
        self.queue
            .front()
            .map(|request| &request.transaction_id)
            .ok_or(Error::NoActiveTransaction)
    }

    /// Queued-or-running positions on `sheet_id`, in queue order.
    pub fn running_positions(&self, sheet_id: &str) -> Vec<SheetPos> {
        self.queue
            .iter()
            .filter(|request| request.sheet_pos.sheet_id == sheet_id)
            .map(|request| request.sheet_pos.clone())
            .collect()
    }

    /// All queued-or-running positions, in queue order.
    pub fn code_running(&self) -> Vec<SheetPos> {
        self.queue
            .iter()
            .map(|request| request.sheet_pos.clone())
            .collect()
    }

    /// Terminate the worker immediately.
    ///
    /// Whatever the worker was computing is abandoned; the queue is kept.
    pub fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            tracing::debug!("Terminating worker generation {}", self.generation);
            worker.terminate();
        }
        self.loaded = false;
    }

    /// Replace the worker with a fresh one, keeping the queue.
    pub fn restart(&mut self) -> Result<()> {
        self.stop();
        self.initialize()
    }

    /// Cancel the active transaction by restarting the worker.
    ///
    /// The cancelled transaction is reported to the grid as a failure and
    /// the rest of the queue runs once the new worker loads.
    pub fn restart_from_user(&mut self) -> Result<()> {
        let transaction_id = self.active_transaction_id()?.clone();
        tracing::info!("Cancelling transaction {} at user request", transaction_id);

        self.restart()?;

        let result = ExecutionResult::cancelled(transaction_id, self.config.cancel_message.clone());
        self.complete(result);
        Ok(())
    }

    /// Handle one response from a worker.
    pub fn handle_envelope(&mut self, envelope: WorkerEnvelope) {
        if self.worker.is_none() || envelope.generation != self.generation {
            tracing::warn!(
                "Dropping '{}' from stale worker generation {} (current {})",
                envelope.response.kind(),
                envelope.generation,
                self.generation
            );
            return;
        }

        match envelope.response {
            WorkerResponse::Loaded => {
                self.notify(OrchestratorEvent::WorkerLoaded);
                self.loaded = true;
                self.dispatch(false);
            }
            WorkerResponse::Loading => {
                self.notify(OrchestratorEvent::WorkerLoading);
            }
            WorkerResponse::Error { message } => {
                tracing::warn!(
                    "Worker reported an error: {}",
                    message.as_deref().unwrap_or("(no message)")
                );
                self.notify(OrchestratorEvent::WorkerError);
            }
            WorkerResponse::GetCells { range } => self.handle_get_cells(range),
            WorkerResponse::Result { results } => self.handle_result(results),
        }
    }

    fn handle_get_cells(&mut self, range: CellsRequest) {
        let Some(head) = self.queue.front() else {
            tracing::error!("Worker requested cells with no active transaction");
            return;
        };

        let transaction_id = head.transaction_id.clone();
        let sheet_id = range
            .sheet
            .clone()
            .unwrap_or_else(|| head.sheet_pos.sheet_id.clone());

        match self
            .grid
            .read_cells(&transaction_id, range.rect(), &sheet_id, range.line_number)
        {
            Ok(cells) => self.send(WorkerCommand::CellData { cells }),
            Err(e) => {
                tracing::warn!(
                    "Reading cells for transaction {} failed: {}",
                    transaction_id,
                    e
                );
                let result = ExecutionResult::failed(transaction_id, e.message, range.line_number);
                self.complete(result);
            }
        }
    }

    fn handle_result(&mut self, results: WorkerResult) {
        let Some(head) = self.queue.front() else {
            tracing::error!("Worker sent a result with no active transaction");
            return;
        };

        let result = ExecutionResult::from_worker(head.transaction_id.clone(), results);
        tracing::debug!(
            "Transaction {} completed (success: {})",
            result.transaction_id,
            result.success
        );
        self.complete(result);
    }

    /// Report the active transaction's outcome and move to the next one.
    fn complete(&mut self, result: ExecutionResult) {
        self.grid.accept_result(result);
        self.running = false;
        self.queue.pop_front();
        self.dispatch(true);
    }

    /// Send the head of the queue to the worker if it is ready for it.
    fn dispatch(&mut self, completed: bool) {
        if completed {
            self.running = false;
            // Observers learn the queue drained even if no worker is loaded.
            if self.queue.is_empty() {
                self.notify(OrchestratorEvent::ComputationFinished);
            }
        }

        if self.worker.is_none() || !self.loaded || self.running {
            self.state_changed();
            return;
        }

        if let Some(head) = self.queue.front() {
            let cmd = WorkerCommand::Execute {
                code: head.code.clone(),
                pos: head.sheet_pos.clone(),
            };
            tracing::debug!("Dispatching transaction {}", head.transaction_id);

            self.running = true;
            self.notify(OrchestratorEvent::ComputationStarted);
            self.send(cmd);
        }

        self.state_changed();
    }

    fn state_changed(&mut self) {
        self.notify(OrchestratorEvent::StateChanged);
        let positions = self.code_running();
        self.grid.running_positions_changed(&positions);
    }

    fn send(&mut self, cmd: WorkerCommand) {
        let Some(worker) = self.worker.as_mut() else {
            return;
        };
        if let Err(e) = worker.send(cmd) {
            // The queue stalls until a restart.
            tracing::error!("Failed to send command to worker: {}", e);
            self.notify(OrchestratorEvent::WorkerError);
        }
    }

    fn notify(&self, event: OrchestratorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Whether a transaction is currently in flight.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a worker is installed.
    pub fn is_initialized(&self) -> bool {
        self.worker.is_some()
    }

    /// Number of queued transactions, including the active one.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Generation of the current (or most recent) worker.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn grid(&self) -> &G {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut G {
        &mut self.grid
    }
}

impl<G: GridCollaborator> Drop for Orchestrator<G> {
    fn drop(&mut self) {
        self.stop();
    }
}
