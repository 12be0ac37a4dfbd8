//! Async front-end running an orchestrator on its own task.
//!
//! The task owns the [`Orchestrator`] and is the only code that touches its
//! queue and flags. Application code talks to it through a cloneable
//! [`OrchestratorHandle`]; worker responses arrive on the envelope channel.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::grid::{GridCollaborator, SheetPos};
use crate::ipc::EnvelopeReceiver;

use super::events::OrchestratorEvent;
use super::orchestrator::Orchestrator;
use super::request::{ExecutionRequest, TransactionId};

/// Capacity of the command channel into the service task.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

enum Command {
    Initialize(oneshot::Sender<Result<()>>),
    Enqueue(ExecutionRequest, oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<()>),
    Restart(oneshot::Sender<Result<()>>),
    RestartFromUser(oneshot::Sender<Result<()>>),
    ActiveTransaction(oneshot::Sender<Result<TransactionId>>),
    RunningPositions(String, oneshot::Sender<Vec<SheetPos>>),
    CodeRunning(oneshot::Sender<Vec<SheetPos>>),
    Shutdown,
}

/// Runs an orchestrator on a tokio task.
pub struct OrchestratorService;

impl OrchestratorService {
    /// Move `orchestrator` onto a new task.
    ///
    /// The join handle yields the orchestrator back after
    /// [`OrchestratorHandle::shutdown`].
    pub fn spawn<G>(
        orchestrator: Orchestrator<G>,
        envelopes: EnvelopeReceiver,
    ) -> (OrchestratorHandle, JoinHandle<Orchestrator<G>>)
    where
        G: GridCollaborator + 'static,
    {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let handle = OrchestratorHandle {
            commands: tx,
            events: orchestrator.event_sender(),
        };

        let task = tokio::spawn(run(orchestrator, rx, envelopes));
        (handle, task)
    }
}

async fn run<G: GridCollaborator>(
    mut orchestrator: Orchestrator<G>,
    mut commands: mpsc::Receiver<Command>,
    mut envelopes: EnvelopeReceiver,
) -> Orchestrator<G> {
    loop {
        tokio::select! {
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => handle_command(&mut orchestrator, cmd),
                }
            }
            Some(envelope) = envelopes.recv() => {
                orchestrator.handle_envelope(envelope);
            }
        }
    }

    tracing::debug!("Orchestrator service shutting down");
    orchestrator.stop();
    orchestrator
}

fn handle_command<G: GridCollaborator>(orchestrator: &mut Orchestrator<G>, cmd: Command) {
    // A dropped reply channel means the caller stopped waiting.
    match cmd {
        Command::Initialize(reply) => {
            let _ = reply.send(orchestrator.initialize());
        }
        Command::Enqueue(request, reply) => {
            let _ = reply.send(orchestrator.enqueue(request));
        }
        Command::Stop(reply) => {
            orchestrator.stop();
            let _ = reply.send(());
        }
        Command::Restart(reply) => {
            let _ = reply.send(orchestrator.restart());
        }
        Command::RestartFromUser(reply) => {
            let _ = reply.send(orchestrator.restart_from_user());
        }
        Command::ActiveTransaction(reply) => {
            let _ = reply.send(orchestrator.active_transaction_id().cloned());
        }
        Command::RunningPositions(sheet_id, reply) => {
            let _ = reply.send(orchestrator.running_positions(&sheet_id));
        }
        Command::CodeRunning(reply) => {
            let _ = reply.send(orchestrator.code_running());
        }
        Command::Shutdown => {}
    }
}

/// Cloneable handle to a running [`OrchestratorService`].
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl OrchestratorHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| Error::ServiceClosed)?;
        rx.await.map_err(|_| Error::ServiceClosed)
    }

    /// Subscribe to observer notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub async fn initialize(&self) -> Result<()> {
        self.request(Command::Initialize).await?
    }

    pub async fn enqueue(&self, request: ExecutionRequest) -> Result<()> {
        self.request(|tx| Command::Enqueue(request, tx)).await?
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    pub async fn restart(&self) -> Result<()> {
        self.request(Command::Restart).await?
    }

    pub async fn restart_from_user(&self) -> Result<()> {
        self.request(Command::RestartFromUser).await?
    }

    pub async fn active_transaction_id(&self) -> Result<TransactionId> {
        self.request(Command::ActiveTransaction).await?
    }

    pub async fn running_positions(&self, sheet_id: impl Into<String>) -> Result<Vec<SheetPos>> {
        let sheet_id = sheet_id.into();
        self.request(|tx| Command::RunningPositions(sheet_id, tx))
            .await
    }

    pub async fn code_running(&self) -> Result<Vec<SheetPos>> {
        self.request(Command::CodeRunning).await
    }

    /// Stop the service task. The worker is terminated.
    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| Error::ServiceClosed)
    }
}
