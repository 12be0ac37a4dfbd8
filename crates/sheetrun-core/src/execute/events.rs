//! Observer notifications emitted by the orchestrator.

use serde::{Deserialize, Serialize};

/// Fire-and-forget notification for UI and peer-broadcast subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// The queue went from idle to running.
    ComputationStarted,
    /// The last queued transaction completed.
    ComputationFinished,
    /// A dispatch check ran; running positions may have changed.
    StateChanged,
    /// The worker finished starting up.
    WorkerLoaded,
    /// The worker is still starting up.
    WorkerLoading,
    /// The worker failed to start or stopped accepting commands.
    WorkerError,
}

impl OrchestratorEvent {
    /// Every notification kind.
    pub const ALL: [OrchestratorEvent; 6] = [
        OrchestratorEvent::ComputationStarted,
        OrchestratorEvent::ComputationFinished,
        OrchestratorEvent::StateChanged,
        OrchestratorEvent::WorkerLoaded,
        OrchestratorEvent::WorkerLoading,
        OrchestratorEvent::WorkerError,
    ];
}
