//! Error types for sheetrun-core.

use thiserror::Error;

/// Result type for sheetrun-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sheetrun-core.
#[derive(Debug, Error)]
pub enum Error {
    /// The orchestrator has no worker installed (never initialized, or stopped).
    #[error("orchestrator not initialized: {0}")]
    NotInitialized(String),

    /// `initialize` was called while a worker is still live.
    #[error("orchestrator already initialized; stop or restart it first")]
    AlreadyInitialized,

    /// The active transaction was requested while the queue is empty.
    #[error("no active transaction: execution queue is empty")]
    NoActiveTransaction,

    /// Relative references were already resolved against an anchor.
    #[error("parse result was already resolved against an anchor")]
    AlreadyResolved,

    /// Failed to spawn a worker.
    #[error("failed to spawn worker: {0}")]
    WorkerSpawn(String),

    /// IPC communication error with a worker.
    #[error("IPC error: {0}")]
    Ipc(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The orchestrator service task is gone.
    #[error("orchestrator service has shut down")]
    ServiceClosed,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is a programming-contract violation rather than a
    /// runtime failure.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            Error::NotInitialized(_)
                | Error::AlreadyInitialized
                | Error::NoActiveTransaction
                | Error::AlreadyResolved
        )
    }

    /// Render the error with a recovery hint for terminal output.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::NotInitialized(_) => Some("call initialize() before enqueueing code"),
            Error::AlreadyInitialized => Some("use restart() to replace a live worker"),
            Error::WorkerSpawn(_) => {
                Some("set SHEETRUN_WORKER_PATH or pass --worker with the worker binary")
            }
            Error::AlreadyResolved => Some("resolve each scan result exactly once"),
            _ => None,
        };

        match hint {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }
}
