//! Orchestrator configuration and worker binary discovery.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable pointing at the worker binary.
pub const WORKER_PATH_ENV: &str = "SHEETRUN_WORKER_PATH";

/// Name of the worker binary looked up next to the executable and on `PATH`.
pub const WORKER_BINARY: &str = if cfg!(windows) {
    "sheetrun-worker.exe"
} else {
    "sheetrun-worker"
};

/// Default capacity of the observer broadcast channel.
/// Slow subscribers lose the oldest notifications past this point.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Message reported for a transaction cancelled through `restart_from_user`.
pub const DEFAULT_CANCEL_MESSAGE: &str = "execution cancelled by user";

/// Settings for an [`Orchestrator`](crate::execute::Orchestrator).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Capacity of the observer broadcast channel.
    pub event_capacity: usize,
    /// Error message attached to user-cancelled transactions.
    pub cancel_message: String,
    /// Explicit worker binary; discovered when unset.
    pub worker_path: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            cancel_message: DEFAULT_CANCEL_MESSAGE.to_string(),
            worker_path: None,
        }
    }
}

impl OrchestratorConfig {
    /// Parse a configuration from JSON, filling unset fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Locate the worker binary.
    ///
    /// Looks in the following order:
    /// 1. `worker_path` from this config
    /// 2. `SHEETRUN_WORKER_PATH` environment variable
    /// 3. Same directory as the current executable
    /// 4. System PATH
    pub fn find_worker_binary(&self) -> Result<PathBuf> {
        if let Some(path) = &self.worker_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(Error::WorkerSpawn(format!(
                "configured worker binary '{}' does not exist",
                path.display()
            )));
        }

        if let Ok(path) = std::env::var(WORKER_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(path);
            }
            tracing::warn!(
                "{} points at missing file '{}'",
                WORKER_PATH_ENV,
                path.display()
            );
        }

        if let Ok(exe_path) = std::env::current_exe()
            && let Some(exe_dir) = exe_path.parent()
        {
            let worker_path = exe_dir.join(WORKER_BINARY);
            if worker_path.exists() {
                return Ok(worker_path);
            }
        }

        if let Ok(path) = which::which(WORKER_BINARY) {
            return Ok(path);
        }

        Err(Error::WorkerSpawn(format!(
            "could not find {}. Set {} or ensure it's in PATH.",
            WORKER_BINARY, WORKER_PATH_ENV
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.cancel_message, "execution cancelled by user");
        assert!(config.worker_path.is_none());
    }

    #[test]
    fn test_partial_json() {
        let config = OrchestratorConfig::from_json(r#"{ "event_capacity": 8 }"#).unwrap();
        assert_eq!(config.event_capacity, 8);
        assert_eq!(config.cancel_message, DEFAULT_CANCEL_MESSAGE);
    }

    #[test]
    fn test_missing_configured_worker() {
        let config = OrchestratorConfig {
            worker_path: Some(PathBuf::from("/definitely/not/here/sheetrun-worker")),
            ..OrchestratorConfig::default()
        };
        let err = config.find_worker_binary().unwrap_err();
        assert!(matches!(err, Error::WorkerSpawn(_)));
    }
}
