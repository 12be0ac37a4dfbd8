//! Core engine for sheetrun.
//!
//! This crate provides:
//! - A scanner locating cell references inside user code
//! - An orchestrator running queued code through an isolated worker
//! - The worker message protocol with thread and process backends

pub mod config;
pub mod error;
pub mod execute;
pub mod grid;
pub mod ipc;
pub mod reference;

pub use config::OrchestratorConfig;
pub use error::{Error, Result};
pub use execute::{
    ExecutionRequest, ExecutionResult, Orchestrator, OrchestratorEvent, OrchestratorHandle,
    OrchestratorService, TransactionId,
};
pub use grid::{GridCollaborator, GridError, JsonCell, Rect, SheetPos};
pub use reference::{ParseResult, resolve, scan};
