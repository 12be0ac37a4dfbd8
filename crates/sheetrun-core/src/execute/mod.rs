//! Supervised execution of user code against the grid.
//!
//! # Architecture
//!
//! ```text
//! OrchestratorHandle (application)
//!     │  enqueue / restart / restart_from_user
//!     ▼
//! OrchestratorService task
//!     │
//!     └── Orchestrator (queue, loaded/running flags)
//!             │
//!             ├── execute ──────────► Worker (thread or process)
//!             │                         │
//!             │ ◄──────── get-cells ────┤
//!             ├── cell-data ──────────► │
//!             │ ◄──────── result ───────┘
//!             │
//!             ├── GridCollaborator (read_cells, accept_result)
//!             └── broadcast::Sender<OrchestratorEvent>
//! ```
//!
//! Exactly one transaction is in flight at a time and the queue is strict
//! FIFO, including across worker restarts.

mod events;
mod orchestrator;
mod request;
mod result;
mod service;

pub use events::OrchestratorEvent;
pub use orchestrator::Orchestrator;
pub use request::{ExecutionRequest, TransactionId};
pub use result::{BLANK_OUTPUT, ExecutionResult, NOTHING_OUTPUT_TYPE};
pub use service::{OrchestratorHandle, OrchestratorService};
