//! Inter-process communication with workers of execution.
//!
//! This module provides the message protocol and the two worker backends:
//! child processes speaking framed JSON over stdin/stdout, and in-process
//! threads driving a [`CodeRunner`].

pub mod protocol;
mod thread;
mod worker;

pub use protocol::{
    CellsRequest, WorkerCommand, WorkerResponse, WorkerResult, read_message, write_message,
};
pub use thread::{CellReader, CodeRunner, ThreadWorker, ThreadWorkerFactory};
pub use worker::{
    EnvelopeReceiver, EnvelopeSender, ProcessWorker, ProcessWorkerFactory, Worker,
    WorkerEnvelope, WorkerFactory,
};
