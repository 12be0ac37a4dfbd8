//! Run command: execute one code file against an empty grid.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use sheetrun_core::grid::{GridCollaborator, GridError, JsonCell, Rect, SheetPos};
use sheetrun_core::ipc::ProcessWorkerFactory;
use sheetrun_core::{
    ExecutionRequest, ExecutionResult, Orchestrator, OrchestratorConfig, OrchestratorEvent,
    OrchestratorService, TransactionId,
};
use tokio::sync::broadcast::error::RecvError;

/// A grid with no cell values that keeps the results it is given.
#[derive(Default)]
struct EmptyGrid {
    results: Vec<ExecutionResult>,
}

impl GridCollaborator for EmptyGrid {
    fn read_cells(
        &mut self,
        transaction_id: &TransactionId,
        rect: Rect,
        sheet_id: &str,
        _line_number: Option<u32>,
    ) -> Result<Vec<JsonCell>, GridError> {
        tracing::debug!(
            "Transaction {} read {}x{} cells on {}",
            transaction_id,
            rect.width(),
            rect.height(),
            sheet_id
        );
        Ok(Vec::new())
    }

    fn accept_result(&mut self, result: ExecutionResult) {
        self.results.push(result);
    }

    fn running_positions_changed(&mut self, positions: &[SheetPos]) {
        tracing::debug!("{} cells running", positions.len());
    }
}

/// Run `path` as the code of cell (`x`, `y`) on `sheet` and print the result.
pub async fn execute(
    path: &Path,
    sheet: &str,
    x: i64,
    y: i64,
    worker: Option<PathBuf>,
) -> anyhow::Result<()> {
    let code = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let config = OrchestratorConfig {
        worker_path: worker,
        ..OrchestratorConfig::default()
    };
    let factory = ProcessWorkerFactory::from_config(&config)?;
    tracing::debug!("Using worker {}", factory.path().display());

    let (orchestrator, envelopes) = Orchestrator::new(config, factory, EmptyGrid::default());
    let (handle, task) = OrchestratorService::spawn(orchestrator, envelopes);
    let mut events = handle.subscribe();

    let transaction_id = uuid::Uuid::new_v4().to_string();
    handle.initialize().await?;
    handle
        .enqueue(ExecutionRequest::new(
            transaction_id.as_str(),
            SheetPos::new(sheet, x, y),
            code,
        ))
        .await?;

    loop {
        match events.recv().await {
            Ok(OrchestratorEvent::ComputationFinished) => break,
            Ok(OrchestratorEvent::WorkerError) => {
                handle.shutdown().await?;
                bail!("worker failed while running {}", path.display());
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => bail!("orchestrator stopped before finishing"),
        }
    }

    handle.shutdown().await?;
    let orchestrator = task.await.context("orchestrator task panicked")?;

    let Some(result) = orchestrator.grid().results.first() else {
        bail!("no result for transaction {}", transaction_id);
    };
    println!("{}", serde_json::to_string_pretty(result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
