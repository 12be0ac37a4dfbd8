//! Grid-facing types and the collaborator interface.
//!
//! The grid model itself lives outside this crate. The orchestrator only
//! needs to read rectangles of cells mid-execution, hand back results, and
//! report which positions are currently computing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::execute::{ExecutionResult, TransactionId};

/// A cell position on a specific sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SheetPos {
    pub x: i64,
    pub y: i64,
    pub sheet_id: String,
}

impl SheetPos {
    pub fn new(sheet_id: impl Into<String>, x: i64, y: i64) -> Self {
        Self {
            x,
            y,
            sheet_id: sheet_id.into(),
        }
    }
}

impl fmt::Display for SheetPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!({}, {})", self.sheet_id, self.x, self.y)
    }
}

/// A rectangle of cells, `min` and `max` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl Rect {
    /// Build a rectangle from two corner points in any order.
    pub fn from_corners(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    pub fn width(&self) -> i64 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> i64 {
        self.max_y - self.min_y + 1
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }
}

/// One cell value as shipped to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonCell {
    pub x: i64,
    pub y: i64,
    pub value: String,
    pub type_name: String,
}

/// Failure reported by the grid while reading cells.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct GridError {
    pub message: String,
}

impl GridError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The grid/document model the orchestrator runs code against.
pub trait GridCollaborator: Send {
    /// Read the cells in `rect` on `sheet_id` for a running transaction.
    ///
    /// An error ends that transaction only.
    fn read_cells(
        &mut self,
        transaction_id: &TransactionId,
        rect: Rect,
        sheet_id: &str,
        line_number: Option<u32>,
    ) -> std::result::Result<Vec<JsonCell>, GridError>;

    /// Accept the outcome of a transaction.
    fn accept_result(&mut self, result: ExecutionResult);

    /// All queued-or-running positions changed (used for peer broadcast).
    fn running_positions_changed(&mut self, positions: &[SheetPos]);
}
