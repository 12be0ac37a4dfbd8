//! Execution requests and transaction identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grid::SheetPos;

/// Opaque identifier of one execution transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Code waiting to run against the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub transaction_id: TransactionId,
    pub sheet_pos: SheetPos,
    pub code: String,
}

impl ExecutionRequest {
    pub fn new(
        transaction_id: impl Into<TransactionId>,
        sheet_pos: SheetPos,
        code: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            sheet_pos,
            code: code.into(),
        }
    }
}
