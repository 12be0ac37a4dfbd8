//! Normalized transaction results handed to the grid.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ipc::WorkerResult;

use super::request::TransactionId;

/// Output type a worker reports when the code produced no value.
pub const NOTHING_OUTPUT_TYPE: &str = "NoneType";

/// Canonical `(value, type)` pair for an empty output.
pub const BLANK_OUTPUT: (&str, &str) = ("", "blank");

/// Outcome of one transaction, in the shape the grid accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub transaction_id: TransactionId,
    pub success: bool,
    pub error_msg: Option<String>,
    pub std_out: Option<String>,
    pub std_err: Option<String>,
    /// Scalar output as `(value, type name)`.
    pub output: Option<(String, String)>,
    /// Array output, always a list of rows.
    pub array_output: Option<Vec<Vec<Value>>>,
    pub line_number: Option<u32>,
    /// Human-readable output type, prefixed with `{rows}x{cols}` for arrays.
    pub output_type: Option<String>,
    pub cancel_compute: bool,
}

impl ExecutionResult {
    /// Normalize a worker's completion payload.
    pub fn from_worker(transaction_id: TransactionId, raw: WorkerResult) -> Self {
        let nothing_returned = raw.output_type.as_deref() == Some(NOTHING_OUTPUT_TYPE)
            && raw
                .output
                .as_ref()
                .is_none_or(|(value, _)| value.trim().is_empty());

        let (output, array_output) = if nothing_returned {
            (
                Some((BLANK_OUTPUT.0.to_string(), BLANK_OUTPUT.1.to_string())),
                None,
            )
        } else {
            (raw.output, raw.array_output.map(into_rows))
        };

        let error_msg = if raw.success {
            raw.error_msg
        } else {
            raw.stack_trace
        };

        let output_type = match raw.output_size {
            Some([rows, cols]) => Some(
                format!("{}x{} {}", rows, cols, raw.output_type.unwrap_or_default())
                    .trim_end()
                    .to_string(),
            ),
            None => raw.output_type,
        };

        Self {
            transaction_id,
            success: raw.success,
            error_msg,
            std_out: raw.std_out,
            std_err: raw.std_err,
            output,
            array_output,
            line_number: raw.lineno,
            output_type,
            cancel_compute: raw.cancel_compute.unwrap_or(false),
        }
    }

    /// A failed result with no output.
    pub fn failed(
        transaction_id: TransactionId,
        message: impl Into<String>,
        line_number: Option<u32>,
    ) -> Self {
        Self {
            transaction_id,
            success: false,
            error_msg: Some(message.into()),
            std_out: None,
            std_err: None,
            output: None,
            array_output: None,
            line_number,
            output_type: None,
            cancel_compute: false,
        }
    }

    /// The result reported for a transaction the user cancelled.
    pub fn cancelled(transaction_id: TransactionId, message: impl Into<String>) -> Self {
        Self {
            output_type: Some(String::new()),
            cancel_compute: true,
            ..Self::failed(transaction_id, message, None)
        }
    }
}

/// Make an array payload uniformly 2-D. A flat list becomes a single column.
fn into_rows(values: Vec<Value>) -> Vec<Vec<Value>> {
    let is_flat = values.first().is_some_and(|first| !first.is_array());

    values
        .into_iter()
        .map(|value| match value {
            Value::Array(row) if !is_flat => row,
            other => vec![other],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id() -> TransactionId {
        TransactionId::new("tx-1")
    }

    #[test]
    fn test_nothing_returned_becomes_blank() {
        let raw = WorkerResult {
            success: true,
            output: Some(("  ".to_string(), "NoneType".to_string())),
            array_output: Some(vec![json!(1)]),
            output_type: Some("NoneType".to_string()),
            ..WorkerResult::default()
        };

        let result = ExecutionResult::from_worker(id(), raw);
        assert_eq!(result.output, Some(("".to_string(), "blank".to_string())));
        assert!(result.array_output.is_none());
    }

    #[test]
    fn test_none_type_with_text_is_kept() {
        let raw = WorkerResult {
            success: true,
            output: Some(("None".to_string(), "NoneType".to_string())),
            output_type: Some("NoneType".to_string()),
            ..WorkerResult::default()
        };

        let result = ExecutionResult::from_worker(id(), raw);
        assert_eq!(result.output.unwrap().0, "None");
    }

    #[test]
    fn test_flat_array_becomes_column() {
        let raw = WorkerResult {
            success: true,
            array_output: Some(vec![json!(1), json!("two"), json!(3.5)]),
            output_type: Some("list".to_string()),
            output_size: Some([3, 1]),
            ..WorkerResult::default()
        };

        let result = ExecutionResult::from_worker(id(), raw);
        assert_eq!(
            result.array_output.unwrap(),
            vec![vec![json!(1)], vec![json!("two")], vec![json!(3.5)]]
        );
        assert_eq!(result.output_type.as_deref(), Some("3x1 list"));
    }

    #[test]
    fn test_two_dimensional_array_untouched() {
        let raw = WorkerResult {
            success: true,
            array_output: Some(vec![json!([1, 2]), json!([3, 4])]),
            ..WorkerResult::default()
        };

        let result = ExecutionResult::from_worker(id(), raw);
        assert_eq!(
            result.array_output.unwrap(),
            vec![vec![json!(1), json!(2)], vec![json!(3), json!(4)]]
        );
        assert!(result.output_type.is_none());
    }

    #[test]
    fn test_failure_uses_stack_trace() {
        let raw = WorkerResult {
            success: false,
            error_msg: Some("short".to_string()),
            stack_trace: Some("Traceback (most recent call last): ...".to_string()),
            lineno: Some(4),
            ..WorkerResult::default()
        };

        let result = ExecutionResult::from_worker(id(), raw);
        assert!(!result.success);
        assert_eq!(
            result.error_msg.as_deref(),
            Some("Traceback (most recent call last): ...")
        );
        assert_eq!(result.line_number, Some(4));
    }

    #[test]
    fn test_cancelled_result() {
        let result = ExecutionResult::cancelled(id(), "execution cancelled by user");
        assert!(!result.success);
        assert!(result.cancel_compute);
        assert!(result.output.is_none());
        assert!(result.array_output.is_none());
        assert_eq!(
            result.error_msg.as_deref(),
            Some("execution cancelled by user")
        );
    }
}
