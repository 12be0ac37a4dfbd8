//! IPC protocol messages for sheetrun workers.
//!
//! Messages are JSON objects tagged by a `"type"` field. Process workers
//! frame them over stdin/stdout as a 4-byte length (u32 LE) followed by the
//! JSON body.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::{JsonCell, Rect, SheetPos};

/// Frames larger than this are rejected (100MB).
pub const MAX_MESSAGE_LEN: usize = 100 * 1024 * 1024;

/// Command sent from the orchestrator to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerCommand {
    /// Run code for the transaction at the head of the queue.
    Execute {
        /// Source code to run.
        code: String,
        /// Cell the code is attached to.
        pos: SheetPos,
    },

    /// Answer to a pending `get-cells` request.
    CellData {
        /// Cells in the requested rectangle.
        cells: Vec<JsonCell>,
    },
}

/// Rectangle requested by a worker mid-execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellsRequest {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
    /// Sheet to read from; the running transaction's sheet when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    /// Source line that issued the read, for error reporting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

impl CellsRequest {
    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.x0, self.y0, self.x1, self.y1)
    }
}

/// Raw completion payload produced by a worker.
///
/// Normalized into an [`ExecutionResult`](crate::execute::ExecutionResult)
/// before it reaches the grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub success: bool,
    #[serde(default)]
    pub std_out: Option<String>,
    #[serde(default)]
    pub std_err: Option<String>,
    /// Scalar output as `(value, type name)`.
    #[serde(default)]
    pub output: Option<(String, String)>,
    /// Array output, either flat or a list of rows.
    #[serde(default)]
    pub array_output: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub output_type: Option<String>,
    /// `[rows, cols]` of the array output.
    #[serde(default)]
    pub output_size: Option<[u32; 2]>,
    #[serde(default)]
    pub lineno: Option<u32>,
    #[serde(default)]
    pub error_msg: Option<String>,
    #[serde(default, rename = "input_python_stack_trace")]
    pub stack_trace: Option<String>,
    #[serde(default)]
    pub cancel_compute: Option<bool>,
}

/// Message sent from a worker to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerResponse {
    /// The worker finished starting up and can execute code.
    Loaded,

    /// The worker is still starting up.
    Loading,

    /// The worker failed to start.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Running code wants to read cells.
    GetCells { range: CellsRequest },

    /// The active transaction finished.
    Result { results: WorkerResult },
}

impl WorkerResponse {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerResponse::Loaded => "loaded",
            WorkerResponse::Loading => "loading",
            WorkerResponse::Error { .. } => "error",
            WorkerResponse::GetCells { .. } => "get-cells",
            WorkerResponse::Result { .. } => "result",
        }
    }
}

/// Write a message as a length-prefixed JSON frame.
pub fn write_message<W: Write>(writer: &mut W, message: &impl Serialize) -> Result<()> {
    let bytes = serde_json::to_vec(message)?;

    let len = u32::try_from(bytes.len())
        .ok()
        .filter(|&len| len as usize <= MAX_MESSAGE_LEN)
        .ok_or_else(|| Error::Ipc(format!("IPC message too large: {} bytes", bytes.len())))?;

    writer
        .write_all(&len.to_le_bytes())
        .map_err(|e| Error::Ipc(format!("Failed to write IPC message length: {}", e)))?;
    writer
        .write_all(&bytes)
        .map_err(|e| Error::Ipc(format!("Failed to write IPC message body: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::Ipc(format!("Failed to flush IPC stream: {}", e)))?;

    Ok(())
}

/// Read one length-prefixed JSON frame.
pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .map_err(|e| Error::Ipc(format!("Failed to read IPC message length: {}", e)))?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_LEN {
        return Err(Error::Ipc(format!("IPC message too large: {} bytes", len)));
    }

    let mut bytes = vec![0u8; len];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| Error::Ipc(format!("Failed to read IPC message body: {}", e)))?;

    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn test_execute_wire_shape() {
        let cmd = WorkerCommand::Execute {
            code: "cell(0, 0)".to_string(),
            pos: SheetPos::new("sheet-1", 3, 4),
        };
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({
                "type": "execute",
                "code": "cell(0, 0)",
                "pos": { "x": 3, "y": 4, "sheet_id": "sheet-1" }
            })
        );
    }

    #[test]
    fn test_cell_data_wire_shape() {
        let cmd = WorkerCommand::CellData {
            cells: vec![JsonCell {
                x: 0,
                y: 1,
                value: "42".to_string(),
                type_name: "number".to_string(),
            }],
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["type"], "cell-data");
        assert_eq!(value["cells"][0]["value"], "42");
    }

    #[test]
    fn test_get_cells_without_sheet() {
        let msg: WorkerResponse = serde_json::from_value(json!({
            "type": "get-cells",
            "range": { "x0": 2, "y0": 0, "x1": 0, "y1": 3 }
        }))
        .unwrap();

        match msg {
            WorkerResponse::GetCells { range } => {
                assert!(range.sheet.is_none());
                assert!(range.line_number.is_none());
                assert_eq!(range.rect(), Rect::from_corners(0, 0, 2, 3));
            }
            other => panic!("Wrong response type: {:?}", other),
        }
    }

    #[test]
    fn test_result_parses_sparse_payload() {
        let msg: WorkerResponse = serde_json::from_value(json!({
            "type": "result",
            "results": {
                "success": false,
                "input_python_stack_trace": "Traceback: boom",
                "lineno": 3
            }
        }))
        .unwrap();

        match msg {
            WorkerResponse::Result { results } => {
                assert!(!results.success);
                assert_eq!(results.stack_trace.as_deref(), Some("Traceback: boom"));
                assert_eq!(results.lineno, Some(3));
                assert!(results.array_output.is_none());
            }
            other => panic!("Wrong response type: {:?}", other),
        }
    }

    #[test]
    fn test_lifecycle_messages() {
        let loaded: WorkerResponse = serde_json::from_str(r#"{"type":"loaded"}"#).unwrap();
        assert_eq!(loaded, WorkerResponse::Loaded);

        let error: WorkerResponse = serde_json::from_str(r#"{"type":"error"}"#).unwrap();
        assert_eq!(error, WorkerResponse::Error { message: None });
        assert_eq!(error.kind(), "error");
    }

    #[test]
    fn test_frame_roundtrip() {
        let resp = WorkerResponse::GetCells {
            range: CellsRequest {
                x0: 0,
                y0: 0,
                x1: 1,
                y1: 1,
                sheet: Some("other".to_string()),
                line_number: Some(7),
            },
        };

        let mut buf = Vec::new();
        write_message(&mut buf, &resp).unwrap();
        assert_eq!(
            u32::from_le_bytes(buf[..4].try_into().unwrap()) as usize,
            buf.len() - 4
        );

        let mut cursor = Cursor::new(buf);
        let decoded: WorkerResponse = read_message(&mut cursor).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut buf = ((MAX_MESSAGE_LEN + 1) as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(b"{}");

        let mut cursor = Cursor::new(buf);
        let err = read_message::<_, WorkerResponse>(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::Ipc(msg) if msg.contains("too large")));
    }

    #[test]
    fn test_truncated_frame() {
        let mut cursor = Cursor::new(vec![10u8, 0, 0, 0, b'{']);
        let err = read_message::<_, WorkerResponse>(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::Ipc(_)));
    }
}
