//! Data model for cell references found in code.

use serde::{Deserialize, Serialize};

/// One component of a cell position.
///
/// The scanner only produces `Relative`. `Absolute` is kept so references
/// coming from the formula grammar share the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "coord")]
pub enum Coordinate {
    Relative(i64),
    Absolute(i64),
}

impl Coordinate {
    /// Shift a `Relative` coordinate by `delta`; `Absolute` is left alone.
    pub fn offset_relative(self, delta: i64) -> Self {
        match self {
            Coordinate::Relative(v) => Coordinate::Relative(v.saturating_add(delta)),
            abs @ Coordinate::Absolute(_) => abs,
        }
    }
}

/// An (x, y) pair of coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub x: Coordinate,
    pub y: Coordinate,
}

impl CellPos {
    /// A position with both components tagged `Relative`.
    pub fn relative(x: i64, y: i64) -> Self {
        Self {
            x: Coordinate::Relative(x),
            y: Coordinate::Relative(y),
        }
    }
}

/// A reference to a single cell or a rectangular range.
///
/// Range endpoints are inclusive and not normalized: `start` may lie after
/// `end` on either axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CellRef {
    Cell { pos: CellPos },
    CellRange { start: CellPos, end: CellPos },
}

/// Half-open range of character offsets into the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A reference located in source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReference {
    pub cell_ref: CellRef,
    /// Whether the call used a relative-addressing function name, meaning the
    /// coordinates are offsets from the cell the code is attached to.
    pub is_relative_position: bool,
    pub span: Span,
}

/// Output of [`scan`](super::scan).
///
/// References are in scan order: all single-cell matches first, then all
/// range matches. The error fields are never populated by the scanner today
/// but callers check them unconditionally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    pub error_message: Option<String>,
    pub error_span: Option<Span>,
    pub references: Vec<ParsedReference>,
    /// Set once [`resolve`](super::resolve) has applied an anchor. Not part
    /// of the JSON handed to editors.
    #[serde(default, skip_serializing)]
    pub resolved: bool,
}

impl ParseResult {
    /// Whether the scan reported a syntax error.
    pub fn has_error(&self) -> bool {
        self.error_message.is_some()
    }
}
