//! Cell references embedded in user code.
//!
//! The scanner is a pure text pass used to highlight the cells a piece of
//! code mentions. It knows nothing about the cell the code is attached to;
//! callers apply that anchor afterwards with [`resolve`].
//!
//! ```
//! use sheetrun_core::reference::{CellRef, CellPos, resolve, scan};
//!
//! let parsed = scan("total = rc(0, -1) + cell(4, 4)");
//! let resolved = resolve(&parsed, (3, 3)).unwrap();
//!
//! assert_eq!(
//!     resolved.references[0].cell_ref,
//!     CellRef::Cell { pos: CellPos::relative(3, 2) }
//! );
//! ```

mod scanner;
mod types;

pub use scanner::{
    CELL_FUNCTIONS, RANGE_FUNCTIONS, RELATIVE_CELL_FUNCTIONS, resolve, scan, text_len,
};
pub use types::{CellPos, CellRef, Coordinate, ParseResult, ParsedReference, Span};
