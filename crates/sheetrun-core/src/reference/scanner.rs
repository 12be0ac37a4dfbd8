//! Regex scanner for cell-access calls embedded in code.
//!
//! Recognizes calls such as `cell(1, 2)`, `rc(0, -1)` and
//! `cells((0, 0), (2, 3))` anywhere in free-form source text. The grammar is
//! deliberately narrow: integer literals only, no nested expressions.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::{Error, Result};

use super::types::{CellPos, CellRef, Coordinate, ParseResult, ParsedReference, Span};

/// Single-cell functions whose coordinates are document positions.
pub const CELL_FUNCTIONS: &[&str] = &["cell", "getCell"];

/// Single-cell functions whose coordinates are offsets from the anchor cell.
pub const RELATIVE_CELL_FUNCTIONS: &[&str] = &["rel_cell", "rc", "c"];

/// Range functions. Ranges are always written in document coordinates.
pub const RANGE_FUNCTIONS: &[&str] = &["cells", "getCells"];

/// Characters that may directly precede a function name.
const BOUNDARY_CHARS: &[char] = &[
    ';', '.', '+', '-', '*', '/', '(', ')', '[', ']', '<', '>', '=', '!', '&', '|', '^', '%',
];

const INT: &str = r"(-?\d+)";

fn single_cell_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let names = alternation(&[CELL_FUNCTIONS, RELATIVE_CELL_FUNCTIONS].concat());
        Regex::new(&format!(r"({names})\(\s*{INT}\s*,\s*{INT}\s*\)"))
            .expect("single-cell pattern is valid")
    })
}

fn range_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let names = alternation(RANGE_FUNCTIONS);
        let pair = format!(r"\(\s*{INT}\s*,\s*{INT}\s*\)");
        // Groups 2-5: cells((x0, y0), (x1, y1)); groups 6-9: cells(x0, y0)(x1, y1).
        let nested = format!(r"\(\s*{pair}\s*,\s*{pair}\s*\)");
        let juxtaposed = format!(r"\(\s*{INT}\s*,\s*{INT}\s*\)\s*{pair}");
        Regex::new(&format!(r"({names})(?:{nested}|{juxtaposed})"))
            .expect("range pattern is valid")
    })
}

/// Build a regex alternation, longest names first so that leftmost-first
/// matching never settles on a prefix (`c` before `cell`).
fn alternation(names: &[&str]) -> String {
    let mut sorted: Vec<&str> = names.to_vec();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    sorted
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|")
}

fn is_boundary(c: char) -> bool {
    c.is_whitespace() || BOUNDARY_CHARS.contains(&c)
}

/// Whether the match starting at `byte_start` follows start-of-text or a
/// boundary character.
fn preceded_by_boundary(text: &str, byte_start: usize) -> bool {
    text[..byte_start].chars().next_back().is_none_or(is_boundary)
}

/// Converts increasing byte offsets into character offsets without
/// rescanning the text from the start each time.
struct CharCursor<'a> {
    text: &'a str,
    byte: usize,
    chars: usize,
}

impl<'a> CharCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            byte: 0,
            chars: 0,
        }
    }

    fn advance_to(&mut self, byte: usize) -> usize {
        debug_assert!(byte >= self.byte);
        self.chars += self.text[self.byte..byte].chars().count();
        self.byte = byte;
        self.chars
    }
}

fn parse_int(caps: &Captures<'_>, group: usize) -> Option<i64> {
    let literal = caps.get(group)?.as_str();
    match literal.parse::<i64>() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Skipping cell reference with literal '{}': {}", literal, e);
            None
        }
    }
}

fn parse_pos(caps: &Captures<'_>, x_group: usize, y_group: usize) -> Option<CellPos> {
    Some(CellPos::relative(
        parse_int(caps, x_group)?,
        parse_int(caps, y_group)?,
    ))
}

/// Run one pattern over the whole text, keeping matches that start at a
/// word boundary.
fn scan_pattern<F>(text: &str, re: &Regex, mut build: F, out: &mut Vec<ParsedReference>)
where
    F: FnMut(&Captures<'_>) -> Option<(CellRef, bool)>,
{
    let mut cursor = CharCursor::new(text);

    for caps in re.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 is always present");
        if !preceded_by_boundary(text, whole.start()) {
            continue;
        }

        let Some((cell_ref, is_relative_position)) = build(&caps) else {
            continue;
        };

        let start = cursor.advance_to(whole.start());
        let end = cursor.advance_to(whole.end());
        out.push(ParsedReference {
            cell_ref,
            is_relative_position,
            span: Span { start, end },
        });
    }
}

/// Scan source text for cell references.
///
/// Single-cell calls are reported first, then range calls; each group is in
/// textual order but the two groups are not merged.
pub fn scan(text: &str) -> ParseResult {
    let mut references = Vec::new();

    scan_pattern(
        text,
        single_cell_regex(),
        |caps| {
            let name = caps.get(1)?.as_str();
            let pos = parse_pos(caps, 2, 3)?;
            Some((
                CellRef::Cell { pos },
                RELATIVE_CELL_FUNCTIONS.contains(&name),
            ))
        },
        &mut references,
    );

    scan_pattern(
        text,
        range_regex(),
        |caps| {
            let (start, end) = if caps.get(2).is_some() {
                (parse_pos(caps, 2, 3)?, parse_pos(caps, 4, 5)?)
            } else {
                (parse_pos(caps, 6, 7)?, parse_pos(caps, 8, 9)?)
            };
            Some((CellRef::CellRange { start, end }, false))
        },
        &mut references,
    );

    ParseResult {
        error_message: None,
        error_span: None,
        references,
        resolved: false,
    }
}

/// Resolve relative-position references against the anchor cell.
///
/// Every `Relative` component of a relative-position `Cell` is shifted by
/// the anchor. Ranges are left untouched. Resolution is additive, so a
/// result may only be resolved once.
pub fn resolve(result: &ParseResult, anchor: (i64, i64)) -> Result<ParseResult> {
    if result.resolved {
        return Err(Error::AlreadyResolved);
    }

    let (ax, ay) = anchor;
    let references = result
        .references
        .iter()
        .map(|parsed| {
            let mut parsed = parsed.clone();
            if parsed.is_relative_position
                && let CellRef::Cell { pos } = &mut parsed.cell_ref
            {
                pos.x = pos.x.offset_relative(ax);
                pos.y = pos.y.offset_relative(ay);
            }
            parsed
        })
        .collect();

    Ok(ParseResult {
        error_message: result.error_message.clone(),
        error_span: result.error_span,
        references,
        resolved: true,
    })
}

/// Character length of `text`, the upper bound for every span.
pub fn text_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(x: i64, y: i64) -> CellRef {
        CellRef::Cell {
            pos: CellPos::relative(x, y),
        }
    }

    #[test]
    fn test_no_references() {
        let result = scan("x = 1 + 2\nprint(x)");
        assert!(result.references.is_empty());
        assert!(!result.has_error());
        assert!(result.error_span.is_none());
    }

    #[test]
    fn test_short_relative_call() {
        let result = scan("c(1,2)");
        assert_eq!(result.references.len(), 1);

        let parsed = &result.references[0];
        assert_eq!(parsed.cell_ref, cell(1, 2));
        assert!(parsed.is_relative_position);
        assert_eq!(parsed.span, Span { start: 0, end: 6 });
    }

    #[test]
    fn test_absolute_style_names() {
        let result = scan("a = cell(3, 4)\nb = getCell(-1, 0)");
        assert_eq!(result.references.len(), 2);
        assert_eq!(result.references[0].cell_ref, cell(3, 4));
        assert!(!result.references[0].is_relative_position);
        assert_eq!(result.references[0].span, Span { start: 4, end: 14 });
        assert_eq!(result.references[1].cell_ref, cell(-1, 0));
        assert!(!result.references[1].is_relative_position);
    }

    #[test]
    fn test_relative_names() {
        let result = scan("rel_cell(0, -1) + rc(2,2)");
        assert_eq!(result.references.len(), 2);
        assert!(result.references.iter().all(|r| r.is_relative_position));
        assert_eq!(result.references[0].cell_ref, cell(0, -1));
        assert_eq!(result.references[1].cell_ref, cell(2, 2));
    }

    #[test]
    fn test_identifier_suffix_not_matched() {
        let result = scan("my_cell(1, 2) + getcc(1,2) + abc(1,2) + src(0,0)");
        assert!(result.references.is_empty());
    }

    #[test]
    fn test_boundary_characters() {
        let result = scan("(c(1,2))*[cell(0,0)]");
        assert_eq!(result.references.len(), 2);
        assert_eq!(result.references[0].span, Span { start: 1, end: 7 });
        assert_eq!(result.references[1].span, Span { start: 10, end: 19 });
    }

    #[test]
    fn test_adjacent_calls() {
        let result = scan("c(1,2)+c(3,4)");
        assert_eq!(result.references.len(), 2);
        assert_eq!(result.references[1].span, Span { start: 7, end: 13 });
    }

    #[test]
    fn test_whitespace_inside_parens() {
        let result = scan("cell( 5 ,  6 )");
        assert_eq!(result.references.len(), 1);
        assert_eq!(result.references[0].cell_ref, cell(5, 6));
    }

    #[test]
    fn test_rejects_expressions_in_arguments() {
        let result = scan("cell(x, 1) + cell(1 + 1, 2) + cell(1, 2, 3) + cell(1.5, 2)");
        assert!(result.references.is_empty());
    }

    #[test]
    fn test_nested_range() {
        let result = scan("data = cells((0, 0), (2, 3))");
        assert_eq!(result.references.len(), 1);
        let parsed = &result.references[0];
        assert_eq!(
            parsed.cell_ref,
            CellRef::CellRange {
                start: CellPos::relative(0, 0),
                end: CellPos::relative(2, 3),
            }
        );
        assert!(!parsed.is_relative_position);
        assert_eq!(parsed.span, Span { start: 7, end: 28 });
    }

    #[test]
    fn test_juxtaposed_range() {
        let result = scan("cells(0,0)(2,3)");
        assert_eq!(result.references.len(), 1);
        assert_eq!(
            result.references[0].cell_ref,
            CellRef::CellRange {
                start: CellPos::relative(0, 0),
                end: CellPos::relative(2, 3),
            }
        );
        assert_eq!(result.references[0].span, Span { start: 0, end: 15 });
    }

    #[test]
    fn test_range_not_normalized() {
        let result = scan("getCells((5, 5), (1, -1))");
        assert_eq!(
            result.references[0].cell_ref,
            CellRef::CellRange {
                start: CellPos::relative(5, 5),
                end: CellPos::relative(1, -1),
            }
        );
    }

    #[test]
    fn test_single_cell_results_precede_ranges() {
        let result = scan("cells((0,0),(1,1)) then cell(9, 9)");
        assert_eq!(result.references.len(), 2);
        assert_eq!(result.references[0].cell_ref, cell(9, 9));
        assert!(matches!(
            result.references[1].cell_ref,
            CellRef::CellRange { .. }
        ));
        assert!(result.references[0].span.start > result.references[1].span.start);
    }

    #[test]
    fn test_duplicates_kept() {
        let result = scan("c(1,1) c(1,1)");
        assert_eq!(result.references.len(), 2);
    }

    #[test]
    fn test_out_of_range_literal_skipped() {
        let result = scan("cell(99999999999999999999, 1) cell(1, 1)");
        assert_eq!(result.references.len(), 1);
        assert_eq!(result.references[0].cell_ref, cell(1, 1));
    }

    #[test]
    fn test_spans_count_characters() {
        let text = "é = c(1,2)";
        let result = scan(text);
        assert_eq!(result.references[0].span, Span { start: 4, end: 10 });
        assert!(result.references[0].span.end <= text_len(text));
    }

    #[test]
    fn test_resolve_relative_cell() {
        let result = scan("c(1,2) + cell(1,2) + cells((1,2),(3,4))");
        let resolved = resolve(&result, (10, 10)).unwrap();

        assert_eq!(resolved.references[0].cell_ref, cell(11, 12));
        assert_eq!(resolved.references[1].cell_ref, cell(1, 2));
        assert_eq!(resolved.references[2].cell_ref, result.references[2].cell_ref);
        assert!(resolved.resolved);
        assert!(!result.resolved);
    }

    #[test]
    fn test_resolve_twice_fails() {
        let resolved = resolve(&scan("rc(1,2)"), (10, 10)).unwrap();
        let err = resolve(&resolved, (10, 10)).unwrap_err();
        assert!(matches!(err, Error::AlreadyResolved));
        assert!(err.is_precondition_violation());
    }

    #[test]
    fn test_resolve_keeps_absolute_components() {
        let result = ParseResult {
            references: vec![ParsedReference {
                cell_ref: CellRef::Cell {
                    pos: CellPos {
                        x: Coordinate::Absolute(4),
                        y: Coordinate::Relative(1),
                    },
                },
                is_relative_position: true,
                span: Span { start: 0, end: 0 },
            }],
            ..ParseResult::default()
        };
        let resolved = resolve(&result, (3, 3)).unwrap();
        assert_eq!(
            resolved.references[0].cell_ref,
            CellRef::Cell {
                pos: CellPos {
                    x: Coordinate::Absolute(4),
                    y: Coordinate::Relative(4),
                },
            }
        );
    }
}
