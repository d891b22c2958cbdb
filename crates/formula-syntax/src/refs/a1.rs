//! A1 notation: `A1`, `$A$1:B2`, `A:A`, `1:1` and (optionally) partial `A1:A`, `A1:1`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::column::{from_col, to_col, MAX_COLS, MAX_ROWS};
use super::{range_operator, split_reference, RefBody, RefParseOptions, RefTarget, Reference, Trim};
use crate::token::TokenKind;

/// A rectangular A1 range with 0-based inclusive edges. `None` edges are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RangeA1 {
    pub top: Option<u32>,
    pub left: Option<u32>,
    pub bottom: Option<u32>,
    pub right: Option<u32>,
    #[serde(rename = "$top", default)]
    pub top_abs: bool,
    #[serde(rename = "$left", default)]
    pub left_abs: bool,
    #[serde(rename = "$bottom", default)]
    pub bottom_abs: bool,
    #[serde(rename = "$right", default)]
    pub right_abs: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<Trim>,
}

pub type A1Reference = Reference<RangeA1>;

impl RangeA1 {
    /// A single relative cell.
    #[must_use]
    pub fn cell(row: u32, col: u32) -> Self {
        Self {
            top: Some(row),
            left: Some(col),
            bottom: Some(row),
            right: Some(col),
            ..Self::default()
        }
    }

    /// A relative range spanning two corners.
    #[must_use]
    pub fn from_corners(top: u32, left: u32, bottom: u32, right: u32) -> Self {
        Self {
            top: Some(top),
            left: Some(left),
            bottom: Some(bottom),
            right: Some(right),
            ..Self::default()
        }
        .normalized()
    }

    /// Swap reversed edges (and their lock flags) so `top <= bottom` and `left <= right`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if let (Some(top), Some(bottom)) = (self.top, self.bottom) {
            if top > bottom {
                self.top = Some(bottom);
                self.bottom = Some(top);
                std::mem::swap(&mut self.top_abs, &mut self.bottom_abs);
            }
        }
        if let (Some(left), Some(right)) = (self.left, self.right) {
            if left > right {
                self.left = Some(right);
                self.right = Some(left);
                std::mem::swap(&mut self.left_abs, &mut self.right_abs);
            }
        }
        self
    }

    /// Render the range without any prefix.
    #[must_use]
    pub fn to_a1(&self) -> String {
        let clamp_row = |v: Option<u32>| v.map(|v| v.min(MAX_ROWS));
        let clamp_col = |v: Option<u32>| v.map(|v| v.min(MAX_COLS));
        let top = clamp_row(self.top);
        let left = clamp_col(self.left);
        let mut bottom = clamp_row(self.bottom);
        let mut right = clamp_col(self.right);
        let (top_abs, left_abs) = (self.top_abs, self.left_abs);
        let (mut bottom_abs, mut right_abs) = (self.bottom_abs, self.right_abs);
        let op = range_operator(self.trim);

        // A lone corner is a single cell.
        if top.is_some() && left.is_some() && bottom.is_none() && right.is_none() {
            bottom = top;
            right = left;
            bottom_abs = top_abs;
            right_abs = left_abs;
        }

        // Trimmed ranges never collapse to beams.
        let plain = self.trim.is_none();
        let all_rows = plain && top == Some(0) && bottom.is_some_and(|b| b >= MAX_ROWS);
        let all_cols = plain && left == Some(0) && right.is_some_and(|r| r >= MAX_COLS);

        if (all_rows && !all_cols) || (top.is_none() && bottom.is_none()) {
            let l = left.or(right).unwrap_or(0);
            let r = right.or(left).unwrap_or(l);
            return format!(
                "{}{op}{}",
                fmt_col(l, left_abs),
                fmt_col(r, if right.is_some() { right_abs } else { left_abs })
            );
        }
        if (all_cols && !all_rows) || (left.is_none() && right.is_none()) {
            let t = top.or(bottom).unwrap_or(0);
            let b = bottom.or(top).unwrap_or(t);
            return format!(
                "{}{op}{}",
                fmt_row(t, top_abs),
                fmt_row(b, if bottom.is_some() { bottom_abs } else { top_abs })
            );
        }

        match (top, left, bottom, right) {
            // `A1:A` (open at the bottom).
            (Some(t), Some(l), None, Some(r)) => format!(
                "{}{}{op}{}",
                fmt_col(l, left_abs),
                fmt_row(t, top_abs),
                fmt_col(r, right_abs)
            ),
            // `A1:1` (open at the right).
            (Some(t), Some(l), Some(b), None) => format!(
                "{}{}{op}{}",
                fmt_col(l, left_abs),
                fmt_row(t, top_abs),
                fmt_row(b, bottom_abs)
            ),
            (Some(t), Some(l), Some(b), Some(r)) => {
                let first = format!("{}{}", fmt_col(l, left_abs), fmt_row(t, top_abs));
                if t != b || l != r || top_abs != bottom_abs || left_abs != right_abs {
                    format!(
                        "{first}{op}{}{}",
                        fmt_col(r, right_abs),
                        fmt_row(b, bottom_abs)
                    )
                } else {
                    first
                }
            }
            // Open on the top or left edge: render what is there as a cell pair.
            _ => {
                let t = top.or(bottom).unwrap_or(0);
                let l = left.or(right).unwrap_or(0);
                format!("{}{}", fmt_col(l, left_abs), fmt_row(t, top_abs))
            }
        }
    }
}

impl fmt::Display for RangeA1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

fn fmt_col(col: u32, abs: bool) -> String {
    format!("{}{}", if abs { "$" } else { "" }, to_col(col))
}

fn fmt_row(row: u32, abs: bool) -> String {
    format!("{}{}", if abs { "$" } else { "" }, row + 1)
}

/// One side of an A1 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum A1Part {
    Cell {
        row: u32,
        row_abs: bool,
        col: u32,
        col_abs: bool,
    },
    Col {
        col: u32,
        abs: bool,
    },
    Row {
        row: u32,
        abs: bool,
    },
}

fn scan_digits(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count()
}

/// Parse a 1-based row number of at most 7 digits into a 0-based index.
fn parse_row(digits: &str) -> Option<u32> {
    if digits.is_empty() || digits.len() > 7 {
        return None;
    }
    let row: u32 = digits.parse().ok()?;
    (1..=MAX_ROWS + 1).contains(&row).then(|| row - 1)
}

/// Scan a cell, column, or row starting at `pos`. Returns the part and the end offset.
pub(crate) fn scan_part(src: &str, pos: usize) -> Option<(A1Part, usize)> {
    let bytes = src.as_bytes();
    let mut i = pos;
    let first_abs = bytes.get(i) == Some(&b'$');
    if first_abs {
        i += 1;
    }

    let letters = bytes[i..]
        .iter()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    if letters == 0 {
        let n = scan_digits(bytes, i);
        let row = parse_row(&src[i..i + n])?;
        return Some((
            A1Part::Row {
                row,
                abs: first_abs,
            },
            i + n,
        ));
    }
    if letters > 3 {
        return None;
    }
    let col = from_col(&src[i..i + letters])?;
    if col > MAX_COLS {
        return None;
    }
    i += letters;

    let row_abs = bytes.get(i) == Some(&b'$');
    let digits_at = if row_abs { i + 1 } else { i };
    let n = scan_digits(bytes, digits_at);
    if n == 0 {
        if row_abs {
            return None;
        }
        return Some((
            A1Part::Col {
                col,
                abs: first_abs,
            },
            i,
        ));
    }
    let row = parse_row(&src[digits_at..digits_at + n])?;
    Some((
        A1Part::Cell {
            row,
            row_abs,
            col,
            col_abs: first_abs,
        },
        digits_at + n,
    ))
}

/// Characters that continue an identifier, so a reference cannot end before them.
pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '\\' | '?') || c >= '\u{a1}'
}

/// A complete range may end at `pos` (a trim operator may follow directly).
pub(crate) fn can_end_range(src: &str, pos: usize) -> bool {
    let rest = &src[pos..];
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some('.') => chars.next() == Some(':'),
        Some(c) => !is_name_char(c),
    }
}

/// Beams and partial ranges additionally cannot end right before `!`.
pub(crate) fn can_end_partial_range(src: &str, pos: usize) -> bool {
    can_end_range(src, pos) && !src[pos..].starts_with('!')
}

fn pair_kind(first: A1Part, second: A1Part, allow_ternary: bool) -> Option<TokenKind> {
    use A1Part::{Cell, Col, Row};
    match (first, second) {
        (Cell { .. }, Cell { .. }) => Some(TokenKind::Range),
        (Col { .. }, Col { .. }) | (Row { .. }, Row { .. }) => Some(TokenKind::RangeBeam),
        (Cell { .. }, Col { .. } | Row { .. }) | (Col { .. } | Row { .. }, Cell { .. })
            if allow_ternary =>
        {
            Some(TokenKind::RangeTernary)
        }
        _ => None,
    }
}

/// Tokenizer entry point: match an A1 range at `pos`, preferring the two-part form.
pub(crate) fn scan_range(src: &str, pos: usize, allow_ternary: bool) -> Option<(TokenKind, usize)> {
    let (first, after_first) = scan_part(src, pos)?;
    if src[after_first..].starts_with(':') {
        if let Some((second, end)) = scan_part(src, after_first + 1) {
            if let Some(kind) = pair_kind(first, second, allow_ternary) {
                let ok = if kind == TokenKind::Range {
                    can_end_range(src, end)
                } else {
                    can_end_partial_range(src, end)
                };
                if ok {
                    return Some((kind, end));
                }
            }
        }
    }
    if matches!(first, A1Part::Cell { .. }) && can_end_range(src, after_first) {
        return Some((TokenKind::Range, after_first));
    }
    None
}

fn combine(first: A1Part, second: A1Part, allow_ternary: bool) -> Option<RangeA1> {
    use A1Part::{Cell, Col, Row};
    let range = match (first, second) {
        (
            Cell {
                row: t,
                row_abs: ta,
                col: l,
                col_abs: la,
            },
            Cell {
                row: b,
                row_abs: ba,
                col: r,
                col_abs: ra,
            },
        ) => RangeA1 {
            top: Some(t),
            left: Some(l),
            bottom: Some(b),
            right: Some(r),
            top_abs: ta,
            left_abs: la,
            bottom_abs: ba,
            right_abs: ra,
            trim: None,
        },
        (Col { col: l, abs: la }, Col { col: r, abs: ra }) => RangeA1 {
            left: Some(l),
            right: Some(r),
            left_abs: la,
            right_abs: ra,
            ..RangeA1::default()
        },
        (Row { row: t, abs: ta }, Row { row: b, abs: ba }) => RangeA1 {
            top: Some(t),
            bottom: Some(b),
            top_abs: ta,
            bottom_abs: ba,
            ..RangeA1::default()
        },
        (
            Cell {
                row,
                row_abs,
                col,
                col_abs,
            },
            Col { col: other, abs },
        )
        | (
            Col { col: other, abs },
            Cell {
                row,
                row_abs,
                col,
                col_abs,
            },
        ) if allow_ternary => {
            // The cell's column and the bare column bound the width; height is open below.
            let (left, left_abs, right, right_abs) = if matches!(first, Cell { .. }) {
                (col, col_abs, other, abs)
            } else {
                (other, abs, col, col_abs)
            };
            RangeA1 {
                top: Some(row),
                top_abs: row_abs,
                left: Some(left),
                left_abs,
                right: Some(right),
                right_abs,
                ..RangeA1::default()
            }
        }
        (
            Cell {
                row,
                row_abs,
                col,
                col_abs,
            },
            Row { row: other, abs },
        )
        | (
            Row { row: other, abs },
            Cell {
                row,
                row_abs,
                col,
                col_abs,
            },
        ) if allow_ternary => {
            let (top, top_abs, bottom, bottom_abs) = if matches!(first, Cell { .. }) {
                (row, row_abs, other, abs)
            } else {
                (other, abs, row, row_abs)
            };
            RangeA1 {
                top: Some(top),
                top_abs,
                bottom: Some(bottom),
                bottom_abs,
                left: Some(col),
                left_abs: col_abs,
                ..RangeA1::default()
            }
        }
        _ => return None,
    };
    Some(range.normalized())
}

fn parse_pair(left: &str, right: &str, allow_ternary: bool) -> Option<RangeA1> {
    let (first, end) = scan_part(left, 0)?;
    if end != left.len() {
        return None;
    }
    let (second, end) = scan_part(right, 0)?;
    if end != right.len() {
        return None;
    }
    combine(first, second, allow_ternary)
}

/// Parse a bare A1 range (no prefix), canonicalizing reversed edges.
pub(crate) fn parse_range(text: &str, allow_ternary: bool) -> Option<RangeA1> {
    for trim in Trim::ALL {
        if let Some((left, right)) = text.split_once(trim.operator()) {
            // Trim operators only join two cells.
            let is_cell = |part: &str| {
                matches!(scan_part(part, 0), Some((A1Part::Cell { .. }, end)) if end == part.len())
            };
            if !is_cell(left) || !is_cell(right) {
                return None;
            }
            let mut range = parse_pair(left, right, allow_ternary)?;
            range.trim = Some(trim);
            return Some(range);
        }
    }
    if let Some((left, right)) = text.split_once(':') {
        return parse_pair(left, right, allow_ternary);
    }
    match scan_part(text, 0)? {
        (A1Part::Cell { row, row_abs, col, col_abs }, end) if end == text.len() => Some(RangeA1 {
            top: Some(row),
            left: Some(col),
            bottom: Some(row),
            right: Some(col),
            top_abs: row_abs,
            left_abs: col_abs,
            bottom_abs: row_abs,
            right_abs: col_abs,
            trim: None,
        }),
        _ => None,
    }
}

/// A single A1 cell (used for anchors). Returns `(row, col)`.
pub(crate) fn parse_cell(text: &str) -> Option<(u32, u32)> {
    match scan_part(text, 0)? {
        (A1Part::Cell { row, col, .. }, end) if end == text.len() => Some((row, col)),
        _ => None,
    }
}

/// Text that would tokenize as a cell (`A1`, `xfd100`), and so needs quoting as a sheet name.
pub(crate) fn is_cell_like(text: &str) -> bool {
    parse_cell(text).is_some()
}

/// Parse an A1 reference such as `Sheet1!A$1:$B2`, `[Book]Sheet!A:A` or a defined name.
///
/// Returns `None` when the text is not a single reference.
#[must_use]
pub fn parse_a1_ref(text: &str, options: &RefParseOptions) -> Option<A1Reference> {
    let (context, body) = split_reference(text, false, options)?;
    let target = match body {
        RefBody::Range(range) => RefTarget::Range(parse_range(&range, true)?),
        RefBody::Name(name) => RefTarget::Name(name),
    };
    Some(Reference { context, target })
}

/// Render an A1 reference, quoting the prefix where required.
#[must_use]
pub fn stringify_a1_ref(reference: &A1Reference) -> String {
    let prefix = super::stringify_prefix(&reference.context);
    match &reference.target {
        RefTarget::Range(range) => format!("{prefix}{}", range.to_a1()),
        RefTarget::Name(name) => format!("{prefix}{name}"),
    }
}

/// Fill unbounded edges with the sheet limits (`A:A` becomes rows `0..=MAX_ROWS`).
#[must_use]
pub fn add_a1_range_bounds(range: &RangeA1) -> RangeA1 {
    let mut out = *range;
    if out.top.is_none() {
        out.top = Some(0);
        out.top_abs = false;
    }
    if out.bottom.is_none() {
        out.bottom = Some(MAX_ROWS);
        out.bottom_abs = false;
    }
    if out.left.is_none() {
        out.left = Some(0);
        out.left_abs = false;
    }
    if out.right.is_none() {
        out.right = Some(MAX_COLS);
        out.right_abs = false;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scans_parts() {
        assert_eq!(
            scan_part("$B$7", 0),
            Some((
                A1Part::Cell {
                    row: 6,
                    row_abs: true,
                    col: 1,
                    col_abs: true
                },
                4
            ))
        );
        assert_eq!(scan_part("AA", 0), Some((A1Part::Col { col: 26, abs: false }, 2)));
        assert_eq!(scan_part("$10", 0), Some((A1Part::Row { row: 9, abs: true }, 3)));
        assert_eq!(scan_part("A0", 0), None);
        assert_eq!(scan_part("XFE1", 0), None);
        assert_eq!(scan_part("ABCD1", 0), None);
        assert_eq!(scan_part("A1048577", 0), None);
        assert_eq!(scan_part("A$", 0), None);
    }

    #[test]
    fn scan_range_prefers_the_longest_form() {
        assert_eq!(scan_range("A1:B2", 0, false), Some((TokenKind::Range, 5)));
        assert_eq!(scan_range("A:A", 0, false), Some((TokenKind::RangeBeam, 3)));
        assert_eq!(scan_range("1:1", 0, false), Some((TokenKind::RangeBeam, 3)));
        assert_eq!(scan_range("A1:A", 0, false), Some((TokenKind::Range, 2)));
        assert_eq!(scan_range("A1:A", 0, true), Some((TokenKind::RangeTernary, 4)));
        assert_eq!(scan_range("A1.:B2", 0, false), Some((TokenKind::Range, 2)));
        // Identifiers are not references.
        assert_eq!(scan_range("A1B", 0, false), None);
        assert_eq!(scan_range("A1_x", 0, false), None);
        assert_eq!(scan_range("A", 0, false), None);
        // A beam cannot be a sheet name.
        assert_eq!(scan_range("A:A!", 0, false), None);
    }

    #[test]
    fn parse_range_normalizes_reversed_edges() {
        let range = parse_range("$B2:A$1", false).unwrap();
        assert_eq!(range.top, Some(0));
        assert_eq!(range.bottom, Some(1));
        assert!(range.top_abs);
        assert!(!range.bottom_abs);
        assert_eq!(range.left, Some(0));
        assert_eq!(range.right, Some(1));
        assert!(!range.left_abs);
        assert!(range.right_abs);
        assert_eq!(range.to_a1(), "A$1:$B2");
    }

    #[test]
    fn ternary_ranges_require_permission() {
        assert_eq!(parse_range("A1:A", false), None);
        let range = parse_range("A1:A", true).unwrap();
        assert_eq!(range.bottom, None);
        assert_eq!(range.to_a1(), "A1:A");

        let range = parse_range("B:A3", true).unwrap();
        assert_eq!((range.left, range.right, range.top), (Some(0), Some(1), Some(2)));
        assert_eq!(range.to_a1(), "A3:B");

        let range = parse_range("A3:1", true).unwrap();
        assert_eq!((range.top, range.bottom, range.right), (Some(0), Some(2), None));
        assert_eq!(range.to_a1(), "A1:3");
    }

    #[test]
    fn stringify_covers_beams_and_cells() {
        assert_eq!(RangeA1::cell(0, 0).to_a1(), "A1");
        assert_eq!(parse_range("C:$D", false).unwrap().to_a1(), "C:$D");
        assert_eq!(parse_range("3:3", false).unwrap().to_a1(), "3:3");
        assert_eq!(parse_range("A1:A1", false).unwrap().to_a1(), "A1");
        assert_eq!(parse_range("$A1:A1", false).unwrap().to_a1(), "$A1:A1");
        let full_cols = RangeA1::from_corners(0, 2, MAX_ROWS, 3);
        assert_eq!(full_cols.to_a1(), "C:D");
        let full_rows = RangeA1::from_corners(4, 0, 4, MAX_COLS);
        assert_eq!(full_rows.to_a1(), "5:5");
        let everything = RangeA1::from_corners(0, 0, MAX_ROWS, MAX_COLS);
        assert_eq!(everything.to_a1(), "A1:XFD1048576");
    }

    #[test]
    fn trimmed_ranges_keep_their_marker() {
        let range = parse_range("A1.:.B2", false).unwrap();
        assert_eq!(range.trim, Some(Trim::Both));
        assert_eq!(range.to_a1(), "A1.:.B2");
        assert_eq!(parse_range("A:.C", false), None);
        assert_eq!(parse_range("1.:3", false), None);
        let column = parse_range("A1.:A1048576", false).unwrap();
        assert_eq!(column.to_a1(), "A1.:A1048576");
    }

    #[test]
    fn bounds_fill_open_edges() {
        let beam = parse_range("B:C", false).unwrap();
        let bounded = add_a1_range_bounds(&beam);
        assert_eq!(bounded.top, Some(0));
        assert_eq!(bounded.bottom, Some(MAX_ROWS));
        assert_eq!(add_a1_range_bounds(&bounded), bounded);
        assert_eq!(bounded.to_a1(), "B:C");
    }
}
