//! R1C1 notation: `R1C1`, `R[-1]C[2]`, `RC`, `R2`, `C[1]:C[3]`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::a1::{can_end_partial_range, can_end_range};
use super::column::{MAX_COLS, MAX_ROWS};
use super::{range_operator, split_reference, RefBody, RefParseOptions, RefTarget, Reference, Trim};
use crate::token::TokenKind;

/// An R1C1 range. Locked coordinates are absolute 0-based indices; unlocked ones are signed
/// offsets from an anchor cell. `None` edges are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RangeR1C1 {
    pub r0: Option<i32>,
    pub c0: Option<i32>,
    pub r1: Option<i32>,
    pub c1: Option<i32>,
    #[serde(rename = "$r0", default)]
    pub r0_abs: bool,
    #[serde(rename = "$c0", default)]
    pub c0_abs: bool,
    #[serde(rename = "$r1", default)]
    pub r1_abs: bool,
    #[serde(rename = "$c1", default)]
    pub c1_abs: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<Trim>,
}

pub type R1C1Reference = Reference<RangeR1C1>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Coord {
    value: i32,
    abs: bool,
}

impl Coord {
    fn fmt(self, axis: char) -> String {
        if self.abs {
            format!("{axis}{}", i64::from(self.value) + 1)
        } else if self.value == 0 {
            axis.to_string()
        } else {
            format!("{axis}[{}]", self.value)
        }
    }
}

fn coord(value: Option<i32>, abs: bool) -> Option<Coord> {
    value.map(|value| Coord { value, abs })
}

impl RangeR1C1 {
    /// Swap an edge pair only when both are present, reversed, and share a lock state.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if let (Some(r0), Some(r1)) = (self.r0, self.r1) {
            if r0 > r1 && self.r0_abs == self.r1_abs {
                self.r0 = Some(r1);
                self.r1 = Some(r0);
            }
        }
        if let (Some(c0), Some(c1)) = (self.c0, self.c1) {
            if c0 > c1 && self.c0_abs == self.c1_abs {
                self.c0 = Some(c1);
                self.c1 = Some(c0);
            }
        }
        self
    }

    #[must_use]
    pub fn to_r1c1(&self) -> String {
        let op = range_operator(self.trim);
        let mut r0 = coord(self.r0, self.r0_abs);
        let mut r1 = coord(self.r1, self.r1_abs);
        let mut c0 = coord(self.c0, self.c0_abs);
        let mut c1 = coord(self.c1, self.c1_abs);

        let full = |a: Option<Coord>, b: Option<Coord>, max: u32| {
            matches!(
                (a, b),
                (Some(Coord { value: 0, abs: true }), Some(Coord { value, abs: true }))
                    if u32::try_from(value).is_ok_and(|v| v >= max)
            )
        };
        // Trimmed ranges never collapse to beams.
        let plain = self.trim.is_none();
        let all_rows = plain && full(r0, r1, MAX_ROWS);
        let all_cols = plain && full(c0, c1, MAX_COLS);
        if all_rows && !all_cols {
            r0 = None;
            r1 = None;
        } else if all_cols && !all_rows {
            c0 = None;
            c1 = None;
        }

        // A lone corner is a single cell.
        if r0.is_some() && c0.is_some() && r1.is_none() && c1.is_none() {
            r1 = r0;
            c1 = c0;
        }

        let span = |a: Option<Coord>, b: Option<Coord>, axis: char| -> String {
            match (a.or(b), b.or(a)) {
                (Some(a), Some(b)) if a == b => a.fmt(axis),
                (Some(a), Some(b)) => format!("{}{op}{}", a.fmt(axis), b.fmt(axis)),
                _ => axis.to_string(),
            }
        };

        match (r0, c0, r1, c1) {
            (None, _, None, _) => span(c0, c1, 'C'),
            (_, None, _, None) => span(r0, r1, 'R'),
            (Some(r0), Some(c0), None, Some(c1)) => {
                format!("{}{}{op}{}", r0.fmt('R'), c0.fmt('C'), c1.fmt('C'))
            }
            (Some(r0), Some(c0), Some(r1), None) => {
                format!("{}{}{op}{}", r0.fmt('R'), c0.fmt('C'), r1.fmt('R'))
            }
            (Some(r0), Some(c0), Some(r1), Some(c1)) => {
                let first = format!("{}{}", r0.fmt('R'), c0.fmt('C'));
                if r0 == r1 && c0 == c1 {
                    first
                } else {
                    format!("{first}{op}{}{}", r1.fmt('R'), c1.fmt('C'))
                }
            }
            (r0, c0, r1, c1) => format!(
                "{}{}",
                r0.or(r1).map_or_else(|| "R".to_string(), |c| c.fmt('R')),
                c0.or(c1).map_or_else(|| "C".to_string(), |c| c.fmt('C'))
            ),
        }
    }
}

impl fmt::Display for RangeR1C1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_r1c1())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RcPart {
    Cell { row: Coord, col: Coord },
    Row(Coord),
    Col(Coord),
}

/// Scan one axis (`R`, `R5`, `R[-2]`) of the given letter starting at `pos`.
fn scan_axis(src: &str, pos: usize, letter: u8, max: u32) -> Option<(Coord, usize)> {
    let bytes = src.as_bytes();
    if !bytes.get(pos)?.eq_ignore_ascii_case(&letter) {
        return None;
    }
    let mut i = pos + 1;
    match bytes.get(i) {
        Some(b) if b.is_ascii_digit() => {
            let n = bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
            if n > 7 {
                return None;
            }
            let value: u32 = src[i..i + n].parse().ok()?;
            if !(1..=max + 1).contains(&value) {
                return None;
            }
            Some((
                Coord {
                    value: i32::try_from(value - 1).ok()?,
                    abs: true,
                },
                i + n,
            ))
        }
        Some(b'[') => {
            i += 1;
            let sign_len = usize::from(matches!(bytes.get(i), Some(b'-' | b'+')));
            let n = bytes[i + sign_len..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            if n == 0 || n > 7 || bytes.get(i + sign_len + n) != Some(&b']') {
                return None;
            }
            let value: i32 = src[i..i + sign_len + n].parse().ok()?;
            if value.unsigned_abs() > max {
                return None;
            }
            Some((Coord { value, abs: false }, i + sign_len + n + 1))
        }
        _ => Some((Coord { value: 0, abs: false }, i)),
    }
}

pub(crate) fn scan_part(src: &str, pos: usize) -> Option<(RcPart, usize)> {
    if let Some((row, after_row)) = scan_axis(src, pos, b'R', MAX_ROWS) {
        if let Some((col, end)) = scan_axis(src, after_row, b'C', MAX_COLS) {
            return Some((RcPart::Cell { row, col }, end));
        }
        return Some((RcPart::Row(row), after_row));
    }
    let (col, end) = scan_axis(src, pos, b'C', MAX_COLS)?;
    Some((RcPart::Col(col), end))
}

fn pair_kind(first: RcPart, second: RcPart, allow_ternary: bool) -> Option<TokenKind> {
    use RcPart::{Cell, Col, Row};
    match (first, second) {
        (Cell { .. }, Cell { .. }) => Some(TokenKind::Range),
        (Row(_), Row(_)) | (Col(_), Col(_)) => Some(TokenKind::RangeBeam),
        (Cell { .. }, Row(_) | Col(_)) | (Row(_) | Col(_), Cell { .. }) if allow_ternary => {
            Some(TokenKind::RangeTernary)
        }
        _ => None,
    }
}

/// Tokenizer entry point for R1C1 mode.
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
    let ok = match first {
        RcPart::Cell { .. } => can_end_range(src, after_first),
        // A lone `R2` or `C[1]` is a beam.
        RcPart::Row(_) | RcPart::Col(_) => can_end_partial_range(src, after_first),
    };
    if !ok {
        return None;
    }
    let kind = if matches!(first, RcPart::Cell { .. }) {
        TokenKind::Range
    } else {
        TokenKind::RangeBeam
    };
    Some((kind, after_first))
}

fn from_parts(first: RcPart, second: Option<RcPart>, allow_ternary: bool) -> Option<RangeR1C1> {
    use RcPart::{Cell, Col, Row};
    let set_row0 = |r: &mut RangeR1C1, c: Coord| {
        r.r0 = Some(c.value);
        r.r0_abs = c.abs;
    };
    let set_row1 = |r: &mut RangeR1C1, c: Coord| {
        r.r1 = Some(c.value);
        r.r1_abs = c.abs;
    };
    let set_col0 = |r: &mut RangeR1C1, c: Coord| {
        r.c0 = Some(c.value);
        r.c0_abs = c.abs;
    };
    let set_col1 = |r: &mut RangeR1C1, c: Coord| {
        r.c1 = Some(c.value);
        r.c1_abs = c.abs;
    };

    let mut range = RangeR1C1::default();
    match (first, second) {
        (Cell { row, col }, None) => {
            set_row0(&mut range, row);
            set_col0(&mut range, col);
            set_row1(&mut range, row);
            set_col1(&mut range, col);
        }
        (Row(row), None) => {
            set_row0(&mut range, row);
            set_row1(&mut range, row);
        }
        (Col(col), None) => {
            set_col0(&mut range, col);
            set_col1(&mut range, col);
        }
        (Cell { row: r0, col: c0 }, Some(Cell { row: r1, col: c1 })) => {
            set_row0(&mut range, r0);
            set_col0(&mut range, c0);
            set_row1(&mut range, r1);
            set_col1(&mut range, c1);
        }
        (Row(r0), Some(Row(r1))) => {
            set_row0(&mut range, r0);
            set_row1(&mut range, r1);
        }
        (Col(c0), Some(Col(c1))) => {
            set_col0(&mut range, c0);
            set_col1(&mut range, c1);
        }
        (Cell { row, col }, Some(Col(other))) | (Col(other), Some(Cell { row, col }))
            if allow_ternary =>
        {
            set_row0(&mut range, row);
            set_col0(&mut range, col);
            set_col1(&mut range, other);
        }
        (Cell { row, col }, Some(Row(other))) | (Row(other), Some(Cell { row, col }))
            if allow_ternary =>
        {
            set_row0(&mut range, row);
            set_col0(&mut range, col);
            set_row1(&mut range, other);
        }
        _ => return None,
    }
    Some(range.normalized())
}

fn parse_whole_part(text: &str) -> Option<RcPart> {
    match scan_part(text, 0)? {
        (part, end) if end == text.len() => Some(part),
        _ => None,
    }
}

/// Parse a bare R1C1 range (no prefix).
pub(crate) fn parse_range(text: &str, allow_ternary: bool) -> Option<RangeR1C1> {
    for trim in Trim::ALL {
        if let Some((left, right)) = text.split_once(trim.operator()) {
            let (first, second) = (parse_whole_part(left)?, parse_whole_part(right)?);
            // Trim operators only join two cells.
            if !matches!((&first, &second), (RcPart::Cell { .. }, RcPart::Cell { .. })) {
                return None;
            }
            let mut range = from_parts(first, Some(second), allow_ternary)?;
            range.trim = Some(trim);
            return Some(range);
        }
    }
    match text.split_once(':') {
        Some((left, right)) => from_parts(
            parse_whole_part(left)?,
            Some(parse_whole_part(right)?),
            allow_ternary,
        ),
        None => from_parts(parse_whole_part(text)?, None, allow_ternary),
    }
}

/// Text such as `R1C1` or `rc` that would tokenize as an R1C1 reference.
pub(crate) fn is_cell_like(text: &str) -> bool {
    parse_whole_part(text).is_some()
}

/// Parse an R1C1 reference such as `Sheet1!R[-1]C2:R3C[4]` or a defined name.
#[must_use]
pub fn parse_r1c1_ref(text: &str, options: &RefParseOptions) -> Option<R1C1Reference> {
    let (context, body) = split_reference(text, true, options)?;
    let target = match body {
        RefBody::Range(range) => RefTarget::Range(parse_range(&range, true)?),
        RefBody::Name(name) => RefTarget::Name(name),
    };
    Some(Reference { context, target })
}

#[must_use]
pub fn stringify_r1c1_ref(reference: &R1C1Reference) -> String {
    let prefix = super::stringify_prefix(&reference.context);
    match &reference.target {
        RefTarget::Range(range) => format!("{prefix}{}", range.to_r1c1()),
        RefTarget::Name(name) => format!("{prefix}{name}"),
    }
}
