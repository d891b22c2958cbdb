//! Translation between A1 and R1C1 notation relative to an anchor cell.

use serde::{Deserialize, Serialize};

use super::{parse_anchor, rewrite_tokens, with_value, REF_ERROR};
use crate::error::EditError;
use crate::lexer::{tokenize, TokenizeOptions};
use crate::refs::a1::{parse_a1_ref, stringify_a1_ref, RangeA1};
use crate::refs::column::{MAX_COLS, MAX_ROWS};
use crate::refs::r1c1::{parse_r1c1_ref, stringify_r1c1_ref, RangeR1C1};
use crate::refs::{RefParseOptions, RefTarget, Reference};
use crate::token::{join_values, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TranslateOptions {
    /// Edges that land outside the sheet wrap around to the opposite side. When disabled the
    /// whole reference becomes `#REF!`.
    pub wrap_edges: bool,
    /// Merge reference parts before translating (formula-string variants only).
    pub merge_refs: bool,
    pub allow_ternary: bool,
    pub xlsx: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            wrap_edges: true,
            merge_refs: true,
            allow_ternary: true,
            xlsx: false,
        }
    }
}

impl TranslateOptions {
    fn tokenize_options(&self, r1c1: bool) -> TokenizeOptions {
        TokenizeOptions {
            allow_ternary: self.allow_ternary,
            negative_numbers: true,
            r1c1,
            merge_refs: self.merge_refs,
            xlsx: self.xlsx,
            with_location: false,
        }
    }

    fn ref_options(&self) -> RefParseOptions {
        RefParseOptions {
            allow_named: false,
            allow_ternary: true,
            xlsx: self.xlsx,
        }
    }
}

fn is_translatable(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Range | TokenKind::RangeBeam | TokenKind::RangeTernary
    )
}

/// Rewrite the A1 references in `formula` as R1C1 references relative to `anchor`.
///
/// ```
/// use formula_syntax::{translate_to_r1c1, TranslateOptions};
///
/// let out = translate_to_r1c1("=SUM(E10,$E$2)", "D10", &TranslateOptions::default()).unwrap();
/// assert_eq!(out, "=SUM(RC[1],R2C5)");
/// ```
pub fn translate_to_r1c1(
    formula: &str,
    anchor: &str,
    options: &TranslateOptions,
) -> Result<String, EditError> {
    let tokens = tokenize(formula, &options.tokenize_options(false));
    let translated = translate_tokens_to_r1c1(&tokens, anchor, options)?;
    Ok(join_values(&translated))
}

/// Token-list form of [`translate_to_r1c1`]. Locations are recomputed for the new values.
pub fn translate_tokens_to_r1c1(
    tokens: &[Token],
    anchor: &str,
    options: &TranslateOptions,
) -> Result<Vec<Token>, EditError> {
    let (row, col) = parse_anchor(anchor)?;
    let ref_options = options.ref_options();
    Ok(rewrite_tokens(tokens, |token| {
        if !is_translatable(token) {
            return None;
        }
        let reference = parse_a1_ref(&token.value, &ref_options)?;
        let range = reference.range()?;
        let translated = Reference {
            context: reference.context.clone(),
            target: RefTarget::Range(relative_range(range, row, col)),
        };
        Some(with_value(token, stringify_r1c1_ref(&translated)))
    }))
}

fn relative_range(range: &RangeA1, row: u32, col: u32) -> RangeR1C1 {
    let offset = |value: Option<u32>, abs: bool, origin: u32| {
        value.map(|v| {
            if abs {
                v as i32
            } else {
                (i64::from(v) - i64::from(origin)) as i32
            }
        })
    };
    RangeR1C1 {
        r0: offset(range.top, range.top_abs, row),
        c0: offset(range.left, range.left_abs, col),
        r1: offset(range.bottom, range.bottom_abs, row),
        c1: offset(range.right, range.right_abs, col),
        r0_abs: range.top_abs,
        c0_abs: range.left_abs,
        r1_abs: range.bottom_abs,
        c1_abs: range.right_abs,
        trim: range.trim,
    }
}

/// Rewrite the R1C1 references in `formula` as A1 references, resolving relative offsets
/// against `anchor`.
///
/// ```
/// use formula_syntax::{translate_to_a1, TranslateOptions};
///
/// let out = translate_to_a1("=R[-1]C[-1]", "B2", &TranslateOptions::default()).unwrap();
/// assert_eq!(out, "=A1");
/// ```
pub fn translate_to_a1(
    formula: &str,
    anchor: &str,
    options: &TranslateOptions,
) -> Result<String, EditError> {
    let tokens = tokenize(formula, &options.tokenize_options(true));
    let translated = translate_tokens_to_a1(&tokens, anchor, options)?;
    Ok(join_values(&translated))
}

/// Token-list form of [`translate_to_a1`]. References that fall off the sheet with
/// `wrap_edges` disabled become `#REF!` error tokens without a group id.
pub fn translate_tokens_to_a1(
    tokens: &[Token],
    anchor: &str,
    options: &TranslateOptions,
) -> Result<Vec<Token>, EditError> {
    let (row, col) = parse_anchor(anchor)?;
    let ref_options = options.ref_options();
    Ok(rewrite_tokens(tokens, |token| {
        if !is_translatable(token) {
            return None;
        }
        let reference = parse_r1c1_ref(&token.value, &ref_options)?;
        let range = reference.range()?;
        match absolute_range(range, row, col, options.wrap_edges) {
            Some(range) => {
                let translated = Reference {
                    context: reference.context.clone(),
                    target: RefTarget::Range(range),
                };
                Some(with_value(token, stringify_a1_ref(&translated)))
            }
            None => {
                log::debug!(
                    "reference `{}` is out of bounds from anchor {anchor}; replacing with {REF_ERROR}",
                    token.value
                );
                let mut out = with_value(token, REF_ERROR.to_string());
                out.kind = TokenKind::Error;
                if let Some(meta) = out.meta.as_mut() {
                    meta.group_id = None;
                }
                Some(out)
            }
        }
    }))
}

/// Resolve one coordinate. Out-of-range values wrap, or are rejected without `wrap`.
fn resolve(value: i32, abs: bool, origin: u32, max: u32, wrap: bool) -> Option<u32> {
    let v = if abs {
        i64::from(value)
    } else {
        i64::from(origin) + i64::from(value)
    };
    let size = i64::from(max) + 1;
    let v = if (0..size).contains(&v) {
        v
    } else if wrap {
        v.rem_euclid(size)
    } else {
        return None;
    };
    u32::try_from(v).ok()
}

fn absolute_range(range: &RangeR1C1, row: u32, col: u32, wrap: bool) -> Option<RangeA1> {
    let edge = |value: Option<i32>, abs: bool, origin: u32, max: u32| match value {
        None => Some(None),
        Some(v) => resolve(v, abs, origin, max, wrap).map(Some),
    };
    let range = RangeA1 {
        top: edge(range.r0, range.r0_abs, row, MAX_ROWS)?,
        left: edge(range.c0, range.c0_abs, col, MAX_COLS)?,
        bottom: edge(range.r1, range.r1_abs, row, MAX_ROWS)?,
        right: edge(range.c1, range.c1_abs, col, MAX_COLS)?,
        top_abs: range.r0_abs,
        left_abs: range.c0_abs,
        bottom_abs: range.r1_abs,
        right_abs: range.c1_abs,
        trim: range.trim,
    };
    Some(range.normalized())
}
