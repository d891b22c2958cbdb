use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::refs::a1::{add_a1_range_bounds, parse_a1_ref};
use crate::refs::r1c1::parse_r1c1_ref;
use crate::refs::structured::parse_struct_ref;
use crate::refs::{RefContext, RefParseOptions, RefTarget};
use crate::token::{Token, TokenKind, TokenMeta};

/// Where the formula lives; used to resolve references without a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenMetaContext {
    pub sheet_name: String,
    pub workbook_name: String,
    /// The tokens were lexed in R1C1 mode, so ranges are read as R1C1 first.
    pub r1c1: bool,
}

/// Annotate tokens for an editor.
///
/// Every token gets its `index` and bracket `depth`; a bracket pair sits at the depth of its
/// contents. Matching parentheses and braces share a group id, as do references that resolve to
/// the same cells or the same defined name. Unbalanced brackets, nested array braces and unknown
/// tokens are flagged with `error`.
#[must_use]
pub fn add_token_meta(tokens: &[Token], context: &TokenMetaContext) -> Vec<Token> {
    let mut out: Vec<Token> = tokens.to_vec();
    let mut ids = GroupIds::default();
    // Open `(` and `{` tokens, innermost last.
    let mut brackets: Vec<(usize, char)> = Vec::new();
    let mut ref_groups: HashMap<String, String> = HashMap::new();

    for idx in 0..out.len() {
        let mut meta = TokenMeta {
            index: idx,
            depth: brackets.len(),
            group_id: None,
            error: false,
        };
        let token = &out[idx];
        match (token.kind, token.value.as_str()) {
            (TokenKind::Operator, "{") if brackets.iter().any(|&(_, c)| c == '{') => {
                meta.error = true;
            }
            (TokenKind::Operator, open @ ("(" | "{")) => {
                brackets.push((idx, if open == "(" { '(' } else { '{' }));
                meta.depth = brackets.len();
                meta.group_id = Some(ids.next());
            }
            (TokenKind::Operator, close @ (")" | "}")) => {
                let expected = if close == ")" { '(' } else { '{' };
                match brackets.last().copied() {
                    Some((open, c)) if c == expected => {
                        brackets.pop();
                        let partner = out[open].meta.as_ref();
                        meta.depth = partner.map_or(0, |m| m.depth);
                        meta.group_id = partner.and_then(|m| m.group_id.clone());
                    }
                    _ => meta.error = true,
                }
            }
            (TokenKind::Unknown, _) => meta.error = true,
            (kind, _) if kind.is_reference() => {
                if let Some(key) = reference_key(token, context) {
                    let id = ref_groups.entry(key).or_insert_with(|| ids.next());
                    meta.group_id = Some(id.clone());
                }
            }
            _ => {}
        }
        out[idx].meta = Some(meta);
    }

    for (idx, _) in brackets {
        if let Some(meta) = out[idx].meta.as_mut() {
            meta.error = true;
        }
    }
    out
}

#[derive(Default)]
struct GroupIds(usize);

impl GroupIds {
    fn next(&mut self) -> String {
        self.0 += 1;
        format!("fxg{}", self.0)
    }
}

/// Workbook and sheet, lowercased, falling back to where the formula lives.
fn scope_key(ref_context: &RefContext, context: &TokenMetaContext) -> String {
    let (workbook, sheet) = ref_context.workbook_and_sheet();
    format!(
        "{}\u{0}{}",
        workbook.unwrap_or(&context.workbook_name).to_lowercase(),
        sheet.unwrap_or(&context.sheet_name).to_lowercase()
    )
}

fn edges<T: ToString>(values: [Option<T>; 4]) -> String {
    values
        .map(|v| v.map_or_else(String::new, |v| v.to_string()))
        .join(",")
}

fn a1_range_key(
    text: &str,
    options: &RefParseOptions,
    context: &TokenMetaContext,
) -> Option<String> {
    let reference = parse_a1_ref(text, options)?;
    let range = add_a1_range_bounds(reference.range()?);
    Some(format!(
        "a1\u{0}{}\u{0}{}",
        scope_key(&reference.context, context),
        edges([range.top, range.left, range.bottom, range.right])
    ))
}

/// R1C1 ranges have no anchor to resolve against, so relative and locked edges stay distinct.
fn r1c1_range_key(
    text: &str,
    options: &RefParseOptions,
    context: &TokenMetaContext,
) -> Option<String> {
    let reference = parse_r1c1_ref(text, options)?;
    let range = reference.range()?;
    let locks = [range.r0_abs, range.c0_abs, range.r1_abs, range.c1_abs]
        .map(|abs| if abs { "$" } else { "" });
    Some(format!(
        "r1c1\u{0}{}\u{0}{}\u{0}{}",
        scope_key(&reference.context, context),
        edges([range.r0, range.c0, range.r1, range.c1]),
        locks.concat()
    ))
}

/// Identity of the cells or name a reference token covers, ignoring spelling. A1 lock flags
/// do not change which cells are covered, so they are left out.
fn reference_key(token: &Token, context: &TokenMetaContext) -> Option<String> {
    let options = RefParseOptions {
        allow_named: false,
        allow_ternary: true,
        xlsx: false,
    };
    match token.kind {
        TokenKind::Range | TokenKind::RangeBeam | TokenKind::RangeTernary => {
            if context.r1c1 {
                r1c1_range_key(&token.value, &options, context)
                    .or_else(|| a1_range_key(&token.value, &options, context))
            } else {
                a1_range_key(&token.value, &options, context)
                    .or_else(|| r1c1_range_key(&token.value, &options, context))
            }
        }
        TokenKind::RangeNamed => {
            let options = RefParseOptions {
                allow_named: true,
                ..options
            };
            let reference = parse_a1_ref(&token.value, &options)?;
            let RefTarget::Name(name) = &reference.target else {
                return None;
            };
            Some(format!(
                "name\u{0}{}\u{0}{}",
                scope_key(&reference.context, context),
                name.to_lowercase()
            ))
        }
        TokenKind::Structured => {
            let reference = parse_struct_ref(&token.value, &options)?;
            let (workbook, _) = reference.context.workbook_and_sheet();
            let mut sections = reference.sections.clone();
            sections.sort();
            sections.dedup();
            let sections: Vec<&str> = sections.iter().map(|s| s.keyword()).collect();
            Some(format!(
                "table\u{0}{}\u{0}{}\u{0}{}\u{0}{}",
                workbook.unwrap_or(&context.workbook_name).to_lowercase(),
                reference.table.as_deref().unwrap_or_default().to_lowercase(),
                reference.columns.join("\u{1}").to_lowercase(),
                sections.join(",").to_lowercase()
            ))
        }
        _ => None,
    }
}
