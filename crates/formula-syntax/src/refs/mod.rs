//! Reference coordinate algebra.
//!
//! Parsing and stringification of A1, R1C1 and structured (table) references, plus the sheet and
//! workbook prefix handling they share.

pub mod a1;
pub mod column;
pub mod r1c1;
pub mod structured;

use serde::{Deserialize, Serialize};

use crate::lexer::{tokenize, TokenizeOptions};
use crate::token::{Token, TokenKind};

/// Trim marker of a trimmed range (`A1.:B2`, `A1:.B2`, `A1.:.B2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trim {
    /// `.:` trims leading blanks.
    Head,
    /// `:.` trims trailing blanks.
    Tail,
    /// `.:.` trims both ends.
    Both,
}

impl Trim {
    #[must_use]
    pub const fn operator(self) -> &'static str {
        match self {
            Trim::Head => ".:",
            Trim::Tail => ":.",
            Trim::Both => ".:.",
        }
    }

    #[must_use]
    pub fn from_operator(op: &str) -> Option<Self> {
        match op {
            ".:" => Some(Trim::Head),
            ":." => Some(Trim::Tail),
            ".:." => Some(Trim::Both),
            _ => None,
        }
    }

    /// Longest operator first, so `.:.` is never read as `.:`.
    pub(crate) const ALL: [Trim; 3] = [Trim::Both, Trim::Head, Trim::Tail];
}

pub(crate) fn range_operator(trim: Option<Trim>) -> &'static str {
    trim.map_or(":", Trim::operator)
}

/// Sheet/workbook scope of a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RefContext {
    /// Ordered scope stack, outermost first: `[Book]Sheet` is `["Book", "Sheet"]`.
    Scopes(Vec<String>),
    /// Explicit workbook and sheet (xlsx mode). `[1]Sheet1` has workbook `1`; empty strings mean
    /// "not given".
    External {
        workbook_name: String,
        sheet_name: String,
    },
}

impl Default for RefContext {
    fn default() -> Self {
        RefContext::Scopes(Vec::new())
    }
}

impl RefContext {
    pub(crate) fn empty(xlsx: bool) -> Self {
        if xlsx {
            RefContext::External {
                workbook_name: String::new(),
                sheet_name: String::new(),
            }
        } else {
            RefContext::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            RefContext::Scopes(scopes) => scopes.iter().all(String::is_empty),
            RefContext::External {
                workbook_name,
                sheet_name,
            } => workbook_name.is_empty() && sheet_name.is_empty(),
        }
    }

    /// Workbook and sheet names, if present. A single scope is taken to be a sheet.
    #[must_use]
    pub fn workbook_and_sheet<'a>(&'a self) -> (Option<&'a str>, Option<&'a str>) {
        let non_empty = |s: &'a str| (!s.is_empty()).then_some(s);
        match self {
            RefContext::Scopes(scopes) => {
                let scopes: Vec<&str> = scopes
                    .iter()
                    .map(String::as_str)
                    .filter(|s| !s.is_empty())
                    .collect();
                match scopes.as_slice() {
                    [] => (None, None),
                    [sheet] => (None, Some(sheet)),
                    [.., book, sheet] => (Some(book), Some(sheet)),
                }
            }
            RefContext::External {
                workbook_name,
                sheet_name,
            } => (non_empty(workbook_name), non_empty(sheet_name)),
        }
    }
}

/// What a parsed A1/R1C1 reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefTarget<R> {
    Range(R),
    Name(String),
}

/// A parsed reference with its prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference<R> {
    pub context: RefContext,
    pub target: RefTarget<R>,
}

impl<R> Reference<R> {
    #[must_use]
    pub fn range(&self) -> Option<&R> {
        match &self.target {
            RefTarget::Range(range) => Some(range),
            RefTarget::Name(_) => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.target {
            RefTarget::Name(name) => Some(name),
            RefTarget::Range(_) => None,
        }
    }
}

/// Options shared by the reference parsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefParseOptions {
    /// Accept defined names (`Sheet1!Rates`) as references.
    pub allow_named: bool,
    /// Accept partial ranges such as `A1:A` or `R1C1:R`.
    pub allow_ternary: bool,
    /// Produce [`RefContext::External`] contexts.
    pub xlsx: bool,
}

impl Default for RefParseOptions {
    fn default() -> Self {
        Self {
            allow_named: true,
            allow_ternary: false,
            xlsx: false,
        }
    }
}

/// Find the end of a leading `[...]` workbook segment (`]]` escapes a literal `]`).
pub(crate) fn find_workbook_prefix_end(src: &str, start: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    if bytes.get(start) != Some(&b'[') {
        return None;
    }

    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b']' {
            if bytes.get(i + 1) == Some(&b']') {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        // Step by chars so multi-byte sequences are never split.
        let ch = src[i..].chars().next()?;
        i += ch.len_utf8();
    }

    None
}

fn unquote_context(value: &str) -> String {
    let inner = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(value);
    inner.replace("''", "'")
}

/// Split `[Book]Sheet` into workbook and sheet.
fn split_workbook(raw: &str) -> (Option<String>, String) {
    match find_workbook_prefix_end(raw, 0) {
        Some(end) => (
            Some(raw[1..end - 1].replace("]]", "]")),
            raw[end..].to_string(),
        ),
        None => (None, raw.to_string()),
    }
}

pub(crate) fn parse_context(token: &Token, xlsx: bool) -> RefContext {
    let raw = if token.kind == TokenKind::ContextQuote {
        unquote_context(&token.value)
    } else {
        token.value.clone()
    };
    let (workbook, sheet) = split_workbook(&raw);
    if xlsx {
        RefContext::External {
            workbook_name: workbook.unwrap_or_default(),
            sheet_name: sheet,
        }
    } else {
        RefContext::Scopes(
            workbook
                .into_iter()
                .chain(std::iter::once(sheet))
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

fn is_plain_prefix_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || !c.is_ascii()
}

/// Whether a sheet name must be quoted to survive re-tokenizing.
fn sheet_needs_quoting(name: &str) -> bool {
    // Booleans lex before prefixes.
    name.eq_ignore_ascii_case("TRUE")
        || name.eq_ignore_ascii_case("FALSE")
        || name.starts_with(|c: char| c.is_ascii_digit())
        || !name.chars().all(is_plain_prefix_char)
        || a1::is_cell_like(name)
        || r1c1::is_cell_like(name)
}

fn workbook_needs_quoting(name: &str) -> bool {
    !name.chars().all(is_plain_prefix_char)
}

fn finish_prefix(body: String, quote: bool) -> String {
    if body.is_empty() {
        String::new()
    } else if quote {
        format!("'{}'!", body.replace('\'', "''"))
    } else {
        format!("{body}!")
    }
}

/// Render a context as the prefix of a reference, including the trailing `!`.
pub(crate) fn stringify_prefix(context: &RefContext) -> String {
    match context {
        RefContext::Scopes(scopes) => {
            let scopes: Vec<&str> = scopes
                .iter()
                .map(String::as_str)
                .filter(|s| !s.is_empty())
                .collect();
            let mut body = String::new();
            let mut quote = false;
            // Scopes alternate sheet/workbook from the innermost outwards.
            for (i, scope) in scopes.iter().rev().enumerate() {
                if i % 2 == 1 {
                    quote |= workbook_needs_quoting(scope);
                    body.insert_str(0, &format!("[{}]", scope.replace(']', "]]")));
                } else {
                    quote |= sheet_needs_quoting(scope);
                    body.insert_str(0, scope);
                }
            }
            finish_prefix(body, quote)
        }
        RefContext::External {
            workbook_name,
            sheet_name,
        } => {
            let mut body = String::new();
            let mut quote = false;
            if !workbook_name.is_empty() {
                quote |= workbook_needs_quoting(workbook_name);
                body.push_str(&format!("[{}]", workbook_name.replace(']', "]]")));
            }
            if !sheet_name.is_empty() {
                quote |= sheet_needs_quoting(sheet_name);
                body.push_str(sheet_name);
            }
            finish_prefix(body, quote)
        }
    }
}

/// Body of a reference string once its prefix has been split off.
pub(crate) enum RefBody {
    Range(String),
    Name(String),
}

/// Tokenize a lone reference string and split it into context and body.
///
/// Only the shapes a single reference can take are accepted; anything else (surrounding
/// whitespace, operators, formula prefix) yields `None`.
pub(crate) fn split_reference(
    text: &str,
    r1c1: bool,
    options: &RefParseOptions,
) -> Option<(RefContext, RefBody)> {
    let tokens = tokenize(
        text,
        &TokenizeOptions {
            allow_ternary: options.allow_ternary,
            negative_numbers: false,
            r1c1,
            merge_refs: false,
            xlsx: options.xlsx,
            with_location: false,
        },
    );

    let (context, rest) = split_context(&tokens, options.xlsx);
    let body = match rest {
        [token] if token.is_range() => RefBody::Range(token.value.clone()),
        [token] if token.kind == TokenKind::RangeNamed && options.allow_named => {
            RefBody::Name(token.value.clone())
        }
        [left, op, right]
            if left.kind == TokenKind::Range
                && right.kind == TokenKind::Range
                && Trim::from_operator(&op.value).is_some()
                && op.kind == TokenKind::Operator
                && !left.value.contains(':')
                && !right.value.contains(':') =>
        {
            RefBody::Range(format!("{}{}{}", left.value, op.value, right.value))
        }
        _ => return None,
    };
    Some((context, body))
}

pub(crate) fn split_context(tokens: &[Token], xlsx: bool) -> (RefContext, &[Token]) {
    match tokens {
        [ctx, bang, rest @ ..] if ctx.kind.is_context() && bang.is_operator("!") => {
            (parse_context(ctx, xlsx), rest)
        }
        _ => (RefContext::empty(xlsx), tokens),
    }
}
