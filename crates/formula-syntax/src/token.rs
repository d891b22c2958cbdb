use serde::{Deserialize, Serialize};

use crate::ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Leading `=`.
    #[serde(rename = "fx_prefix")]
    FxPrefix,
    #[serde(rename = "operator")]
    Operator,
    #[serde(rename = "bool")]
    Boolean,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "func")]
    Function,
    #[serde(rename = "newline")]
    Newline,
    #[serde(rename = "whitespace")]
    Whitespace,
    #[serde(rename = "string")]
    String,
    /// Unquoted sheet/workbook prefix, e.g. `Sheet1` or `[Book.xlsx]Sheet1`.
    #[serde(rename = "context")]
    Context,
    /// Quoted sheet/workbook prefix, e.g. `'My Sheet'`.
    #[serde(rename = "context_quote")]
    ContextQuote,
    #[serde(rename = "range")]
    Range,
    /// Whole rows or columns (`A:A`, `1:1`, `R2`, `C[1]`).
    #[serde(rename = "range_beam")]
    RangeBeam,
    /// Partially bounded range (`A1:A`, `A1:1`).
    #[serde(rename = "range_ternary")]
    RangeTernary,
    /// Defined name or other identifier.
    #[serde(rename = "range_named")]
    RangeNamed,
    #[serde(rename = "structured")]
    Structured,
    #[serde(rename = "unknown")]
    Unknown,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TokenKind::FxPrefix => "fx_prefix",
            TokenKind::Operator => "operator",
            TokenKind::Boolean => "bool",
            TokenKind::Error => "error",
            TokenKind::Number => "number",
            TokenKind::Function => "func",
            TokenKind::Newline => "newline",
            TokenKind::Whitespace => "whitespace",
            TokenKind::String => "string",
            TokenKind::Context => "context",
            TokenKind::ContextQuote => "context_quote",
            TokenKind::Range => "range",
            TokenKind::RangeBeam => "range_beam",
            TokenKind::RangeTernary => "range_ternary",
            TokenKind::RangeNamed => "range_named",
            TokenKind::Structured => "structured",
            TokenKind::Unknown => "unknown",
        }
    }

    /// Range-like kinds (excludes names and structured references).
    #[must_use]
    pub const fn is_range(self) -> bool {
        matches!(
            self,
            TokenKind::Range | TokenKind::RangeBeam | TokenKind::RangeTernary
        )
    }

    /// Any kind the parser turns into a reference node.
    #[must_use]
    pub const fn is_reference(self) -> bool {
        matches!(
            self,
            TokenKind::Range
                | TokenKind::RangeBeam
                | TokenKind::RangeTernary
                | TokenKind::RangeNamed
                | TokenKind::Structured
        )
    }

    #[must_use]
    pub const fn is_context(self) -> bool {
        matches!(self, TokenKind::Context | TokenKind::ContextQuote)
    }

    #[must_use]
    pub const fn is_whitespace(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Newline)
    }

    #[must_use]
    pub const fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::Boolean | TokenKind::Error | TokenKind::Number | TokenKind::String
        )
    }
}

/// Editor metadata attached by [`crate::add_token_meta`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMeta {
    /// Position of the token in the list.
    pub index: usize,
    /// Paren/brace nesting depth (a bracket shares the depth of its partner).
    pub depth: usize,
    /// Pairs matching brackets and equivalent references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Unbalanced bracket or unrecognized input.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
    /// Set on string literals that run to the end of the input.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unterminated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<TokenMeta>,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            loc: None,
            unterminated: false,
            meta: None,
        }
    }

    #[must_use]
    pub fn with_loc(mut self, start: usize, end: usize) -> Self {
        self.loc = Some(Span::new(start, end));
        self
    }

    #[must_use]
    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.value == op
    }

    #[must_use]
    pub fn is_range(&self) -> bool {
        self.kind.is_range()
    }

    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.kind.is_reference()
    }

    #[must_use]
    pub fn is_whitespace(&self) -> bool {
        self.kind.is_whitespace()
    }

    #[must_use]
    pub fn is_function(&self) -> bool {
        self.kind == TokenKind::Function
    }

    #[must_use]
    pub fn is_fx_prefix(&self) -> bool {
        self.kind == TokenKind::FxPrefix
    }

    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.kind.is_literal()
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == TokenKind::Error
    }

    /// Group id assigned by [`crate::add_token_meta`], if any.
    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.group_id.as_deref())
    }
}

/// Concatenate token values back into formula text.
#[must_use]
pub fn join_values(tokens: &[Token]) -> String {
    let mut out = String::with_capacity(tokens.iter().map(|t| t.value.len()).sum());
    for token in tokens {
        out.push_str(&token.value);
    }
    out
}

pub(crate) fn prev_significant(tokens: &[Token], idx: usize) -> Option<usize> {
    let mut j = idx;
    while j > 0 {
        j -= 1;
        if !tokens[j].is_whitespace() {
            return Some(j);
        }
    }
    None
}

pub(crate) fn next_significant(tokens: &[Token], idx: usize) -> Option<usize> {
    let mut j = idx + 1;
    while j < tokens.len() {
        if !tokens[j].is_whitespace() {
            return Some(j);
        }
        j += 1;
    }
    None
}
