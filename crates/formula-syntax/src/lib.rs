#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Syntax-only analysis of spreadsheet formulas.
//!
//! The crate turns Excel-compatible formula text into a lossless token stream ([`tokenize`]) and
//! an abstract syntax tree ([`parse`]) without evaluating anything. On top of that it provides an
//! algebra for cell references:
//!
//! - A1 and R1C1 references, parsed into [`RangeA1`] / [`RangeR1C1`] and rendered back
//!   ([`parse_a1_ref`], [`stringify_r1c1_ref`], ...).
//! - Structured (table) references ([`parse_struct_ref`], [`stringify_struct_ref`]).
//! - Formula rewriting services: translation between notations ([`translate_to_r1c1`],
//!   [`translate_to_a1`]), canonicalization ([`fix_ranges`]) and editor metadata
//!   ([`add_token_meta`]).
//!
//! ## Prefixes
//!
//! By default a prefix such as `[Book.xlsx]Sheet1!` is kept as an ordered scope stack
//! ([`RefContext::Scopes`]). With the `xlsx` option the same prefix is read as an explicit
//! workbook/sheet pair ([`RefContext::External`]), which is how xlsx files spell external links
//! (`[1]Sheet1!A1`).
//!
//! All functions are pure; nothing is cached between calls except the reference merge grammar.

pub mod ast;
pub mod editing;
pub mod error;
pub mod lexer;
pub mod merge;
pub mod parser;
pub mod refs;
pub mod token;

pub use ast::{
    ArrayExpr, BinaryExpr, BinaryOp, CallExpr, ErrorLiteralNode, Identifier, LambdaExpr,
    LetDeclarator, LetExpr, LiteralNode, LiteralValue, Node, NodeKind, ParseError, RefKind,
    ReferenceNode, Span, UnaryExpr, UnaryOp,
};
pub use editing::fix::{fix_ranges, fix_token_ranges, FixRangesOptions};
pub use editing::token_meta::{add_token_meta, TokenMetaContext};
pub use editing::translate::{
    translate_to_a1, translate_to_r1c1, translate_tokens_to_a1, translate_tokens_to_r1c1,
    TranslateOptions,
};
pub use error::EditError;
pub use lexer::{tokenize, TokenizeOptions};
pub use merge::merge_ref_tokens;
pub use parser::{parse, parse_tokens, ParseOptions, DEFAULT_REFERENCE_FUNCTIONS};
pub use refs::a1::{add_a1_range_bounds, parse_a1_ref, stringify_a1_ref, A1Reference, RangeA1};
pub use refs::column::{from_col, to_col, MAX_COLS, MAX_ROWS};
pub use refs::r1c1::{parse_r1c1_ref, stringify_r1c1_ref, R1C1Reference, RangeR1C1};
pub use refs::structured::{
    parse_struct_ref, stringify_struct_ref, StructuredReference, TableSection,
};
pub use refs::{RefContext, RefParseOptions, RefTarget, Reference, Trim};
pub use token::{join_values, Token, TokenKind, TokenMeta};
