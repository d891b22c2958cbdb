//! Token-level formula rewriting: notation translation, range canonicalization and editor
//! metadata.
//!
//! Services never mutate their input. Rewritten tokens are clones whose locations are shifted by
//! the accumulated change in length of the tokens before them.

pub mod fix;
pub mod token_meta;
pub mod translate;

use crate::ast::Span;
use crate::error::EditError;
use crate::refs::a1;
use crate::token::Token;

const REF_ERROR: &str = "#REF!";

/// Parse an anchor cell such as `D10` into 0-based `(row, col)`.
fn parse_anchor(anchor: &str) -> Result<(u32, u32), EditError> {
    a1::parse_cell(anchor).ok_or_else(|| EditError::InvalidAnchor(anchor.to_string()))
}

/// Map every token through `rewrite` (`None` keeps the token as is), keeping `loc` consistent
/// with the new values.
fn rewrite_tokens<F>(tokens: &[Token], mut rewrite: F) -> Vec<Token>
where
    F: FnMut(&Token) -> Option<Token>,
{
    let mut delta: isize = 0;
    tokens
        .iter()
        .map(|token| {
            let mut out = rewrite(token).unwrap_or_else(|| token.clone());
            if let Some(loc) = token.loc {
                let start = loc.start.saturating_add_signed(delta);
                out.loc = Some(Span::new(start, start + out.value.len()));
            }
            delta += out.value.len() as isize - token.value.len() as isize;
            out
        })
        .collect()
}

/// Clone `token` with a new value.
fn with_value(token: &Token, value: String) -> Token {
    let mut out = token.clone();
    out.value = value;
    out
}
