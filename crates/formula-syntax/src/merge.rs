//! Reference merging.
//!
//! Combines the token sequences that together spell one reference (`Sheet1`, `!`, `A1`, `:`,
//! `B2`) into a single token carrying the kind of its right-most part.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::ast::Span;
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Kind(TokenKind),
    Op(&'static str),
}

fn key_for(token: &Token) -> Option<Key> {
    if token.kind == TokenKind::Operator {
        let op = match token.value.as_str() {
            ":" => ":",
            ".:" => ".:",
            ":." => ":.",
            ".:." => ".:.",
            "!" => "!",
            _ => return None,
        };
        return Some(Key::Op(op));
    }
    Some(Key::Kind(token.kind))
}

#[derive(Debug, Default)]
struct Trie {
    children: HashMap<Key, Trie>,
    terminal: bool,
}

impl Trie {
    /// Insert a shape, walking it from its last element.
    fn insert(&mut self, shape: &[Key]) {
        let mut node = self;
        for key in shape.iter().rev() {
            node = node.children.entry(*key).or_default();
        }
        node.terminal = true;
    }
}

/// Every token sequence that forms a single reference.
fn shapes() -> Vec<Vec<Key>> {
    use TokenKind::{Range, RangeBeam, RangeNamed, RangeTernary, Structured};
    let k = Key::Kind;
    let bang = Key::Op("!");
    let range_ops = [":", ".:", ":.", ".:."];

    let mut bare: Vec<Vec<Key>> = vec![
        vec![k(Range)],
        vec![k(RangeBeam)],
        vec![k(RangeTernary)],
        vec![k(RangeNamed)],
        vec![k(Structured)],
    ];
    for op in range_ops {
        bare.push(vec![k(Range), Key::Op(op), k(Range)]);
    }

    let mut out = bare.clone();
    for context in [TokenKind::Context, TokenKind::ContextQuote] {
        for shape in &bare {
            let mut prefixed = vec![k(context), bang];
            prefixed.extend_from_slice(shape);
            out.push(prefixed);
        }
    }
    out
}

fn grammar() -> &'static Trie {
    static GRAMMAR: OnceLock<Trie> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        let mut trie = Trie::default();
        for shape in shapes() {
            trie.insert(&shape);
        }
        trie
    })
}

/// A range operator may only join two plain cells (`A1:B2:C3` is not one reference).
fn is_valid_run(run: &[Token]) -> bool {
    run.iter().enumerate().all(|(i, token)| {
        if token.kind != TokenKind::Operator || token.value == "!" {
            return true;
        }
        let plain = |t: Option<&Token>| t.is_some_and(|t| !t.value.contains(':'));
        plain(i.checked_sub(1).and_then(|j| run.get(j))) && plain(run.get(i + 1))
    })
}

/// Lengths of all grammar matches ending at `end`, longest first.
fn match_lengths(tokens: &[Token], end: usize) -> Vec<usize> {
    let mut node = grammar();
    let mut lengths = Vec::new();
    for (n, token) in tokens[..=end].iter().rev().enumerate() {
        let Some(next) = key_for(token).and_then(|key| node.children.get(&key)) else {
            break;
        };
        node = next;
        if node.terminal {
            lengths.push(n + 1);
        }
    }
    lengths.reverse();
    lengths
}

fn merge_run(run: &[Token]) -> Token {
    let anchor = &run[run.len() - 1];
    let value: String = run.iter().map(|t| t.value.as_str()).collect();
    let mut merged = Token::new(anchor.kind, value);
    if let (Some(first), Some(last)) = (run[0].loc, anchor.loc) {
        merged.loc = Some(Span::new(first.start, last.end));
    }
    merged
}

/// Merge reference parts into single tokens. Tokens that are not part of a reference pass
/// through unchanged.
#[must_use]
pub fn merge_ref_tokens(tokens: &[Token]) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut end = tokens.len();
    while end > 0 {
        let last = end - 1;
        if tokens[last].is_reference() {
            let best = match_lengths(tokens, last)
                .into_iter()
                .find(|&len| is_valid_run(&tokens[end - len..end]));
            if let Some(len) = best.filter(|&len| len > 1) {
                out.push(merge_run(&tokens[end - len..end]));
                end -= len;
                continue;
            }
        }
        out.push(tokens[last].clone());
        end = last;
    }
    out.reverse();
    out
}
