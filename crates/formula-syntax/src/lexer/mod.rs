//! Lossless formula tokenizer.
//!
//! Every byte of the input ends up in exactly one token, so joining token values always
//! reproduces the formula. Input the matchers do not recognize becomes `unknown` tokens.

mod matchers;

use serde::{Deserialize, Serialize};

use crate::ast::Span;
use crate::merge::merge_ref_tokens;
use crate::token::{prev_significant, Token, TokenKind};
use matchers::{Match, MATCHERS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenizeOptions {
    /// Recognize partial ranges such as `A1:A` and `A1:1`.
    pub allow_ternary: bool,
    /// Fold a unary minus into the following number literal (`-1`).
    pub negative_numbers: bool,
    /// Read references in R1C1 notation.
    pub r1c1: bool,
    /// Combine prefixes, range operators and references into single tokens.
    pub merge_refs: bool,
    /// Workbook prefixes follow xlsx conventions (`[1]Sheet1!A1`).
    pub xlsx: bool,
    /// Attach byte spans to tokens.
    pub with_location: bool,
}

impl Default for TokenizeOptions {
    fn default() -> Self {
        Self {
            allow_ternary: false,
            negative_numbers: true,
            r1c1: false,
            merge_refs: true,
            xlsx: false,
            with_location: true,
        }
    }
}

/// Split a formula into tokens.
///
/// ```
/// use formula_syntax::{tokenize, TokenKind, TokenizeOptions};
///
/// let tokens = tokenize("=SUM(1,2)", &TokenizeOptions::default());
/// let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
/// assert_eq!(kinds[1], TokenKind::Function);
/// assert_eq!(tokens[1].value, "SUM");
/// ```
#[must_use]
pub fn tokenize(formula: &str, options: &TokenizeOptions) -> Vec<Token> {
    let mut tokens = Lexer::new(formula, options).run();
    if options.merge_refs {
        tokens = merge_ref_tokens(&tokens);
    }
    if !options.with_location {
        for token in &mut tokens {
            token.loc = None;
        }
    }
    tokens
}

struct Lexer<'a> {
    src: &'a str,
    opts: &'a TokenizeOptions,
    pos: usize,
    tokens: Vec<Token>,
    /// Indices of tentative trim operators, resolved once all tokens are known.
    trim_candidates: Vec<usize>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, opts: &'a TokenizeOptions) -> Self {
        Self {
            src,
            opts,
            pos: 0,
            tokens: Vec::new(),
            trim_candidates: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Token> {
        let src = self.src;
        if src.starts_with('=') {
            self.tokens
                .push(Token::new(TokenKind::FxPrefix, "=").with_loc(0, 1));
            self.pos = 1;
        }

        while self.pos < src.len() {
            let start = self.pos;
            let matched = MATCHERS
                .iter()
                .find_map(|matcher| matcher(src, start, self.opts))
                .filter(|m| m.end > start);
            match matched {
                Some(m) => self.push_match(start, m),
                None => {
                    let len = src[start..].chars().next().map_or(1, char::len_utf8);
                    self.push(
                        Token::new(TokenKind::Unknown, &src[start..start + len])
                            .with_loc(start, start + len),
                    );
                    self.pos = start + len;
                }
            }
        }

        self.resolve_trim_operators();
        relabel_lambda_names(&mut self.tokens);
        self.tokens
    }

    fn push_match(&mut self, start: usize, m: Match) {
        let mut token = Token::new(m.kind, &self.src[start..m.end]).with_loc(start, m.end);
        token.unterminated = m.unterminated;
        self.pos = m.end;

        if m.kind == TokenKind::Operator && matches!(token.value.as_str(), ".:" | ":." | ".:.") {
            self.trim_candidates.push(self.tokens.len());
        }
        if m.kind == TokenKind::Number && self.opts.negative_numbers && self.take_unary_minus() {
            token.value.insert(0, '-');
            token.loc = Some(Span::new(start - 1, m.end));
        }
        self.push(token);
    }

    /// Pop a `-` that directly precedes a number when it cannot be a binary minus.
    fn take_unary_minus(&mut self) -> bool {
        let Some(last) = self.tokens.last() else {
            return false;
        };
        if !last.is_operator("-") {
            return false;
        }
        let minus = self.tokens.len() - 1;
        let unary = match prev_significant(&self.tokens, minus) {
            None => true,
            Some(j) => {
                let prev = &self.tokens[j];
                prev.kind == TokenKind::FxPrefix
                    || (prev.kind == TokenKind::Operator
                        && !matches!(prev.value.as_str(), ")" | "}" | "%" | "#"))
            }
        };
        if unary {
            self.tokens.pop();
        }
        unary
    }

    /// Append a token, folding unknown input into neighbouring unknown or identifier runs.
    fn push(&mut self, token: Token) {
        if let Some(last) = self.tokens.last_mut() {
            let coalesce = (token.kind == TokenKind::Unknown
                && matches!(
                    last.kind,
                    TokenKind::Unknown | TokenKind::RangeNamed | TokenKind::Function
                ))
                || (last.kind == TokenKind::Unknown && token.kind == TokenKind::RangeNamed);
            if coalesce {
                last.kind = TokenKind::Unknown;
                last.value.push_str(&token.value);
                if let (Some(a), Some(b)) = (last.loc, token.loc) {
                    last.loc = Some(a.cover(b));
                }
                return;
            }
        }
        self.tokens.push(token);
    }

    /// Keep trim operators only between two ranges.
    fn resolve_trim_operators(&mut self) {
        for &idx in &self.trim_candidates {
            let is_range = |i: Option<usize>| {
                i.and_then(|i| self.tokens.get(i))
                    .is_some_and(|t| t.kind == TokenKind::Range)
            };
            if is_range(idx.checked_sub(1)) && is_range(Some(idx + 1)) {
                continue;
            }
            log::trace!(
                "demoting trim operator `{}` at token {idx}",
                self.tokens[idx].value
            );
            self.tokens[idx].kind = TokenKind::Unknown;
        }
    }
}

fn is_lambda_or_let(name: &str) -> bool {
    let name = name
        .get(..6)
        .filter(|p| p.eq_ignore_ascii_case("_xlfn."))
        .map_or(name, |_| &name[6..]);
    name.eq_ignore_ascii_case("LAMBDA") || name.eq_ignore_ascii_case("LET")
}

/// Inside `LAMBDA(...)`/`LET(...)`, a bare `r` or `c` is a parameter name, not an R1C1 fragment.
fn relabel_lambda_names(tokens: &mut [Token]) {
    let mut depth = 0usize;
    let mut scopes: Vec<usize> = Vec::new();
    let mut pending = false;
    for (idx, token) in tokens.iter_mut().enumerate() {
        match token.kind {
            TokenKind::Function => {
                pending = is_lambda_or_let(&token.value);
                continue;
            }
            TokenKind::Operator if token.value == "(" => {
                depth += 1;
                if pending {
                    scopes.push(depth);
                }
            }
            TokenKind::Operator if token.value == ")" => {
                if scopes.last() == Some(&depth) {
                    scopes.pop();
                }
                depth = depth.saturating_sub(1);
            }
            // In R1C1 mode a bare `R`/`C` lexes as a beam.
            TokenKind::Unknown | TokenKind::RangeBeam
                if scopes.last() == Some(&depth)
                    && (token.value.eq_ignore_ascii_case("r")
                        || token.value.eq_ignore_ascii_case("c")) =>
            {
                log::trace!("treating `{}` at token {idx} as a name", token.value);
                token.kind = TokenKind::RangeNamed;
            }
            _ => {}
        }
        pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(formula: &str, opts: &TokenizeOptions) -> Vec<(TokenKind, String)> {
        tokenize(formula, opts)
            .into_iter()
            .map(|t| (t.kind, t.value))
            .collect()
    }

    fn tok(kind: TokenKind, value: &str) -> (TokenKind, String) {
        (kind, value.to_string())
    }

    fn unmerged() -> TokenizeOptions {
        TokenizeOptions {
            merge_refs: false,
            ..TokenizeOptions::default()
        }
    }

    #[test]
    fn unary_minus_folds_only_in_operand_position() {
        use TokenKind::*;
        assert_eq!(
            kinds("=-1+2-3", &unmerged()),
            vec![
                tok(FxPrefix, "="),
                tok(Number, "-1"),
                tok(Operator, "+"),
                tok(Number, "2"),
                tok(Operator, "-"),
                tok(Number, "3"),
            ]
        );
        assert_eq!(
            kinds("=(1)-2", &unmerged())[4..].to_vec(),
            vec![tok(Operator, "-"), tok(Number, "2")]
        );
        assert_eq!(kinds("=- 1", &unmerged())[1], tok(Operator, "-"));
        assert_eq!(kinds("=-1", &unmerged())[1], tok(Number, "-1"));
        let folded = tokenize("=-1", &unmerged());
        assert_eq!(folded[1].loc, Some(Span::new(1, 3)));
    }

    #[test]
    fn unknown_input_coalesces() {
        use TokenKind::*;
        assert_eq!(
            kinds("=foo$$", &unmerged()),
            vec![tok(FxPrefix, "="), tok(Unknown, "foo$$")]
        );
    }

    #[test]
    fn trim_operators_need_ranges_on_both_sides() {
        use TokenKind::*;
        assert_eq!(
            kinds("A1.:B2", &unmerged()),
            vec![tok(Range, "A1"), tok(Operator, ".:"), tok(Range, "B2")]
        );
        assert_eq!(kinds("=1 .:2", &unmerged())[3], tok(Unknown, ".:"));
    }

    #[test]
    fn lambda_parameters_named_r_and_c() {
        let tokens = tokenize("=LAMBDA(r,c,r*c)", &unmerged());
        let names: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::RangeNamed)
            .map(|t| t.value.as_str())
            .collect();
        assert_eq!(names, vec!["r", "c", "r", "c"]);

        // Nested calls do not inherit the relabeling.
        let tokens = tokenize("=LAMBDA(x,SUM(r))", &unmerged());
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Unknown && t.value == "r"));
    }

    #[test]
    fn locations_can_be_omitted() {
        let tokens = tokenize(
            "=A1",
            &TokenizeOptions {
                with_location: false,
                ..TokenizeOptions::default()
            },
        );
        assert!(tokens.iter().all(|t| t.loc.is_none()));
    }
}
