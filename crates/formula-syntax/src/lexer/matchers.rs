//! Individual token matchers, tried in order by the lexer.

use super::TokenizeOptions;
use crate::refs::{a1, find_workbook_prefix_end, r1c1, structured};
use crate::token::TokenKind;

/// A successful match: token kind and end offset (exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Match {
    pub kind: TokenKind,
    pub end: usize,
    pub unterminated: bool,
}

impl Match {
    fn new(kind: TokenKind, end: usize) -> Self {
        Self {
            kind,
            end,
            unterminated: false,
        }
    }
}

pub(crate) type Matcher = fn(&str, usize, &TokenizeOptions) -> Option<Match>;

/// First match wins.
pub(crate) const MATCHERS: &[Matcher] = &[
    lex_error,
    lex_range_trim,
    lex_operator,
    lex_function,
    lex_boolean,
    lex_newline,
    lex_whitespace,
    lex_string,
    lex_context,
    lex_range,
    lex_structured,
    lex_number,
    lex_name,
];

const ERROR_LITERALS: &[&str] = &[
    "#NULL!",
    "#DIV/0!",
    "#VALUE!",
    "#REF!",
    "#NAME?",
    "#NUM!",
    "#N/A",
    "#GETTING_DATA",
    "#SPILL!",
    "#CALC!",
    "#FIELD!",
    "#BLOCKED!",
    "#CONNECT!",
    "#UNKNOWN!",
    "#BUSY!",
    "#EXTERNAL!",
    "#PYTHON!",
];

fn starts_with_ignore_case(input: &str, prefix: &str) -> bool {
    input
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn lex_error(src: &str, pos: usize, _: &TokenizeOptions) -> Option<Match> {
    let input = &src[pos..];
    if !input.starts_with('#') {
        return None;
    }
    let len = ERROR_LITERALS
        .iter()
        .filter(|lit| starts_with_ignore_case(input, lit))
        .map(|lit| lit.len())
        .max()?;
    Some(Match::new(TokenKind::Error, pos + len))
}

/// Trim operators are tentative; the lexer demotes them unless flanked by ranges.
fn lex_range_trim(src: &str, pos: usize, _: &TokenizeOptions) -> Option<Match> {
    let input = &src[pos..];
    [".:.", ".:", ":."]
        .into_iter()
        .find(|op| input.starts_with(op))
        .map(|op| Match::new(TokenKind::Operator, pos + op.len()))
}

fn lex_operator(src: &str, pos: usize, _: &TokenizeOptions) -> Option<Match> {
    let input = &src[pos..];
    if ["<>", "<=", ">="].iter().any(|op| input.starts_with(op)) {
        return Some(Match::new(TokenKind::Operator, pos + 2));
    }
    let c = input.chars().next()?;
    matches!(
        c,
        '+' | '-' | '*' | '/' | '^' | '&' | '=' | '<' | '>' | '%' | '(' | ')' | '{' | '}' | ','
            | ';' | ':' | '!' | '@' | '#'
    )
    .then(|| Match::new(TokenKind::Operator, pos + 1))
}

pub(crate) fn is_ident_start_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '\\' || c >= '\u{a1}'
}

pub(crate) fn is_ident_cont_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '\\') || c >= '\u{a1}'
}

/// Length of an identifier at the start of `input`, or 0.
fn ident_len(input: &str, cont: fn(char) -> bool) -> usize {
    if !input.starts_with(is_ident_start_char) {
        return 0;
    }
    input.find(|c: char| !cont(c)).unwrap_or(input.len())
}

fn lex_function(src: &str, pos: usize, _: &TokenizeOptions) -> Option<Match> {
    let len = ident_len(&src[pos..], is_ident_cont_char);
    (len > 0 && src[pos + len..].starts_with('('))
        .then(|| Match::new(TokenKind::Function, pos + len))
}

fn lex_boolean(src: &str, pos: usize, _: &TokenizeOptions) -> Option<Match> {
    let input = &src[pos..];
    let len = ["TRUE", "FALSE"]
        .into_iter()
        .find(|b| starts_with_ignore_case(input, b))?
        .len();
    match input[len..].chars().next() {
        Some(c) if a1::is_name_char(c) || c == '(' => None,
        _ => Some(Match::new(TokenKind::Boolean, pos + len)),
    }
}

fn lex_newline(src: &str, pos: usize, _: &TokenizeOptions) -> Option<Match> {
    let bytes = src.as_bytes();
    let mut i = pos;
    loop {
        match bytes.get(i) {
            Some(b'\n') => i += 1,
            Some(b'\r') if bytes.get(i + 1) == Some(&b'\n') => i += 2,
            _ => break,
        }
    }
    (i > pos).then(|| Match::new(TokenKind::Newline, i))
}

pub(crate) fn is_whitespace_char(c: char) -> bool {
    matches!(
        c,
        ' ' | '\t'
            | '\r'
            | '\u{0B}'
            | '\u{0C}'
            | '\u{A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
            | '\u{FEFF}'
    )
}

fn lex_whitespace(src: &str, pos: usize, _: &TokenizeOptions) -> Option<Match> {
    let input = &src[pos..];
    let len = input
        .find(|c: char| !is_whitespace_char(c))
        .unwrap_or(input.len());
    (len > 0).then(|| Match::new(TokenKind::Whitespace, pos + len))
}

fn lex_string(src: &str, pos: usize, _: &TokenizeOptions) -> Option<Match> {
    let bytes = src.as_bytes();
    if bytes.get(pos) != Some(&b'"') {
        return None;
    }
    let mut i = pos + 1;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return Some(Match::new(TokenKind::String, i + 1));
        }
        i += 1;
    }
    Some(Match {
        kind: TokenKind::String,
        end: src.len(),
        unterminated: true,
    })
}

fn is_sheet_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c >= '\u{a1}'
}

/// A sheet/workbook prefix, only when directly followed by `!`.
fn lex_context(src: &str, pos: usize, _: &TokenizeOptions) -> Option<Match> {
    let bytes = src.as_bytes();
    if bytes.get(pos) == Some(&b'\'') {
        let mut i = pos + 1;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                return (bytes.get(i + 1) == Some(&b'!') && i > pos + 1)
                    .then(|| Match::new(TokenKind::ContextQuote, i + 1));
            }
            i += 1;
        }
        return None;
    }

    let mut i = find_workbook_prefix_end(src, pos).unwrap_or(pos);
    let rest = &src[i..];
    i += rest.find(|c: char| !is_sheet_char(c)).unwrap_or(rest.len());
    (i > pos && bytes.get(i) == Some(&b'!')).then(|| Match::new(TokenKind::Context, i))
}

fn lex_range(src: &str, pos: usize, opts: &TokenizeOptions) -> Option<Match> {
    let (kind, end) = if opts.r1c1 {
        r1c1::scan_range(src, pos, opts.allow_ternary)?
    } else {
        a1::scan_range(src, pos, opts.allow_ternary)?
    };
    Some(Match::new(kind, end))
}

fn lex_structured(src: &str, pos: usize, _: &TokenizeOptions) -> Option<Match> {
    structured::scan(src, pos).map(|end| Match::new(TokenKind::Structured, end))
}

fn lex_number(src: &str, pos: usize, _: &TokenizeOptions) -> Option<Match> {
    let bytes = src.as_bytes();
    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let mut i = pos;
    let int_len = digits(i);
    i += int_len;
    if int_len == 0 {
        // `.5`
        if bytes.get(i) != Some(&b'.') {
            return None;
        }
        let frac = digits(i + 1);
        if frac == 0 {
            return None;
        }
        i += 1 + frac;
    } else if bytes.get(i) == Some(&b'.') {
        i += 1 + digits(i + 1);
    }

    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(i + 1), Some(b'+' | b'-')));
        let exp = digits(i + 1 + sign);
        if exp > 0 {
            i += 1 + sign + exp;
        }
    }
    Some(Match::new(TokenKind::Number, i))
}

fn is_name_cont_char(c: char) -> bool {
    is_ident_cont_char(c) || c == '?'
}

/// Defined names. A bare `r` or `c` is reserved and left for the lexer's relabeling pass.
fn lex_name(src: &str, pos: usize, _: &TokenizeOptions) -> Option<Match> {
    let len = ident_len(&src[pos..], is_name_cont_char);
    if len == 0 {
        return None;
    }
    let name = &src[pos..pos + len];
    if name.eq_ignore_ascii_case("r") || name.eq_ignore_ascii_case("c") {
        return None;
    }
    Some(Match::new(TokenKind::RangeNamed, pos + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(matcher: Matcher, src: &str) -> Option<(TokenKind, usize)> {
        matcher(src, 0, &TokenizeOptions::default()).map(|m| (m.kind, m.end))
    }

    #[test]
    fn error_literals_match_case_insensitively() {
        assert_eq!(run(lex_error, "#ref!+1"), Some((TokenKind::Error, 5)));
        assert_eq!(run(lex_error, "#N/A"), Some((TokenKind::Error, 4)));
        assert_eq!(run(lex_error, "#GETTING_DATA"), Some((TokenKind::Error, 13)));
        assert_eq!(run(lex_error, "#BOGUS!"), None);
    }

    #[test]
    fn numbers() {
        assert_eq!(run(lex_number, "12.5e-3x"), Some((TokenKind::Number, 7)));
        assert_eq!(run(lex_number, ".5"), Some((TokenKind::Number, 2)));
        assert_eq!(run(lex_number, "1."), Some((TokenKind::Number, 2)));
        assert_eq!(run(lex_number, "1e"), Some((TokenKind::Number, 1)));
        assert_eq!(run(lex_number, "."), None);
    }

    #[test]
    fn strings_may_be_unterminated() {
        assert_eq!(run(lex_string, r#""a""b"c"#), Some((TokenKind::String, 6)));
        let m = lex_string("\"abc", 0, &TokenizeOptions::default()).unwrap();
        assert!(m.unterminated);
        assert_eq!(m.end, 4);
    }

    #[test]
    fn contexts_need_a_bang() {
        assert_eq!(run(lex_context, "Sheet1!A1"), Some((TokenKind::Context, 6)));
        assert_eq!(run(lex_context, "'My Sheet'!A1"), Some((TokenKind::ContextQuote, 10)));
        assert_eq!(run(lex_context, "[Book.xlsx]Sheet1!A1"), Some((TokenKind::Context, 17)));
        assert_eq!(run(lex_context, "[1]!Name"), Some((TokenKind::Context, 3)));
        assert_eq!(run(lex_context, "Sheet1+1"), None);
        assert_eq!(run(lex_context, "'x'"), None);
    }

    #[test]
    fn booleans_and_names() {
        assert_eq!(run(lex_boolean, "true"), Some((TokenKind::Boolean, 4)));
        assert_eq!(run(lex_boolean, "TRUEX"), None);
        assert_eq!(run(lex_name, "foo.bar?"), Some((TokenKind::RangeNamed, 8)));
        assert_eq!(run(lex_name, "r"), None);
        assert_eq!(run(lex_name, "rc"), Some((TokenKind::RangeNamed, 2)));
        assert_eq!(run(lex_function, "_xlfn.XLOOKUP("), Some((TokenKind::Function, 13)));
    }

    #[test]
    fn whitespace_includes_unicode_spaces() {
        assert_eq!(run(lex_whitespace, " \u{a0}\u{3000}x"), Some((TokenKind::Whitespace, 6)));
        assert_eq!(run(lex_newline, "\r\n\nx"), Some((TokenKind::Newline, 3)));
    }
}
