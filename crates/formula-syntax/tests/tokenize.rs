use formula_syntax::{join_values, merge_ref_tokens, tokenize, Span, TokenKind, TokenizeOptions};
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

#[test]
fn sum_of_two_numbers() {
    use TokenKind::*;
    assert_eq!(
        kinds("=SUM(1,2)", &TokenizeOptions::default()),
        vec![
            tok(FxPrefix, "="),
            tok(Function, "SUM"),
            tok(Operator, "("),
            tok(Number, "1"),
            tok(Operator, ","),
            tok(Number, "2"),
            tok(Operator, ")"),
        ]
    );
}

#[test]
fn locations_are_byte_offsets() {
    let tokens = tokenize("=SUM(1,2)", &TokenizeOptions::default());
    let locs: Vec<_> = tokens.iter().map(|t| t.loc).collect();
    assert_eq!(
        locs,
        vec![
            Some(Span::new(0, 1)),
            Some(Span::new(1, 4)),
            Some(Span::new(4, 5)),
            Some(Span::new(5, 6)),
            Some(Span::new(6, 7)),
            Some(Span::new(7, 8)),
            Some(Span::new(8, 9)),
        ]
    );
}

#[test]
fn literal_kinds() {
    use TokenKind::*;
    assert_eq!(
        kinds("=TRUE&\"a\"\"b\"&#N/A&1.5E3", &TokenizeOptions::default()),
        vec![
            tok(FxPrefix, "="),
            tok(Boolean, "TRUE"),
            tok(Operator, "&"),
            tok(String, "\"a\"\"b\""),
            tok(Operator, "&"),
            tok(Error, "#N/A"),
            tok(Operator, "&"),
            tok(Number, "1.5E3"),
        ]
    );
}

#[test]
fn whitespace_and_newlines_are_kept() {
    use TokenKind::*;
    assert_eq!(
        kinds("=1 +\n2", &TokenizeOptions::default()),
        vec![
            tok(FxPrefix, "="),
            tok(Number, "1"),
            tok(Whitespace, " "),
            tok(Operator, "+"),
            tok(Newline, "\n"),
            tok(Number, "2"),
        ]
    );
}

#[test]
fn formulas_without_prefix_are_expressions() {
    use TokenKind::*;
    assert_eq!(
        kinds("A1*2", &TokenizeOptions::default()),
        vec![tok(Range, "A1"), tok(Operator, "*"), tok(Number, "2")]
    );
}

#[test]
fn references_merge_with_their_prefix() {
    use TokenKind::*;
    assert_eq!(
        kinds("='Q1 Data'!B2:C3+[Book.xlsx]Sheet1!Rates", &TokenizeOptions::default()),
        vec![
            tok(FxPrefix, "="),
            tok(Range, "'Q1 Data'!B2:C3"),
            tok(Operator, "+"),
            tok(RangeNamed, "[Book.xlsx]Sheet1!Rates"),
        ]
    );
}

#[test]
fn unmerged_output_keeps_the_parts() {
    use TokenKind::*;
    let opts = TokenizeOptions {
        merge_refs: false,
        ..TokenizeOptions::default()
    };
    assert_eq!(
        kinds("=Sheet1!A1", &opts),
        vec![
            tok(FxPrefix, "="),
            tok(Context, "Sheet1"),
            tok(Operator, "!"),
            tok(Range, "A1"),
        ]
    );
    let merged = merge_ref_tokens(&tokenize("=Sheet1!A1", &opts));
    assert_eq!(merged[1].value, "Sheet1!A1");
    assert_eq!(merged[1].kind, Range);
}

#[test]
fn ternary_ranges_are_opt_in() {
    use TokenKind::*;
    assert_eq!(
        kinds("=A1:A", &TokenizeOptions::default()),
        vec![
            tok(FxPrefix, "="),
            tok(Range, "A1"),
            tok(Operator, ":"),
            tok(RangeNamed, "A"),
        ]
    );
    let opts = TokenizeOptions {
        allow_ternary: true,
        ..TokenizeOptions::default()
    };
    assert_eq!(
        kinds("=A1:A", &opts),
        vec![tok(FxPrefix, "="), tok(RangeTernary, "A1:A")]
    );
}

#[test]
fn r1c1_notation() {
    use TokenKind::*;
    let opts = TokenizeOptions {
        r1c1: true,
        ..TokenizeOptions::default()
    };
    assert_eq!(
        kinds("=SUM(R[-1]C:R2C3,C[2])", &opts),
        vec![
            tok(FxPrefix, "="),
            tok(Function, "SUM"),
            tok(Operator, "("),
            tok(Range, "R[-1]C:R2C3"),
            tok(Operator, ","),
            tok(RangeBeam, "C[2]"),
            tok(Operator, ")"),
        ]
    );
}

#[test]
fn structured_references() {
    use TokenKind::*;
    assert_eq!(
        kinds("=SUM(Sales[[#Data],[Amount]])", &TokenizeOptions::default()),
        vec![
            tok(FxPrefix, "="),
            tok(Function, "SUM"),
            tok(Operator, "("),
            tok(Structured, "Sales[[#Data],[Amount]]"),
            tok(Operator, ")"),
        ]
    );
}

#[test]
fn bad_input_degrades_to_unknown_tokens() {
    let formula = "=\"open ¤ string";
    let tokens = tokenize(formula, &TokenizeOptions::default());
    assert_eq!(join_values(&tokens), formula);
    assert!(tokens.last().is_some_and(|t| t.unterminated));

    let formula = "=1+~~";
    let tokens = tokenize(formula, &TokenizeOptions::default());
    assert_eq!(join_values(&tokens), formula);
    assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Unknown));
}
