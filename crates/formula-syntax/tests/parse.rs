use formula_syntax::{
    parse, parse_tokens, tokenize, BinaryOp, LiteralValue, Node, NodeKind, ParseOptions, RefKind,
    Span, TokenizeOptions, UnaryOp,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn bare() -> ParseOptions {
    ParseOptions {
        with_location: false,
        ..ParseOptions::default()
    }
}

fn parse_bare(formula: &str) -> Node {
    parse(formula, &bare()).unwrap_or_else(|e| panic!("{formula}: {e}\n{}", e.pointer()))
}

#[test]
fn serializes_to_the_estree_like_shape() {
    let node = parse_bare("=SUM(A1,-2)");
    assert_eq!(
        serde_json::to_value(&node).unwrap(),
        json!({
            "type": "CallExpression",
            "callee": { "type": "Identifier", "name": "SUM" },
            "arguments": [
                { "type": "ReferenceIdentifier", "value": "A1", "kind": "range" },
                { "type": "Literal", "value": -2.0, "raw": "-2" },
            ],
        })
    );
}

#[test]
fn negative_numbers_can_stay_unary() {
    let opts = ParseOptions {
        negative_numbers: false,
        ..bare()
    };
    let Node::Unary(unary) = parse("=-2", &opts).unwrap() else {
        panic!("expected unary minus");
    };
    assert_eq!(unary.operator, UnaryOp::Minus);
}

#[test]
fn operator_precedence() {
    let cases = [
        ("=1+2*3", "1+2*3"),
        ("=(1+2)*3", "(1+2)*3"),
        ("=1=2&3", "1=2&3"),
        ("=A1:B2 C1%", "A1:B2 C1%"),
        ("=2^3^4", "2^3^4"),
    ];
    for (formula, expected) in cases {
        assert_eq!(parse_bare(formula).to_string(), expected, "{formula}");
    }

    let Node::Binary(eq) = parse_bare("=1=2&3") else {
        panic!("expected comparison");
    };
    assert_eq!(eq.operator, BinaryOp::Eq);
    assert!(matches!(*eq.right, Node::Binary(ref b) if b.operator == BinaryOp::Concat));
}

#[test]
fn reference_kinds() {
    let kinds = [
        ("=A1", RefKind::Range),
        ("=A:B", RefKind::Beam),
        ("=Rates", RefKind::Name),
        ("=Sales[Amount]", RefKind::Table),
        ("=Sheet1!A1:B2", RefKind::Range),
    ];
    for (formula, expected) in kinds {
        let Node::Reference(node) = parse_bare(formula) else {
            panic!("{formula} is not a reference");
        };
        assert_eq!(node.kind, expected, "{formula}");
    }
}

#[test]
fn postfix_and_prefix_operators() {
    let Node::Unary(spill) = parse_bare("=A1#") else {
        panic!("expected spill");
    };
    assert_eq!(spill.operator, UnaryOp::SpillRange);

    let Node::Unary(at) = parse_bare("=@A1:A10") else {
        panic!("expected implicit intersection");
    };
    assert_eq!(at.operator, UnaryOp::ImplicitIntersection);
    assert!(matches!(*at.argument, Node::Reference(_)));
}

#[test]
fn reference_operators_need_reference_operands() {
    assert!(parse("=A1:OFFSET(B2,1,1)", &bare()).is_ok());
    assert!(parse("=(A1,B2):C3", &bare()).is_ok());
    assert!(parse("=A1#:B2", &bare()).is_ok());

    let err = parse("=1:A1", &bare()).unwrap_err();
    assert_eq!(err.message, "Operands of `:` must be references");
    let err = parse("=A1:\"x\"", &bare()).unwrap_err();
    assert_eq!(err.offset, 4);
}

#[test]
fn literals() {
    let Node::Array(array) = parse_bare("={1,\"a\"\"b\";TRUE,#N/A}") else {
        panic!("expected array");
    };
    let values: Vec<_> = array.elements.iter().flatten().map(Node::kind).collect();
    assert_eq!(
        values,
        vec![
            NodeKind::Literal,
            NodeKind::Literal,
            NodeKind::Literal,
            NodeKind::ErrorLiteral
        ]
    );
    let Node::Literal(s) = &array.elements[0][1] else {
        panic!("expected string");
    };
    assert_eq!(s.value, LiteralValue::String("a\"b".to_string()));
    assert_eq!(s.raw, "\"a\"\"b\"");

    let Node::ErrorLiteral(err) = parse_bare("=#ref!") else {
        panic!("expected error literal");
    };
    assert_eq!(err.value, "#REF!");
    assert_eq!(err.raw, "#ref!");
}

#[test]
fn xlfn_prefixed_lambda_is_recognized() {
    let node = parse_bare("=_xlfn.LAMBDA(_xlpm.x,_xlpm.x+1)(2)");
    let Node::Call(call) = node else {
        panic!("expected call");
    };
    let Node::Lambda(lambda) = *call.callee else {
        panic!("expected lambda callee");
    };
    assert_eq!(lambda.params[0].name, "_xlpm.x");
}

#[test]
fn parse_tokens_matches_parse() {
    let formula = "=IF(Sheet1!A1>0, SUM(B1:B10), {1,2})";
    let tokens = tokenize(formula, &TokenizeOptions::default());
    assert_eq!(
        parse_tokens(&tokens, &ParseOptions::default()).unwrap(),
        parse(formula, &ParseOptions::default()).unwrap()
    );
}

#[test]
fn errors_carry_source_and_offset() {
    let err = parse("=SUM(1,,", &ParseOptions::default()).unwrap_err();
    assert_eq!(err.source_text, "=SUM(1,,");
    assert_eq!(err.offset, 8);

    let err = parse("=1+)", &ParseOptions::default()).unwrap_err();
    assert_eq!(err.message, "Unexpected `)`");
    assert_eq!(err.offset, 3);
    assert_eq!(err.pointer(), "=1+)\n   ^");

    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["offset"], 3);
}

#[test]
fn locations_span_subtrees() {
    let node = parse("=A1 * (2 + 3)", &ParseOptions::default()).unwrap();
    // Parentheses group without producing a node of their own.
    assert_eq!(node.loc(), Some(Span::new(1, 12)));
    let Node::Binary(mul) = node else {
        panic!("expected product");
    };
    assert_eq!(mul.right.loc(), Some(Span::new(7, 12)));
}

#[test]
fn r1c1_formulas_parse() {
    let opts = ParseOptions {
        r1c1: true,
        ..bare()
    };
    let Node::Call(call) = parse("=SUM(R[-1]C:R1C1,C2)", &opts).unwrap() else {
        panic!("expected call");
    };
    let kinds: Vec<_> = call
        .arguments
        .iter()
        .flatten()
        .map(|arg| match arg {
            Node::Reference(r) => r.kind,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(kinds, vec![RefKind::Range, RefKind::Beam]);
}
