use formula_syntax::{
    add_a1_range_bounds, from_col, parse_a1_ref, stringify_a1_ref, to_col, RangeA1, RefContext,
    RefParseOptions, RefTarget, Reference, Trim, MAX_COLS, MAX_ROWS,
};
use pretty_assertions::assert_eq;

fn scopes(parts: &[&str]) -> RefContext {
    RefContext::Scopes(parts.iter().map(|s| s.to_string()).collect())
}

fn parse(text: &str) -> Option<Reference<RangeA1>> {
    parse_a1_ref(text, &RefParseOptions::default())
}

#[test]
fn mixed_locks_with_a_sheet_prefix() {
    let reference = parse("Sheet1!A$1:$B2").unwrap();
    assert_eq!(reference.context, scopes(&["Sheet1"]));
    assert_eq!(
        reference.target,
        RefTarget::Range(RangeA1 {
            top: Some(0),
            left: Some(0),
            bottom: Some(1),
            right: Some(1),
            top_abs: true,
            left_abs: false,
            bottom_abs: false,
            right_abs: true,
            trim: None,
        })
    );
    assert_eq!(stringify_a1_ref(&reference), "Sheet1!A$1:$B2");
}

#[test]
fn workbook_prefixes() {
    let reference = parse("[Book.xlsx]Sheet1!C3").unwrap();
    assert_eq!(reference.context, scopes(&["Book.xlsx", "Sheet1"]));
    assert_eq!(stringify_a1_ref(&reference), "[Book.xlsx]Sheet1!C3");

    let xlsx = RefParseOptions {
        xlsx: true,
        ..RefParseOptions::default()
    };
    let reference = parse_a1_ref("[1]Sheet1!A1", &xlsx).unwrap();
    assert_eq!(
        reference.context,
        RefContext::External {
            workbook_name: "1".to_string(),
            sheet_name: "Sheet1".to_string(),
        }
    );
    assert_eq!(stringify_a1_ref(&reference), "[1]Sheet1!A1");

    let reference = parse_a1_ref("[Book.xlsx]!Rates", &xlsx).unwrap();
    assert_eq!(
        reference.context,
        RefContext::External {
            workbook_name: "Book.xlsx".to_string(),
            sheet_name: String::new(),
        }
    );
    assert_eq!(reference.name(), Some("Rates"));
}

#[test]
fn quoted_prefixes_round_trip() {
    let reference = parse("'Bob''s Sheet'!A1").unwrap();
    assert_eq!(reference.context, scopes(&["Bob's Sheet"]));
    assert_eq!(stringify_a1_ref(&reference), "'Bob''s Sheet'!A1");
}

#[test]
fn names_are_optional() {
    assert_eq!(parse("Rates").unwrap().name(), Some("Rates"));
    let no_names = RefParseOptions {
        allow_named: false,
        ..RefParseOptions::default()
    };
    assert_eq!(parse_a1_ref("Rates", &no_names), None);
}

#[test]
fn ternary_ranges_are_opt_in() {
    assert_eq!(parse("A1:A"), None);
    let ternary = RefParseOptions {
        allow_ternary: true,
        ..RefParseOptions::default()
    };
    let reference = parse_a1_ref("A1:A", &ternary).unwrap();
    let range = reference.range().unwrap();
    assert_eq!((range.top, range.bottom), (Some(0), None));
    assert_eq!(stringify_a1_ref(&reference), "A1:A");
}

#[test]
fn trimmed_ranges() {
    let reference = parse("A1.:B10").unwrap();
    assert_eq!(reference.range().unwrap().trim, Some(Trim::Head));
    assert_eq!(stringify_a1_ref(&reference), "A1.:B10");

    // Trims join cells, never beams.
    for text in ["A:.C", "1.:3", "A1.:C"] {
        assert_eq!(parse(text).and_then(|r| r.range().copied()), None, "{text}");
    }
    let column = parse("A1:.A1048576").unwrap();
    assert_eq!(stringify_a1_ref(&column), "A1:.A1048576");
}

#[test]
fn rejects_anything_but_a_single_reference() {
    for text in ["", "=A1", "A1+B1", " A1", "A1:B2:C3", "A0", "SUM(A1)"] {
        assert_eq!(parse(text), None, "{text:?}");
    }
}

#[test]
fn columns_past_the_sheet_edge_are_names() {
    let reference = parse("XFE1").unwrap();
    assert_eq!(reference.context, scopes(&[]));
    assert_eq!(reference.target, RefTarget::Name("XFE1".to_string()));

    let strict = RefParseOptions {
        allow_named: false,
        ..RefParseOptions::default()
    };
    assert_eq!(parse_a1_ref("XFE1", &strict), None);
    assert!(parse("XFD1").unwrap().range().is_some());
}

#[test]
fn stringify_is_idempotent_on_canonical_forms() {
    for text in ["A1", "$A$1:B2", "A:C", "$2:$5", "'My Sheet'!B:B", "A1:XFD1048576"] {
        let once = stringify_a1_ref(&parse(text).unwrap());
        let twice = stringify_a1_ref(&parse(&once).unwrap());
        assert_eq!(once, twice, "{text}");
    }
}

#[test]
fn bounds_cover_the_sheet() {
    let range = add_a1_range_bounds(&RangeA1 {
        left: Some(2),
        right: Some(2),
        ..RangeA1::default()
    });
    assert_eq!(range.top, Some(0));
    assert_eq!(range.bottom, Some(MAX_ROWS));
    assert_eq!(add_a1_range_bounds(&range), range);
}

#[test]
fn column_labels() {
    assert_eq!(to_col(0), "A");
    assert_eq!(to_col(25), "Z");
    assert_eq!(to_col(26), "AA");
    assert_eq!(to_col(MAX_COLS), "XFD");
    assert_eq!(from_col("xfd"), Some(MAX_COLS));
    assert_eq!(from_col("AA"), Some(26));
    assert_eq!(from_col(""), None);
    assert_eq!(from_col("A1"), None);
}
