use formula_syntax::{
    add_a1_range_bounds, fix_ranges, join_values, parse, parse_a1_ref, parse_r1c1_ref,
    parse_tokens, stringify_a1_ref, stringify_r1c1_ref, to_col, tokenize, translate_to_a1,
    translate_to_r1c1, FixRangesOptions, ParseOptions, RangeA1, RefParseOptions,
    TokenizeOptions, TranslateOptions,
};
use proptest::prelude::*;
use proptest::test_runner::{Config, RngAlgorithm, TestRng, TestRunner};

const CASES: u32 = 128;
const SEED: [u8; 32] = [0x5a; 32];

fn runner() -> TestRunner {
    TestRunner::new_with_rng(
        Config {
            cases: CASES,
            failure_persistence: None,
            ..Config::default()
        },
        TestRng::from_seed(RngAlgorithm::ChaCha, &SEED),
    )
}

fn dollar(abs: bool) -> &'static str {
    if abs {
        "$"
    } else {
        ""
    }
}

fn arb_sheet_prefix() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("Sheet1!".to_string()),
        Just("'My Sheet'!".to_string()),
        Just("'Bob''s'!".to_string()),
        Just("'2019'!".to_string()),
        Just("'A1'!".to_string()),
        Just("'R1'!".to_string()),
        Just("[Book.xlsx]Data!".to_string()),
    ]
}

fn arb_a1_cell() -> impl Strategy<Value = String> {
    (0u32..60, any::<bool>(), 0u32..200, any::<bool>()).prop_map(|(col, col_abs, row, row_abs)| {
        format!("{}{}{}{}", dollar(col_abs), to_col(col), dollar(row_abs), row + 1)
    })
}

fn arb_a1_range() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_a1_cell(),
        (arb_a1_cell(), arb_a1_cell()).prop_map(|(a, b)| format!("{a}:{b}")),
        (0u32..60, any::<bool>(), 0u32..60, any::<bool>()).prop_map(|(l, la, r, ra)| {
            format!("{}{}:{}{}", dollar(la), to_col(l), dollar(ra), to_col(r))
        }),
        (0u32..200, any::<bool>(), 0u32..200, any::<bool>()).prop_map(|(t, ta, b, ba)| {
            format!("{}{}:{}{}", dollar(ta), t + 1, dollar(ba), b + 1)
        }),
    ]
}

fn arb_a1_ref() -> impl Strategy<Value = String> {
    (arb_sheet_prefix(), arb_a1_range()).prop_map(|(prefix, range)| format!("{prefix}{range}"))
}

fn arb_r1c1_axis(letter: char) -> impl Strategy<Value = String> {
    prop_oneof![
        Just(letter.to_string()),
        (1u32..300).prop_map(move |n| format!("{letter}{n}")),
        (-100i32..100).prop_map(move |n| format!("{letter}[{n}]")),
    ]
}

fn arb_r1c1_ref() -> impl Strategy<Value = String> {
    let cell = || (arb_r1c1_axis('R'), arb_r1c1_axis('C')).prop_map(|(r, c)| format!("{r}{c}"));
    let range = prop_oneof![
        cell(),
        (cell(), cell()).prop_map(|(a, b)| format!("{a}:{b}")),
        (arb_r1c1_axis('R'), arb_r1c1_axis('R')).prop_map(|(a, b)| format!("{a}:{b}")),
        (arb_r1c1_axis('C'), arb_r1c1_axis('C')).prop_map(|(a, b)| format!("{a}:{b}")),
    ];
    (arb_sheet_prefix(), range).prop_map(|(prefix, range)| format!("{prefix}{range}"))
}

fn arb_anchor() -> impl Strategy<Value = String> {
    (0u32..80, 0u32..300).prop_map(|(col, row)| format!("{}{}", to_col(col), row + 1))
}

fn arb_atom() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..1000).prop_map(|n| n.to_string()),
        (0u32..100, 1u32..100).prop_map(|(i, f)| format!("{i}.{f}")),
        Just("\"text\"".to_string()),
        Just("\"say \"\"hi\"\"\"".to_string()),
        Just("TRUE".to_string()),
        Just("#N/A".to_string()),
        Just("Rates".to_string()),
        Just("Table1[Qty]".to_string()),
        arb_a1_ref(),
    ]
}

fn arb_binary_op() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("+"),
        Just("-"),
        Just("*"),
        Just("/"),
        Just("^"),
        Just("&"),
        Just("="),
        Just("<>"),
        Just("<="),
        Just(">"),
    ]
}

fn arb_expression() -> impl Strategy<Value = String> {
    arb_atom().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            (inner.clone(), arb_binary_op(), inner.clone())
                .prop_map(|(a, op, b)| format!("{a}{op}{b}")),
            inner.clone().prop_map(|a| format!("({a})")),
            inner.clone().prop_map(|a| format!("{a}%")),
            (
                prop_oneof![Just("SUM"), Just("IF"), Just("_xlfn.XLOOKUP")],
                prop::collection::vec(inner, 0..4)
            )
                .prop_map(|(name, args)| format!("{name}({})", args.join(","))),
        ]
    })
}

#[test]
fn tokenizing_is_lossless() {
    let options = [
        TokenizeOptions::default(),
        TokenizeOptions {
            r1c1: true,
            allow_ternary: true,
            ..TokenizeOptions::default()
        },
        TokenizeOptions {
            merge_refs: false,
            negative_numbers: false,
            ..TokenizeOptions::default()
        },
    ];
    let input = prop_oneof![
        "\\PC{0,40}",
        "=[A-Za-z0-9$:!'\\[\\]#@.,;(){}\"+*/^&<>= -]{0,40}",
    ];
    runner()
        .run(&input, |formula| {
            for opts in &options {
                let tokens = tokenize(&formula, opts);
                prop_assert_eq!(join_values(&tokens), formula.clone());
                let mut end = 0;
                for token in &tokens {
                    let loc = token.loc.ok_or_else(|| TestCaseError::fail("missing loc"))?;
                    prop_assert_eq!(loc.start, end);
                    prop_assert_eq!(loc.end - loc.start, token.value.len());
                    end = loc.end;
                }
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn parse_of_tokens_matches_parse_of_text() {
    runner()
        .run(&arb_expression(), |expr| {
            let formula = format!("={expr}");
            let opts = ParseOptions::default();
            let direct = parse(&formula, &opts)
                .map_err(|e| TestCaseError::fail(format!("{formula}: {e}")))?;
            let tokens = tokenize(&formula, &TokenizeOptions::default());
            prop_assert_eq!(parse_tokens(&tokens, &opts), Ok(direct));
            Ok(())
        })
        .unwrap();
}

#[test]
fn printed_trees_parse_back_to_the_same_tree() {
    let opts = ParseOptions {
        with_location: false,
        ..ParseOptions::default()
    };
    runner()
        .run(&arb_expression(), |expr| {
            let tree = parse(&format!("={expr}"), &opts)
                .map_err(|e| TestCaseError::fail(format!("{expr}: {e}")))?;
            let printed = tree.to_string();
            let reparsed = parse(&printed, &opts)
                .map_err(|e| TestCaseError::fail(format!("{printed}: {e}")))?;
            prop_assert_eq!(reparsed, tree, "printed as {}", printed);
            Ok(())
        })
        .unwrap();
}

#[test]
fn a1_stringify_is_stable() {
    let opts = RefParseOptions::default();
    runner()
        .run(&arb_a1_ref(), |text| {
            let parsed = parse_a1_ref(&text, &opts)
                .ok_or_else(|| TestCaseError::fail(format!("{text} did not parse")))?;
            let once = stringify_a1_ref(&parsed);
            let reparsed = parse_a1_ref(&once, &opts)
                .ok_or_else(|| TestCaseError::fail(format!("{once} did not parse")))?;
            prop_assert_eq!(&reparsed, &parsed);
            prop_assert_eq!(stringify_a1_ref(&reparsed), once);
            Ok(())
        })
        .unwrap();
}

#[test]
fn r1c1_stringify_is_stable() {
    let opts = RefParseOptions::default();
    runner()
        .run(&arb_r1c1_ref(), |text| {
            let parsed = parse_r1c1_ref(&text, &opts)
                .ok_or_else(|| TestCaseError::fail(format!("{text} did not parse")))?;
            let once = stringify_r1c1_ref(&parsed);
            let reparsed = parse_r1c1_ref(&once, &opts)
                .ok_or_else(|| TestCaseError::fail(format!("{once} did not parse")))?;
            prop_assert_eq!(stringify_r1c1_ref(&reparsed), once);
            Ok(())
        })
        .unwrap();
}

#[test]
fn bounds_are_idempotent() {
    let edge = || proptest::option::of(0u32..2000);
    let range = (edge(), edge(), edge(), edge(), any::<[bool; 4]>()).prop_map(
        |(top, left, bottom, right, abs)| RangeA1 {
            top,
            left,
            bottom,
            right,
            top_abs: abs[0],
            left_abs: abs[1],
            bottom_abs: abs[2],
            right_abs: abs[3],
            trim: None,
        },
    );
    runner()
        .run(&range, |range| {
            let bounded = add_a1_range_bounds(&range);
            prop_assert!(bounded.top.is_some() && bounded.left.is_some());
            prop_assert!(bounded.bottom.is_some() && bounded.right.is_some());
            prop_assert_eq!(add_a1_range_bounds(&bounded), bounded);
            Ok(())
        })
        .unwrap();
}

#[test]
fn translating_there_and_back_canonicalizes() {
    let input = (
        prop::collection::vec(arb_a1_ref(), 1..4),
        arb_anchor(),
    );
    runner()
        .run(&input, |(refs, anchor)| {
            let formula = format!("=SUM({})", refs.join(","));
            let opts = TranslateOptions::default();
            let r1c1 = translate_to_r1c1(&formula, &anchor, &opts)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let back = translate_to_a1(&r1c1, &anchor, &opts)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let fixed = fix_ranges(&formula, &FixRangesOptions::default())
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(back, fixed, "via {} at {}", r1c1, anchor);
            Ok(())
        })
        .unwrap();
}
