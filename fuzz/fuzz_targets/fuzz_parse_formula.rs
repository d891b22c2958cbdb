#![no_main]

use libfuzzer_sys::fuzz_target;

use formula_syntax::{
    add_token_meta, fix_token_ranges, join_values, parse, parse_tokens, tokenize,
    translate_tokens_to_a1, translate_tokens_to_r1c1, FixRangesOptions, ParseOptions,
    TokenMetaContext, TokenizeOptions, TranslateOptions,
};

/// Excel's display limit, plus some slack so the harness also covers slightly longer input.
const MAX_FUZZ_FORMULA_CHARS: usize = 8_192 + 256;
const MAX_INPUT_BYTES: usize = MAX_FUZZ_FORMULA_CHARS * 4; // max UTF-8 bytes per char

fn truncate_to_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    // Accept arbitrary bytes as input; treat invalid UTF-8 lossy.
    let input = String::from_utf8_lossy(data);
    let formula = truncate_to_chars(&input, MAX_FUZZ_FORMULA_CHARS);

    // Vary options to explore A1/R1C1, ternary and xlsx code paths.
    let selector = data[0];
    let anchor_byte = data.get(1).copied().unwrap_or(0);

    let tokenize_opts = TokenizeOptions {
        r1c1: selector & 0b1 != 0,
        allow_ternary: selector & 0b10 != 0,
        xlsx: selector & 0b100 != 0,
        merge_refs: selector & 0b1000 == 0,
        negative_numbers: selector & 0b1_0000 == 0,
        with_location: true,
    };

    let tokens = tokenize(formula, &tokenize_opts);
    assert_eq!(join_values(&tokens), formula, "tokenizing must be lossless");

    let parse_opts = ParseOptions {
        r1c1: tokenize_opts.r1c1,
        allow_ternary: tokenize_opts.allow_ternary,
        xlsx: tokenize_opts.xlsx,
        ..ParseOptions::default()
    };
    if let Ok(ast) = parse(formula, &parse_opts) {
        // Printing a tree must produce something the parser accepts again.
        let printed = format!("={ast}");
        if let Err(err) = parse(&printed, &parse_opts) {
            panic!("printed tree `{printed}` of `{formula}` does not parse: {err}");
        }
    }
    let _ = parse_tokens(&tokens, &parse_opts);

    let annotated = add_token_meta(&tokens, &TokenMetaContext::default());
    assert_eq!(annotated.len(), tokens.len());

    let anchor = format!("{}{}", char::from(b'A' + anchor_byte % 26), u32::from(anchor_byte) + 1);
    let translate_opts = TranslateOptions {
        wrap_edges: selector & 0b10_0000 == 0,
        xlsx: tokenize_opts.xlsx,
        ..TranslateOptions::default()
    };
    let translated = if tokenize_opts.r1c1 {
        translate_tokens_to_a1(&annotated, &anchor, &translate_opts)
    } else {
        let _ = fix_token_ranges(&annotated, &FixRangesOptions::default());
        translate_tokens_to_r1c1(&annotated, &anchor, &translate_opts)
    };
    if let Ok(translated) = translated {
        // Rewritten locations must stay contiguous.
        let mut end = 0;
        for token in &translated {
            if let Some(loc) = token.loc {
                assert_eq!(loc.start, end);
                end = loc.end;
            }
        }
    }
});
