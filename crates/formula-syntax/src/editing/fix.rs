use serde::{Deserialize, Serialize};

use super::{rewrite_tokens, with_value};
use crate::error::EditError;
use crate::lexer::{tokenize, TokenizeOptions};
use crate::refs::a1::{add_a1_range_bounds, parse_a1_ref, stringify_a1_ref};
use crate::refs::structured::{parse_struct_ref, stringify_struct_ref};
use crate::refs::{RefParseOptions, RefTarget};
use crate::token::{join_values, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixRangesOptions {
    /// Fill unbounded edges with the sheet limits (`A2:A` becomes `A2:A1048576`).
    pub add_bounds: bool,
    pub allow_ternary: bool,
    pub xlsx: bool,
    /// Spell out `[#This Row]` instead of the `@` shorthand.
    pub this_row: bool,
    /// Not supported; set only to get [`EditError::R1C1Unsupported`].
    pub r1c1: bool,
}

impl Default for FixRangesOptions {
    fn default() -> Self {
        Self {
            add_bounds: false,
            allow_ternary: true,
            xlsx: false,
            this_row: false,
            r1c1: false,
        }
    }
}

/// Rewrite every reference in `formula` in canonical form: reversed edges swapped, prefixes
/// quoted only where needed, structured references in their shortest spelling.
///
/// ```
/// use formula_syntax::{fix_ranges, FixRangesOptions};
///
/// assert_eq!(fix_ranges("=B2:A1", &FixRangesOptions::default()).unwrap(), "=A1:B2");
/// ```
pub fn fix_ranges(formula: &str, options: &FixRangesOptions) -> Result<String, EditError> {
    if options.r1c1 {
        return Err(EditError::R1C1Unsupported);
    }
    let tokens = tokenize(
        formula,
        &TokenizeOptions {
            allow_ternary: options.allow_ternary,
            xlsx: options.xlsx,
            with_location: false,
            ..TokenizeOptions::default()
        },
    );
    Ok(join_values(&fix_token_ranges(&tokens, options)?))
}

/// Token-list form of [`fix_ranges`]. Locations are recomputed for the new values.
pub fn fix_token_ranges(tokens: &[Token], options: &FixRangesOptions) -> Result<Vec<Token>, EditError> {
    if options.r1c1 {
        return Err(EditError::R1C1Unsupported);
    }
    let ref_options = RefParseOptions {
        allow_named: true,
        allow_ternary: true,
        xlsx: options.xlsx,
    };
    Ok(rewrite_tokens(tokens, |token| {
        let value = match token.kind {
            TokenKind::Structured => {
                let reference = parse_struct_ref(&token.value, &ref_options)?;
                stringify_struct_ref(&reference, options.this_row)
            }
            TokenKind::Range
            | TokenKind::RangeBeam
            | TokenKind::RangeTernary
            | TokenKind::RangeNamed => {
                let mut reference = parse_a1_ref(&token.value, &ref_options)?;
                if options.add_bounds {
                    if let RefTarget::Range(range) = &mut reference.target {
                        *range = add_a1_range_bounds(range);
                    }
                }
                stringify_a1_ref(&reference)
            }
            _ => return None,
        };
        (value != token.value).then(|| with_value(token, value))
    }))
}
