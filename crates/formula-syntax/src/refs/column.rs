/// Highest 0-based row index (row `1048576`).
pub const MAX_ROWS: u32 = 1_048_575;
/// Highest 0-based column index (column `XFD`).
pub const MAX_COLS: u32 = 16_383;

/// Convert a 0-based column index to its letters (`0` -> `A`, `27` -> `AB`).
#[must_use]
pub fn to_col(col: u32) -> String {
    // Letters are bijective base-26 over 1-based column numbers.
    let mut n = u64::from(col) + 1;
    let mut out = Vec::<u8>::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// Convert column letters (case-insensitive) to a 0-based index.
///
/// Returns `None` for empty input, non-letters, or values that overflow `u32`. The result is not
/// checked against [`MAX_COLS`].
#[must_use]
pub fn from_col(label: &str) -> Option<u32> {
    if label.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for b in label.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        let v = u32::from(b.to_ascii_uppercase() - b'A') + 1;
        col = col.checked_mul(26)?.checked_add(v)?;
    }
    Some(col - 1)
}
