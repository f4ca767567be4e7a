//! Spreadsheet-style addresses (`A1`, `B3`, `AA10`).
//!
//! Addresses index the coordinate array directly: `A1` is the origin cell,
//! `B1` the first column header, `A2` the first row header.

/// Convert 0-based column index to letter(s): 0=A, 1=B, ..., 25=Z, 26=AA, etc.
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Decode column letters (case-insensitive) to a 0-based index.
///
/// Returns `None` for empty input, non-letters, or overflow.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut col: usize = 0;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        let digit = (b.to_ascii_uppercase() - b'A') as usize + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col - 1)
}

/// Parse an address into 0-based `(row, col)`.
///
/// Column letters must come first, followed by a 1-based row number with
/// nothing trailing. Malformed input yields `None`.
pub fn parse_address(address: &str) -> Option<(usize, usize)> {
    let s = address.trim();
    let split = s
        .bytes()
        .position(|b| !b.is_ascii_alphabetic())
        .unwrap_or(s.len());
    if split == 0 || split == s.len() {
        return None;
    }

    let (letters, digits) = s.split_at(split);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let col = letters_to_col(letters)?;
    let row_1_based: usize = digits.parse().ok()?;
    if row_1_based == 0 {
        return None;
    }
    Some((row_1_based - 1, col))
}

/// Format 0-based `(row, col)` as an address.
pub fn to_address(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letters(col), row + 1)
}
