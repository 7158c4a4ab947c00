//! A1-style cell reference helpers.
//!
//! Rules and header positions arrive as free-form text (`"C"`, `"c12"`,
//! `"$B$4"`). Every helper here is total: malformed input yields `None`.

/// Largest column index Excel accepts (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;
/// Largest row index Excel accepts.
pub const MAX_ROW: u32 = 1_048_576;

/// Converts column letters (`"A"`, `"aa"`) into a 1-based column index.
pub fn column_index(letters: &str) -> Option<u32> {
    let letters = letters.trim();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }

    let mut index: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(ch.to_ascii_uppercase() as u8 - b'A') + 1;
        index = index * 26 + digit;
    }

    (index <= MAX_COLUMN).then_some(index)
}

/// Converts a 1-based column index back into its letters.
pub fn column_letters(mut index: u32) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Extracts the leading column letters of a cell coordinate (`"B7"` → `"B"`).
pub fn column_of_cell(coordinate: &str) -> Option<&str> {
    let trimmed = coordinate.trim().trim_start_matches('$');
    let end = trimmed
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_alphabetic())
        .map(|(idx, _)| idx)
        .unwrap_or(trimmed.len());
    (end > 0).then(|| &trimmed[..end])
}

/// Extracts the first run of digits from a cell coordinate or plain row
/// number (`"A3"` → 3, `"12"` → 12).
pub fn row_of_cell(coordinate: &str) -> Option<u32> {
    let digits: String = coordinate
        .chars()
        .skip_while(|ch| !ch.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok().filter(|row| *row > 0)
}

/// Parses a full coordinate such as `"B12"` or `"$B$12"` into `(row, column)`.
pub fn parse_cell(coordinate: &str) -> Option<(u32, u32)> {
    let cleaned: String = coordinate.trim().chars().filter(|ch| *ch != '$').collect();
    let split = cleaned.find(|ch: char| ch.is_ascii_digit())?;
    let (letters, digits) = cleaned.split_at(split);
    let column = column_index(letters)?;
    let row = digits.parse::<u32>().ok().filter(|row| *row > 0)?;
    Some((row, column))
}
