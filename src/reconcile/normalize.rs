//! Header canonicalization shared by every matching stage.

/// Lower-cases the text and drops every character that is not a letter or a
/// digit, so `"Дата Рождения"` and `"дата_рождения"` compare equal.
pub fn normalize_header(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .collect()
}
