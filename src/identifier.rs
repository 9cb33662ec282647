//! Header-to-identifier sanitization.
//!
//! Every table and column name that reaches generated SQL passes through
//! [`sanitize_identifier`]. The result only contains `a-z`, `0-9` and `_`
//! and never starts with a digit, but it can still be a reserved word
//! (`order`, `group`), so generated SQL wraps it in [`quote_identifier`].
//!
//! Distinct headers may sanitize to the same identifier (`"Unit Price"` and
//! `"unit-price"` both become `unit_price`). Nothing here deduplicates them;
//! [`crate::ddl::TableSchema`] rejects the collision instead.

pub const DIGIT_PREFIX: &str = "col_";
pub const EMPTY_IDENTIFIER: &str = "col";

pub fn sanitize_identifier(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut clean: String = lowered
        .trim()
        .chars()
        .map(|ch| match ch {
            'a'..='z' | '0'..='9' => ch,
            _ => '_',
        })
        .collect();

    if clean.is_empty() {
        return EMPTY_IDENTIFIER.to_string();
    }
    if clean.starts_with(|ch: char| ch.is_ascii_digit()) {
        clean.insert_str(0, DIGIT_PREFIX);
    }
    clean
}

pub fn sanitize_headers(headers: &[String]) -> Vec<String> {
    headers.iter().map(|h| sanitize_identifier(h)).collect()
}

/// Double-quoted SQL identifier. Sanitized names are lowercase, so quoting
/// never changes how PostgreSQL or SQLite resolve them.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn is_valid_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
}
