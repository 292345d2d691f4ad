//! SQL identifier validation.

use std::sync::OnceLock;

use regex::Regex;

fn identifier_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
}

/// Whether `name` is a plain, unquoted SQL identifier.
///
/// Table, schema and column names are spliced into statement text, so only
/// `[A-Za-z_][A-Za-z0-9_]*` is accepted.
pub fn is_valid_identifier(name: &str) -> bool {
    match identifier_regex() {
        Some(re) => re.is_match(name),
        None => false,
    }
}
