//! Environment-variable parsing helpers.

use std::str::FromStr;

/// Parses `key` from the environment, falling back when the variable is
/// unset, empty, or fails to parse.
#[must_use]
pub fn parsed_var<T: FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(fallback)
}

/// Returns the trimmed value of `key`, or `None` when unset or empty.
#[must_use]
pub fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}
