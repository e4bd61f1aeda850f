//! Reading, merging, and writing `.env` files.
//!
//! Values that only contain shell-safe characters are written bare; anything
//! else is JSON-quoted so special characters survive a round trip through
//! the dotenv parser.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::warn;

/// Parses an existing `.env` file into a map.
///
/// A missing file yields an empty map. A malformed file is treated the same
/// way (with a warning) so a corrupted env file never blocks regeneration.
#[must_use]
pub fn read_env_file(path: &Path) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    if !path.exists() {
        return vars;
    }
    match dotenvy::from_path_iter(path) {
        Ok(iter) => {
            for (key, value) in iter.flatten() {
                vars.insert(key, value);
            }
        }
        Err(e) => {
            warn!("failed to parse {}, regenerating: {e}", path.display());
        }
    }
    vars
}

/// Writes a map back out as a `.env` file, one `KEY=value` line per entry.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn write_env_file(path: &Path, vars: &BTreeMap<String, String>) -> Result<()> {
    let mut out = String::new();
    for (key, value) in vars {
        let _ = writeln!(out, "{key}={}", format_value(value));
    }
    std::fs::write(path, out)
        .with_context(|| format!("failed to write env file {}", path.display()))
}

/// Merges `overrides` into the `.env` file at `path`, preserving entries
/// already present, and writes the result back. Returns the merged map.
///
/// # Errors
///
/// Returns an error when the merged file cannot be written.
pub fn merge_env_file(
    path: &Path,
    overrides: &[(&str, &str)],
) -> Result<BTreeMap<String, String>> {
    let mut vars = read_env_file(path);
    for (key, value) in overrides {
        vars.insert((*key).to_string(), (*value).to_string());
    }
    write_env_file(path, &vars)?;
    Ok(vars)
}

fn format_value(value: &str) -> String {
    let bare = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '.' | '/' | ':' | '-'));
    if bare {
        value.to_string()
    } else {
        serde_json::Value::String(value.to_string()).to_string()
    }
}
