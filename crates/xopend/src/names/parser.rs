//! Line grammar for name table sources.
//!
//! Each line yields at most one `key value` pair. Blank lines and lines whose
//! first non-blank character is `#` are ignored. The key is the first
//! whitespace-delimited token and the value is the rest of the line with
//! surrounding whitespace removed, so values may contain spaces. A line with a
//! key but no value is malformed and skipped.

use std::collections::HashMap;
use std::path::Path;

/// Parses a single source line.
pub(crate) fn parse_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (key, value) = trimmed.split_once(char::is_whitespace)?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Parses a whole source text into `map`, later lines overriding earlier ones.
///
/// Values are home-expanded against `home`. Returns the number of lines that
/// produced an entry.
pub(crate) fn merge_source(
    text: &str,
    home: Option<&Path>,
    map: &mut HashMap<String, String>,
) -> usize {
    let mut parsed = 0;
    for (key, value) in text.lines().filter_map(parse_line) {
        map.insert(key.to_owned(), expand_home(value, home));
        parsed += 1;
    }
    parsed
}

/// Expands a leading `~` in `value` to the home directory.
///
/// Only `~` on its own and `~/...` are expanded; anything else, including
/// URLs, is returned unchanged. Without a home directory the value is kept
/// as written.
pub(crate) fn expand_home(value: &str, home: Option<&Path>) -> String {
    let Some(home) = home else {
        return value.to_owned();
    };
    if value == "~" {
        return home.display().to_string();
    }
    match value.strip_prefix("~/") {
        Some(rest) => home.join(rest).display().to_string(),
        None => value.to_owned(),
    }
}
