//! Snapshot object naming.
//!
//! Object names have the form `<snapshot-name>.<timestamp>.<extension>`, e.g.
//! `repos.1700000000.5.zip`. The timestamp is the only structured field read
//! back: decoding takes the leftmost `digits '.' digits` run in the name, so a
//! snapshot name must never contain one of its own or end in a digit.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default archive extension.
pub const DEFAULT_EXTENSION: &str = "zip";

/// Build the object name for a snapshot taken at `timestamp`.
pub fn encode(name: &str, timestamp: f64, extension: &str) -> String {
    format!("{}.{}.{}", name, format_timestamp(timestamp), extension)
}

/// Render a timestamp as the shortest decimal that parses back to the same
/// `f64`, always with a fractional part (`1000.0`, not `1000`).
pub fn format_timestamp(timestamp: f64) -> String {
    let mut text = timestamp.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

/// Leftmost `digits '.' digits` run.
static TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+\.[0-9]+").expect("timestamp pattern is valid"));

/// Extract the timestamp embedded in an object name.
///
/// Returns 0.0 when the name holds no `digits '.' digits` run.
pub fn decode(object_name: &str) -> f64 {
    TIMESTAMP
        .find(object_name)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// True if `text` contains something `decode` would read as a timestamp.
pub fn contains_timestamp(text: &str) -> bool {
    TIMESTAMP.is_match(text)
}

/// Whether `name` can prefix encoded timestamps without changing what
/// `decode` reads back.
///
/// A dot would let the name carry its own timestamp, and a trailing digit
/// would merge with the integer part (`data2.1000.0.zip` decodes as 2.1).
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('.') && !name.ends_with(|c: char| c.is_ascii_digit())
}
