//! # Docstring Adapter
//!
//! Splits free-form operation text into a summary (first sentence of the
//! first line) and details (everything else). Also collects
//! `:raises Name: description` annotations.

use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

fn raises_re() -> &'static Regex {
    static RAISES_RE: OnceLock<Regex> = OnceLock::new();
    RAISES_RE.get_or_init(|| {
        Regex::new(r"(?m):raises\s+(?P<name>\w+)\s*:\s*(?P<description>.*)$")
            .expect("Invalid regex")
    })
}

/// A parsed docstring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Docstring {
    /// The cleaned text.
    pub raw: Option<String>,
    /// First sentence of the first line.
    pub summary: Option<String>,
    /// The remainder.
    pub details: Option<String>,
    /// `:raises` annotations, exception name to description.
    pub raises: IndexMap<String, String>,
}

/// Removes the indentation shared by every line after the first, and
/// surrounding blank lines.
fn clean(raw: &str) -> String {
    let mut lines = raw.lines();
    let first = lines.next().unwrap_or_default().trim_start();
    let rest: Vec<&str> = lines.collect();

    let indent = rest
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned = vec![first.trim_end().to_string()];
    cleaned.extend(
        rest.iter()
            .map(|line| line.get(indent..).unwrap_or("").trim_end().to_string()),
    );

    while cleaned.first().is_some_and(|l| l.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

/// Parses a docstring. Empty input yields an empty [`Docstring`].
pub fn parse_docstring(raw: Option<&str>) -> Docstring {
    let Some(raw) = raw.map(clean).filter(|r| !r.is_empty()) else {
        return Docstring::default();
    };

    let summary = raw
        .trim_matches(|c| c == ' ' || c == '\n')
        .split('\n')
        .next()
        .and_then(|line| line.split('.').next())
        .unwrap_or_default()
        .to_string();

    let details = raw
        .replacen(&summary, "", 1)
        .trim_start_matches(|c| c == '.' || c == ' ' || c == '\n')
        .trim_matches(|c| c == ' ' || c == '\n')
        .to_string();

    let raises = raises_re()
        .captures_iter(&raw)
        .map(|caps| (caps["name"].to_string(), caps["description"].trim().to_string()))
        .collect();

    Docstring {
        summary: Some(summary).filter(|s| !s.is_empty()),
        details: Some(details).filter(|d| !d.is_empty()),
        raises,
        raw: Some(raw),
    }
}
