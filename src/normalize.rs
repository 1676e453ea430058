//! Turning "string or list" cell values into an ordered list of trimmed strings.
//!
//! Delivery sheets carry multi-valued cells as quoted, comma-separated literals
//! (`"foo", "bar"` or `['foo', 'bar']`), while config files may already hold a
//! JSON array. Both shapes end up as `Vec<String>`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static QUOTED_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)"|'([^']*)'"#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListValue {
    Text(String),
    List(Vec<String>),
}

impl From<&str> for ListValue {
    fn from(value: &str) -> Self {
        ListValue::Text(value.to_string())
    }
}

impl From<Vec<String>> for ListValue {
    fn from(value: Vec<String>) -> Self {
        ListValue::List(value)
    }
}

/// Normalizes a value to a list. Applying it to its own output is a no-op.
pub fn normalize(value: &ListValue) -> Vec<String> {
    match value {
        ListValue::Text(text) => normalize_cell(text),
        ListValue::List(items) => items.iter().map(|item| item.trim().to_string()).collect(),
    }
}

pub fn normalize_cell(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match list_tokens(trimmed) {
        Some(tokens) => tokens,
        None => vec![trimmed.to_string()],
    }
}

/// Like [`normalize_cell`], but unquoted text is also split on commas.
///
/// Used for columns that never hold a comma inside a single value, such as
/// email addresses, where a CSV field `"a@x.org, b@x.org"` arrives unquoted.
pub fn normalize_delimited(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if let Some(tokens) = list_tokens(trimmed) {
        return tokens;
    }
    trimmed
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// True when the cell is a quoted, comma-separated literal rather than a bare token.
pub fn is_list_literal(text: &str) -> bool {
    list_tokens(text.trim()).is_some()
}

fn list_tokens(trimmed: &str) -> Option<Vec<String>> {
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);

    let mut tokens = Vec::new();
    let mut last_end = 0;
    for caps in QUOTED_TOKEN.captures_iter(inner) {
        let whole = caps.get(0)?;
        if !only_separators(&inner[last_end..whole.start()]) {
            return None;
        }
        let token = caps.get(1).or_else(|| caps.get(2))?;
        tokens.push(token.as_str().trim().to_string());
        last_end = whole.end();
    }
    if tokens.is_empty() || !only_separators(&inner[last_end..]) {
        return None;
    }
    Some(tokens)
}

fn only_separators(gap: &str) -> bool {
    gap.chars().all(|ch| ch == ',' || ch.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_list() {
        assert_eq!(normalize_cell(r#""foo", "bar""#), vec!["foo", "bar"]);
    }

    #[test]
    fn bracketed_single_quotes() {
        assert_eq!(normalize_cell("['a', ' b ']"), vec!["a", "b"]);
    }

    #[test]
    fn delimited_splits_bare_commas() {
        assert_eq!(normalize_delimited("a@x.org, b@x.org,"), vec!["a@x.org", "b@x.org"]);
        assert_eq!(normalize_delimited(r#"["a@x.org"]"#), vec!["a@x.org"]);
        assert!(normalize_delimited(" , ").is_empty());
    }

    #[test]
    fn stray_apostrophe_stays_bare() {
        assert_eq!(normalize_cell("O'Brien lab"), vec!["O'Brien lab"]);
        assert!(!is_list_literal("it's Bob's"));
    }
}
