//! Safe Structured Parser — pulls a JSON object or array out of free-form LLM text.
//!
//! Models routinely wrap JSON in markdown fences or surround it with prose even
//! when told not to. `parse_json_or` is total: it never panics and never returns
//! an error; when nothing usable is found the caller's fallback comes back unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*```[A-Za-z]*[ \t]*\r?$").expect("fence pattern is valid")
});
static SMALLEST_OBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^{}]*\}").expect("object pattern is valid"));

/// Removes ```json ... ``` or ``` ... ``` fence lines. Backticks inside the
/// payload itself are left alone.
pub fn strip_json_fences(text: &str) -> String {
    FENCE_RE.replace_all(text, "").trim().to_string()
}

/// Returns the first candidate slice of `text` that deserializes into `T`.
///
/// Candidates, in order:
/// 1. the whole trimmed text, as is
/// 2. the text with fence lines removed
/// 3. first `{`/`[` through the last matching `}`/`]` (earliest opener first)
/// 4. each smallest brace-delimited `{...}` match
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    let raw = text.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<T>(raw) {
        return Some(value);
    }

    let cleaned = strip_json_fences(raw);
    if cleaned.is_empty() {
        return None;
    }
    if cleaned != raw {
        if let Ok(value) = serde_json::from_str::<T>(&cleaned) {
            return Some(value);
        }
    }

    for slice in delimited_slices(&cleaned) {
        if let Ok(value) = serde_json::from_str::<T>(slice) {
            return Some(value);
        }
    }

    SMALLEST_OBJECT_RE
        .find_iter(&cleaned)
        .find_map(|m| serde_json::from_str::<T>(m.as_str()).ok())
}

/// Parses `text` into `T`, or returns `fallback` if no JSON in it fits.
pub fn parse_json_or<T: DeserializeOwned>(text: &str, fallback: T) -> T {
    extract_json(text).unwrap_or(fallback)
}

fn delimited_slices(text: &str) -> Vec<&str> {
    let mut spans: Vec<(usize, usize)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| {
            let start = text.find(open)?;
            let end = text.rfind(close)?;
            (end > start).then_some((start, end))
        })
        .collect();
    spans.sort_by_key(|(start, _)| *start);
    spans
        .into_iter()
        .map(|(start, end)| &text[start..=end])
        .collect()
}
