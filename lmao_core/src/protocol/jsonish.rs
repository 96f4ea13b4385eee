//! Locating JSON inside free-form model output.
//!
//! Models wrap their JSON in code fences, prefix it with prose, or emit two
//! objects back to back. Candidates are tried in a fixed order: fenced blocks,
//! brace-matched objects, then the whole text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```(?:json)?\s*(.*?)```").unwrap_or_else(|_| unreachable!())
});

#[must_use]
pub fn extract_fenced_blocks(raw_text: &str) -> Vec<&str> {
    FENCED_BLOCK
        .captures_iter(raw_text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|block| !block.is_empty())
        .collect()
}

/// Top-level `{...}` spans, ignoring braces inside JSON strings.
#[must_use]
pub fn extract_braced_objects(raw_text: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0_usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in raw_text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(begin) = start.take()
                {
                    objects.push(raw_text[begin..=idx].trim());
                }
            }
            _ => {}
        }
    }
    objects
}

/// Deduplicated candidates in extraction order.
#[must_use]
pub fn candidates(raw_text: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    let whole = raw_text.trim();
    let ordered = extract_fenced_blocks(raw_text)
        .into_iter()
        .chain(extract_braced_objects(raw_text))
        .chain((!whole.is_empty()).then_some(whole));
    for candidate in ordered {
        if !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

/// Parse one candidate as a JSON object or array.
///
/// With `recover_trailing`, text holding two concatenated values yields the
/// first one, but only when that first value is an object.
#[must_use]
pub fn try_load(candidate: &str, recover_trailing: bool) -> Option<Value> {
    let cleaned = candidate.trim();
    if cleaned.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(cleaned) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        Ok(_) => None,
        Err(err) if recover_trailing && err.to_string().contains("trailing characters") => {
            recover_leading_object(cleaned).map(Value::Object)
        }
        Err(_) => None,
    }
}

fn recover_leading_object(text: &str) -> Option<Map<String, Value>> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(Value::Object(map))) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_blocks_are_found() {
        let text = "here:\n```json\n{\"a\":1}\n```\nand\n```\n{\"b\":2}\n```";
        assert_eq!(extract_fenced_blocks(text), vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn test_braced_scan_ignores_braces_in_strings() {
        let text = r#"prose {"content":"a } inside","n":{"x":1}} tail {"y":2}"#;
        assert_eq!(
            extract_braced_objects(text),
            vec![r#"{"content":"a } inside","n":{"x":1}}"#, r#"{"y":2}"#]
        );
    }

    #[test]
    fn test_candidates_are_deduplicated_in_order() {
        let text = "```\n{\"a\":1}\n```";
        let found = candidates(text);
        assert_eq!(found[0], "{\"a\":1}");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_trailing_object_recovery() {
        let text = r#"{"type":"assistant_turn"}{"type":"assistant_turn"}"#;
        assert!(try_load(text, false).is_none());
        let recovered = try_load(text, true);
        assert!(matches!(recovered, Some(Value::Object(_))));
    }

    #[test]
    fn test_trailing_recovery_rejects_leading_array() {
        assert!(try_load("[1,2] [3]", true).is_none());
    }

    #[test]
    fn test_scalars_are_not_candidates() {
        assert!(try_load("42", true).is_none());
        assert!(try_load("   ", true).is_none());
    }
}
