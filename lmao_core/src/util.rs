//! Text helpers for summaries and log previews.

use serde_json::Value;

const SUMMARY_SKIP_KEYS: [&str; 8] = [
    "content", "text", "stdout", "stderr", "patch", "diff", "output", "raw",
];
const SUMMARY_MAX_FIELDS: usize = 6;
const SUMMARY_STR_LIMIT: usize = 80;
const SUMMARY_MAX_CHARS: usize = 400;

/// Collapse all whitespace runs into single spaces.
#[must_use]
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max_lines` lines and `max_chars` characters, appending
/// `suffix` when anything was cut. A zero limit disables that limit.
#[must_use]
pub fn truncate_text(text: &str, max_lines: usize, max_chars: usize, suffix: &str) -> String {
    if text.is_empty() || (max_lines == 0 && max_chars == 0) {
        return String::new();
    }
    let lines: Vec<&str> = text.lines().collect();
    let mut out = if max_lines > 0 && lines.len() > max_lines {
        let mut head = lines[..max_lines].join("\n");
        head.push_str(suffix);
        head
    } else {
        lines.join("\n")
    };
    if max_chars > 0 && out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect::<String>() + suffix;
    }
    out
}

/// Single-line preview used in log lines.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    truncate_text(&single_line(text), 0, max_chars, "...")
}

fn summarize_value(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Object(map) if key == "lines" => match (
            map.get("start").and_then(Value::as_i64),
            map.get("end").and_then(Value::as_i64),
        ) {
            (Some(start), Some(end)) => Some(format!("lines={start}-{end}")),
            _ => Some(format!("{key}_keys={}", map.len())),
        },
        Value::Bool(b) => Some(format!("{key}={b}")),
        Value::Number(n) => Some(format!("{key}={n}")),
        Value::String(s) if s.chars().count() > SUMMARY_STR_LIMIT => {
            Some(format!("{key}_chars={}", s.chars().count()))
        }
        Value::String(s) => Some(format!("{key}={}", single_line(s))),
        Value::Array(items) => Some(format!("{key}_items={}", items.len())),
        Value::Object(map) => Some(format!("{key}_keys={}", map.len())),
    }
}

fn summarize_size(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(format!("{key}_chars={}", s.chars().count())),
        Value::Array(items) => Some(format!("{key}_items={}", items.len())),
        Value::Object(map) => Some(format!("{key}_keys={}", map.len())),
        _ => None,
    }
}

/// One-line digest of a tool result JSON string: `ok key=value ...` or
/// `error <message>`. Bulky fields are reported by size only.
#[must_use]
pub fn summarize_tool_output(output: &str) -> String {
    if output.trim().is_empty() {
        return "no tool output".to_string();
    }
    let Ok(Value::Object(payload)) = serde_json::from_str::<Value>(output) else {
        return "unparseable tool output".to_string();
    };

    let summary = if payload.get("success") == Some(&Value::Bool(true)) {
        let parts: Vec<String> = match payload.get("data") {
            Some(Value::Object(data)) => data
                .iter()
                .filter_map(|(key, value)| {
                    if SUMMARY_SKIP_KEYS.contains(&key.as_str()) {
                        summarize_size(key, value)
                    } else {
                        summarize_value(key, value)
                    }
                })
                .take(SUMMARY_MAX_FIELDS)
                .collect(),
            Some(other) => summarize_value("data", other).into_iter().collect(),
            None => Vec::new(),
        };
        if parts.is_empty() {
            "ok".to_string()
        } else {
            format!("ok {}", parts.join(" "))
        }
    } else {
        let error = payload
            .get("error")
            .filter(|value| !value.is_null())
            .or_else(|| payload.get("data").filter(|value| value.is_string()));
        match error {
            Some(Value::String(msg)) => format!("error {msg}"),
            Some(other) => format!("error {other}"),
            None => "error".to_string(),
        }
    };

    truncate_text(&single_line(&summary), 1, SUMMARY_MAX_CHARS, "...[truncated]")
}
