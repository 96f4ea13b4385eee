use serde_json::Value;

use super::error::ProtocolError;
use super::jsonish;
use super::types::ToolCallPayload;

/// Find a bare `{"tool": ..., "target": ..., "args": ...}` object in free text.
///
/// Older models skip the turn envelope and emit only the call. Fenced blocks,
/// brace-matched objects and the whole text are scanned; lists of call objects
/// are accepted too. Only allow-listed tools count. The same call found through
/// several candidates is reported once, but two different calls are an error,
/// matching the one-call-per-turn rule of the strict parser.
pub fn extract_tool_call<S: AsRef<str>>(
    raw_text: &str,
    allowed_tools: &[S],
) -> Result<Option<ToolCallPayload>, ProtocolError> {
    let mut found: Vec<ToolCallPayload> = Vec::new();

    for candidate in jsonish::candidates(raw_text) {
        let items = match jsonish::try_load(candidate, false) {
            Some(Value::Array(items)) => items,
            Some(obj @ Value::Object(_)) => vec![obj],
            _ => continue,
        };
        for item in items {
            if let Some(call) = bare_call(&item, allowed_tools)
                && !found.contains(&call)
            {
                found.push(call);
            }
        }
    }

    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        n => Err(ProtocolError::new(
            "tool_call",
            format!("found {n} tool calls; send exactly one per turn"),
        )),
    }
}

fn bare_call<S: AsRef<str>>(item: &Value, allowed_tools: &[S]) -> Option<ToolCallPayload> {
    let Value::Object(obj) = item else {
        return None;
    };
    let tool = obj.get("tool")?.as_str()?.trim();
    if !allowed_tools.iter().any(|name| name.as_ref() == tool) {
        return None;
    }
    let target = obj
        .get("target")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim();
    let args = match obj.get("args") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
    };
    let meta = obj.get("meta").and_then(Value::as_object).cloned();
    Some(ToolCallPayload {
        tool: tool.to_string(),
        target: target.to_string(),
        args,
        meta,
    })
}
