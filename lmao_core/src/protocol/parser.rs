use serde_json::{Map, Value};
use tracing::debug;

use super::error::ProtocolError;
use super::jsonish;
use super::types::{AssistantTurn, MessagePurpose, Step, ToolCallPayload, TurnKind};
use super::PROTOCOL_VERSION;

/// Step types that compile into a `tool_call` of the same name.
pub const TASK_TOOL_ALIASES: [&str; 4] = ["add_task", "complete_task", "delete_task", "list_tasks"];

type Object = Map<String, Value>;

/// Parse raw completion text into a validated [`AssistantTurn`].
///
/// `allowed_tools` is the allow-list for `tool_call` steps and task aliases.
/// Every rejection names the offending location so the message can be echoed
/// back to the model as-is.
pub fn parse_assistant_turn<S: AsRef<str>>(
    raw_text: &str,
    allowed_tools: &[S],
) -> Result<AssistantTurn, ProtocolError> {
    let obj = load_turn_object(raw_text)?;

    match obj.get("type").and_then(Value::as_str) {
        Some("assistant_turn") => {}
        _ => {
            return Err(ProtocolError::new(
                "assistant_turn.type",
                "must be 'assistant_turn'",
            ));
        }
    }

    let version = match obj.get("version") {
        Some(Value::String(v)) => v.clone(),
        Some(Value::Null) | None => {
            return Err(ProtocolError::new("assistant_turn.version", "is required"));
        }
        Some(_) => {
            return Err(ProtocolError::new("assistant_turn.version", "must be a string"));
        }
    };
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::new(
            "assistant_turn.version",
            format!("unsupported version '{version}', expected '{PROTOCOL_VERSION}'"),
        ));
    }

    let Some(Value::Array(raw_steps)) = obj.get("steps") else {
        return Err(ProtocolError::new("assistant_turn.steps", "must be a list"));
    };

    let mut steps = Vec::with_capacity(raw_steps.len());
    let mut seen_tool_call = false;
    for (idx, raw_step) in raw_steps.iter().enumerate() {
        let step = parse_step(idx, raw_step, allowed_tools)?;
        if matches!(step, Step::ToolCall { .. }) {
            if seen_tool_call {
                return Err(ProtocolError::at_step(
                    idx,
                    "",
                    "only one tool_call step is allowed per turn",
                ));
            }
            seen_tool_call = true;
        }
        steps.push(step);
    }

    let turn = parse_turn_number(obj.get("turn"))?;

    debug!("Parsed assistant turn with {} steps", steps.len());
    Ok(AssistantTurn {
        kind: TurnKind::AssistantTurn,
        version,
        steps,
        turn,
    })
}

/// Pick the object to validate: the first candidate tagged `assistant_turn`,
/// otherwise the first candidate that loads as an object at all.
fn load_turn_object(raw_text: &str) -> Result<Object, ProtocolError> {
    let mut first_loaded: Option<Object> = None;
    for candidate in jsonish::candidates(raw_text) {
        let Some(Value::Object(obj)) = jsonish::try_load(candidate, true) else {
            continue;
        };
        if obj.get("type").and_then(Value::as_str) == Some("assistant_turn") {
            return Ok(obj);
        }
        if first_loaded.is_none() {
            first_loaded = Some(obj);
        }
    }
    if let Some(obj) = first_loaded {
        return Ok(obj);
    }

    match serde_json::from_str::<Value>(raw_text.trim()) {
        Ok(_) => Err(ProtocolError::new("assistant_turn", "must be an object")),
        Err(err) => Err(ProtocolError::new("assistant_turn", format!("invalid JSON: {err}"))),
    }
}

fn parse_step<S: AsRef<str>>(
    idx: usize,
    raw_step: &Value,
    allowed_tools: &[S],
) -> Result<Step, ProtocolError> {
    let Value::Object(obj) = raw_step else {
        return Err(ProtocolError::at_step(idx, "", "must be an object"));
    };
    let step_type = require_text(idx, obj, "type")?;

    match step_type.as_str() {
        "think" => Ok(Step::Think {
            content: require_text(idx, obj, "content")?,
        }),
        "message" => parse_message(idx, obj),
        "tool_call" => parse_tool_call(idx, obj, allowed_tools),
        "end" => Ok(Step::End {
            reason: optional_text(obj.get("reason")).unwrap_or_else(|| "completed".to_string()),
        }),
        alias if TASK_TOOL_ALIASES.contains(&alias) => {
            ensure_allowed(idx, "type", alias, allowed_tools)?;
            Ok(Step::ToolCall {
                call: task_alias_call(alias, obj),
            })
        }
        other => Err(ProtocolError::at_step(
            idx,
            "type",
            format!("unsupported step type '{other}'"),
        )),
    }
}

fn parse_message(idx: usize, obj: &Object) -> Result<Step, ProtocolError> {
    let content = require_text(idx, obj, "content")?;
    let format = optional_text(obj.get("format")).unwrap_or_else(|| "markdown".to_string());
    let purpose = match obj.get("purpose") {
        None | Some(Value::Null) => MessagePurpose::default(),
        Some(Value::String(name)) if name.trim().is_empty() => MessagePurpose::default(),
        Some(Value::String(name)) => {
            MessagePurpose::from_name(name.trim()).ok_or_else(|| purpose_error(idx))?
        }
        Some(_) => return Err(purpose_error(idx)),
    };
    Ok(Step::Message {
        content,
        format,
        purpose,
    })
}

fn purpose_error(idx: usize) -> ProtocolError {
    let names: Vec<&str> = MessagePurpose::ALL.iter().map(|p| p.as_str()).collect();
    ProtocolError::at_step(idx, "purpose", format!("must be one of {}", names.join(", ")))
}

fn parse_tool_call<S: AsRef<str>>(
    idx: usize,
    obj: &Object,
    allowed_tools: &[S],
) -> Result<Step, ProtocolError> {
    let Some(Value::Object(call)) = obj.get("call") else {
        return Err(ProtocolError::at_step(idx, "call", "must be an object"));
    };
    let tool = require_text(idx, call, "tool").map_err(|_| {
        ProtocolError::at_step(idx, "call.tool", "must be a non-empty string")
    })?;
    ensure_allowed(idx, "call.tool", &tool, allowed_tools)?;

    let meta = match call.get("meta") {
        None | Some(Value::Null) => None,
        Some(Value::Object(meta)) => Some(meta.clone()),
        Some(_) => return Err(ProtocolError::at_step(idx, "call.meta", "must be an object")),
    };

    Ok(Step::ToolCall {
        call: ToolCallPayload {
            tool,
            target: scalar_text(call.get("target")),
            args: coerce_args(call.get("args")),
            meta,
        },
    })
}

fn ensure_allowed<S: AsRef<str>>(
    idx: usize,
    field: &str,
    tool: &str,
    allowed_tools: &[S],
) -> Result<(), ProtocolError> {
    if allowed_tools.iter().any(|name| name.as_ref() == tool) {
        Ok(())
    } else {
        Err(ProtocolError::at_step(
            idx,
            field,
            format!("tool '{tool}' is not allowed"),
        ))
    }
}

/// Compile a task-management step (`{"type":"add_task","task":"..."}`) into
/// the equivalent tool call. Text and ids are read from several keys since
/// models are inconsistent about which one they use.
fn task_alias_call(alias: &str, obj: &Object) -> ToolCallPayload {
    let target = scalar_text(obj.get("target"));
    let args = match alias {
        "add_task" => first_present(obj, &["task", "text"])
            .or_else(|| nested_arg(obj.get("args"), &["task", "text"]))
            .unwrap_or_else(|| target.clone()),
        "complete_task" | "delete_task" => first_present(obj, &["id", "task_id"])
            .or_else(|| nested_arg(obj.get("args"), &["id", "task_id"]))
            .unwrap_or_else(|| target.clone()),
        _ => String::new(),
    };
    ToolCallPayload::new(alias, target, args)
}

fn first_present(obj: &Object, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .map(|value| scalar_text(Some(value)))
        .find(|text| !text.trim().is_empty())
}

fn nested_arg(args: Option<&Value>, keys: &[&str]) -> Option<String> {
    match args? {
        Value::Object(inner) => first_present(inner, keys),
        Value::Null => None,
        other => Some(scalar_text(Some(other))).filter(|text| !text.trim().is_empty()),
    }
}

fn require_text(idx: usize, obj: &Object, key: &str) -> Result<String, ProtocolError> {
    match obj.get(key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        _ => Err(ProtocolError::at_step(idx, key, "must be a non-empty string")),
    }
}

fn optional_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

fn scalar_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// `args` always reaches tools as a string; structured values are serialised.
fn coerce_args(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn parse_turn_number(value: Option<&Value>) -> Result<Option<i64>, ProtocolError> {
    let invalid = || ProtocolError::new("assistant_turn.turn", "must be an integer when provided");
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(int) = n.as_i64() {
                return Ok(Some(int));
            }
            match n.as_f64() {
                Some(float) if float.fract() == 0.0 && float.abs() < 9.0e15 => {
                    Ok(Some(float as i64))
                }
                _ => Err(invalid()),
            }
        }
        Some(Value::String(text)) => text.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}
