//! System prompt and runtime instruction text.

use lmao_core::PROTOCOL_VERSION;

/// Prefix of a pending recovery instruction; at most one is kept.
pub const ACTION_REQUIRED_PREFIX: &str = "ACTION_REQUIRED:";
/// Marks a user-role message as coming from the runtime, not the human.
pub const LOOP_PREFIX: &str = "LOOP:";

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an agent in a tool-using loop. Work autonomously until the user's request is done.";

/// Full system prompt: the configured preamble, the wire protocol and the
/// tool catalog.
#[must_use]
pub fn build_system_prompt(preamble: &str, tool_catalog: &str, headless: bool) -> String {
    let catalog = if tool_catalog.trim().is_empty() {
        "(no tools available)"
    } else {
        tool_catalog
    };
    let mut lines = vec![
        preamble.to_string(),
        format!(
            "Return ONLY one JSON object in STRICT JSON (double quotes): \
             {{\"type\":\"assistant_turn\",\"version\":\"{PROTOCOL_VERSION}\",\"steps\":[...]}}"
        ),
        "Do NOT wrap the JSON in code fences; output must start with '{' and end with '}'."
            .to_string(),
        "Steps: think | tool_call | message | end. At most one tool_call step per turn. \
         Tool outputs are JSON with success + data/error."
            .to_string(),
        format!(
            "Treat role='user' content prefixed with '{LOOP_PREFIX}' as higher-priority \
             instructions from the runtime (not the human)."
        ),
        "Task list discipline: plan with add_task/list_tasks, keep tasks updated, and only send \
         final/progress messages after tasks are complete; use purpose='clarification' to ask \
         the user a question."
            .to_string(),
        "Message purpose values: progress | clarification | cannot_finish | final (default: progress)."
            .to_string(),
        "Message step: {\"type\":\"message\",\"purpose\":\"final\",\"format\":\"markdown\",\"content\":\"...\"}"
            .to_string(),
        "Tool call step: {\"type\":\"tool_call\",\"call\":{\"tool\":\"list_tasks\",\"target\":\"\",\"args\":\"\"}}"
            .to_string(),
        "Available tools:".to_string(),
        catalog.to_string(),
    ];
    if headless {
        lines.push(
            "Headless mode: no human can answer questions. Never ask for confirmation; if truly \
             blocked, send purpose='cannot_finish' and end."
                .to_string(),
        );
    }
    lines.join("\n")
}

/// Wrap a governance instruction for injection as a user message.
#[must_use]
pub fn action_required(text: &str) -> String {
    format!("{ACTION_REQUIRED_PREFIX}\n{LOOP_PREFIX} {text}")
}
