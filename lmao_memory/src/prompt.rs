//! Shaping what goes into the prompt: tool-output truncation, pinning,
//! history sanitisation and provider error classification.

use std::path::Path;

use lmao_core::parse_assistant_turn;

pub const MAX_TOOL_RESULT_PROMPT_CHARS: usize = 20_000;

pub const TRUNCATION_MARKER: &str =
    "\n...[truncated: output exceeded prompt limit; narrow the request for more detail]";

const CONTEXT_LENGTH_PHRASES: [&str; 7] = [
    "context length",
    "context-length",
    "context window",
    "context-window",
    "maximum context",
    "requested token count exceeds",
    "input is too long",
];

/// Cut `output` to `max_chars` characters, marker included.
///
/// Pinned outputs are returned whole. The flag reports whether anything
/// was cut.
#[must_use]
pub fn truncate_tool_result_for_prompt(output: &str, max_chars: usize, pinned: bool) -> (String, bool) {
    if pinned || output.chars().count() <= max_chars {
        return (output.to_string(), false);
    }
    let available = max_chars.saturating_sub(TRUNCATION_MARKER.chars().count());
    if available == 0 {
        return (TRUNCATION_MARKER.to_string(), true);
    }
    let mut truncated: String = output.chars().take(available).collect();
    truncated.push_str(TRUNCATION_MARKER);
    (truncated, true)
}

/// Whether a tool's output carries standing instructions the model must
/// keep seeing: policy output, and reads of an `AGENTS.md` file.
#[must_use]
pub fn should_pin_tool_result(tool: &str, target: &str) -> bool {
    match tool {
        "policy" | "read_agents" => true,
        "read" => Path::new(target.trim())
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.eq_ignore_ascii_case("agents.md")),
        _ => false,
    }
}

/// Strip think steps from an assistant reply before it enters history.
///
/// Replies that do not parse are stored verbatim.
#[must_use]
pub fn sanitize_assistant_reply<S: AsRef<str>>(reply: &str, allowed_tools: &[S]) -> String {
    parse_assistant_turn(reply, allowed_tools)
        .map_or_else(|_| reply.to_string(), |turn| turn.without_thinks().to_json())
}

/// Whether a provider error says the prompt did not fit the context window.
#[must_use]
pub fn is_context_length_error(message: &str) -> bool {
    let lowered = message.to_lowercase();
    CONTEXT_LENGTH_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}
