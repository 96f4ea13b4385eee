//! Runtime-state keys and the per-turn facts handed to governance hooks.

use lmao_core::AssistantTurn;
use lmao_hooks::HookContext;
use serde_json::Value;

use crate::policy::TaskSnapshot;

pub const PARSED_TURN: &str = "parsed_turn";
pub const TASKS: &str = "tasks";
pub const HEADLESS: &str = "headless";
pub const TOOL_RAN_SINCE_MESSAGE: &str = "tool_ran_since_message";
pub const LAST_TOOL_SUMMARY: &str = "last_tool_summary";
pub const ASSISTANT_REPLY: &str = "assistant_reply";
pub const LAST_USER: &str = "last_user";
pub const ERROR_MESSAGE: &str = "error_message";
pub const ALLOWED_TOOLS: &str = "allowed_tools";
pub const WITHHELD_MESSAGE: &str = "withheld_message";

/// Result data key holding a serialised [`crate::GovernanceAction`].
pub const ACTION_KEY: &str = "action";
/// Result data key: whether this turn's messages may be shown to the user.
pub const RENDER_KEY: &str = "render";

/// Everything governance needs to know about the current turn.
#[derive(Debug, Clone, Default)]
pub struct TurnFacts {
    pub parsed_turn: Option<AssistantTurn>,
    pub tasks: TaskSnapshot,
    pub headless: bool,
    pub tool_ran_since_message: bool,
    pub last_tool_summary: Option<String>,
    pub assistant_reply: String,
    pub last_user: String,
    pub error_message: Option<String>,
    pub allowed_tools: Vec<String>,
    /// Messages withheld from the user and not yet superseded by a shown one.
    pub pending_withheld: Option<String>,
}

impl TurnFacts {
    #[must_use]
    pub fn to_context(&self, hook_type: &str) -> HookContext {
        let mut ctx = HookContext::new(hook_type)
            .with_runtime_state(
                TASKS,
                serde_json::to_value(&self.tasks).unwrap_or(Value::Null),
            )
            .with_runtime_state(HEADLESS, self.headless)
            .with_runtime_state(TOOL_RAN_SINCE_MESSAGE, self.tool_ran_since_message)
            .with_runtime_state(ASSISTANT_REPLY, self.assistant_reply.clone())
            .with_runtime_state(LAST_USER, self.last_user.clone())
            .with_runtime_state(ALLOWED_TOOLS, self.allowed_tools.clone());
        if let Some(turn) = &self.parsed_turn {
            ctx.set(PARSED_TURN, serde_json::to_value(turn).unwrap_or(Value::Null));
        }
        if let Some(summary) = &self.last_tool_summary {
            ctx.set(LAST_TOOL_SUMMARY, summary.clone());
        }
        if let Some(error) = &self.error_message {
            ctx.set(ERROR_MESSAGE, error.clone());
        }
        if let Some(withheld) = &self.pending_withheld {
            ctx.set(WITHHELD_MESSAGE, withheld.clone());
        }
        ctx
    }
}
