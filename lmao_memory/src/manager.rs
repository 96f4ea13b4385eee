use lmao_core::{ChatMessage, ToolCallPayload};
use tracing::{debug, info};

use crate::budget::PromptBudget;
use crate::compaction::{self, CompactionReport, MemoryState};
use crate::prompt::{MAX_TOOL_RESULT_PROMPT_CHARS, should_pin_tool_result, truncate_tool_result_for_prompt};

/// Per-conversation prompt memory.
///
/// Owns the pinning state and the budget; the message list itself stays
/// with the caller.
#[derive(Debug, Clone)]
pub struct MemoryManager {
    budget: PromptBudget,
    state: MemoryState,
    max_tool_result_chars: usize,
}

impl MemoryManager {
    #[must_use]
    pub fn new(budget: PromptBudget) -> Self {
        info!(
            max_prompt = budget.max_prompt,
            trigger = budget.trigger,
            target = budget.target,
            "Prompt budget configured"
        );
        Self {
            budget,
            state: MemoryState::default(),
            max_tool_result_chars: MAX_TOOL_RESULT_PROMPT_CHARS,
        }
    }

    #[must_use]
    pub const fn with_max_tool_result_chars(mut self, max_chars: usize) -> Self {
        self.max_tool_result_chars = max_chars;
        self
    }

    #[must_use]
    pub const fn budget(&self) -> &PromptBudget {
        &self.budget
    }

    #[must_use]
    pub const fn state(&self) -> &MemoryState {
        &self.state
    }

    /// Record `message` as the user message compaction must keep.
    pub const fn note_user_message(&mut self, message: &ChatMessage) {
        self.state.last_user_message = Some(message.id);
    }

    pub fn pin(&mut self, message: &ChatMessage) {
        self.state.pin(message.id);
    }

    /// Build the prompt message for a tool's output, truncating it unless
    /// the output is one that gets pinned.
    pub fn tool_result_message(
        &mut self,
        call: &ToolCallPayload,
        output: &str,
        last_user: &str,
    ) -> ChatMessage {
        let pinned = should_pin_tool_result(&call.tool, &call.target);
        let (body, truncated) =
            truncate_tool_result_for_prompt(output, self.max_tool_result_chars, pinned);
        if truncated {
            debug!(
                tool = %call.tool,
                original_chars = output.chars().count(),
                "Tool output truncated for prompt"
            );
        }
        let message = ChatMessage::tool_result(&call.tool, &call.target, &body, last_user);
        if pinned {
            debug!(tool = %call.tool, id = %message.id, "Pinned tool result");
            self.state.pin(message.id);
        }
        message
    }

    pub fn compact(&self, messages: &mut Vec<ChatMessage>) -> CompactionReport {
        compaction::compact_messages(messages, &self.state, &self.budget)
    }

    pub fn aggressive_compact(&self, messages: &mut Vec<ChatMessage>) -> usize {
        compaction::aggressive_compact(messages, &self.state)
    }
}
