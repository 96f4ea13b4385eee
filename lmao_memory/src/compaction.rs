//! Evicting history to keep the prompt under budget.

use std::collections::HashSet;
use std::time::Instant;

use lmao_core::util::preview;
use lmao_core::{ChatMessage, MessageId};
use tracing::{debug, info};

use crate::budget::PromptBudget;
use crate::estimate::estimate_message_tokens;

const LOG_PREVIEW_CHARS: usize = 120;

/// Messages that survive every compaction.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub pinned_message_ids: HashSet<MessageId>,
    pub last_user_message: Option<MessageId>,
}

impl MemoryState {
    pub fn pin(&mut self, id: MessageId) {
        self.pinned_message_ids.insert(id);
    }

    #[must_use]
    pub fn is_pinned(&self, id: MessageId) -> bool {
        self.pinned_message_ids.contains(&id)
    }

    fn is_exempt(&self, idx: usize, message: &ChatMessage) -> bool {
        idx == 0 || self.is_pinned(message.id) || self.last_user_message == Some(message.id)
    }
}

/// What a compaction pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub dropped: usize,
    pub prompt_tokens: usize,
}

/// Index of the next message to evict, if any.
///
/// Older tool results go first; the newest droppable tool result stays so
/// the model can react to it. After that the oldest droppable message of
/// any role goes.
fn next_droppable_index(messages: &[ChatMessage], state: &MemoryState) -> Option<usize> {
    if messages.len() <= 1 {
        return None;
    }
    let mut droppable = messages
        .iter()
        .enumerate()
        .filter(|(idx, message)| !state.is_exempt(*idx, message));

    let latest_tool_result = droppable
        .clone()
        .rev()
        .find(|(_, message)| message.is_tool_result())
        .map(|(idx, _)| idx);

    droppable
        .clone()
        .find(|(idx, message)| message.is_tool_result() && Some(*idx) != latest_tool_result)
        .or_else(|| droppable.find(|(idx, _)| Some(*idx) != latest_tool_result))
        .map(|(idx, _)| idx)
}

/// Evict messages while the estimate exceeds the budget.
///
/// Nothing happens unless the estimate is above `budget.trigger`; then
/// messages are dropped until it is at or below `budget.target` or nothing
/// droppable is left.
pub fn compact_messages(
    messages: &mut Vec<ChatMessage>,
    state: &MemoryState,
    budget: &PromptBudget,
) -> CompactionReport {
    let started = Instant::now();
    let mut prompt_tokens = estimate_message_tokens(messages);
    if prompt_tokens <= budget.trigger {
        return CompactionReport {
            dropped: 0,
            prompt_tokens,
        };
    }

    let mut dropped = 0;
    while prompt_tokens > budget.target {
        let Some(idx) = next_droppable_index(messages, state) else {
            break;
        };
        let removed = messages.remove(idx);
        dropped += 1;
        debug!(
            role = ?removed.role,
            idx,
            "Compaction dropped message: {}",
            preview(&removed.content, LOG_PREVIEW_CHARS)
        );
        prompt_tokens = estimate_message_tokens(messages);
    }

    info!(
        dropped,
        prompt_tokens,
        target = budget.target,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "Compacted conversation history"
    );
    CompactionReport {
        dropped,
        prompt_tokens,
    }
}

/// Keep only the system message, pinned messages and the last user message.
///
/// Used after the provider rejected a prompt as too long. Surviving
/// messages keep their relative order.
pub fn aggressive_compact(messages: &mut Vec<ChatMessage>, state: &MemoryState) -> usize {
    let before = messages.len();
    let mut seen = HashSet::new();
    let mut idx = 0;
    messages.retain(|message| {
        let keep = state.is_exempt(idx, message) && seen.insert(message.id);
        idx += 1;
        keep
    });
    info!(
        retained = messages.len(),
        dropped = before - messages.len(),
        "Aggressively compacted conversation history"
    );
    before - messages.len()
}
