//! Approximate token counting.
//!
//! Words and individual punctuation marks each count as one token. The
//! figure only needs to be deterministic and grow with the text.

use lmao_core::ChatMessage;
use once_cell::sync::Lazy;
use regex::Regex;

/// Fixed overhead per message for role markers and separators.
const PER_MESSAGE_OVERHEAD: usize = 4;

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9_]+|[^\sA-Za-z0-9_]").unwrap_or_else(|_| unreachable!()));

#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    TOKEN.find_iter(text).count()
}

#[must_use]
pub fn estimate_message_tokens(messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .map(|msg| {
            estimate_tokens(msg.role.wire_name()) + estimate_tokens(&msg.content) + PER_MESSAGE_OVERHEAD
        })
        .sum()
}
