#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Keeping the conversation prompt inside the model's context window.

pub mod budget;
pub mod compaction;
mod estimate;
mod manager;
pub mod prompt;

pub use budget::{DEFAULT_RESERVED_COMPLETION_TOKENS, PromptBudget};
pub use compaction::{CompactionReport, MemoryState, aggressive_compact, compact_messages};
pub use estimate::{estimate_message_tokens, estimate_tokens};
pub use manager::MemoryManager;
pub use prompt::{
    MAX_TOOL_RESULT_PROMPT_CHARS, TRUNCATION_MARKER, is_context_length_error,
    sanitize_assistant_reply, should_pin_tool_result, truncate_tool_result_for_prompt,
};
