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

//! Governed multi-turn conversations with a tool-using model.
//!
//! # Key Features
//! - One structured assistant turn per model call, at most one tool each
//! - Governance hooks decide what the user sees and when the model may stop
//! - Prompt history kept inside the model's context window
//! - Recovery instructions injected as runtime messages, never accumulated

mod manager;
pub mod prompt;
mod session;

pub use manager::{
    ConversationConfig, ConversationError, ConversationManager, DEFAULT_MAX_TURNS, TurnOutcome,
    TurnStatus, print_outcome,
};
pub use session::ConversationSession;
