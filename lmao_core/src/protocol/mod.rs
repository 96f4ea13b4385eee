//! The assistant turn wire protocol.
//!
//! One model completion carries one JSON object:
//! `{"type":"assistant_turn","version":"2","steps":[...],"turn":N}`.

mod error;
pub mod jsonish;
mod legacy;
mod parser;
mod types;

pub use error::ProtocolError;
pub use legacy::extract_tool_call;
pub use parser::{TASK_TOOL_ALIASES, parse_assistant_turn};
pub use types::{AssistantTurn, MessagePurpose, Step, ToolCallPayload, TurnKind};

/// The only protocol version this parser accepts.
pub const PROTOCOL_VERSION: &str = "2";
