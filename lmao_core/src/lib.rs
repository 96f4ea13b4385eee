#![deny(
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

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod protocol;
pub mod tasks;
pub mod tools;
pub mod util;

pub use protocol::{
    AssistantTurn, MessagePurpose, PROTOCOL_VERSION, ProtocolError, Step, ToolCallPayload,
    extract_tool_call, parse_assistant_turn,
};
pub use tasks::{Task, TaskList};
pub use tools::{Tool, ToolRegistry, ToolResult};

/// Prefix of every tool-result message placed in the prompt.
pub const TOOL_RESULT_PROMPT_PREFIX: &str = "Tool result for ";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    /// Role name used on the chat-completions wire.
    ///
    /// Tool results travel as `user` messages since not every provider
    /// accepts a bare `tool` role without a matching call id.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::User | Self::Tool => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a conversation message, independent of its content.
///
/// Two messages with identical role and content still get distinct ids, so
/// pinning and "last user message" checks never confuse them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(skip, default = "MessageId::next")]
    pub id: MessageId,
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::next(),
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Build the prompt entry for a tool's output.
    #[must_use]
    pub fn tool_result(tool: &str, target: &str, body: &str, last_user: &str) -> Self {
        Self::new(
            Role::Tool,
            format!(
                "{TOOL_RESULT_PROMPT_PREFIX}tool '{tool}' on '{target}':\n{body}\n\
                 Use this to continue helping the user (request: {last_user:?}). \
                 If another tool is needed, call it; otherwise reply to the user now."
            ),
        )
    }

    #[must_use]
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.content.starts_with(TOOL_RESULT_PROMPT_PREFIX)
    }
}

impl PartialEq for ChatMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChatMessage {}

#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Request one completion. Errors carry the provider's message text so
    /// callers can classify them (e.g. context-length overflows).
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> anyhow::Result<LLMResponse>;
    fn get_default_model(&self) -> &str;
}

#[async_trait]
impl<T: LLMProvider + ?Sized> LLMProvider for std::sync::Arc<T> {
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> anyhow::Result<LLMResponse> {
        (**self).chat(messages, model).await
    }

    fn get_default_model(&self) -> &str {
        (**self).get_default_model()
    }
}

/// Executes a single validated tool call and returns its JSON-encoded result.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn dispatch(&self, call: &ToolCallPayload) -> String;

    /// Tool names the model may call.
    fn allowed_tools(&self) -> Vec<String>;

    /// One line per tool, shown to the model in the system prompt.
    fn catalog(&self) -> String {
        self.allowed_tools()
            .iter()
            .map(|name| format!("- {name}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl<T: ToolDispatcher + ?Sized> ToolDispatcher for std::sync::Arc<T> {
    async fn dispatch(&self, call: &ToolCallPayload) -> String {
        (**self).dispatch(call).await
    }

    fn allowed_tools(&self) -> Vec<String> {
        (**self).allowed_tools()
    }

    fn catalog(&self) -> String {
        (**self).catalog()
    }
}

/// Read-only view of the task list consumed by governance.
pub trait TaskListProvider: Send + Sync {
    fn has_incomplete_tasks(&self) -> bool;
    fn render(&self) -> String;
}
