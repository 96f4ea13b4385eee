//! In-memory message history for one conversation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use lmao_core::{ChatMessage, Role};

/// A conversation and its rolling message list.
///
/// Nothing here is persisted; the session lives as long as the process.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub id: Uuid,
    pub name: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub const fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Drop runtime instructions (system or user messages) starting with
    /// `prefix`. Returns how many were removed.
    pub fn remove_prefixed(&mut self, prefix: &str) -> usize {
        let before = self.messages.len();
        self.messages.retain(|msg| {
            !(matches!(msg.role, Role::System | Role::User) && msg.content.starts_with(prefix))
        });
        let removed = before - self.messages.len();
        if removed > 0 {
            self.updated_at = Utc::now();
        }
        removed
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_session() {
        let id = Uuid::now_v7();
        let mut session = ConversationSession::new().with_id(id);
        assert_eq!(session.id, id);
        assert!(session.messages.is_empty());

        session.add_message(ChatMessage::user("Hello"));
        session.add_message(ChatMessage::assistant("Hi there!"));
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "Hi there!");
        assert!(session.updated_at >= session.created_at);
    }

    #[test]
    fn test_remove_prefixed_spares_assistant_messages() {
        let mut session = ConversationSession::new();
        session.add_message(ChatMessage::user("ACTION_REQUIRED:\nLOOP: retry"));
        session.add_message(ChatMessage::assistant("ACTION_REQUIRED: echoed"));
        session.add_message(ChatMessage::user("keep me"));

        assert_eq!(session.remove_prefixed("ACTION_REQUIRED:"), 1);
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "keep me");
        assert_eq!(session.remove_prefixed("ACTION_REQUIRED:"), 0);
    }
}
