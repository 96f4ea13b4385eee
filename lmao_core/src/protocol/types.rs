//! Typed representation of one assistant turn.

use serde::{Deserialize, Serialize};

use super::PROTOCOL_VERSION;

/// Envelope tag; serialises as `"assistant_turn"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnKind {
    #[default]
    #[serde(rename = "assistant_turn")]
    AssistantTurn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantTurn {
    #[serde(rename = "type")]
    pub kind: TurnKind,
    pub version: String,
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<i64>,
}

impl AssistantTurn {
    #[must_use]
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            kind: TurnKind::AssistantTurn,
            version: PROTOCOL_VERSION.to_string(),
            steps,
            turn: None,
        }
    }

    /// The single tool call of this turn, if any.
    #[must_use]
    pub fn tool_call(&self) -> Option<&ToolCallPayload> {
        self.steps.iter().find_map(|step| match step {
            Step::ToolCall { call } => Some(call),
            _ => None,
        })
    }

    /// `(content, purpose)` of every message step, in order.
    pub fn messages(&self) -> impl Iterator<Item = (&str, MessagePurpose)> {
        self.steps.iter().filter_map(|step| match step {
            Step::Message {
                content, purpose, ..
            } => Some((content.as_str(), *purpose)),
            _ => None,
        })
    }

    pub fn thinks(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|step| match step {
            Step::Think { content } => Some(content.as_str()),
            _ => None,
        })
    }

    #[must_use]
    pub fn has_end(&self) -> bool {
        self.steps.iter().any(|step| matches!(step, Step::End { .. }))
    }

    #[must_use]
    pub fn has_message_with(&self, purposes: &[MessagePurpose]) -> bool {
        self.messages().any(|(_, purpose)| purposes.contains(&purpose))
    }

    /// Copy of this turn without `think` steps, for storing in history.
    #[must_use]
    pub fn without_thinks(&self) -> Self {
        Self {
            steps: self
                .steps
                .iter()
                .filter(|step| !matches!(step, Step::Think { .. }))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    /// Serialise back to the wire format.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Think {
        content: String,
    },
    Message {
        content: String,
        format: String,
        purpose: MessagePurpose,
    },
    ToolCall {
        call: ToolCallPayload,
    },
    End {
        reason: String,
    },
}

impl Step {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Think { .. } => "think",
            Self::Message { .. } => "message",
            Self::ToolCall { .. } => "tool_call",
            Self::End { .. } => "end",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePurpose {
    #[default]
    Progress,
    Clarification,
    CannotFinish,
    Final,
}

impl MessagePurpose {
    pub const ALL: [Self; 4] = [
        Self::Progress,
        Self::Clarification,
        Self::CannotFinish,
        Self::Final,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Clarification => "clarification",
            Self::CannotFinish => "cannot_finish",
            Self::Final => "final",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|purpose| purpose.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub tool: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub args: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ToolCallPayload {
    #[must_use]
    pub fn new(tool: impl Into<String>, target: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            target: target.into(),
            args: args.into(),
            meta: None,
        }
    }
}
