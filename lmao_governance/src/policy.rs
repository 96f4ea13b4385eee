//! Rules for when the agent may talk to the user and when it may stop.

use lmao_core::{AssistantTurn, MessagePurpose, TaskListProvider};
use serde::{Deserialize, Serialize};

/// Point-in-time copy of the task list, carried through hook contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub incomplete: bool,
    pub rendered: String,
}

impl TaskSnapshot {
    pub fn capture(tasks: &(impl TaskListProvider + ?Sized)) -> Self {
        Self {
            incomplete: tasks.has_incomplete_tasks(),
            rendered: tasks.render(),
        }
    }
}

impl TaskListProvider for TaskSnapshot {
    fn has_incomplete_tasks(&self) -> bool {
        self.incomplete
    }

    fn render(&self) -> String {
        self.rendered.clone()
    }
}

/// Messages are withheld while tasks remain open, unless they ask the user
/// something or explain why the work cannot be finished.
pub fn should_render_user_messages(
    tasks: &(impl TaskListProvider + ?Sized),
    turn: &AssistantTurn,
) -> bool {
    if turn.messages().next().is_none() || !tasks.has_incomplete_tasks() {
        return true;
    }
    turn.has_message_with(&[MessagePurpose::Clarification, MessagePurpose::CannotFinish])
}

pub fn can_end_conversation(
    tasks: &(impl TaskListProvider + ?Sized),
    turn: &AssistantTurn,
) -> bool {
    !tasks.has_incomplete_tasks() || turn.has_message_with(&[MessagePurpose::CannotFinish])
}
