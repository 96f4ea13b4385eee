//! In-memory task list shared between the task tools and governance.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::TaskListProvider;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub text: String,
    pub done: bool,
}

#[derive(Debug)]
struct TaskState {
    tasks: Vec<Task>,
    next_id: u64,
}

/// Ordered tasks with ids starting at 1. Ids are never reused within a list.
#[derive(Debug)]
pub struct TaskList {
    state: Mutex<TaskState>,
}

impl TaskList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(TaskState {
                tasks: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub fn add(&self, text: impl Into<String>) -> Task {
        let mut state = self.state.lock();
        let task = Task {
            id: state.next_id,
            text: text.into(),
            done: false,
        };
        state.next_id += 1;
        state.tasks.push(task.clone());
        task
    }

    /// Mark a task done. Returns the updated task, or `None` for an unknown id.
    pub fn complete(&self, id: u64) -> Option<Task> {
        let mut state = self.state.lock();
        let task = state.tasks.iter_mut().find(|task| task.id == id)?;
        task.done = true;
        Some(task.clone())
    }

    pub fn delete(&self, id: u64) -> Option<Task> {
        let mut state = self.state.lock();
        let pos = state.tasks.iter().position(|task| task.id == id)?;
        Some(state.tasks.remove(pos))
    }

    /// Drop every task and restart ids at 1.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.tasks.clear();
        state.next_id = 1;
    }

    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    #[must_use]
    pub fn render(&self) -> String {
        let state = self.state.lock();
        if state.tasks.is_empty() {
            return "(empty task list)".to_string();
        }
        state
            .tasks
            .iter()
            .map(|task| {
                let mark = if task.done { "[x]" } else { "[ ]" };
                format!("{mark} {} {}", task.id, task.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for TaskList {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskListProvider for TaskList {
    fn has_incomplete_tasks(&self) -> bool {
        self.state.lock().tasks.iter().any(|task| !task.done)
    }

    fn render(&self) -> String {
        Self::render(self)
    }
}
