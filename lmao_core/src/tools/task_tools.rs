use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{Tool, ToolRegistry, ToolResult};
use crate::{TaskList, TaskListProvider, ToolCallPayload};

/// Register all four task tools against one shared list.
pub fn register_task_tools(registry: &mut ToolRegistry, tasks: Arc<TaskList>) {
    registry.register(Arc::new(AddTaskTool::new(Arc::clone(&tasks))));
    registry.register(Arc::new(CompleteTaskTool::new(Arc::clone(&tasks))));
    registry.register(Arc::new(DeleteTaskTool::new(Arc::clone(&tasks))));
    registry.register(Arc::new(ListTasksTool::new(tasks)));
}

/// Task text or id: `args` first, then `target`.
fn call_argument(call: &ToolCallPayload) -> &str {
    let args = call.args.trim();
    if args.is_empty() {
        call.target.trim()
    } else {
        args
    }
}

fn parse_task_id(call: &ToolCallPayload) -> Result<u64, ToolResult> {
    let raw = call_argument(call);
    raw.trim_start_matches('#')
        .parse::<u64>()
        .map_err(|_| ToolResult::error(format!("invalid task id '{raw}'")))
}

fn list_snapshot(tasks: &TaskList) -> serde_json::Value {
    json!({
        "tasks": tasks.tasks(),
        "rendered": tasks.render(),
        "incomplete": tasks.has_incomplete_tasks(),
    })
}

pub struct AddTaskTool {
    tasks: Arc<TaskList>,
}

impl AddTaskTool {
    #[must_use]
    pub const fn new(tasks: Arc<TaskList>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl Tool for AddTaskTool {
    fn name(&self) -> &str {
        "add_task"
    }

    fn description(&self) -> &str {
        "Add a task to the task list. args: task text."
    }

    async fn execute(&self, call: &ToolCallPayload) -> ToolResult {
        let text = call_argument(call);
        if text.is_empty() {
            return ToolResult::error("task text is required");
        }
        let task = self.tasks.add(text);
        ToolResult::success(json!({ "id": task.id, "text": task.text }))
    }
}

pub struct CompleteTaskTool {
    tasks: Arc<TaskList>,
}

impl CompleteTaskTool {
    #[must_use]
    pub const fn new(tasks: Arc<TaskList>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl Tool for CompleteTaskTool {
    fn name(&self) -> &str {
        "complete_task"
    }

    fn description(&self) -> &str {
        "Mark a task as done. args: task id."
    }

    async fn execute(&self, call: &ToolCallPayload) -> ToolResult {
        let id = match parse_task_id(call) {
            Ok(id) => id,
            Err(err) => return err,
        };
        match self.tasks.complete(id) {
            Some(task) => ToolResult::success(json!({
                "id": task.id,
                "text": task.text,
                "remaining_incomplete": self.tasks.has_incomplete_tasks(),
            })),
            None => ToolResult::error(format!("task {id} not found")),
        }
    }
}

pub struct DeleteTaskTool {
    tasks: Arc<TaskList>,
}

impl DeleteTaskTool {
    #[must_use]
    pub const fn new(tasks: Arc<TaskList>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl Tool for DeleteTaskTool {
    fn name(&self) -> &str {
        "delete_task"
    }

    fn description(&self) -> &str {
        "Remove a task from the list. args: task id."
    }

    async fn execute(&self, call: &ToolCallPayload) -> ToolResult {
        let id = match parse_task_id(call) {
            Ok(id) => id,
            Err(err) => return err,
        };
        match self.tasks.delete(id) {
            Some(task) => ToolResult::success(json!({ "deleted": task.id })),
            None => ToolResult::error(format!("task {id} not found")),
        }
    }
}

pub struct ListTasksTool {
    tasks: Arc<TaskList>,
}

impl ListTasksTool {
    #[must_use]
    pub const fn new(tasks: Arc<TaskList>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl Tool for ListTasksTool {
    fn name(&self) -> &str {
        "list_tasks"
    }

    fn description(&self) -> &str {
        "Show the current task list."
    }

    async fn execute(&self, _call: &ToolCallPayload) -> ToolResult {
        ToolResult::success(list_snapshot(&self.tasks))
    }
}
