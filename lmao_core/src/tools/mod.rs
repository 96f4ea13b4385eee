pub mod registry;
pub mod task_tools;

pub use registry::ToolRegistry;
pub use task_tools::{
    AddTaskTool, CompleteTaskTool, DeleteTaskTool, ListTasksTool, register_task_tools,
};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::ToolCallPayload;

/// Result of one tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub data: Value,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: Value::Null,
            error: Some(message.into()),
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Encode as the JSON string handed back to the model.
    #[must_use]
    pub fn to_json(&self, tool: &str) -> String {
        let payload = match &self.error {
            None => json!({ "tool": tool, "success": true, "data": self.data }),
            Some(err) => json!({ "tool": tool, "success": false, "error": err }),
        };
        payload.to_string()
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn execute(&self, call: &ToolCallPayload) -> ToolResult;
}
