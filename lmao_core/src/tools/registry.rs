use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{Tool, ToolResult};
use crate::{ToolCallPayload, ToolDispatcher};

/// Name-indexed tool set. Its names double as the protocol allow-list.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        info!("Registering tool: {}", tool.name());
        self.tools.insert(tool.name().to_string(), tool);
    }

    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// `name: description` lines for the system prompt.
    #[must_use]
    pub fn describe(&self) -> String {
        self.tools
            .values()
            .map(|tool| format!("- {}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn execute(&self, call: &ToolCallPayload) -> ToolResult {
        match self.tools.get(&call.tool) {
            Some(tool) => tool.execute(call).await,
            None => {
                warn!("Tool not found: {}", call.tool);
                ToolResult::error(format!("unknown tool '{}'", call.tool))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolDispatcher for ToolRegistry {
    async fn dispatch(&self, call: &ToolCallPayload) -> String {
        info!("Dispatching tool '{}' on '{}'", call.tool, call.target);
        self.execute(call).await.to_json(&call.tool)
    }

    fn allowed_tools(&self) -> Vec<String> {
        self.list()
    }

    fn catalog(&self) -> String {
        self.describe()
    }
}
