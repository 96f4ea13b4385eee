use std::collections::HashSet;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::HookError;

/// State passed along a hook chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookContext {
    pub hook_type: String,
    pub runtime_state: Map<String, Value>,
    pub cancelled: bool,
    pub cancel_reason: Option<String>,
}

impl HookContext {
    pub fn new(hook_type: impl Into<String>) -> Self {
        Self {
            hook_type: hook_type.into(),
            ..Self::default()
        }
    }

    pub fn cancel(&mut self, reason: impl Into<String>) {
        self.cancelled = true;
        self.cancel_reason = Some(reason.into());
    }

    /// Same context under another hook type.
    #[must_use]
    pub fn with_hook_type(&self, hook_type: impl Into<String>) -> Self {
        Self {
            hook_type: hook_type.into(),
            ..self.clone()
        }
    }

    /// Copy with one runtime-state entry added or replaced.
    #[must_use]
    pub fn with_runtime_state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.runtime_state.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.runtime_state.insert(key.into(), value.into());
    }

    /// Deserialize a required runtime-state entry.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, HookError> {
        let value = self
            .runtime_state
            .get(key)
            .ok_or_else(|| HookError::MissingState(key.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|err| HookError::InvalidState {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.runtime_state
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.runtime_state.get(key).and_then(Value::as_str)
    }
}

/// Outcome of one handler, or the folded outcome of a whole chain.
#[derive(Debug, Clone, PartialEq)]
pub struct HookResult {
    pub success: bool,
    pub data: Map<String, Value>,
    pub errors: Vec<String>,
    pub modified_context: Option<HookContext>,
    pub should_cancel: bool,
    pub should_skip: bool,
}

impl Default for HookResult {
    fn default() -> Self {
        Self {
            success: true,
            data: Map::new(),
            errors: Vec::new(),
            modified_context: None,
            should_cancel: false,
            should_skip: false,
        }
    }
}

impl HookResult {
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: HookContext) -> Self {
        self.modified_context = Some(context);
        self
    }

    #[must_use]
    pub const fn cancelled(mut self) -> Self {
        self.should_cancel = true;
        self
    }

    #[must_use]
    pub const fn skipped(mut self) -> Self {
        self.should_skip = true;
        self
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![message.into()],
            ..Self::default()
        }
    }
}

/// What a handler hands back to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutput {
    Unchanged,
    Result(HookResult),
    Context(HookContext),
}

impl From<HookResult> for HookOutput {
    fn from(result: HookResult) -> Self {
        Self::Result(result)
    }
}

impl From<HookContext> for HookOutput {
    fn from(context: HookContext) -> Self {
        Self::Context(context)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionOrder {
    /// Priority descending, then registration order.
    #[default]
    Priority,
    Registration,
    /// Shuffled per run; useful to check handlers don't depend on order.
    Random,
}

/// Registry settings. All of them may be changed between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookSettings {
    pub enabled: bool,
    /// Per-handler wall time in milliseconds.
    pub hook_timeout_ms: Option<u64>,
    /// Wall time for the whole chain in milliseconds.
    pub max_execution_time_ms: Option<u64>,
    pub enable_cancellation: bool,
    pub execution_order: ExecutionOrder,
    pub disabled_hooks: HashSet<String>,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            hook_timeout_ms: None,
            max_execution_time_ms: None,
            enable_cancellation: true,
            execution_order: ExecutionOrder::Priority,
            disabled_hooks: HashSet::new(),
        }
    }
}

impl HookSettings {
    #[must_use]
    pub fn hook_timeout(&self) -> Option<Duration> {
        self.hook_timeout_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub fn max_execution_time(&self) -> Option<Duration> {
        self.max_execution_time_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub const fn with_hook_timeout_ms(mut self, ms: u64) -> Self {
        self.hook_timeout_ms = Some(ms);
        self
    }

    #[must_use]
    pub const fn with_max_execution_time_ms(mut self, ms: u64) -> Self {
        self.max_execution_time_ms = Some(ms);
        self
    }

    #[must_use]
    pub const fn with_execution_order(mut self, order: ExecutionOrder) -> Self {
        self.execution_order = order;
        self
    }

    #[must_use]
    pub const fn with_cancellation(mut self, enabled: bool) -> Self {
        self.enable_cancellation = enabled;
        self
    }

    #[must_use]
    pub fn is_disabled(&self, hook_type: &str) -> bool {
        !self.enabled || self.disabled_hooks.contains(hook_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_state_access() {
        let ctx = HookContext::new("t")
            .with_runtime_state("count", 3)
            .with_runtime_state("headless", true);
        assert_eq!(ctx.get::<u32>("count").ok(), Some(3));
        assert!(ctx.get_bool("headless"));
        assert!(!ctx.get_bool("missing"));
        assert!(matches!(
            ctx.get::<u32>("missing"),
            Err(HookError::MissingState(key)) if key == "missing"
        ));
        assert!(matches!(
            ctx.get::<String>("count"),
            Err(HookError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: HookSettings =
            serde_json::from_str(r#"{"execution_order":"random","hook_timeout_ms":50}"#)
                .unwrap_or_default();
        assert!(settings.enabled);
        assert_eq!(settings.execution_order, ExecutionOrder::Random);
        assert_eq!(settings.hook_timeout(), Some(Duration::from_millis(50)));
        assert_eq!(settings.max_execution_time(), None);
    }
}
