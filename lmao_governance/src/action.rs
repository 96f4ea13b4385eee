use lmao_hooks::HookResult;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::ACTION_KEY;

/// What the orchestrator must do after a governance hook point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum GovernanceAction {
    /// Inject an instruction for the model and call it again.
    InsertUserMessage(String),
    /// Show this text as the assistant's reply and end the conversation.
    InsertAssistantMessageAndEnd(String),
    /// End the conversation with a failure report.
    FailConversation(String),
    Continue,
}

impl GovernanceAction {
    /// Attach this action to a hook result under the action key. `Continue`
    /// writes nothing, so it never overwrites an action set earlier in the chain.
    #[must_use]
    pub fn into_result(self) -> HookResult {
        if self.is_continue() {
            return HookResult::ok();
        }
        let value = serde_json::to_value(&self).unwrap_or_default();
        HookResult::ok().with_data(ACTION_KEY, value)
    }

    /// Read the action a hook chain produced. Missing or unreadable actions
    /// mean `Continue`.
    #[must_use]
    pub fn from_hook_result(result: &HookResult) -> Self {
        let Some(value) = result.data.get(ACTION_KEY) else {
            return Self::Continue;
        };
        serde_json::from_value(value.clone()).unwrap_or_else(|err| {
            warn!("Ignoring malformed governance action: {}", err);
            Self::Continue
        })
    }

    #[must_use]
    pub const fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }

    #[must_use]
    pub const fn ends_conversation(&self) -> bool {
        matches!(
            self,
            Self::InsertAssistantMessageAndEnd(_) | Self::FailConversation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_survives_hook_result() {
        let action = GovernanceAction::InsertUserMessage("do the thing".to_string());
        let result = action.clone().into_result();
        assert_eq!(result.data[ACTION_KEY]["kind"], "insert_user_message");
        assert_eq!(GovernanceAction::from_hook_result(&result), action);
    }

    #[test]
    fn test_missing_or_garbage_action_is_continue() {
        assert_eq!(
            GovernanceAction::from_hook_result(&HookResult::ok()),
            GovernanceAction::Continue
        );
        let garbage = HookResult::ok().with_data(ACTION_KEY, "insert_user_message");
        assert!(GovernanceAction::from_hook_result(&garbage).is_continue());
    }

    #[test]
    fn test_continue_leaves_no_action_entry() {
        let result = GovernanceAction::Continue.into_result();
        assert!(!result.data.contains_key(ACTION_KEY));
        assert!(GovernanceAction::from_hook_result(&result).is_continue());
    }

    #[test]
    fn test_terminal_actions() {
        assert!(GovernanceAction::FailConversation(String::new()).ends_conversation());
        assert!(!GovernanceAction::InsertUserMessage(String::new()).ends_conversation());
    }
}
