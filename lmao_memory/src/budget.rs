//! Prompt budget derived from a model's context window.

use serde::{Deserialize, Serialize};

pub const DEFAULT_RESERVED_COMPLETION_TOKENS: usize = 4096;

/// Compaction starts above 70% of the prompt budget...
const TRIGGER_PERCENT: usize = 70;
/// ...and stops once the estimate is back under 60%.
const TARGET_PERCENT: usize = 60;

/// Token thresholds that drive compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBudget {
    pub context_window: usize,
    pub reserved_completion: usize,
    pub max_prompt: usize,
    pub trigger: usize,
    pub target: usize,
}

impl PromptBudget {
    /// Derive the budget for `context_window` tokens.
    ///
    /// The completion reservation (`reserved_override`, else
    /// [`DEFAULT_RESERVED_COMPLETION_TOKENS`]) is clamped between a quarter
    /// and a half of the window, so the prompt always keeps at least half.
    #[must_use]
    pub fn derive(context_window: usize, reserved_override: Option<usize>) -> Self {
        let context_window = context_window.max(1);
        let reserved = reserved_override
            .unwrap_or(DEFAULT_RESERVED_COMPLETION_TOKENS)
            .clamp(context_window / 4, context_window / 2)
            .max(1);
        let max_prompt = context_window.saturating_sub(reserved).max(1);
        Self {
            context_window,
            reserved_completion: reserved,
            max_prompt,
            trigger: (max_prompt * TRIGGER_PERCENT / 100).max(1),
            target: (max_prompt * TARGET_PERCENT / 100).max(1),
        }
    }

    /// A budget with explicit thresholds, bypassing derivation.
    #[must_use]
    pub const fn fixed(trigger: usize, target: usize) -> Self {
        Self {
            context_window: 0,
            reserved_completion: 0,
            max_prompt: trigger,
            trigger,
            target,
        }
    }
}
