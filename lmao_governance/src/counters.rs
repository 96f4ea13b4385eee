use serde::{Deserialize, Serialize};

/// Escalation state for one conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceCounters {
    pub empty_replies: u32,
    pub invalid_replies: u32,
    pub think_only_turns: u32,
    pub progress_only_turns: u32,
}

impl GovernanceCounters {
    /// Empty replies tolerated before the conversation ends with a fallback.
    pub const MAX_EMPTY_REPLIES: u32 = 4;
    /// Invalid replies tolerated; one more fails the conversation.
    pub const MAX_INVALID_REPLIES: u32 = 2;
    pub const MAX_THINK_ONLY_TURNS: u32 = 3;
    pub const MAX_PROGRESS_ONLY_TURNS: u32 = 4;

    /// Called once a turn is fully acceptable.
    pub const fn reset(&mut self) {
        *self = Self {
            empty_replies: 0,
            invalid_replies: 0,
            think_only_turns: 0,
            progress_only_turns: 0,
        };
    }

    #[must_use]
    pub const fn empty_budget_exhausted(&self) -> bool {
        self.empty_replies >= Self::MAX_EMPTY_REPLIES
    }

    #[must_use]
    pub const fn invalid_budget_exhausted(&self) -> bool {
        self.invalid_replies > Self::MAX_INVALID_REPLIES
    }

    #[must_use]
    pub const fn think_only_escalated(&self) -> bool {
        self.think_only_turns > Self::MAX_THINK_ONLY_TURNS
    }

    #[must_use]
    pub const fn progress_only_escalated(&self) -> bool {
        self.progress_only_turns > Self::MAX_PROGRESS_ONLY_TURNS
    }
}
