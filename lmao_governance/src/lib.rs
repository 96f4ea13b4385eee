#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Turn-acceptability policy, built as handlers on a [`HookRegistry`].
//!
//! The orchestrator runs the hook points in [`TURN_HOOK_POINTS`] order for
//! each parsed turn and acts on the first non-`Continue` action. Empty and
//! unparseable replies go through their own hook points.

pub mod action;
pub mod counters;
pub mod handlers;
pub mod headless;
pub mod policy;
pub mod state;

use std::sync::Arc;

use lmao_hooks::{HookRegistry, HookResult};
use parking_lot::Mutex;
use tracing::info;

pub use action::GovernanceAction;
pub use counters::GovernanceCounters;
pub use headless::requests_user_input;
pub use policy::{TaskSnapshot, can_end_conversation, should_render_user_messages};
pub use state::TurnFacts;

use handlers::{
    EmptyReplyRecovery, EndGate, HeadlessGuardrail, PostParsingGovernance, ProtocolRecovery,
};

pub const ON_LLM_EMPTY_REPLY: &str = "on_llm_empty_reply_error";
pub const ON_PROTOCOL_PARSE_ERROR: &str = "on_protocol_parse_error";
pub const POST_MESSAGE_PARSING: &str = "post_message_parsing";
pub const POST_MESSAGE_VALIDATION: &str = "post_message_validation";
pub const POST_ASSISTANT_TURN_VALIDATION: &str = "post_assistant_turn_validation";

/// Hook points evaluated, in order, on every successfully parsed turn.
pub const TURN_HOOK_POINTS: [&str; 3] = [
    POST_MESSAGE_PARSING,
    POST_MESSAGE_VALIDATION,
    POST_ASSISTANT_TURN_VALIDATION,
];

/// Priority of the built-in handlers; custom handlers above it run first.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Governance state for exactly one conversation.
#[derive(Debug, Default)]
pub struct Governance {
    counters: Arc<Mutex<GovernanceCounters>>,
}

/// Outcome of evaluating one parsed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnVerdict {
    pub action: GovernanceAction,
    /// Whether the turn's messages may be shown to the user.
    pub render: bool,
}

impl Governance {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe the default handlers to `registry`.
    pub fn register_hooks(&self, registry: &mut HookRegistry) {
        registry.register(
            ON_LLM_EMPTY_REPLY,
            "empty_reply_recovery",
            DEFAULT_PRIORITY,
            EmptyReplyRecovery::new(Arc::clone(&self.counters)),
        );
        registry.register(
            ON_PROTOCOL_PARSE_ERROR,
            "protocol_recovery",
            DEFAULT_PRIORITY,
            ProtocolRecovery::new(Arc::clone(&self.counters)),
        );
        registry.register(
            POST_MESSAGE_PARSING,
            "post_parsing_governance",
            DEFAULT_PRIORITY,
            PostParsingGovernance::new(Arc::clone(&self.counters)),
        );
        registry.register(
            POST_MESSAGE_VALIDATION,
            "headless_guardrail",
            DEFAULT_PRIORITY,
            HeadlessGuardrail,
        );
        registry.register(
            POST_ASSISTANT_TURN_VALIDATION,
            "end_gate",
            DEFAULT_PRIORITY,
            EndGate::new(Arc::clone(&self.counters)),
        );
        info!("Registered governance hooks");
    }

    #[must_use]
    pub fn counters(&self) -> GovernanceCounters {
        *self.counters.lock()
    }

    /// A non-empty reply arrived; the empty-reply streak is over.
    pub fn note_reply_received(&self) {
        self.counters.lock().empty_replies = 0;
    }

    pub fn reset(&self) {
        self.counters.lock().reset();
    }

    /// Run the empty-reply hook point.
    #[must_use]
    pub fn on_empty_reply(&self, registry: &HookRegistry, facts: &TurnFacts) -> GovernanceAction {
        let result = registry.execute_hooks(
            ON_LLM_EMPTY_REPLY,
            facts.to_context(ON_LLM_EMPTY_REPLY),
        );
        log_hook_errors(ON_LLM_EMPTY_REPLY, &result);
        GovernanceAction::from_hook_result(&result)
    }

    /// Run the parse-error hook point. `facts.error_message` must be set.
    #[must_use]
    pub fn on_parse_error(&self, registry: &HookRegistry, facts: &TurnFacts) -> GovernanceAction {
        let result = registry.execute_hooks(
            ON_PROTOCOL_PARSE_ERROR,
            facts.to_context(ON_PROTOCOL_PARSE_ERROR),
        );
        log_hook_errors(ON_PROTOCOL_PARSE_ERROR, &result);
        GovernanceAction::from_hook_result(&result)
    }

    /// Run the per-turn hook points in order, stopping at the first action
    /// that is not `Continue`.
    #[must_use]
    pub fn evaluate_turn(&self, registry: &HookRegistry, facts: &TurnFacts) -> TurnVerdict {
        let mut render = true;
        for hook_type in TURN_HOOK_POINTS {
            let result = registry.execute_hooks(hook_type, facts.to_context(hook_type));
            log_hook_errors(hook_type, &result);
            if let Some(flag) = result.data.get(state::RENDER_KEY).and_then(|v| v.as_bool()) {
                render = flag;
            }
            let action = GovernanceAction::from_hook_result(&result);
            if !action.is_continue() {
                return TurnVerdict { action, render };
            }
        }
        TurnVerdict {
            action: GovernanceAction::Continue,
            render,
        }
    }
}

fn log_hook_errors(hook_type: &str, result: &HookResult) {
    for error in &result.errors {
        tracing::warn!(hook_type, "Governance hook error: {}", error);
    }
}
