//! Default governance handlers.
//!
//! Each handler reads the turn facts from the hook context, updates the
//! shared counters and reports a [`GovernanceAction`] in its result data.

use std::sync::Arc;

use lmao_core::util::truncate_text;
use lmao_core::{AssistantTurn, MessagePurpose, PROTOCOL_VERSION, Step, ToolCallPayload};
use lmao_hooks::{HookContext, HookError, HookHandler, HookOutcome, HookOutput};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::action::GovernanceAction;
use crate::counters::GovernanceCounters;
use crate::headless::requests_user_input;
use crate::policy::{TaskSnapshot, can_end_conversation, should_render_user_messages};
use crate::state::{
    ALLOWED_TOOLS, ASSISTANT_REPLY, ERROR_MESSAGE, HEADLESS, LAST_TOOL_SUMMARY, LAST_USER,
    PARSED_TURN, RENDER_KEY, TASKS, TOOL_RAN_SINCE_MESSAGE, WITHHELD_MESSAGE,
};

pub type SharedCounters = Arc<Mutex<GovernanceCounters>>;

fn parsed_turn(ctx: &HookContext) -> Result<Option<AssistantTurn>, HookError> {
    if ctx.runtime_state.contains_key(PARSED_TURN) {
        ctx.get(PARSED_TURN).map(Some)
    } else {
        Ok(None)
    }
}

fn task_snapshot(ctx: &HookContext) -> Result<TaskSnapshot, HookError> {
    if ctx.runtime_state.contains_key(TASKS) {
        ctx.get(TASKS)
    } else {
        Ok(TaskSnapshot::default())
    }
}

fn insert_user_message(text: String) -> HookOutcome {
    Ok(GovernanceAction::InsertUserMessage(text).into_result().into())
}

/// Concrete next action shown to a model that keeps stalling.
fn example_next_action(ctx: &HookContext) -> String {
    let allowed: Vec<String> = ctx.get(ALLOWED_TOOLS).unwrap_or_default();
    let tool = if allowed.iter().any(|name| name == "list_tasks") {
        "list_tasks".to_string()
    } else {
        allowed.first().cloned().unwrap_or_else(|| "read".to_string())
    };
    AssistantTurn::new(vec![Step::ToolCall {
        call: ToolCallPayload::new(tool, "", ""),
    }])
    .to_json()
}

/// Handles empty or whitespace-only model replies.
pub struct EmptyReplyRecovery {
    counters: SharedCounters,
}

impl EmptyReplyRecovery {
    #[must_use]
    pub const fn new(counters: SharedCounters) -> Self {
        Self { counters }
    }
}

impl HookHandler for EmptyReplyRecovery {
    fn handle(&self, ctx: &HookContext) -> HookOutcome {
        let counters = {
            let mut counters = self.counters.lock();
            counters.empty_replies += 1;
            *counters
        };
        warn!("Empty model reply ({} in a row)", counters.empty_replies);

        if counters.empty_budget_exhausted() {
            let summary = ctx
                .get_str(LAST_TOOL_SUMMARY)
                .unwrap_or("No tool output available.");
            let fallback = format!(
                "(auto-generated fallback) Unable to get a response from the model. \
                 Based on the latest tool output, here is a summary:\n{summary}"
            );
            return Ok(GovernanceAction::InsertAssistantMessageAndEnd(fallback)
                .into_result()
                .cancelled()
                .into());
        }

        let last_user = ctx.get_str(LAST_USER).unwrap_or("unknown");
        insert_user_message(format!(
            "Your last reply was empty (or whitespace). This is not allowed.\n\
             The user asked: {last_user:?}.\n\
             Return ONLY a single JSON object matching the assistant protocol.\n\
             Do NOT return whitespace.\n\n\
             If you are unsure what to do next, emit a tool_call or a short progress message."
        ))
    }
}

/// Handles replies the protocol parser rejected.
pub struct ProtocolRecovery {
    counters: SharedCounters,
}

impl ProtocolRecovery {
    #[must_use]
    pub const fn new(counters: SharedCounters) -> Self {
        Self { counters }
    }
}

impl HookHandler for ProtocolRecovery {
    fn handle(&self, ctx: &HookContext) -> HookOutcome {
        let error: String = ctx.get(ERROR_MESSAGE)?;
        let counters = {
            let mut counters = self.counters.lock();
            counters.invalid_replies += 1;
            *counters
        };
        warn!(
            "Invalid protocol reply ({}/{}): {}",
            counters.invalid_replies,
            GovernanceCounters::MAX_INVALID_REPLIES,
            error
        );

        if counters.invalid_budget_exhausted() {
            let reply = ctx.get_str(ASSISTANT_REPLY).unwrap_or("N/A");
            let report = format!(
                "error: model repeatedly returned invalid JSON protocol output.\n\
                 last error: {error}\n\
                 last reply (verbatim):\n{reply}"
            );
            return Ok(GovernanceAction::FailConversation(report)
                .into_result()
                .cancelled()
                .into());
        }

        insert_user_message(format!(
            "Your reply was not valid for the required JSON assistant protocol.\n\
             Error: {error}\n\
             Return ONLY a single JSON object matching:\n\
             {{\"type\":\"assistant_turn\",\"version\":\"{PROTOCOL_VERSION}\",\"steps\":[...]}}\n\
             No code fences, no extra text. Retry now."
        ))
    }
}

/// Think-only and progress-only turns, plus the render decision.
pub struct PostParsingGovernance {
    counters: SharedCounters,
}

impl PostParsingGovernance {
    #[must_use]
    pub const fn new(counters: SharedCounters) -> Self {
        Self { counters }
    }

    fn think_only(&self, ctx: &HookContext) -> String {
        let escalated = {
            let mut counters = self.counters.lock();
            counters.think_only_turns += 1;
            info!("Think-only turn #{}", counters.think_only_turns);
            counters.think_only_escalated()
        };
        let reminder = if escalated {
            "You have emitted multiple think-only turns. This is not allowed.\n\
             Next, emit either tool_call steps or message/end steps.\n\n"
        } else {
            "You produced only think steps. Continue immediately with the next action.\n\n"
        };
        format!(
            "{reminder}Return ONLY a single JSON object matching the assistant protocol.\n\
             Example next action:\n{}",
            example_next_action(ctx)
        )
    }

    fn progress_only(&self, turn: &AssistantTurn, render: bool, tasks: &TaskSnapshot) -> String {
        let escalated = {
            let mut counters = self.counters.lock();
            counters.progress_only_turns += 1;
            info!("Progress-only turn #{}", counters.progress_only_turns);
            counters.progress_only_escalated()
        };
        let mut text = String::new();
        if escalated {
            text.push_str(
                "You have emitted multiple message-only turns without taking an action. \
                 This is not allowed.\n",
            );
        }
        if turn.has_message_with(&[MessagePurpose::Final, MessagePurpose::CannotFinish]) {
            text.push_str(
                "You sent a terminal message (purpose='final' or 'cannot_finish') but did not \
                 include an end step.\n\
                 Continue immediately by returning a new assistant_turn that includes an explicit \
                 end step.\n\
                 Return ONLY JSON; do not ask the user to type 'ok' or provide follow-ups.",
            );
        } else {
            text.push_str(
                "You sent a progress message but did not call any tools and did not end.\n\
                 Continue immediately without waiting for user input: either call a tool \
                 (tool_call steps) or, if finished, send purpose='final' AND an explicit end step.\n\
                 Do not ask the user to type 'ok' or otherwise prompt for input unless you truly \
                 need clarification (then set purpose='clarification').",
            );
        }
        if !render {
            text.push_str("\n\n");
            text.push_str(&withheld_notice(turn, tasks));
        }
        text
    }
}

fn combined_messages(turn: &AssistantTurn) -> String {
    turn.messages()
        .map(|(content, _)| content)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn withheld_preview(text: &str) -> String {
    truncate_text(text, 12, 900, "\n...[truncated]")
}

fn withheld_notice(turn: &AssistantTurn, tasks: &TaskSnapshot) -> String {
    let preview = withheld_preview(&combined_messages(turn));
    format!(
        "Your previous message was NOT shown to the human user because the task list is \
         incomplete.\n\
         Do not assume the user saw it. First, complete the outstanding tasks using tool calls.\n\
         After the task list is complete, resend the message to the user (prefer purpose='final').\n\n\
         Current task list:\n{}\n\n\
         Withheld message preview (for you to resend later):\n{preview}",
        tasks.rendered
    )
}

impl HookHandler for PostParsingGovernance {
    fn handle(&self, ctx: &HookContext) -> HookOutcome {
        let Some(turn) = parsed_turn(ctx)? else {
            return Ok(HookOutput::Unchanged);
        };
        let tasks = task_snapshot(ctx)?;
        let render = should_render_user_messages(&tasks, &turn);
        let has_messages = turn.messages().next().is_some();
        let has_tool_call = turn.tool_call().is_some();

        let action = if !has_messages && !has_tool_call && !turn.has_end() {
            GovernanceAction::InsertUserMessage(self.think_only(ctx))
        } else if has_messages
            && !has_tool_call
            && !turn.has_end()
            && !turn.has_message_with(&[MessagePurpose::Clarification])
        {
            GovernanceAction::InsertUserMessage(self.progress_only(&turn, render, &tasks))
        } else {
            GovernanceAction::Continue
        };

        debug!(render, "Post-parsing governance: {:?}", action);
        Ok(action.into_result().with_data(RENDER_KEY, render).into())
    }
}

/// Blocks clarification requests when nobody can answer them.
pub struct HeadlessGuardrail;

impl HookHandler for HeadlessGuardrail {
    fn handle(&self, ctx: &HookContext) -> HookOutcome {
        if !ctx.get_bool(HEADLESS) {
            return Ok(HookOutput::Unchanged);
        }
        let Some(turn) = parsed_turn(ctx)? else {
            return Ok(HookOutput::Unchanged);
        };

        let explicit = turn.has_message_with(&[MessagePurpose::Clarification]);
        let implicit = requests_user_input(
            turn.messages()
                .filter(|(_, purpose)| *purpose != MessagePurpose::CannotFinish)
                .map(|(content, _)| content),
        );
        if !explicit && !implicit {
            return Ok(HookOutput::Unchanged);
        }

        info!(explicit, implicit, "Headless guardrail blocked an input request");
        insert_user_message(
            "Headless mode is active: the human user cannot respond, so do NOT ask questions or \
             request confirmation.\n\
             Proceed autonomously: pick reasonable defaults, state assumptions briefly, and \
             continue (call tools if helpful).\n\
             If you are truly blocked, send a message step with purpose='cannot_finish' \
             describing what's missing, then end."
                .to_string(),
        )
    }
}

/// Decides whether an `end` step is honoured and resets the counters once a
/// turn is accepted.
pub struct EndGate {
    counters: SharedCounters,
}

impl EndGate {
    #[must_use]
    pub const fn new(counters: SharedCounters) -> Self {
        Self { counters }
    }
}

impl HookHandler for EndGate {
    fn handle(&self, ctx: &HookContext) -> HookOutcome {
        let Some(turn) = parsed_turn(ctx)? else {
            return Ok(HookOutput::Unchanged);
        };
        let tasks = task_snapshot(ctx)?;

        if turn.has_end() {
            let has_messages = turn.messages().next().is_some();
            let shows_message = has_messages && should_render_user_messages(&tasks, &turn);
            if ctx.get_bool(TOOL_RAN_SINCE_MESSAGE) && !shows_message {
                let escalated = {
                    let mut counters = self.counters.lock();
                    counters.progress_only_turns += 1;
                    counters.progress_only_escalated()
                };
                let prefix = if escalated {
                    "You have repeatedly tried to end without reporting to the user. \
                     This is not allowed.\n"
                } else {
                    ""
                };
                let withheld = if has_messages {
                    Some(combined_messages(&turn))
                } else {
                    ctx.get_str(WITHHELD_MESSAGE).map(str::to_string)
                };
                let extra = withheld
                    .filter(|text| !text.is_empty())
                    .map(|text| {
                        format!(
                            "\n\nWithheld message preview (resend or rephrase):\n{}",
                            withheld_preview(&text)
                        )
                    })
                    .unwrap_or_default();
                return insert_user_message(format!(
                    "{prefix}You emitted an end step, but the human user has not received a \
                     final visible summary of what happened.\n\
                     Do NOT end yet. Send a message step now (prefer purpose='final') \
                     summarizing results, then end.\n\n\
                     Current task list:\n{}{extra}",
                    tasks.rendered
                ));
            }
            if !can_end_conversation(&tasks, &turn) {
                info!("End step refused: tasks remain incomplete");
                return insert_user_message(format!(
                    "You emitted an end step while tasks are still incomplete.\n\
                     Current task list:\n{}\n\n\
                     Rules:\n\
                     - Do not send message steps with purpose 'progress' or 'final' until all \
                     tasks are complete.\n\
                     - If you need user input, send a message step with purpose 'clarification'.\n\
                     - If you cannot finish, send a message step with purpose 'cannot_finish' \
                     and then end.\n\
                     - Otherwise, use tool_call steps to complete or delete tasks until the list \
                     is complete.",
                    tasks.rendered
                ));
            }
        }

        if turn.has_end() || turn.tool_call().is_some() {
            self.counters.lock().reset();
            debug!("Turn accepted; governance counters reset");
        }
        Ok(HookOutput::Unchanged)
    }
}
