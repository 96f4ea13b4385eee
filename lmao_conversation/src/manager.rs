//! Turn orchestrator.
//!
//! The `ConversationManager` calls the model, parses each reply, lets the
//! governance hooks judge it, runs at most one tool per turn and keeps the
//! message list inside the prompt budget.

use std::io::Write;
use std::sync::Arc;

use lmao_core::util::summarize_tool_output;
use lmao_core::{
    AssistantTurn, ChatMessage, LLMProvider, LLMResponse, Step, TaskListProvider,
    ToolCallPayload, ToolDispatcher, extract_tool_call, parse_assistant_turn,
};
use lmao_governance::{Governance, GovernanceAction, TaskSnapshot, TurnFacts};
use lmao_hooks::{HookRegistry, HookSettings};
use lmao_memory::{
    MAX_TOOL_RESULT_PROMPT_CHARS, MemoryManager, PromptBudget, is_context_length_error,
    sanitize_assistant_reply,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::prompt::{
    ACTION_REQUIRED_PREFIX, DEFAULT_SYSTEM_PROMPT, action_required, build_system_prompt,
};
use crate::session::ConversationSession;

pub const DEFAULT_MAX_TURNS: usize = 32;

/// Configuration for one conversation.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub session_id: Uuid,
    pub session_name: Option<String>,
    /// Model name; empty means the provider's default.
    pub model: String,
    /// Preamble placed before the protocol description.
    pub system_prompt: String,
    /// Model calls allowed per user input.
    pub max_turns: usize,
    /// No human is available to answer questions.
    pub headless: bool,
    pub prompt_budget: PromptBudget,
    pub max_tool_result_chars: usize,
    pub hook_settings: HookSettings,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            session_id: Uuid::now_v7(),
            session_name: None,
            model: String::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            headless: false,
            prompt_budget: PromptBudget::derive(8192, None),
            max_tool_result_chars: MAX_TOOL_RESULT_PROMPT_CHARS,
            hook_settings: HookSettings::default(),
        }
    }
}

impl ConversationConfig {
    #[must_use]
    pub const fn with_session_id(mut self, id: Uuid) -> Self {
        self.session_id = id;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = prompt;
        self
    }

    #[must_use]
    pub const fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub const fn with_prompt_budget(mut self, budget: PromptBudget) -> Self {
        self.prompt_budget = budget;
        self
    }

    #[must_use]
    pub const fn with_max_tool_result_chars(mut self, max_chars: usize) -> Self {
        self.max_tool_result_chars = max_chars;
        self
    }

    #[must_use]
    pub fn with_hook_settings(mut self, settings: HookSettings) -> Self {
        self.hook_settings = settings;
        self
    }
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("LLM provider error: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How processing of one user input ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    /// The model ended the conversation and the end was honoured.
    Ended,
    /// The model is waiting for the user (clarification or plain reply).
    AwaitingUser,
    /// A retry budget ran out; carries the failure report.
    Failed(String),
    TurnLimitReached,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    /// Messages shown to the user, in order.
    pub rendered: Vec<String>,
    /// Messages held back while the task list was incomplete.
    pub withheld: Vec<String>,
    pub model_calls: usize,
}

impl TurnOutcome {
    const fn new() -> Self {
        Self {
            status: TurnStatus::TurnLimitReached,
            rendered: Vec::new(),
            withheld: Vec::new(),
            model_calls: 0,
        }
    }
}

/// Multi-turn conversation manager.
///
/// Each instance owns its hook registry, governance counters and memory
/// state; nothing is shared between conversations.
pub struct ConversationManager<P = Arc<dyn LLMProvider>, D = Arc<dyn ToolDispatcher>>
where
    P: Send + Sync,
    D: Send + Sync,
{
    provider: P,
    dispatcher: D,
    tasks: Arc<dyn TaskListProvider>,
    hooks: HookRegistry,
    governance: Governance,
    memory: MemoryManager,
    config: ConversationConfig,
    session: ConversationSession,
    allowed_tools: Vec<String>,
    last_user: String,
    last_tool_summary: Option<String>,
    /// Something happened since the user last saw a message.
    user_update_pending: bool,
    /// Latest messages the user has not seen yet.
    pending_withheld: Option<String>,
}

impl<P, D> ConversationManager<P, D>
where
    P: LLMProvider + Send + Sync,
    D: ToolDispatcher + Send + Sync,
{
    pub fn new(
        provider: P,
        dispatcher: D,
        tasks: Arc<dyn TaskListProvider>,
        config: ConversationConfig,
    ) -> Self {
        info!(
            "Creating conversation manager for session: {}",
            config.session_id
        );
        let mut hooks = HookRegistry::with_settings(config.hook_settings.clone());
        let governance = Governance::new();
        governance.register_hooks(&mut hooks);

        let memory = MemoryManager::new(config.prompt_budget)
            .with_max_tool_result_chars(config.max_tool_result_chars);
        let allowed_tools = dispatcher.allowed_tools();

        let mut session = ConversationSession::new().with_id(config.session_id);
        session.name.clone_from(&config.session_name);
        session.add_message(ChatMessage::system(build_system_prompt(
            &config.system_prompt,
            &dispatcher.catalog(),
            config.headless,
        )));

        Self {
            provider,
            dispatcher,
            tasks,
            hooks,
            governance,
            memory,
            config,
            session,
            allowed_tools,
            last_user: String::new(),
            last_tool_summary: None,
            user_update_pending: false,
            pending_withheld: None,
        }
    }

    /// Registry for adding custom handlers next to the governance ones.
    pub const fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    #[must_use]
    pub const fn governance(&self) -> &Governance {
        &self.governance
    }

    #[must_use]
    pub const fn session(&self) -> &ConversationSession {
        &self.session
    }

    #[must_use]
    pub const fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    fn model(&self) -> &str {
        if self.config.model.is_empty() {
            self.provider.get_default_model()
        } else {
            &self.config.model
        }
    }

    /// Handle one user input, calling the model until the turn ends, the
    /// model waits for the user, a retry budget runs out or `max_turns`
    /// model calls have been made.
    pub async fn process_input(&mut self, input: &str) -> Result<TurnOutcome, ConversationError> {
        let user = ChatMessage::user(input);
        self.memory.note_user_message(&user);
        self.session.add_message(user);
        self.last_user = input.to_string();
        self.user_update_pending = false;
        self.pending_withheld = None;
        self.governance.reset();
        info!("Processing input for session: {}", self.session.id);

        let mut outcome = TurnOutcome::new();
        while outcome.model_calls < self.config.max_turns {
            let response = self.call_model().await?;
            outcome.model_calls += 1;
            if let Some(usage) = &response.usage {
                debug!(
                    "Tokens: {} prompt + {} completion = {} total",
                    usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                );
            }
            if let Some(status) = self.handle_reply(&response.content, &mut outcome).await {
                info!(
                    model_calls = outcome.model_calls,
                    "Input processed: {:?}",
                    status
                );
                outcome.status = status;
                return Ok(outcome);
            }
        }

        warn!(
            max_turns = self.config.max_turns,
            "Stopped after reaching the model call limit"
        );
        outcome.status = TurnStatus::TurnLimitReached;
        Ok(outcome)
    }

    /// Compact, call the provider, and on a context-length rejection
    /// compact aggressively and retry once.
    async fn call_model(&mut self) -> Result<LLMResponse, ConversationError> {
        self.memory.compact(&mut self.session.messages);
        let model = self.model().to_string();
        match self.provider.chat(&self.session.messages, &model).await {
            Ok(response) => Ok(response),
            Err(err) if is_context_length_error(&format!("{err:#}")) => {
                warn!("Prompt rejected as too long, compacting aggressively: {err:#}");
                self.memory.aggressive_compact(&mut self.session.messages);
                Ok(self.provider.chat(&self.session.messages, &model).await?)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn facts(
        &self,
        reply: &str,
        parsed_turn: Option<AssistantTurn>,
        error_message: Option<String>,
    ) -> TurnFacts {
        TurnFacts {
            parsed_turn,
            tasks: TaskSnapshot::capture(self.tasks.as_ref()),
            headless: self.config.headless,
            tool_ran_since_message: self.user_update_pending,
            last_tool_summary: self.last_tool_summary.clone(),
            assistant_reply: reply.to_string(),
            last_user: self.last_user.clone(),
            error_message,
            allowed_tools: self.allowed_tools.clone(),
            pending_withheld: self.pending_withheld.clone(),
        }
    }

    /// `None` means call the model again.
    async fn handle_reply(&mut self, reply: &str, outcome: &mut TurnOutcome) -> Option<TurnStatus> {
        if reply.trim().is_empty() {
            let action = self
                .governance
                .on_empty_reply(&self.hooks, &self.facts(reply, None, None));
            return self.apply_action(action, outcome);
        }
        self.governance.note_reply_received();

        match self.parse_reply(reply) {
            Ok(turn) => self.handle_turn(reply, turn, outcome).await,
            Err(error) => {
                debug!("Protocol error: {}", error);
                let action = self
                    .governance
                    .on_parse_error(&self.hooks, &self.facts(reply, None, Some(error)));
                if action.ends_conversation() {
                    self.session.add_message(ChatMessage::assistant(reply));
                }
                self.apply_action(action, outcome)
            }
        }
    }

    /// Strict parse, falling back to a single bare tool call.
    fn parse_reply(&self, reply: &str) -> Result<AssistantTurn, String> {
        let strict = match parse_assistant_turn(reply, &self.allowed_tools) {
            Ok(turn) => return Ok(turn),
            Err(err) => err,
        };
        match extract_tool_call(reply, &self.allowed_tools) {
            Ok(Some(call)) => {
                info!(tool = %call.tool, "Recovered a bare tool call from an off-protocol reply");
                Ok(AssistantTurn::new(vec![Step::ToolCall { call }]))
            }
            Ok(None) => Err(strict.to_string()),
            Err(legacy) => Err(legacy.to_string()),
        }
    }

    async fn handle_turn(
        &mut self,
        reply: &str,
        turn: AssistantTurn,
        outcome: &mut TurnOutcome,
    ) -> Option<TurnStatus> {
        self.session.remove_prefixed(ACTION_REQUIRED_PREFIX);
        let verdict = self
            .governance
            .evaluate_turn(&self.hooks, &self.facts(reply, Some(turn.clone()), None));

        let messages: Vec<String> = turn.messages().map(|(content, _)| content.to_string()).collect();
        if !messages.is_empty() {
            if verdict.render {
                outcome.rendered.extend(messages);
                self.user_update_pending = false;
                self.pending_withheld = None;
            } else {
                debug!(count = messages.len(), "Withholding messages until tasks are complete");
                self.pending_withheld = Some(messages.join("\n\n"));
                outcome.withheld.extend(messages);
                self.user_update_pending = true;
            }
        }
        self.session.add_message(ChatMessage::assistant(sanitize_assistant_reply(
            reply,
            &self.allowed_tools,
        )));

        if !verdict.action.is_continue() {
            return self.apply_action(verdict.action, outcome);
        }
        if let Some(call) = turn.tool_call() {
            self.run_tool(call).await;
            return None;
        }
        if turn.has_end() {
            Some(TurnStatus::Ended)
        } else {
            Some(TurnStatus::AwaitingUser)
        }
    }

    fn apply_action(&mut self, action: GovernanceAction, outcome: &mut TurnOutcome) -> Option<TurnStatus> {
        match action {
            GovernanceAction::InsertUserMessage(text) => {
                self.session.remove_prefixed(ACTION_REQUIRED_PREFIX);
                self.session.add_message(ChatMessage::user(action_required(&text)));
                None
            }
            GovernanceAction::InsertAssistantMessageAndEnd(text) => {
                self.session.add_message(ChatMessage::assistant(text.clone()));
                outcome.rendered.push(text);
                Some(TurnStatus::Ended)
            }
            GovernanceAction::FailConversation(report) => {
                warn!("Conversation failed: {}", report);
                Some(TurnStatus::Failed(report))
            }
            GovernanceAction::Continue => None,
        }
    }

    async fn run_tool(&mut self, call: &ToolCallPayload) {
        info!(tool = %call.tool, target = %call.target, "Executing tool call");
        let output = self.dispatcher.dispatch(call).await;
        self.last_tool_summary = Some(summarize_tool_output(&output));
        let message = self.memory.tool_result_message(call, &output, &self.last_user);
        self.session.add_message(message);
        self.user_update_pending = true;
    }

    /// Read lines from stdin and answer each one until `exit` or EOF.
    pub async fn run_interactive(&mut self) -> Result<(), ConversationError> {
        println!("=== Conversation Session: {} ===", self.session.id);
        println!("Type 'exit', 'quit', or Ctrl+C to end the session.\n");

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let mut input = String::new();
            if std::io::stdin().read_line(&mut input)? == 0 {
                break;
            }
            let input = input.trim();

            if matches!(input, "exit" | "quit" | "q") {
                println!("\nSession ended.");
                break;
            }
            if input.is_empty() {
                continue;
            }

            match self.process_input(input).await {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) => eprintln!("Error: {e}"),
            }
        }

        Ok(())
    }
}

/// Print what the user should see from one processed input.
pub fn print_outcome(outcome: &TurnOutcome) {
    for message in &outcome.rendered {
        println!("\n{message}\n");
    }
    if !outcome.withheld.is_empty() {
        println!(
            "({} message(s) withheld until the task list is complete)",
            outcome.withheld.len()
        );
    }
    match &outcome.status {
        TurnStatus::Failed(report) => eprintln!("{report}"),
        TurnStatus::TurnLimitReached => {
            eprintln!("(stopped after {} model calls)", outcome.model_calls);
        }
        TurnStatus::Ended | TurnStatus::AwaitingUser => {}
    }
}
