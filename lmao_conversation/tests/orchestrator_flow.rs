use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use lmao_conversation::prompt::ACTION_REQUIRED_PREFIX;
use lmao_conversation::{
    ConversationConfig, ConversationError, ConversationManager, TurnStatus,
};
use lmao_core::tools::register_task_tools;
use lmao_core::{
    ChatMessage, LLMProvider, LLMResponse, Role, TaskList, ToolCallPayload, ToolDispatcher,
    ToolRegistry,
};
use parking_lot::Mutex;

/// Replays canned replies; `Err` entries become provider errors.
struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompt(&self, call: usize) -> Vec<ChatMessage> {
        self.prompts.lock()[call].clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(&self, messages: &[ChatMessage], _model: &str) -> anyhow::Result<LLMResponse> {
        self.prompts.lock().push(messages.to_vec());
        match self.replies.lock().pop_front() {
            Some(Ok(content)) => Ok(LLMResponse {
                content,
                usage: None,
            }),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("script exhausted")),
        }
    }

    fn get_default_model(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct RecordingDispatcher {
    calls: Mutex<Vec<ToolCallPayload>>,
}

#[async_trait]
impl ToolDispatcher for RecordingDispatcher {
    async fn dispatch(&self, call: &ToolCallPayload) -> String {
        self.calls.lock().push(call.clone());
        r#"{"tool":"ls","success":true,"data":{"count":2}}"#.to_string()
    }

    fn allowed_tools(&self) -> Vec<String> {
        vec!["ls".to_string()]
    }
}

const LS_CALL: &str = r#"{"type":"assistant_turn","version":"2","steps":[
    {"type":"tool_call","call":{"tool":"ls","target":".","args":""}}]}"#;
const FINAL: &str = r#"{"type":"assistant_turn","version":"2","steps":[
    {"type":"message","purpose":"final","content":"Found 2 files."},{"type":"end"}]}"#;
const END_ONLY: &str = r#"{"type":"assistant_turn","version":"2","steps":[{"type":"end"}]}"#;
const THINK_ONLY: &str = r#"{"type":"assistant_turn","version":"2","steps":[
    {"type":"think","content":"let me think"}]}"#;

fn manager(
    provider: Arc<ScriptedProvider>,
    dispatcher: Arc<RecordingDispatcher>,
    config: ConversationConfig,
) -> ConversationManager<Arc<ScriptedProvider>, Arc<RecordingDispatcher>> {
    ConversationManager::new(provider, dispatcher, Arc::new(TaskList::new()), config)
}

fn action_required_count(messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .filter(|m| m.content.starts_with(ACTION_REQUIRED_PREFIX))
        .count()
}

#[tokio::test]
async fn test_tool_call_then_final_summary() {
    let provider = ScriptedProvider::new(vec![Ok(LS_CALL), Ok(FINAL)]);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let mut conversation = manager(provider, dispatcher.clone(), ConversationConfig::default());

    let outcome = conversation
        .process_input("list the files")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(outcome.status, TurnStatus::Ended);
    assert_eq!(outcome.rendered, vec!["Found 2 files.".to_string()]);
    assert_eq!(outcome.model_calls, 2);
    assert_eq!(dispatcher.calls.lock().len(), 1);
    assert!(conversation.session().messages.iter().any(ChatMessage::is_tool_result));
}

#[tokio::test]
async fn test_end_without_summary_after_tool_is_refused() {
    let provider = ScriptedProvider::new(vec![Ok(LS_CALL), Ok(END_ONLY), Ok(FINAL)]);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let mut conversation = manager(provider.clone(), dispatcher, ConversationConfig::default());

    let outcome = conversation
        .process_input("list the files")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(outcome.status, TurnStatus::Ended);
    assert_eq!(outcome.model_calls, 3);
    let third_prompt = provider.prompt(2);
    let instruction = third_prompt
        .last()
        .unwrap_or_else(|| panic!("empty prompt"));
    assert!(instruction.content.starts_with(ACTION_REQUIRED_PREFIX));
    assert!(instruction.content.contains("final visible summary"));
    assert_eq!(action_required_count(&conversation.session().messages), 0);
}

#[tokio::test]
async fn test_empty_replies_end_with_fallback() {
    let provider = ScriptedProvider::new(vec![Ok(LS_CALL), Ok(""), Ok("  "), Ok("\n"), Ok("")]);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let mut conversation = manager(provider, dispatcher, ConversationConfig::default());

    let outcome = conversation
        .process_input("list the files")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(outcome.status, TurnStatus::Ended);
    assert_eq!(outcome.model_calls, 5);
    let fallback = outcome.rendered.last().unwrap_or_else(|| panic!("no fallback"));
    assert!(fallback.starts_with("(auto-generated fallback)"));
    assert!(fallback.contains("count=2"));
}

#[tokio::test]
async fn test_repeated_invalid_replies_fail() {
    let provider = ScriptedProvider::new(vec![Ok("nope"), Ok("nope"), Ok("nope")]);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let mut conversation = manager(provider, dispatcher, ConversationConfig::default());

    let outcome = conversation
        .process_input("hello")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    match outcome.status {
        TurnStatus::Failed(report) => {
            assert!(report.starts_with("error: model repeatedly returned invalid JSON"));
            assert!(report.ends_with("last reply (verbatim):\nnope"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(outcome.model_calls, 3);
}

#[tokio::test]
async fn test_context_length_error_triggers_aggressive_compaction() {
    let provider = ScriptedProvider::new(vec![
        Ok(FINAL),
        Err("This model's maximum context length is 4096 tokens"),
        Ok(FINAL),
    ]);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let mut conversation = manager(provider.clone(), dispatcher, ConversationConfig::default());

    let first = conversation.process_input("first").await;
    assert!(first.is_ok());
    let second = conversation
        .process_input("second")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(second.status, TurnStatus::Ended);
    assert_eq!(second.model_calls, 1);
    let retried = provider.prompt(2);
    assert_eq!(retried.len(), 2);
    assert_eq!(retried[0].role, Role::System);
    assert_eq!(retried[1].content, "second");
}

#[tokio::test]
async fn test_other_provider_errors_propagate() {
    let provider = ScriptedProvider::new(vec![Err("connection refused")]);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let mut conversation = manager(provider, dispatcher, ConversationConfig::default());

    let result = conversation.process_input("hello").await;
    assert!(matches!(result, Err(ConversationError::Provider(_))));
}

#[tokio::test]
async fn test_bare_tool_call_is_executed() {
    let provider = ScriptedProvider::new(vec![
        Ok("Let's do it\n{\"tool\":\"ls\",\"target\":\".\",\"args\":\"\"}"),
        Ok(FINAL),
    ]);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let mut conversation = manager(provider, dispatcher.clone(), ConversationConfig::default());

    let outcome = conversation
        .process_input("list")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(outcome.status, TurnStatus::Ended);
    let calls = dispatcher.calls.lock();
    assert_eq!(calls.as_slice(), &[ToolCallPayload::new("ls", ".", "")]);
}

#[tokio::test]
async fn test_turn_limit_keeps_a_single_pending_instruction() {
    let provider = ScriptedProvider::new(vec![Ok(THINK_ONLY), Ok(THINK_ONLY)]);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let config = ConversationConfig::default().with_max_turns(2);
    let mut conversation = manager(provider, dispatcher, config);

    let outcome = conversation
        .process_input("hello")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(outcome.status, TurnStatus::TurnLimitReached);
    assert_eq!(outcome.model_calls, 2);
    assert_eq!(action_required_count(&conversation.session().messages), 1);
    assert_eq!(conversation.governance().counters().think_only_turns, 2);
}

#[tokio::test]
async fn test_clarification_waits_for_user() {
    let provider = ScriptedProvider::new(vec![Ok(r#"{"type":"assistant_turn","version":"2",
        "steps":[{"type":"message","purpose":"clarification","content":"Which directory?"}]}"#)]);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let mut conversation = manager(provider, dispatcher, ConversationConfig::default());

    let outcome = conversation
        .process_input("list files")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(outcome.status, TurnStatus::AwaitingUser);
    assert_eq!(outcome.rendered, vec!["Which directory?".to_string()]);
}

#[tokio::test]
async fn test_messages_are_withheld_until_tasks_complete() {
    let tasks = Arc::new(TaskList::new());
    tasks.add("count the files");
    let mut registry = ToolRegistry::new();
    register_task_tools(&mut registry, tasks.clone());

    let provider = ScriptedProvider::new(vec![
        Ok(r#"{"type":"assistant_turn","version":"2","steps":[
            {"type":"message","purpose":"progress","content":"Halfway there."}]}"#),
        Ok(r#"{"type":"assistant_turn","version":"2","steps":[
            {"type":"tool_call","call":{"tool":"complete_task","target":"","args":"1"}}]}"#),
        Ok(r#"{"type":"assistant_turn","version":"2","steps":[
            {"type":"message","purpose":"final","content":"All done."},{"type":"end"}]}"#),
    ]);
    let mut conversation = ConversationManager::new(
        provider.clone(),
        registry,
        tasks.clone(),
        ConversationConfig::default(),
    );

    let outcome = conversation
        .process_input("count the files")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(outcome.status, TurnStatus::Ended);
    assert_eq!(outcome.withheld, vec!["Halfway there.".to_string()]);
    assert_eq!(outcome.rendered, vec!["All done.".to_string()]);
    let second_prompt = provider.prompt(1);
    let notice = second_prompt.last().unwrap_or_else(|| panic!("empty prompt"));
    assert!(notice.content.contains("NOT shown to the human user"));
    assert!(tasks.tasks()[0].done);
}

#[tokio::test]
async fn test_think_steps_are_not_stored() {
    let provider = ScriptedProvider::new(vec![Ok(r#"{"type":"assistant_turn","version":"2","steps":[
        {"type":"think","content":"private reasoning"},
        {"type":"message","purpose":"final","content":"Hi."},{"type":"end"}]}"#)]);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let mut conversation = manager(provider, dispatcher, ConversationConfig::default());

    conversation
        .process_input("hello")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    let stored = conversation
        .session()
        .messages
        .iter()
        .rfind(|m| m.role == Role::Assistant)
        .unwrap_or_else(|| panic!("no assistant message"));
    assert!(!stored.content.contains("private reasoning"));
    assert!(stored.content.contains("Hi."));
    let value: serde_json::Value =
        serde_json::from_str(&stored.content).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(value["steps"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_end_gate_repeats_withheld_message() {
    let tasks = Arc::new(TaskList::new());
    tasks.add("count the files");
    let mut registry = ToolRegistry::new();
    register_task_tools(&mut registry, tasks.clone());

    let provider = ScriptedProvider::new(vec![
        Ok(r#"{"type":"assistant_turn","version":"2","steps":[
            {"type":"message","purpose":"progress","content":"Halfway there."}]}"#),
        Ok(r#"{"type":"assistant_turn","version":"2","steps":[
            {"type":"tool_call","call":{"tool":"complete_task","target":"","args":"1"}}]}"#),
        Ok(END_ONLY),
        Ok(FINAL),
    ]);
    let mut conversation = ConversationManager::new(
        provider.clone(),
        registry,
        tasks,
        ConversationConfig::default(),
    );

    let outcome = conversation
        .process_input("count the files")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(outcome.status, TurnStatus::Ended);
    assert_eq!(outcome.model_calls, 4);
    let fourth_prompt = provider.prompt(3);
    let instruction = fourth_prompt
        .last()
        .unwrap_or_else(|| panic!("empty prompt"));
    assert!(instruction.content.contains("final visible summary"));
    assert!(instruction
        .content
        .contains("Withheld message preview (resend or rephrase):\nHalfway there."));
}
