use lmao_core::{AssistantTurn, MessagePurpose, Step, TaskList, ToolCallPayload};
use lmao_governance::state::{ACTION_KEY, RENDER_KEY};
use lmao_governance::{
    Governance, GovernanceAction, ON_LLM_EMPTY_REPLY, POST_MESSAGE_PARSING, TaskSnapshot,
    TurnFacts,
};
use lmao_hooks::{HookContext, HookOutcome, HookRegistry, HookResult};

fn governed_registry() -> (Governance, HookRegistry) {
    let governance = Governance::new();
    let mut registry = HookRegistry::new();
    governance.register_hooks(&mut registry);
    (governance, registry)
}

fn message(content: &str, purpose: MessagePurpose) -> Step {
    Step::Message {
        content: content.to_string(),
        format: "markdown".to_string(),
        purpose,
    }
}

#[test]
fn test_fourth_empty_reply_ends_with_fallback() {
    let (_, registry) = governed_registry();
    let facts = TurnFacts {
        last_tool_summary: Some("ok count=2".to_string()),
        ..TurnFacts::default()
    };

    let mut last = HookResult::ok();
    for _ in 0..4 {
        last = registry.execute_hooks(ON_LLM_EMPTY_REPLY, facts.to_context(ON_LLM_EMPTY_REPLY));
    }

    assert!(last.should_cancel);
    match GovernanceAction::from_hook_result(&last) {
        GovernanceAction::InsertAssistantMessageAndEnd(text) => {
            assert!(text.starts_with("(auto-generated fallback)"));
            assert!(text.ends_with("ok count=2"));
        }
        other => panic!("expected fallback reply, got {other:?}"),
    }
}

#[test]
fn test_progress_message_with_open_task_is_withheld() {
    let (governance, registry) = governed_registry();
    let tasks = TaskList::new();
    tasks.add("summarise the logs");
    let turn = AssistantTurn::new(vec![message(
        "Working on the logs now.",
        MessagePurpose::Progress,
    )]);
    let facts = TurnFacts {
        parsed_turn: Some(turn),
        tasks: TaskSnapshot::capture(&tasks),
        ..TurnFacts::default()
    };

    let verdict = governance.evaluate_turn(&registry, &facts);
    assert!(!verdict.render);
    match verdict.action {
        GovernanceAction::InsertUserMessage(text) => {
            assert!(text.contains("did not call any tools and did not end"));
            assert!(text.contains("NOT shown to the human user"));
            assert!(text.contains("[ ] 1 summarise the logs"));
            assert!(text.contains("Working on the logs now."));
        }
        other => panic!("expected recovery instruction, got {other:?}"),
    }
}

#[test]
fn test_headless_final_question_is_blocked() {
    let (governance, registry) = governed_registry();
    let turn = AssistantTurn::new(vec![
        message("Would you like option A or B?", MessagePurpose::Final),
        Step::End {
            reason: "completed".to_string(),
        },
    ]);
    let facts = TurnFacts {
        parsed_turn: Some(turn),
        headless: true,
        ..TurnFacts::default()
    };

    let verdict = governance.evaluate_turn(&registry, &facts);
    match verdict.action {
        GovernanceAction::InsertUserMessage(text) => {
            assert!(text.starts_with("Headless mode is active"));
        }
        other => panic!("expected autonomy instruction, got {other:?}"),
    }
}

#[test]
fn test_same_question_is_honoured_when_interactive() {
    let (governance, registry) = governed_registry();
    let turn = AssistantTurn::new(vec![
        message("Would you like option A or B?", MessagePurpose::Final),
        Step::End {
            reason: "completed".to_string(),
        },
    ]);
    let facts = TurnFacts {
        parsed_turn: Some(turn),
        ..TurnFacts::default()
    };
    assert_eq!(
        governance.evaluate_turn(&registry, &facts).action,
        GovernanceAction::Continue
    );
}

#[test]
fn test_counters_reset_after_tool_call_turn() {
    let (governance, registry) = governed_registry();
    let stall = TurnFacts {
        parsed_turn: Some(AssistantTurn::new(vec![Step::Think {
            content: "thinking".to_string(),
        }])),
        ..TurnFacts::default()
    };
    for _ in 0..3 {
        let _ = governance.evaluate_turn(&registry, &stall);
    }
    let _ = governance.on_empty_reply(&registry, &TurnFacts::default());
    assert_eq!(governance.counters().think_only_turns, 3);
    assert_eq!(governance.counters().empty_replies, 1);

    let act = TurnFacts {
        parsed_turn: Some(AssistantTurn::new(vec![Step::ToolCall {
            call: ToolCallPayload::new("ls", ".", ""),
        }])),
        ..TurnFacts::default()
    };
    let _ = governance.evaluate_turn(&registry, &act);
    assert_eq!(governance.counters(), Default::default());
}

#[test]
fn test_custom_handler_can_preempt_governance() {
    let (governance, mut registry) = governed_registry();
    registry.register(
        POST_MESSAGE_PARSING,
        "policy_override",
        100,
        |_: &HookContext| -> HookOutcome {
            Ok(GovernanceAction::FailConversation("blocked by policy".to_string())
                .into_result()
                .with_data(RENDER_KEY, false)
                .cancelled()
                .into())
        },
    );
    let facts = TurnFacts {
        parsed_turn: Some(AssistantTurn::new(vec![message("hi", MessagePurpose::Final)])),
        ..TurnFacts::default()
    };

    let verdict = governance.evaluate_turn(&registry, &facts);
    assert_eq!(
        verdict.action,
        GovernanceAction::FailConversation("blocked by policy".to_string())
    );
    assert!(!verdict.render);
    // The cancelled chain never reached the built-in handler.
    assert_eq!(governance.counters().progress_only_turns, 0);
}

#[test]
fn test_custom_action_survives_builtin_continue() {
    let (governance, mut registry) = governed_registry();
    registry.register(
        POST_MESSAGE_PARSING,
        "retry_policy",
        100,
        |_: &HookContext| -> HookOutcome {
            Ok(GovernanceAction::InsertUserMessage("custom says retry".to_string())
                .into_result()
                .into())
        },
    );
    let facts = TurnFacts {
        parsed_turn: Some(AssistantTurn::new(vec![
            message("All done.", MessagePurpose::Final),
            Step::End {
                reason: "completed".to_string(),
            },
        ])),
        ..TurnFacts::default()
    };

    let verdict = governance.evaluate_turn(&registry, &facts);
    assert_eq!(
        verdict.action,
        GovernanceAction::InsertUserMessage("custom says retry".to_string())
    );
    assert!(verdict.render);
}

#[test]
fn test_headless_clarification_is_blocked() {
    let (governance, registry) = governed_registry();
    let facts = TurnFacts {
        parsed_turn: Some(AssistantTurn::new(vec![message(
            "Proceeding with defaults",
            MessagePurpose::Clarification,
        )])),
        headless: true,
        ..TurnFacts::default()
    };

    match governance.evaluate_turn(&registry, &facts).action {
        GovernanceAction::InsertUserMessage(text) => {
            assert!(text.starts_with("Headless mode is active"));
        }
        other => panic!("expected autonomy instruction, got {other:?}"),
    }
}

#[test]
fn test_progress_only_escalates_after_fourth_turn() {
    let (governance, registry) = governed_registry();
    let facts = TurnFacts {
        parsed_turn: Some(AssistantTurn::new(vec![message(
            "Still looking.",
            MessagePurpose::Progress,
        )])),
        ..TurnFacts::default()
    };

    for round in 1..=5 {
        match governance.evaluate_turn(&registry, &facts).action {
            GovernanceAction::InsertUserMessage(text) => {
                assert_eq!(text.contains("multiple message-only turns"), round == 5);
                assert!(text.contains("did not call any tools and did not end"));
            }
            other => panic!("expected recovery instruction, got {other:?}"),
        }
    }
    assert_eq!(governance.counters().progress_only_turns, 5);
}

#[test]
fn test_end_gate_shows_withheld_preview() {
    let (governance, registry) = governed_registry();
    let facts = TurnFacts {
        parsed_turn: Some(AssistantTurn::new(vec![Step::End {
            reason: "completed".to_string(),
        }])),
        tool_ran_since_message: true,
        pending_withheld: Some("Draft results".to_string()),
        ..TurnFacts::default()
    };

    match governance.evaluate_turn(&registry, &facts).action {
        GovernanceAction::InsertUserMessage(text) => {
            assert!(text.contains("final visible summary"));
            assert!(text.ends_with("Withheld message preview (resend or rephrase):\nDraft results"));
        }
        other => panic!("expected summary instruction, got {other:?}"),
    }
}

#[test]
fn test_action_key_is_stable() {
    let result = GovernanceAction::InsertUserMessage("retry".to_string()).into_result();
    assert_eq!(result.data[ACTION_KEY]["kind"], "insert_user_message");
    assert!(
        !GovernanceAction::Continue
            .into_result()
            .data
            .contains_key(ACTION_KEY)
    );
}
