use lmao_config::Config;
use lmao_conversation::{ConversationConfig, ConversationManager, TurnStatus, print_outcome};
use lmao_core::{TaskList, TaskListProvider, ToolRegistry, tools::register_task_tools};
use lmao_providers::OpenAiCompatProvider;
use std::sync::Arc;
use tracing::info;

/// Input parameters for the Run command strategy.
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    /// Single prompt to process (non-interactive mode)
    pub prompt: Option<String>,
    pub headless: bool,
    pub max_turns: Option<usize>,
    /// Optional model override
    pub model: Option<String>,
}

/// Runs a governed conversation against the configured provider, either
/// for one prompt or as a REPL on stdin.
#[derive(Debug, Clone, Copy)]
pub struct RunStrategy;

impl RunStrategy {
    fn conversation_config(config: &Config, input: &RunInput, model: String) -> ConversationConfig {
        let defaults = &config.agents.defaults;
        let mut conversation = ConversationConfig::default()
            .with_model(model)
            .with_max_turns(input.max_turns.unwrap_or(defaults.max_turns))
            .with_headless(input.headless || defaults.headless)
            .with_prompt_budget(config.prompt_budget())
            .with_max_tool_result_chars(config.memory.max_tool_result_chars)
            .with_hook_settings(config.hooks.clone());
        if let Some(prompt) = &defaults.system_prompt {
            conversation = conversation.with_system_prompt(prompt.clone());
        }
        conversation
    }
}

impl super::CommandStrategy for RunStrategy {
    type Input = RunInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        info!("Loaded config from ~/lmao/config.json");

        let provider_config = &config.providers.openai_compat;
        let model = input
            .model
            .as_deref()
            .unwrap_or(&config.agents.defaults.model)
            .trim();
        let model = if model.is_empty() {
            provider_config.kind.default_model()
        } else {
            model
        }
        .to_string();

        let budget = config.prompt_budget();
        info!(
            model = %model,
            context_window = budget.context_window,
            trigger = budget.trigger,
            target = budget.target,
            "Prompt budget"
        );

        let provider = OpenAiCompatProvider::new(provider_config.base_url())
            .with_api_key(provider_config.api_key().map(str::to_string))
            .with_default_model(model.clone())
            .with_temperature(config.agents.defaults.temperature)
            .with_max_tokens(budget.reserved_completion);

        let tasks = Arc::new(TaskList::new());
        let mut registry = ToolRegistry::new();
        register_task_tools(&mut registry, Arc::clone(&tasks));
        let task_view: Arc<dyn TaskListProvider> = tasks;

        let conversation_config = Self::conversation_config(&config, &input, model);
        let mut manager =
            ConversationManager::new(provider, registry, task_view, conversation_config);

        if let Some(prompt) = input.prompt {
            let outcome = manager.process_input(&prompt).await?;
            print_outcome(&outcome);
            if let TurnStatus::Failed(reason) = outcome.status {
                anyhow::bail!("conversation failed: {reason}");
            }
        } else {
            manager.run_interactive().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_override_config() {
        let config = Config::from_json(
            r#"{"agents": {"defaults": {"max_turns": 5, "system_prompt": "Be brief."}}}"#,
        )
        .unwrap();
        let input = RunInput {
            headless: true,
            max_turns: Some(9),
            ..RunInput::default()
        };
        let conversation = RunStrategy::conversation_config(&config, &input, "m".to_string());
        assert_eq!(conversation.max_turns, 9);
        assert!(conversation.headless);
        assert_eq!(conversation.model, "m");
        assert_eq!(conversation.system_prompt, "Be brief.");
        assert_eq!(conversation.prompt_budget, config.prompt_budget());
    }

    #[test]
    fn test_config_defaults_apply_without_flags() {
        let config = Config::default();
        let conversation =
            RunStrategy::conversation_config(&config, &RunInput::default(), String::new());
        assert_eq!(conversation.max_turns, 32);
        assert!(!conversation.headless);
        assert_eq!(conversation.max_tool_result_chars, 20_000);
    }
}
