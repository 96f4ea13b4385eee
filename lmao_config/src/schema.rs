use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use lmao_hooks::HookSettings;
use lmao_memory::{MAX_TOOL_RESULT_PROMPT_CHARS, PromptBudget};

/// Directory under the home directory holding `config.json`.
pub const CONFIG_DIR_NAME: &str = "lmao";

const CONFIG_TEMPLATE: &str = r#"{
  "agents": {
    "defaults": {
      "model": "",
      "temperature": 0.2,
      "max_turns": 32,
      "headless": false
    }
  },
  "providers": {
    "openai_compat": {
      "kind": "lmstudio",
      "base_url": "http://localhost:1234/v1",
      "api_key": ""
    }
  },
  "memory": {
    "max_tool_result_chars": 20000
  },
  "hooks": {
    "enabled": true,
    "enable_cancellation": true,
    "execution_order": "priority",
    "disabled_hooks": []
  }
}"#;

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub hooks: HookSettings,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct AgentsConfig {
    #[serde(default)]
    pub defaults: AgentDefaults,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AgentDefaults {
    /// Empty means the provider's default model.
    #[serde(default)]
    pub model: String,
    #[serde(default = "AgentDefaults::default_temperature")]
    pub temperature: f32,
    /// Completion tokens reserved out of the context window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(default = "AgentDefaults::default_max_turns")]
    pub max_turns: usize,
    #[serde(default)]
    pub headless: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: Self::default_temperature(),
            max_tokens: None,
            max_turns: Self::default_max_turns(),
            headless: false,
            system_prompt: None,
        }
    }
}

impl AgentDefaults {
    const fn default_temperature() -> f32 {
        0.2
    }

    const fn default_max_turns() -> usize {
        32
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai_compat: ProviderConfig,
}

/// Which OpenAI-compatible backend the client talks to.
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Lmstudio,
    Openrouter,
}

impl ProviderKind {
    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Lmstudio => "http://localhost:1234/v1",
            Self::Openrouter => "https://openrouter.ai/api/v1",
        }
    }

    /// Model id used when `agents.defaults.model` is empty.
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Lmstudio => "local-model",
            Self::Openrouter => "openrouter/auto",
        }
    }

    /// Context window assumed when the config does not set one.
    #[must_use]
    pub const fn default_context_window(self) -> usize {
        match self {
            Self::Lmstudio => 8192,
            Self::Openrouter => 32768,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.kind.default_base_url())
    }

    /// The API key, if one is set and non-blank.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_completion_tokens: Option<usize>,
    #[serde(default = "MemoryConfig::default_max_tool_result_chars")]
    pub max_tool_result_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            context_window_tokens: None,
            reserved_completion_tokens: None,
            max_tool_result_chars: Self::default_max_tool_result_chars(),
        }
    }
}

impl MemoryConfig {
    const fn default_max_tool_result_chars() -> usize {
        MAX_TOOL_RESULT_PROMPT_CHARS
    }
}

impl Config {
    /// Prompt budget for the configured provider. An explicit
    /// `memory.reserved_completion_tokens` wins over `agents.defaults.max_tokens`.
    #[must_use]
    pub fn prompt_budget(&self) -> PromptBudget {
        let window = self
            .memory
            .context_window_tokens
            .unwrap_or_else(|| self.providers.openai_compat.kind.default_context_window());
        let reserved = self
            .memory
            .reserved_completion_tokens
            .or(self.agents.defaults.max_tokens);
        PromptBudget::derive(window, reserved)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'lmao init' to create config.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config at {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join(CONFIG_DIR_NAME))
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        std::fs::write(&config_path, CONFIG_TEMPLATE)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Start LM Studio, or set kind to \"openrouter\" and add your API key");
        println!("   2. Run 'lmao run' to start a conversation");
        println!();
        println!("🔧 Configuration options:");
        println!("   - model: model id sent to the provider (empty uses the provider default)");
        println!("   - memory.context_window_tokens: override the model's context window");
        println!("   - hooks.disabled_hooks: hook points to skip entirely");
        println!();
        Ok(())
    }
}
