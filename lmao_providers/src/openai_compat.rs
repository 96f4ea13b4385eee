use async_trait::async_trait;
use lmao_core::{ChatMessage, LLMProvider, LLMResponse, Usage};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::ProviderError;
use crate::retry::{RetryPolicy, retry_with_backoff};

const DEFAULT_MODEL: &str = "local-model";

/// Client for any server exposing `POST {base_url}/chat/completions`.
pub struct OpenAiCompatProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
    retry: RetryPolicy,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Creating OpenAiCompatProvider for {base_url}");
        Self {
            client: Client::new(),
            base_url,
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Bearer token sent with every request; blank keys are ignored.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_default_model(mut self, model: String) -> Self {
        self.default_model = model;
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, messages: &[ChatMessage], model: &str) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.wire_name(), "content": m.content }))
            .collect();
        let mut request = json!({
            "model": model,
            "messages": messages,
        });
        if let Some(temperature) = self.temperature {
            request["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request["max_tokens"] = json!(max_tokens);
        }
        request
    }

    async fn try_send(&self, request: &Value) -> Result<LLMResponse, ProviderError> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json::<Value>().await?;
        parse_completion(&body)
    }
}

fn parse_completion(body: &Value) -> Result<LLMResponse, ProviderError> {
    if let Some(error) = body.get("error") {
        let message = error["message"]
            .as_str()
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(ProviderError::Api(message));
    }

    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ProviderError::InvalidResponse("missing content".to_string()))?
        .to_string();

    let count = |u: &serde_json::Map<String, Value>, key: &str| {
        u.get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };
    let usage = body["usage"].as_object().map(|u| Usage {
        prompt_tokens: count(u, "prompt_tokens"),
        completion_tokens: count(u, "completion_tokens"),
        total_tokens: count(u, "total_tokens"),
    });

    Ok(LLMResponse { content, usage })
}

#[async_trait]
impl LLMProvider for OpenAiCompatProvider {
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> anyhow::Result<LLMResponse> {
        let request = self.build_request(messages, model);

        info!(
            model,
            messages = messages.len(),
            "Sending chat completion request"
        );

        let response = retry_with_backoff(
            || self.try_send(&request),
            &self.retry,
            ProviderError::is_transient,
        )
        .await?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Received chat completion"
            );
        }
        Ok(response)
    }

    fn get_default_model(&self) -> &str {
        &self.default_model
    }
}
