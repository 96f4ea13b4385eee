use lmao_memory::is_context_length_error;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// An error object returned inside a successful response.
    #[error("provider error: {0}")]
    Api(String),

    #[error("invalid response format: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the same request may succeed if sent again. Prompts that
    /// overflow the context window never are.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
            Self::Status { status, body } => {
                (*status == 429 || *status >= 500) && !is_context_length_error(body)
            }
            Self::Api(_) | Self::InvalidResponse(_) => false,
        }
    }
}
