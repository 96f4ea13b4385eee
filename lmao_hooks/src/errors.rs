//! Hook error types.

use thiserror::Error;

/// Errors a handler may return. The registry records them and moves on.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("missing runtime state '{0}'")]
    MissingState(String),

    #[error("invalid runtime state '{key}': {reason}")]
    InvalidState { key: String, reason: String },

    #[error("{0}")]
    Failed(String),
}
