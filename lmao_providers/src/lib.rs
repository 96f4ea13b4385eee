#![warn(
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

//! Chat-completions clients for OpenAI-compatible servers (LM Studio,
//! OpenRouter).

mod error;
mod openai_compat;
pub mod retry;

pub use error::ProviderError;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, retry_with_backoff};
