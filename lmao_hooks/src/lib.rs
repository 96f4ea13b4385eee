#![deny(
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

//! Priority-ordered hook dispatch.
//!
//! A [`HookRegistry`] maps hook type names to handler subscriptions and runs
//! them in order against a [`HookContext`], folding their outputs into one
//! [`HookResult`]. The engine knows nothing about what the hooks mean.
//!
//! Handlers run synchronously on the caller's thread. Timeouts are measured
//! after each handler returns; a handler that never returns blocks the chain.

pub mod errors;
pub mod registry;
pub mod types;

pub use errors::HookError;
pub use registry::{HookRegistry, HookSubscription};
pub use types::{ExecutionOrder, HookContext, HookOutput, HookResult, HookSettings};

/// What a handler returns.
pub type HookOutcome = Result<HookOutput, HookError>;

/// A hook handler. Closures `Fn(&HookContext) -> Result<HookOutput, HookError>`
/// implement this automatically.
pub trait HookHandler: Send + Sync {
    fn handle(&self, context: &HookContext) -> HookOutcome;
}

impl<F> HookHandler for F
where
    F: Fn(&HookContext) -> HookOutcome + Send + Sync,
{
    fn handle(&self, context: &HookContext) -> HookOutcome {
        self(context)
    }
}
