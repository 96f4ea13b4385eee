//! Hook registry.
//!
//! Each conversation owns its own registry; there is no process-wide
//! instance. Handler errors and panics are caught and recorded in the folded
//! [`HookResult`], they never escape [`HookRegistry::execute_hooks`].

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use rand::seq::SliceRandom;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::HookHandler;
use crate::types::{ExecutionOrder, HookContext, HookOutput, HookResult, HookSettings};

#[derive(Clone)]
pub struct HookSubscription {
    pub hook_type: String,
    pub name: String,
    pub priority: i32,
    pub registration_order: u64,
    handler: Arc<dyn HookHandler>,
}

impl std::fmt::Debug for HookSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookSubscription")
            .field("hook_type", &self.hook_type)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("registration_order", &self.registration_order)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Vec<HookSubscription>>,
    settings: HookSettings,
    order_counter: u64,
}

/// Running fold of handler outputs.
struct Accumulator {
    context: HookContext,
    data: Map<String, Value>,
    errors: Vec<String>,
    should_cancel: bool,
    should_skip: bool,
}

impl Accumulator {
    fn merge(&mut self, output: HookOutput) {
        match output {
            HookOutput::Unchanged => {}
            HookOutput::Context(context) => self.context = context,
            HookOutput::Result(result) => {
                self.data.extend(result.data);
                self.errors.extend(result.errors);
                if let Some(context) = result.modified_context {
                    self.context = context;
                }
                self.should_cancel |= result.should_cancel;
                self.should_skip |= result.should_skip;
            }
        }
    }

    fn finish(self) -> HookResult {
        HookResult {
            success: self.errors.is_empty(),
            data: self.data,
            errors: self.errors,
            modified_context: Some(self.context),
            should_cancel: self.should_cancel,
            should_skip: self.should_skip,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(settings: HookSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &HookSettings {
        &self.settings
    }

    pub const fn settings_mut(&mut self) -> &mut HookSettings {
        &mut self.settings
    }

    /// Subscribe `handler` to `hook_type`. Returns the registration order.
    pub fn register(
        &mut self,
        hook_type: impl Into<String>,
        name: impl Into<String>,
        priority: i32,
        handler: impl HookHandler + 'static,
    ) -> u64 {
        self.order_counter += 1;
        let subscription = HookSubscription {
            hook_type: hook_type.into(),
            name: name.into(),
            priority,
            registration_order: self.order_counter,
            handler: Arc::new(handler),
        };
        debug!(
            hook_type = %subscription.hook_type,
            handler = %subscription.name,
            priority,
            "Registering hook"
        );
        self.hooks
            .entry(subscription.hook_type.clone())
            .or_default()
            .push(subscription);
        self.order_counter
    }

    /// Remove every subscription named `name` under `hook_type`.
    pub fn unregister(&mut self, hook_type: &str, name: &str) -> bool {
        let Some(subs) = self.hooks.get_mut(hook_type) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|sub| sub.name != name);
        subs.len() < before
    }

    #[must_use]
    pub fn hook_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .hooks
            .iter()
            .filter(|(_, subs)| !subs.is_empty())
            .map(|(hook_type, _)| hook_type.clone())
            .collect();
        types.sort();
        types
    }

    #[must_use]
    pub fn subscriptions(&self, hook_type: &str) -> Vec<HookSubscription> {
        self.hooks.get(hook_type).cloned().unwrap_or_default()
    }

    fn ordered(&self, hook_type: &str) -> Vec<HookSubscription> {
        let mut subs = self.subscriptions(hook_type);
        match self.settings.execution_order {
            ExecutionOrder::Priority => {
                subs.sort_by_key(|sub| (std::cmp::Reverse(sub.priority), sub.registration_order));
            }
            ExecutionOrder::Registration => subs.sort_by_key(|sub| sub.registration_order),
            ExecutionOrder::Random => subs.shuffle(&mut rand::rng()),
        }
        subs
    }

    /// Run every handler subscribed to `hook_type` and fold their outputs.
    ///
    /// The returned result always carries the final context in
    /// `modified_context`. Iteration stops as soon as cancellation is
    /// requested, by a result flag or by a cancelled context when
    /// cancellation is enabled.
    pub fn execute_hooks(&self, hook_type: &str, context: HookContext) -> HookResult {
        if self.settings.is_disabled(hook_type) {
            return HookResult::ok().with_context(context);
        }
        let subscriptions = self.ordered(hook_type);
        if subscriptions.is_empty() {
            return HookResult::ok().with_context(context);
        }

        let settings = &self.settings;
        let per_handler = settings.hook_timeout();
        let chain_budget = settings.max_execution_time();
        let chain_started = Instant::now();
        let mut acc = Accumulator {
            context,
            data: Map::new(),
            errors: Vec::new(),
            should_cancel: false,
            should_skip: false,
        };

        for sub in &subscriptions {
            let started = Instant::now();
            let outcome = catch_unwind(AssertUnwindSafe(|| sub.handler.handle(&acc.context)));
            let elapsed = started.elapsed();

            match outcome {
                Ok(Ok(output)) => acc.merge(output),
                Ok(Err(err)) => {
                    warn!(hook_type, handler = %sub.name, "Hook handler failed: {}", err);
                    acc.errors.push(format!("{}: {err}", sub.name));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(hook_type, handler = %sub.name, "Hook handler panicked: {}", message);
                    acc.errors.push(format!("{}: {message}", sub.name));
                }
            }

            if let Some(limit) = per_handler
                && elapsed > limit
            {
                warn!(hook_type, handler = %sub.name, "Hook handler exceeded timeout: {:?}", elapsed);
                acc.errors.push(format!(
                    "{}: timeout exceeded ({:.2}s)",
                    sub.name,
                    elapsed.as_secs_f64()
                ));
                if settings.enable_cancellation {
                    acc.should_cancel = true;
                }
            }

            if acc.context.cancelled && settings.enable_cancellation {
                acc.should_cancel = true;
            }
            if acc.should_cancel {
                debug!(hook_type, handler = %sub.name, "Hook chain cancelled");
                break;
            }

            if let Some(budget) = chain_budget
                && chain_started.elapsed() > budget
            {
                warn!(hook_type, "Hook chain exceeded its time budget");
                acc.errors.push("hook execution time exceeded".to_string());
                acc.should_cancel = true;
                break;
            }
        }

        acc.finish()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hook_types", &self.hook_types())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::{HookError, HookOutcome};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &str) -> impl HookHandler + 'static {
        let log = Arc::clone(log);
        let label = label.to_string();
        move |_: &HookContext| -> HookOutcome {
            if let Ok(mut entries) = log.lock() {
                entries.push(label.clone());
            }
            Ok(HookOutput::Unchanged)
        }
    }

    fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock().map(|e| e.clone()).unwrap_or_default()
    }

    #[test]
    fn test_priority_then_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.register("t", "low", 1, recorder(&log, "low"));
        registry.register("t", "high-a", 10, recorder(&log, "high-a"));
        registry.register("t", "high-b", 10, recorder(&log, "high-b"));

        let result = registry.execute_hooks("t", HookContext::new("t"));
        assert!(result.success);
        assert_eq!(entries(&log), vec!["high-a", "high-b", "low"]);
    }

    #[test]
    fn test_registration_order_mode() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.settings_mut().execution_order = ExecutionOrder::Registration;
        registry.register("t", "low", 1, recorder(&log, "low"));
        registry.register("t", "high", 10, recorder(&log, "high"));

        registry.execute_hooks("t", HookContext::new("t"));
        assert_eq!(entries(&log), vec!["low", "high"]);
    }

    #[test]
    fn test_random_order_runs_every_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry =
            HookRegistry::with_settings(HookSettings::default().with_execution_order(ExecutionOrder::Random));
        for name in ["a", "b", "c", "d"] {
            registry.register("t", name, 0, recorder(&log, name));
        }
        registry.execute_hooks("t", HookContext::new("t"));
        let mut seen = entries(&log);
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_disabled_registry_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.register("t", "a", 0, recorder(&log, "a"));
        registry.settings_mut().disabled_hooks.insert("t".to_string());

        let ctx = HookContext::new("t").with_runtime_state("k", 1);
        let result = registry.execute_hooks("t", ctx.clone());
        assert!(result.success);
        assert_eq!(result.modified_context, Some(ctx));
        assert!(entries(&log).is_empty());

        registry.settings_mut().disabled_hooks.clear();
        registry.settings_mut().enabled = false;
        registry.execute_hooks("t", HookContext::new("t"));
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_results_merge() {
        let mut registry = HookRegistry::new();
        registry.register("t", "first", 2, |_: &HookContext| -> HookOutcome {
            Ok(HookResult::ok()
                .with_data("shared", "first")
                .with_data("only_first", 1)
                .skipped()
                .into())
        });
        registry.register("t", "second", 1, |_: &HookContext| -> HookOutcome {
            let mut result = HookResult::ok().with_data("shared", "second");
            result.errors.push("second: soft warning".to_string());
            Ok(result.into())
        });

        let result = registry.execute_hooks("t", HookContext::new("t"));
        assert_eq!(result.data["shared"], "second");
        assert_eq!(result.data["only_first"], 1);
        assert!(result.should_skip);
        assert!(!result.should_cancel);
        assert!(!result.success);
        assert_eq!(result.errors, vec!["second: soft warning"]);
    }

    #[test]
    fn test_returned_context_flows_to_next_handler() {
        let mut registry = HookRegistry::new();
        registry.register("t", "writer", 2, |ctx: &HookContext| -> HookOutcome {
            Ok(ctx.clone().with_runtime_state("seen", true).into())
        });
        registry.register("t", "reader", 1, |ctx: &HookContext| -> HookOutcome {
            Ok(HookResult::ok().with_data("saw", ctx.get_bool("seen")).into())
        });

        let result = registry.execute_hooks("t", HookContext::new("t"));
        assert_eq!(result.data["saw"], true);
        assert!(
            result
                .modified_context
                .is_some_and(|ctx| ctx.get_bool("seen"))
        );
    }

    #[test]
    fn test_errors_and_panics_are_contained() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.register("t", "failing", 3, |_: &HookContext| -> HookOutcome {
            Err(HookError::Failed("bad input".to_string()))
        });
        registry.register("t", "exploding", 2, |_: &HookContext| -> HookOutcome {
            panic!("kaboom")
        });
        registry.register("t", "after", 1, recorder(&log, "after"));

        let result = registry.execute_hooks("t", HookContext::new("t"));
        assert!(!result.success);
        assert_eq!(result.errors, vec!["failing: bad input", "exploding: kaboom"]);
        assert_eq!(entries(&log), vec!["after"]);
    }

    #[test]
    fn test_cancel_stops_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.register("t", "stopper", 2, |_: &HookContext| -> HookOutcome {
            Ok(HookResult::ok().cancelled().into())
        });
        registry.register("t", "after", 1, recorder(&log, "after"));

        let result = registry.execute_hooks("t", HookContext::new("t"));
        assert!(result.should_cancel);
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_context_cancellation_respects_setting() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.register("t", "canceller", 2, |ctx: &HookContext| -> HookOutcome {
            let mut next = ctx.clone();
            next.cancel("stop here");
            Ok(next.into())
        });
        registry.register("t", "after", 1, recorder(&log, "after"));

        let result = registry.execute_hooks("t", HookContext::new("t"));
        assert!(result.should_cancel);
        assert!(entries(&log).is_empty());

        registry.settings_mut().enable_cancellation = false;
        let result = registry.execute_hooks("t", HookContext::new("t"));
        assert!(!result.should_cancel);
        assert_eq!(entries(&log), vec!["after"]);
    }

    #[test]
    fn test_slow_handler_records_timeout() {
        let mut registry =
            HookRegistry::with_settings(HookSettings::default().with_hook_timeout_ms(1));
        registry.register("t", "slow", 0, |_: &HookContext| -> HookOutcome {
            std::thread::sleep(Duration::from_millis(20));
            Ok(HookOutput::Unchanged)
        });

        let result = registry.execute_hooks("t", HookContext::new("t"));
        assert!(result.should_cancel);
        assert!(result.errors[0].starts_with("slow: timeout exceeded"));
    }

    #[test]
    fn test_chain_budget_stops_remaining_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::with_settings(
            HookSettings::default()
                .with_max_execution_time_ms(1)
                .with_cancellation(false),
        );
        registry.register("t", "slow", 2, |_: &HookContext| -> HookOutcome {
            std::thread::sleep(Duration::from_millis(20));
            Ok(HookOutput::Unchanged)
        });
        registry.register("t", "after", 1, recorder(&log, "after"));

        let result = registry.execute_hooks("t", HookContext::new("t"));
        assert!(result.should_cancel);
        assert_eq!(result.errors, vec!["hook execution time exceeded"]);
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_unregister_and_hook_types() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.register("b", "x", 0, recorder(&log, "x"));
        registry.register("a", "y", 0, recorder(&log, "y"));
        assert_eq!(registry.hook_types(), vec!["a", "b"]);
        assert!(registry.unregister("a", "y"));
        assert!(!registry.unregister("a", "y"));
        assert_eq!(registry.hook_types(), vec!["b"]);
    }
}
