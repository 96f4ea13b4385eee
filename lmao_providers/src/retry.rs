use std::fmt::Display;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Backoff schedule: one attempt per entry in `base_delays`, then
/// `final_retries` more spaced by `final_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delays: Vec<Duration>,
    pub final_retries: usize,
    pub final_delay: Duration,
}

impl Default for RetryPolicy {
    /// 2s, 4s, 6s, 8s, then 10s x 3.
    fn default() -> Self {
        Self {
            base_delays: [2, 4, 6, 8].map(Duration::from_secs).to_vec(),
            final_retries: 3,
            final_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A single attempt with no retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            base_delays: Vec::new(),
            final_retries: 0,
            final_delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> usize {
        (self.base_delays.len() + self.final_retries).max(1)
    }

    fn delay_after(&self, attempt: usize) -> Duration {
        self.base_delays
            .get(attempt - 1)
            .copied()
            .unwrap_or(self.final_delay)
    }
}

/// Retry an async operation with backoff while `should_retry` accepts the
/// error. Returns the first success, or the last error once the attempts run
/// out or an error is not retryable.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    mut operation: F,
    policy: &RetryPolicy,
    should_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
    R: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_attempts && should_retry(&e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "Request failed (attempt {attempt}/{max_attempts}): {e}. Retrying after {}ms...",
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
