use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::config::{default_retry_delays, RetryConfig};
use crate::core::types::StopToken;

/// Backoff schedule shared (read-only) across all remote calls in a run.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Ordered backoff delays; the last entry caps further attempts.
    pub delays: Vec<Duration>,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: default_retry_delays(),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>, max_attempts: u32) -> Self {
        Self {
            delays,
            max_attempts,
        }
    }

    /// Delay before the attempt following the n-th failure (0-based),
    /// capping at the last entry.
    pub fn delay_for(&self, failure_index: u32) -> Duration {
        let idx = (failure_index as usize).min(self.delays.len().saturating_sub(1));
        self.delays[idx]
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            delays: cfg.delays.clone(),
            max_attempts: cfg.max_attempts,
        }
    }
}

/// Classified outcome of one HTTP call, as seen by the retry controller.
///
/// Only `RateLimited` and `Transport` are retryable. Application-level
/// outcomes are classified by the caller after the controller returns a
/// successful response body; retrying cannot change a deterministic rejection.
#[derive(Debug)]
pub enum CallOutcome {
    /// HTTP 429: absorbed here, never surfaced directly to the strategy.
    RateLimited { message: String },
    /// DNS failure, timeout, connection reset.
    Transport { message: String },
    /// Any other non-success status: a hard API error, never retried.
    Api { status: u16, message: String },
}

/// Terminal failure of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("rate limit still in effect after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("network error after {attempts} attempts: {message}")]
    Network { attempts: u32, message: String },

    #[error("API request failed: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Wraps a fallible network call with bounded exponential backoff.
///
/// The loop is the `Attempting(n) -> Done | Failed` machine: success is
/// terminal, a non-retryable outcome is terminal, and a retryable outcome
/// with `n < max_attempts` sleeps `delays[min(n, len-1)]` then re-attempts.
#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Drive `operation` to a terminal state.
    ///
    /// `stop` is checked before each backoff sleep; once raised, the current
    /// outcome is finalized without further attempts.
    pub async fn execute<T, F, Fut>(
        &self,
        stop: &StopToken,
        mut operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallOutcome>>,
    {
        let mut failures: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(CallOutcome::Api { status, message }) => {
                    return Err(RetryError::Api { status, message });
                }
                Err(outcome) => {
                    failures += 1;
                    let exhausted = failures >= self.policy.max_attempts;

                    if exhausted || stop.is_stopped() {
                        if !exhausted {
                            debug!("stop signal raised, finalizing after {} attempts", failures);
                        }
                        return Err(match outcome {
                            CallOutcome::RateLimited { .. } => RetryError::RateLimitExceeded {
                                attempts: failures,
                            },
                            CallOutcome::Transport { message } => RetryError::Network {
                                attempts: failures,
                                message,
                            },
                            CallOutcome::Api { .. } => unreachable!("handled above"),
                        });
                    }

                    let delay = self.policy.delay_for(failures - 1);
                    match &outcome {
                        CallOutcome::RateLimited { message } => warn!(
                            "rate limited (attempt {}/{}), backing off {:?}: {}",
                            failures, self.policy.max_attempts, delay, message
                        ),
                        CallOutcome::Transport { message } => warn!(
                            "transport error (attempt {}/{}), backing off {:?}: {}",
                            failures, self.policy.max_attempts, delay, message
                        ),
                        CallOutcome::Api { .. } => unreachable!("handled above"),
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn rate_limited() -> CallOutcome {
        CallOutcome::RateLimited {
            message: "quota exceeded".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_four_rate_limits_with_exact_schedule() {
        let controller = RetryController::new(RetryPolicy::default());
        let stop = StopToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let start = Instant::now();
        let calls_in = Arc::clone(&calls);
        let result = controller
            .execute(&stop, move || {
                let calls = Arc::clone(&calls_in);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 4 {
                        Err(rate_limited())
                    } else {
                        Ok(n + 1)
                    }
                }
            })
            .await;

        // Sleeps must be exactly 2+4+8+16 = 30s before the 5th attempt.
        assert_eq!(result.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_three_attempts_after_two_sleeps() {
        let policy = RetryPolicy::new(default_retry_delays(), 3);
        let controller = RetryController::new(policy);
        let stop = StopToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let start = Instant::now();
        let calls_in = Arc::clone(&calls);
        let result: Result<(), _> = controller
            .execute(&stop, move || {
                let calls = Arc::clone(&calls_in);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(rate_limited())
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(RetryError::RateLimitExceeded { attempts: 3 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Exactly two sleeps: 2s + 4s.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn api_error_is_never_retried() {
        let controller = RetryController::new(RetryPolicy::default());
        let stop = StopToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let start = Instant::now();
        let calls_in = Arc::clone(&calls);
        let result: Result<(), _> = controller
            .execute(&stop, move || {
                let calls = Arc::clone(&calls_in);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CallOutcome::Api {
                        status: 400,
                        message: "bad request".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Api { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_exhaust_to_network() {
        let policy = RetryPolicy::new(vec![Duration::from_secs(1)], 2);
        let controller = RetryController::new(policy);
        let stop = StopToken::new();

        let result: Result<(), _> = controller
            .execute(&stop, || async {
                Err(CallOutcome::Transport {
                    message: "connection reset".to_string(),
                })
            })
            .await;

        match result {
            Err(RetryError::Network { attempts, message }) => {
                assert_eq!(attempts, 2);
                assert!(message.contains("connection reset"));
            }
            other => panic!("expected Network error, got {:?}", other.err()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delay_caps_at_last_entry() {
        let policy = RetryPolicy::new(vec![Duration::from_secs(2)], 4);
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));

        let controller = RetryController::new(policy);
        let stop = StopToken::new();
        let start = Instant::now();

        let result: Result<(), _> = controller
            .execute(&stop, || async { Err(rate_limited()) })
            .await;

        assert!(result.is_err());
        // Three sleeps of the capped 2s delay.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_token_skips_remaining_sleeps() {
        let controller = RetryController::new(RetryPolicy::default());
        let stop = StopToken::new();
        stop.stop();

        let start = Instant::now();
        let result: Result<(), _> = controller
            .execute(&stop, || async { Err(rate_limited()) })
            .await;

        assert!(matches!(
            result,
            Err(RetryError::RateLimitExceeded { attempts: 1 })
        ));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
