//! Retry controller for remote model calls
//!
//! One logical call = one prompt. The controller:
//! 1. hashes the prompt once and answers from the response cache when it can
//!    (no throttle slot is consumed for a hit)
//! 2. otherwise claims a throttle slot and invokes the provider
//! 3. on success writes the cache and returns the text
//! 4. on a rate-limit failure sleeps `min(cap, base * 2^(attempt-1))` plus
//!    up to one second of jitter, then tries again while attempts remain
//! 5. propagates any other failure immediately, without writing the cache
//!
//! Every suspension point (throttle wait, remote call, backoff sleep)
//! observes the caller's `CancellationToken`. A cancelled call never writes
//! the cache.

use crate::cache::ResponseCache;
use crate::config::{RetryConfig, MAX_INTERVAL_SECS};
use crate::llm::{LLMError, LLMProvider, Result};
use crate::rate_limiter::ThrottleGate;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Attempt budget and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: clamped_secs(config.backoff_base_secs),
            backoff_cap: clamped_secs(config.backoff_cap_secs),
        }
    }

    /// Sleep after failed attempt `attempt` (1-based).
    ///
    /// `jitter` is a fraction of one second in `[0, 1)`, added after the cap
    /// is applied.
    pub fn backoff_delay(&self, attempt: u32, jitter: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let exponential = self.backoff_base.as_secs_f64() * 2f64.powi(exponent);
        let capped = exponential.min(self.backoff_cap.as_secs_f64());
        Duration::from_secs_f64(capped + jitter.clamp(0.0, 1.0))
    }
}

/// Seconds from configuration as a `Duration`, limited to
/// `[0, MAX_INTERVAL_SECS]`. NaN maps to zero.
fn clamped_secs(secs: f64) -> Duration {
    Duration::from_secs_f64(secs.max(0.0).min(MAX_INTERVAL_SECS))
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// What happened on one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Retryable,
    Fatal,
}

/// One remote invocation within a call
#[derive(Debug, Clone, Serialize)]
pub struct RequestAttempt {
    /// 1-based attempt number
    pub number: u32,
    /// Time spent waiting for the throttle before the request went out
    pub waited: Duration,
    pub outcome: AttemptOutcome,
    /// Backoff slept after this attempt, if it was retried
    pub backoff: Option<Duration>,
}

/// Result of a call together with its attempt history
#[derive(Debug, Clone, Serialize)]
pub struct CallReport {
    pub text: String,
    /// True when the text came from the response cache; `attempts` is empty
    pub from_cache: bool,
    pub attempts: Vec<RequestAttempt>,
}

impl CallReport {
    /// Backoff sleeps taken, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.attempts.iter().filter_map(|a| a.backoff).collect()
    }
}

fn jitter() -> f64 {
    rand::thread_rng().gen_range(0.0..1.0)
}

/// Executes prompts against a provider with caching, throttling, and retry
#[derive(Clone)]
pub struct RetryController {
    provider: Arc<dyn LLMProvider>,
    throttle: Arc<ThrottleGate>,
    cache: Arc<ResponseCache>,
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        throttle: Arc<ThrottleGate>,
        cache: Arc<ResponseCache>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            throttle,
            cache,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run one prompt and return the response text
    pub async fn execute(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        self.execute_with_report(prompt, cancel)
            .await
            .map(|report| report.text)
    }

    /// Run one prompt and return the text with its attempt history
    ///
    /// # Errors
    /// - the last `LLMError::RateLimitExceeded` once attempts are exhausted
    /// - any non-retryable provider error, after a single attempt
    /// - `LLMError::Cancelled` when `cancel` fires at any suspension point
    pub async fn execute_with_report(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<CallReport> {
        if cancel.is_cancelled() {
            return Err(LLMError::Cancelled);
        }

        let key = ResponseCache::cache_key(prompt);
        if let Some(text) = self.cache.get(&key) {
            debug!("Serving prompt from response cache");
            return Ok(CallReport {
                text,
                from_cache: true,
                attempts: Vec::new(),
            });
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = Vec::new();
        let mut number = 0;

        loop {
            number += 1;

            let queued = Instant::now();
            self.throttle.acquire(cancel).await?;
            let waited = queued.elapsed();

            debug!(
                "Calling {} (attempt {}/{})",
                self.provider.name(),
                number,
                max_attempts
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LLMError::Cancelled),
                result = self.provider.complete(prompt) => result,
            };

            match result {
                Ok(text) => {
                    if cancel.is_cancelled() {
                        return Err(LLMError::Cancelled);
                    }
                    self.cache.put(&key, &text);
                    attempts.push(RequestAttempt {
                        number,
                        waited,
                        outcome: AttemptOutcome::Success,
                        backoff: None,
                    });
                    if number > 1 {
                        info!("Remote call succeeded on attempt {}", number);
                    }
                    return Ok(CallReport {
                        text,
                        from_cache: false,
                        attempts,
                    });
                }
                Err(e) if e.is_retryable() && number < max_attempts => {
                    let delay = self.policy.backoff_delay(number, jitter());
                    warn!(
                        "Rate limited by {} (attempt {}/{}), retrying in {:.1}s: {}",
                        self.provider.name(),
                        number,
                        max_attempts,
                        delay.as_secs_f64(),
                        e
                    );
                    attempts.push(RequestAttempt {
                        number,
                        waited,
                        outcome: AttemptOutcome::Retryable,
                        backoff: Some(delay),
                    });

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(LLMError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!(
                            "Rate limit persisted after {} attempts: {}",
                            max_attempts, e
                        );
                    } else {
                        error!("Remote call failed without retry: {}", e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
