//! Agent invocation with bounded retry, backoff and one repair round-trip.
//!
//! Every call to a completion backend goes through [`RetryingInvoker`]:
//!
//! - each attempt is bounded by `attempt_timeout_ms`; a timeout counts as a
//!   transport failure,
//! - failures are retried up to `max_attempts` with exponential backoff
//!   (capped at `max_delay_ms`, optionally jittered by up to 25%),
//! - a concurrency limiter caps outstanding attempts; the permit is held for
//!   the attempt only, never during backoff,
//! - [`RetryingInvoker::invoke_decoded`] reissues the *same* request exactly
//!   once when the first response does not decode.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use tribunal_llm::{CompletionBackend, CompletionRequest, LlmError};

use crate::domain::error::{Result, ReviewError};
use crate::obs;

/// Retry and timeout settings for agent calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per invocation, first call included.
    pub max_attempts: u32,
    /// Delay before the second attempt (milliseconds).
    pub initial_delay_ms: u64,
    /// Upper bound for any single backoff delay (milliseconds).
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Add up to 25% random jitter to each delay.
    pub jitter: bool,
    /// Wall-clock limit for a single attempt (milliseconds).
    pub attempt_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 1_000,
            max_delay_ms: 20_000,
            multiplier: 2.0,
            jitter: true,
            attempt_timeout_ms: 120_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff after failed attempt `attempt` (1-based), before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Backoff after failed attempt `attempt`, jitter applied. Never
    /// exceeds `max_delay_ms`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_millis() as u64;
        if !self.jitter || base < 4 {
            return Duration::from_millis(base);
        }
        let extra = rand::thread_rng().gen_range(0..=base / 4);
        Duration::from_millis(base.saturating_add(extra).min(self.max_delay_ms))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// Calls a completion backend under a [`RetryPolicy`] and a shared
/// concurrency cap.
#[derive(Clone)]
pub struct RetryingInvoker {
    backend: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
    limiter: Arc<Semaphore>,
}

impl RetryingInvoker {
    /// `max_concurrent` is clamped to at least one outstanding attempt.
    pub fn new(backend: Arc<dyn CompletionBackend>, policy: RetryPolicy, max_concurrent: usize) -> Self {
        Self {
            backend,
            policy,
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Raw response text, retried on transport failure or timeout.
    ///
    /// A backend that reports missing configuration fails on the first
    /// attempt with [`ReviewError::InvalidConfig`].
    pub async fn invoke(&self, request: &CompletionRequest) -> Result<String> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            match self.attempt(request).await {
                Ok(text) => {
                    if attempt > 1 {
                        debug!(agent = %request.agent_id, attempt, "Invocation succeeded after retry");
                    }
                    return Ok(text);
                }
                Err(err) if !err.is_transient() => {
                    warn!(agent = %request.agent_id, error = %err, "Invocation failed permanently");
                    return Err(ReviewError::InvalidConfig(format!(
                        "agent '{}': {err}",
                        request.agent_id
                    )));
                }
                Err(err) => {
                    last_reason = err.to_string();
                    if attempt == max_attempts {
                        break;
                    }
                    let delay = self.policy.delay(attempt);
                    obs::emit_invocation_retry(
                        &request.agent_id,
                        attempt,
                        max_attempts,
                        delay.as_millis() as u64,
                        &err,
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        warn!(
            agent = %request.agent_id,
            attempts = max_attempts,
            reason = %last_reason,
            "Invocation exhausted retries"
        );
        Err(ReviewError::Transient {
            agent: request.agent_id.clone(),
            attempts: max_attempts,
            reason: last_reason,
        })
    }

    /// Invoke and decode, with exactly one repair round-trip.
    ///
    /// If `decode` rejects the first response, the identical request is sent
    /// once more. A second rejection is a terminal [`ReviewError::Decode`].
    pub async fn invoke_decoded<T, F>(&self, request: &CompletionRequest, decode: F) -> Result<T>
    where
        F: Fn(&str) -> std::result::Result<T, String>,
    {
        let first = self.invoke(request).await?;
        let reason = match decode(&first) {
            Ok(value) => return Ok(value),
            Err(reason) => reason,
        };

        warn!(
            agent = %request.agent_id,
            reason = %reason,
            "Response did not decode, reissuing request once"
        );

        let second = self.invoke(request).await?;
        decode(&second).map_err(|reason| ReviewError::Decode {
            agent: request.agent_id.clone(),
            repaired: true,
            reason,
        })
    }

    async fn attempt(&self, request: &CompletionRequest) -> std::result::Result<String, LlmError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| LlmError::Http("invocation limiter closed".to_string()))?;

        match tokio::time::timeout(self.policy.attempt_timeout(), self.backend.complete(request)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(LlmError::Timeout(self.policy.attempt_timeout_ms)),
        }
    }
}
