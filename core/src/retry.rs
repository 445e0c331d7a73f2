//! Bounded retry loop with capped exponential backoff.
//!
//! The loop distinguishes failures worth another attempt from configuration
//! problems that no amount of waiting will fix, and every wait races the
//! caller's [`CancellationToken`] so a long backoff can be abandoned cleanly.

use std::future::Future;
use std::time::Duration;

use log::Level;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::errors::{AiError, AttemptError, ExtractionError, TransportError};
use crate::logging::log_event;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            cap: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Wait after the 1-based `attempt` failed: `min(base * 2^(attempt-1), cap)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let base_ms = as_millis_u64(self.base_delay);
        let cap_ms = as_millis_u64(self.cap);
        Duration::from_millis(base_ms.saturating_mul(1_u64 << exponent).min(cap_ms))
    }
}

fn as_millis_u64(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}

/// How a single attempt failed, as seen by the loop.
#[derive(Debug)]
pub enum AttemptFailure {
    /// Abort immediately without retrying or falling back.
    Terminal(AiError),
    Retryable(AttemptError),
}

impl From<TransportError> for AttemptFailure {
    /// Statuses outside 408, 429 and 5xx end the loop and bypass the fallback.
    fn from(err: TransportError) -> Self {
        if let TransportError::HttpStatus(status) = err {
            if !err.is_transient() {
                return Self::Terminal(AiError::Rejected { status });
            }
        }
        Self::Retryable(err.into())
    }
}

impl From<ExtractionError> for AttemptFailure {
    fn from(err: ExtractionError) -> Self {
        Self::Retryable(err.into())
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    Exhausted { attempts: u32, last: AttemptError },
}

/// Drive `attempt_fn` until it succeeds, hits a terminal failure, runs out of
/// attempts or the token is cancelled.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    request_id: &str,
    mut attempt_fn: F,
) -> Result<RetryOutcome<T>, AiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptFailure>>,
{
    let mut last: Option<AttemptError> = None;

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(AiError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AiError::Cancelled),
            result = attempt_fn(attempt) => result,
        };

        match result {
            Ok(value) => {
                return Ok(RetryOutcome::Success {
                    value,
                    attempts: attempt,
                })
            }
            Err(AttemptFailure::Terminal(err)) => {
                log_event(
                    Level::Error,
                    Some(err.code()),
                    "ai.retry",
                    "AI attempt failed, not retrying",
                    Some(err.explain()),
                    Some(json!({
                        "request_id": request_id,
                        "attempt": attempt,
                        "error": err.to_string(),
                    })),
                );
                return Err(err);
            }
            Err(AttemptFailure::Retryable(err)) => {
                log_event(
                    Level::Warn,
                    Some("AI-0201"),
                    "ai.retry",
                    "AI attempt failed",
                    Some(&err.to_string()),
                    Some(json!({
                        "request_id": request_id,
                        "attempt": attempt,
                        "max_attempts": policy.max_attempts,
                    })),
                );
                last = Some(err);
            }
        }

        if attempt < policy.max_attempts {
            let delay = policy.delay_for(attempt);
            log_event(
                Level::Info,
                Some("AI-0202"),
                "ai.retry",
                "Backing off before next attempt",
                None,
                Some(json!({
                    "request_id": request_id,
                    "delay_ms": as_millis_u64(delay),
                    "next_attempt": attempt + 1,
                })),
            );
            sleep_or_cancel(delay, cancel).await?;
        }
    }

    match last {
        Some(last) => Ok(RetryOutcome::Exhausted {
            attempts: policy.max_attempts,
            last,
        }),
        None => Err(AiError::configuration("retry policy allows no attempts")),
    }
}

/// Sleep for `delay` unless the token fires first.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<(), AiError> {
    if delay.is_zero() {
        return if cancel.is_cancelled() {
            Err(AiError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AiError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
