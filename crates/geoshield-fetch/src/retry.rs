//! Retry policies for upstream requests.
//!
//! A policy is consulted after each failed attempt except the last, with the
//! error, the zero-based attempt index and the total attempt budget. It
//! decides whether to try again and how long to wait first.
//!
//! Two policies cover the call sites:
//! - `ExponentialBackoff` (the default): initial delay doubling each attempt, capped
//! - `FixedDelay`: the same delay between every attempt
//!
//! `TransientOnly` wraps either one and stops early on permanent client
//! errors (4xx other than 408 and 429).

use std::time::Duration;

use reqwest::StatusCode;

use crate::error::FetchError;

pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 8000;
pub const DEFAULT_FIXED_DELAY_MS: u64 = 1000;

/// Outcome of consulting a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given duration, then try again
    RetryAfter(Duration),
    /// Stop and return the error
    GiveUp,
}

impl RetryDecision {
    pub fn should_retry(self) -> bool {
        matches!(self, RetryDecision::RetryAfter(_))
    }
}

/// Decides whether a failed attempt is retried.
pub trait RetryPolicy: Send + Sync {
    fn decide(&self, error: &FetchError, attempt: u32, max_retries: u32) -> RetryDecision;
}

impl<F> RetryPolicy for F
where
    F: Fn(&FetchError, u32, u32) -> RetryDecision + Send + Sync,
{
    fn decide(&self, error: &FetchError, attempt: u32, max_retries: u32) -> RetryDecision {
        self(error, attempt, max_retries)
    }
}

fn has_attempts_left(error: &FetchError, attempt: u32, max_retries: u32) -> bool {
    error.is_retryable() && attempt.saturating_add(1) < max_retries
}

/// Constant delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    pub delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_FIXED_DELAY_MS))
    }
}

impl RetryPolicy for FixedDelay {
    fn decide(&self, error: &FetchError, attempt: u32, max_retries: u32) -> RetryDecision {
        if has_attempts_left(error, attempt, max_retries) {
            RetryDecision::RetryAfter(self.delay)
        } else {
            RetryDecision::GiveUp
        }
    }
}

/// Delay doubling with each attempt, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl ExponentialBackoff {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }

    /// Calculate the delay after the given (zero-based) attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // initial_delay * 2^attempt
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped)
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn decide(&self, error: &FetchError, attempt: u32, max_retries: u32) -> RetryDecision {
        if has_attempts_left(error, attempt, max_retries) {
            RetryDecision::RetryAfter(self.delay_for_attempt(attempt))
        } else {
            RetryDecision::GiveUp
        }
    }
}

/// Gives up immediately on permanent HTTP statuses, otherwise defers to `inner`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientOnly<P> {
    pub inner: P,
}

impl<P> TransientOnly<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

impl<P: RetryPolicy> RetryPolicy for TransientOnly<P> {
    fn decide(&self, error: &FetchError, attempt: u32, max_retries: u32) -> RetryDecision {
        if let Some(status) = error.status() {
            if !is_transient_status(status) {
                tracing::debug!("Status {} is permanent, not retrying", status);
                return RetryDecision::GiveUp;
            }
        }
        self.inner.decide(error, attempt, max_retries)
    }
}

/// Check if a status code is worth retrying
pub fn is_transient_status(status: u16) -> bool {
    let Ok(status) = StatusCode::from_u16(status) else {
        return false;
    };

    // 5xx server errors, 429 rate limiting, 408 request timeout
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}
