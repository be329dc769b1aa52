// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bounded reconnect policy with exponential backoff and jitter.
//!
//! The engine never reconnects on its own. Callers that want to ride out a
//! device restart wrap `connect` in [`ReconnectPolicy::run`].

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::error::ModbusError;

// =============================================================================
// ExponentialBackoff
// =============================================================================

/// Exponential backoff strategy with optional jitter.
///
/// Delay doubles with each attempt: initial_delay * 2^attempt.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Multiplier for each attempt (default: 2.0).
    pub multiplier: f64,
    /// Jitter factor (0.0 = no jitter, 1.0 = up to 100% jitter).
    pub jitter_factor: f64,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff without jitter.
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    /// Sets the multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter factor.
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Calculates the delay for the given attempt (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter_factor > 0.0 {
            let jitter_range = capped * self.jitter_factor;
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(final_delay)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

// =============================================================================
// ReconnectPolicy
// =============================================================================

/// How often and how patiently to retry a failed connect.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Maximum attempts including the first one (0 = unlimited).
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: ExponentialBackoff,
}

impl ReconnectPolicy {
    /// Creates a policy.
    pub fn new(max_attempts: u32, backoff: ExponentialBackoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self::new(1, ExponentialBackoff::new(Duration::ZERO, Duration::ZERO))
    }

    /// Returns `true` if attempt number `attempt` (1-based) may run.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt <= self.max_attempts
    }

    /// Runs `operation` until it succeeds, fails permanently or the attempts
    /// are exhausted. Only retryable errors are retried.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> RetryResult<T, ModbusError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ModbusError>>,
    {
        let started = Instant::now();
        let mut attempt = 1u32;

        loop {
            match operation(attempt).await {
                Ok(value) => return RetryResult::Success(value),
                Err(error) => {
                    let exhausted = !self.allows(attempt.saturating_add(1));
                    if exhausted || !error.is_retryable() {
                        return RetryResult::Failed {
                            error,
                            attempts: attempt,
                            total_time: started.elapsed(),
                        };
                    }

                    let delay = self.backoff.delay(attempt - 1);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Connect failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(5, ExponentialBackoff::default())
    }
}

// =============================================================================
// RetryResult
// =============================================================================

/// Result of a retry operation.
#[derive(Debug, Clone)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed after all retries.
    Failed {
        /// The last error.
        error: E,
        /// Number of attempts made.
        attempts: u32,
        /// Total time spent.
        total_time: Duration,
    },
}

impl<T, E> RetryResult<T, E> {
    /// Returns `true` if the operation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Converts to a standard Result, discarding retry metadata.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failed { error, .. } => Err(error),
        }
    }

    /// Returns the number of attempts made, or 1 on success.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success(_) => 1,
            Self::Failed { attempts, .. } => *attempts,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_exponential_backoff_no_jitter() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(10));

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(10), Duration::from_secs(10));
    }

    #[test]
    fn test_exponential_backoff_with_jitter() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(10))
            .with_jitter(0.5);

        let delay = backoff.delay(0);
        assert!(delay >= Duration::from_millis(50));
        assert!(delay <= Duration::from_millis(150));
    }

    #[test]
    fn test_policy_allows() {
        let policy = ReconnectPolicy::new(3, ExponentialBackoff::default());
        assert!(policy.allows(3));
        assert!(!policy.allows(4));

        let unlimited = ReconnectPolicy::new(0, ExponentialBackoff::default());
        assert!(unlimited.allows(u32::MAX));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = ReconnectPolicy::new(
            5,
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1)),
        );

        let counter = calls.clone();
        let result = policy
            .run(|attempt| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 {
                        Err(ModbusError::connect_failed("10.0.0.1", 502, "refused"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.into_result().unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_after_max_attempts() {
        let policy = ReconnectPolicy::new(
            2,
            ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(10)),
        );
        let result: RetryResult<(), _> = policy
            .run(|_| async { Err(ModbusError::connect_failed("h", 502, "refused")) })
            .await;

        assert!(!result.is_success());
        assert_eq!(result.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_does_not_retry_permanent_errors() {
        let policy = ReconnectPolicy::default();
        let result: RetryResult<(), _> = policy
            .run(|_| async { Err(ModbusError::HostNotConfigured) })
            .await;

        assert_eq!(result.attempts(), 1);
        assert_eq!(result.into_result().unwrap_err(), ModbusError::HostNotConfigured);
    }
}
