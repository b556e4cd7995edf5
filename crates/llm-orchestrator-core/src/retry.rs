// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry with backoff, shared by the executor (§4.3).

use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{OrchestratorError, Result};
use crate::workflow::{BackoffStrategy, RetryConfig};

/// A resolved retry policy: attempt budget plus the delay curve between
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts allowed after the first failure.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            multiplier,
            max_delay,
        }
    }

    /// Delay before retry attempt number `attempt` (1-based: the delay
    /// before the *first* retry is `delay_for(1)`), with +/-10% jitter and
    /// clamped to `max_delay`.
    fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32 - 1);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);
        let jitter = rand::thread_rng().gen_range(0.9..=1.1);
        Duration::from_millis((capped_ms * jitter).max(0.0) as u64).min(self.max_delay)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let multiplier = match config.backoff {
            BackoffStrategy::Exponential => 2.0,
            BackoffStrategy::Linear => 1.0,
            BackoffStrategy::Constant => 1.0,
        };
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Runs an async operation under a [`RetryPolicy`], honoring cooperative
/// cancellation at every suspension point.
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Attempts `operation` up to `policy.max_attempts + 1` times total.
    /// Returns the first success, or the last failure once the budget is
    /// exhausted. If `cancelled` flips to `true` between attempts, returns
    /// [`OrchestratorError::Cancelled`] immediately without another attempt.
    pub async fn execute<T, F, Fut>(&self, cancelled: &AtomicBool, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if cancelled.load(Ordering::Relaxed) {
                return Err(OrchestratorError::Cancelled);
            }

            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt > self.policy.max_attempts {
                        return Err(err);
                    }
                    let delay = self.policy.delay_for(attempt);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = wait_for_cancel(cancelled) => {
                            return Err(OrchestratorError::Cancelled);
                        }
                    }
                }
            }
        }
    }
}

/// Polls the cancellation flag until it is set, yielding cooperatively.
async fn wait_for_cancel(cancelled: &AtomicBool) {
    loop {
        if cancelled.load(Ordering::Relaxed) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
