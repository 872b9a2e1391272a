// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Resilience primitives (retry policy + circuit breaker).

use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Bounded retry with linear backoff: the wait after attempt `n` is
/// `base_delay * n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay to wait after the failed attempt numbered `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Run `operation` until it succeeds or attempts run out.
    ///
    /// The closure receives the 1-based attempt number. On success the
    /// value is returned together with the attempt that produced it.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<(T, u32), RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match operation(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "Attempt failed");
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.delay_for_attempt(attempt)).await;
                    }
                }
            }
        }

        Err(RetryExhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_millis(1000))
    }
}

#[derive(Debug, Error)]
#[error("All {attempts} attempts exhausted. Last error: {}", display_last(.last_error))]
pub struct RetryExhausted<E: Display> {
    pub attempts: u32,
    pub last_error: Option<E>,
}

fn display_last<E: Display>(error: &Option<E>) -> String {
    error
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "none".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    /// Tripped; stays open until [`CircuitBreaker::reset`]
    Open,
}

/// Consecutive-failure breaker.
///
/// Successes reset the count. Reaching `failure_threshold` opens the circuit,
/// and it never half-opens on its own.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<CircuitState>,
    failure_threshold: u32,
    failure_count: AtomicU32,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            state: Mutex::new(CircuitState::Closed),
            failure_threshold: failure_threshold.max(1),
            failure_count: AtomicU32::new(0),
        }
    }

    pub fn record_success(&self) {
        let state = self.state.lock();
        if *state == CircuitState::Closed {
            self.failure_count.store(0, Ordering::SeqCst);
        }
    }

    /// Count a failure and return the resulting state
    pub fn record_failure(&self) -> CircuitState {
        let mut state = self.state.lock();
        if *state == CircuitState::Closed {
            let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
            if failures >= self.failure_threshold {
                *state = CircuitState::Open;
                warn!(failures, "Circuit breaker opened");
            }
        }
        *state
    }

    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = CircuitState::Closed;
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub fn state(&self) -> CircuitState {
        *self.state.lock()
    }

    pub fn failures(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }
}
