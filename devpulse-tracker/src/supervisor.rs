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

//! Periodic full-state sync with a consecutive-failure limit
//!
//! ```text
//!   Stopped ──start()──► Running ──tick ok──► Running (failures = 0)
//!                           │
//!                           └──tick err──► failures + 1 ──(== max)──► Stopped
//! ```
//!
//! Once stopped by failures the supervisor stays stopped until `start` is
//! called again. The fatal condition is logged, sent to the notifier and
//! published on the state channel.

use crate::error::{TrackerError, TrackerResult};
use crate::notifier::Notifier;
use async_trait::async_trait;
use devpulse_core::{CircuitBreaker, CircuitState};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// The operation run on every supervisor tick
#[async_trait]
pub trait SnapshotSync: Send + Sync {
    async fn sync_all(&self) -> TrackerResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Stopped,
    Running,
}

struct Inner {
    sync: Arc<dyn SnapshotSync>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    breaker: CircuitBreaker,
    state: watch::Sender<SupervisorState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    /// Run one sync; returns whether the timer should keep going
    async fn tick(&self) -> bool {
        let result = self.sync.sync_all().await;
        // A stop() that raced with this tick wins
        if *self.state.borrow() == SupervisorState::Stopped {
            return false;
        }

        match result {
            Ok(()) => {
                self.breaker.record_success();
                debug!("Supervisor sync succeeded");
                true
            }
            Err(e) => match self.breaker.record_failure() {
                CircuitState::Closed => {
                    warn!(
                        failures = self.breaker.failures(),
                        max = self.breaker.failure_threshold(),
                        error = %e,
                        "Supervisor sync failed"
                    );
                    true
                }
                CircuitState::Open => {
                    let fatal = TrackerError::SupervisorExhausted {
                        failures: self.breaker.failures(),
                    };
                    error!(error = %e, "{}", fatal);
                    self.state.send_replace(SupervisorState::Stopped);
                    self.notifier.notify_error(&fatal.to_string());
                    false
                }
            },
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

pub struct PeriodicSupervisor {
    inner: Arc<Inner>,
}

impl PeriodicSupervisor {
    pub fn new(
        sync: Arc<dyn SnapshotSync>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
        max_retries: u32,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::Stopped);
        Self {
            inner: Arc::new(Inner {
                sync,
                notifier,
                interval,
                breaker: CircuitBreaker::new(max_retries),
                state,
                task: Mutex::new(None),
            }),
        }
    }

    /// Start ticking. A no-op while already running; after a fatal stop it
    /// starts over with a zero failure count.
    pub fn start(&self) {
        let mut task = self.inner.task.lock();
        if self.state() == SupervisorState::Running {
            return;
        }
        if let Some(stale) = task.take() {
            stale.abort();
        }

        self.inner.breaker.reset();
        self.inner.state.send_replace(SupervisorState::Running);

        let period = self.inner.interval;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if !inner.tick().await {
                    break;
                }
            }
        }));
        info!(interval_ms = period.as_millis() as u64, "Supervisor started");
    }

    /// Cancel the timer. Idempotent.
    pub fn stop(&self) {
        let mut task = self.inner.task.lock();
        if let Some(handle) = task.take() {
            handle.abort();
        }
        let previous = self.inner.state.send_replace(SupervisorState::Stopped);
        if previous == SupervisorState::Running {
            info!("Supervisor stopped");
        }
    }

    pub fn state(&self) -> SupervisorState {
        *self.inner.state.borrow()
    }

    /// Watch state changes, including the fatal transition to `Stopped`
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.inner.state.subscribe()
    }

    /// Consecutive failures so far
    pub fn failures(&self) -> u32 {
        self.inner.breaker.failures()
    }
}
