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

//! Capture entry point: snapshot diff, record, bounded-retry submission

use crate::error::TrackerResult;
use crate::notifier::Notifier;
use crate::queue::ActivityQueue;
use async_trait::async_trait;
use devpulse_core::{ActivityRecord, ContentCache, RetryPolicy, TrackerConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Destination for captured records
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, record: ActivityRecord) -> TrackerResult<()>;
}

#[async_trait]
impl Submitter for ActivityQueue {
    async fn submit(&self, record: ActivityRecord) -> TrackerResult<()> {
        let project = record.project.clone();
        self.enqueue(&project, record)
    }
}

/// What happened to one capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Tracking is off; nothing was computed or cached
    Disabled,
    Submitted { attempts: u32 },
    /// Every attempt failed; the operator was notified and the record dropped
    Dropped { attempts: u32 },
}

pub struct ActivityLogger {
    enabled: AtomicBool,
    cache: ContentCache,
    submitter: Arc<dyn Submitter>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
}

impl ActivityLogger {
    /// A logger in the disabled state
    pub fn new(
        config: &TrackerConfig,
        submitter: Arc<dyn Submitter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            cache: ContentCache::new(config.max_cached_files),
            submitter,
            notifier,
            retry: RetryPolicy::linear(config.retry_attempts, config.retry_delay()),
        }
    }

    pub fn start(&self) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            info!("Activity tracking started");
        }
    }

    /// Disable capture and forget every baseline. Retries already running
    /// are left to finish.
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.cache.clear();
        info!("Activity tracking stopped");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub async fn capture(&self, file: &str, content: &str, project: &str) -> CaptureOutcome {
        if !self.is_enabled() {
            return CaptureOutcome::Disabled;
        }

        let changes = self.cache.capture(file, content);
        let record = ActivityRecord::new(file, project, changes);
        let submitter = &self.submitter;

        let result = self
            .retry
            .execute(|_attempt| {
                let record = record.clone();
                async move { submitter.submit(record).await }
            })
            .await;

        match result {
            Ok(((), attempts)) => {
                debug!(file, project, attempts, "Activity recorded");
                CaptureOutcome::Submitted { attempts }
            }
            Err(exhausted) => {
                error!(file, project, error = %exhausted, "Dropping activity record");
                self.notifier.notify_error(&format!(
                    "Failed to record activity for {} after {} attempts",
                    file, exhausted.attempts
                ));
                CaptureOutcome::Dropped {
                    attempts: exhausted.attempts,
                }
            }
        }
    }
}
