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

//! Per-project activity buffering and batched remote flushes
//!
//! Records are buffered per project and written out by a periodic flush task
//! that starts lazily on the first enqueue. Each flush drains every non-empty
//! buffer and, per project:
//!
//! 1. reads the remote log (absent means an empty array)
//! 2. appends the drained records in enqueue order
//! 3. writes the whole array back, conditional on the token it read
//!
//! Writes to different projects are paced by `interProjectDelayMs`. A failed
//! write is logged and its records discarded, unless `requeueOnFailure` puts
//! them back at the front of the buffer.

use crate::error::{TrackerError, TrackerResult};
use devpulse_core::{ActivityRecord, TrackerConfig};
use devpulse_storage::{read_log, write_log, RemoteStore};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Queue tuning, usually taken from [`TrackerConfig`]
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Destination repository name
    pub repository: String,
    pub flush_interval: Duration,
    pub inter_project_delay: Duration,
    /// Pause after creating a remote file before the next write
    pub create_settle: Duration,
    pub max_queued_records: usize,
    pub requeue_on_failure: bool,
}

impl QueueSettings {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            repository: config.remote.repository.clone(),
            flush_interval: config.flush_interval(),
            inter_project_delay: config.inter_project_delay(),
            create_settle: config.create_settle(),
            max_queued_records: config.max_queued_records,
            requeue_on_failure: config.requeue_on_failure,
        }
    }
}

/// Outcome of one flush pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub projects_written: usize,
    pub records_written: usize,
    pub records_discarded: usize,
    pub records_requeued: usize,
    /// Another flush was already in flight, so this one did nothing
    pub skipped: bool,
}

struct Shared {
    store: Arc<dyn RemoteStore>,
    settings: QueueSettings,
    buffers: Mutex<BTreeMap<String, Vec<ActivityRecord>>>,
    known_projects: Mutex<BTreeSet<String>>,
    /// In-flight flag; periodic ticks only `try_lock` it
    flushing: tokio::sync::Mutex<()>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

/// Buffered, periodically flushed activity queue. Cheap to clone.
#[derive(Clone)]
pub struct ActivityQueue {
    shared: Arc<Shared>,
}

impl ActivityQueue {
    pub fn new(store: Arc<dyn RemoteStore>, settings: QueueSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                settings,
                buffers: Mutex::new(BTreeMap::new()),
                known_projects: Mutex::new(BTreeSet::new()),
                flushing: tokio::sync::Mutex::new(()),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.shared.settings
    }

    /// Append a record to `project`'s buffer and make sure the flush timer runs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, project: &str, record: ActivityRecord) -> TrackerResult<()> {
        let capacity = self.shared.settings.max_queued_records;
        {
            let mut buffers = self.shared.buffers.lock();
            let buffer = buffers.entry(project.to_string()).or_default();
            if buffer.len() >= capacity {
                return Err(TrackerError::QueueFull {
                    project: project.to_string(),
                    capacity,
                });
            }
            buffer.push(record);
        }
        self.shared.known_projects.lock().insert(project.to_string());
        self.ensure_timer();
        Ok(())
    }

    /// Records waiting for `project`
    pub fn pending(&self, project: &str) -> usize {
        self.shared
            .buffers
            .lock()
            .get(project)
            .map_or(0, Vec::len)
    }

    pub fn total_pending(&self) -> usize {
        self.shared.buffers.lock().values().map(Vec::len).sum()
    }

    /// Every project that has ever had a record enqueued
    pub fn known_projects(&self) -> Vec<String> {
        self.shared.known_projects.lock().iter().cloned().collect()
    }

    /// Register a project without enqueueing anything
    pub fn track_project(&self, project: &str) {
        self.shared.known_projects.lock().insert(project.to_string());
    }

    pub fn is_timer_running(&self) -> bool {
        self.shared
            .timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn ensure_timer(&self) {
        let mut timer = self.shared.timer.lock();
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let period = self.shared.settings.flush_interval;
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        debug!(interval_ms = period.as_millis() as u64, "Starting flush timer");

        *timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else { break };
                let report = ActivityQueue { shared }.flush().await;
                if report.records_written > 0 || report.records_discarded > 0 {
                    debug!(?report, "Periodic flush finished");
                }
            }
        }));
    }

    /// Flush every non-empty buffer once. Skipped if a flush is already running.
    pub async fn flush(&self) -> FlushReport {
        let Ok(_in_flight) = self.shared.flushing.try_lock() else {
            debug!("Flush already in progress, skipping");
            return FlushReport {
                skipped: true,
                ..FlushReport::default()
            };
        };
        self.flush_buffers().await
    }

    /// Stop the flush timer and write out whatever is still buffered,
    /// waiting for an in-flight flush to finish first.
    pub async fn shutdown(&self) -> FlushReport {
        // The timer may only be cancelled between ticks, never mid-write
        let _in_flight = self.shared.flushing.lock().await;
        if let Some(handle) = self.shared.timer.lock().take() {
            handle.abort();
        }
        let report = self.flush_buffers().await;
        info!(
            records = report.records_written,
            discarded = report.records_discarded,
            "Activity queue shut down"
        );
        report
    }

    async fn flush_buffers(&self) -> FlushReport {
        let projects: Vec<String> = self
            .shared
            .buffers
            .lock()
            .iter()
            .filter(|(_, buffer)| !buffer.is_empty())
            .map(|(project, _)| project.clone())
            .collect();

        let settings = &self.shared.settings;
        let mut report = FlushReport::default();
        let mut previous_created = false;

        for (index, project) in projects.iter().enumerate() {
            if index > 0 {
                if previous_created && !settings.create_settle.is_zero() {
                    sleep(settings.create_settle).await;
                }
                sleep(settings.inter_project_delay).await;
            }

            let snapshot = match self.shared.buffers.lock().get_mut(project) {
                Some(buffer) => std::mem::take(buffer),
                None => Vec::new(),
            };
            if snapshot.is_empty() {
                previous_created = false;
                continue;
            }

            match self.write_project(project, &snapshot).await {
                Ok(created) => {
                    debug!(project, records = snapshot.len(), created, "Flushed project");
                    report.projects_written += 1;
                    report.records_written += snapshot.len();
                    previous_created = created;
                }
                Err(e) => {
                    previous_created = false;
                    if settings.requeue_on_failure {
                        warn!(project, records = snapshot.len(), error = %e, "Flush failed, requeueing records");
                        report.records_requeued += snapshot.len();
                        report.records_discarded += self.requeue_front(project, snapshot);
                    } else {
                        warn!(project, records = snapshot.len(), error = %e, "Flush failed, discarding records");
                        report.records_discarded += snapshot.len();
                    }
                }
            }
        }

        report
    }

    /// Returns whether the remote log was created by this write
    async fn write_project(&self, project: &str, records: &[ActivityRecord]) -> TrackerResult<bool> {
        let store = self.shared.store.as_ref();
        let repository = &self.shared.settings.repository;

        let mut log = read_log(store, repository, project).await?;
        let created = log.is_new();
        log.append(records)?;

        let message = format!("Record {} activity entries for {}", records.len(), project);
        write_log(store, repository, project, &log, &message).await?;
        Ok(created)
    }

    /// Put `snapshot` back ahead of anything enqueued since, keeping the
    /// buffer within `max_queued_records`. Returns how many of the newest
    /// records were dropped to make room.
    fn requeue_front(&self, project: &str, mut snapshot: Vec<ActivityRecord>) -> usize {
        let capacity = self.shared.settings.max_queued_records;
        let mut buffers = self.shared.buffers.lock();
        let buffer = buffers.entry(project.to_string()).or_default();
        snapshot.append(buffer);

        let overflow = snapshot.len().saturating_sub(capacity);
        if overflow > 0 {
            warn!(project, dropped = overflow, capacity, "Requeue overflowed the buffer, dropping newest records");
            snapshot.truncate(capacity);
        }
        *buffer = snapshot;
        overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devpulse_core::detect_changes;
    use async_trait::async_trait;
    use devpulse_storage::{activity_log_path, ConcurrencyToken, MemoryStore, RemoteFile, RemoteResult};
    use serde_json::{json, Value};

    const REPO: &str = "activity";

    /// Holds every write for `delay` before passing it on
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    impl SlowStore {
        fn new(delay: Duration) -> Self {
            Self {
                inner: MemoryStore::with_repository(REPO),
                delay,
            }
        }
    }

    #[async_trait]
    impl RemoteStore for SlowStore {
        async fn exists(&self, name: &str) -> RemoteResult<bool> {
            self.inner.exists(name).await
        }

        async fn read(&self, name: &str, path: &str) -> RemoteResult<Option<RemoteFile>> {
            self.inner.read(name, path).await
        }

        async fn write(
            &self,
            name: &str,
            path: &str,
            content: &str,
            message: &str,
            token: Option<&ConcurrencyToken>,
        ) -> RemoteResult<()> {
            sleep(self.delay).await;
            self.inner.write(name, path, content, message, token).await
        }
    }

    fn settings() -> QueueSettings {
        QueueSettings {
            repository: REPO.to_string(),
            flush_interval: Duration::from_millis(5000),
            inter_project_delay: Duration::from_millis(1000),
            create_settle: Duration::ZERO,
            max_queued_records: 10,
            requeue_on_failure: false,
        }
    }

    fn record(file: &str, project: &str) -> ActivityRecord {
        ActivityRecord::new(file, project, detect_changes("", "function f(){}"))
    }

    fn remote_log(store: &MemoryStore, project: &str) -> Vec<Value> {
        let content = store.get(REPO, &activity_log_path(project)).unwrap_or_default();
        serde_json::from_str(&content).unwrap()
    }

    #[tokio::test]
    async fn test_flush_merges_with_existing_log() {
        let store = Arc::new(MemoryStore::with_repository(REPO));
        store.put(REPO, &activity_log_path("p"), "[{\"id\":1}]");
        let queue = ActivityQueue::new(store.clone(), settings());

        let r1 = record("a.js", "p");
        let r2 = record("b.js", "p");
        queue.enqueue("p", r1.clone()).unwrap();
        queue.enqueue("p", r2.clone()).unwrap();

        let report = queue.flush().await;
        assert_eq!(report.records_written, 2);
        assert_eq!(queue.pending("p"), 0);

        let log = remote_log(&store, "p");
        assert_eq!(
            log,
            vec![
                json!({"id": 1}),
                serde_json::to_value(&r1).unwrap(),
                serde_json::to_value(&r2).unwrap()
            ]
        );
    }

    #[tokio::test]
    async fn test_first_flush_creates_log() {
        let store = Arc::new(MemoryStore::with_repository(REPO));
        let queue = ActivityQueue::new(store.clone(), settings());
        queue.enqueue("new", record("a.js", "new")).unwrap();

        queue.flush().await;
        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].created);
        assert_eq!(remote_log(&store, "new").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_discards_by_default() {
        let store = Arc::new(MemoryStore::with_repository(REPO));
        let queue = ActivityQueue::new(store.clone(), settings());
        queue.enqueue("p", record("a.js", "p")).unwrap();
        queue.enqueue("p", record("b.js", "p")).unwrap();

        store.fail_next_writes(1);
        let report = queue.flush().await;
        assert_eq!(report.records_discarded, 2);
        assert_eq!(queue.pending("p"), 0);
        assert!(store.get(REPO, &activity_log_path("p")).is_none());
    }

    #[tokio::test]
    async fn test_failed_write_requeues_when_enabled() {
        let store = Arc::new(MemoryStore::with_repository(REPO));
        let queue = ActivityQueue::new(
            store.clone(),
            QueueSettings {
                requeue_on_failure: true,
                ..settings()
            },
        );
        let r1 = record("a.js", "p");
        let r2 = record("b.js", "p");
        queue.enqueue("p", r1.clone()).unwrap();

        store.fail_next_writes(1);
        let report = queue.flush().await;
        assert_eq!(report.records_requeued, 1);
        assert_eq!(queue.pending("p"), 1);

        queue.enqueue("p", r2.clone()).unwrap();
        queue.flush().await;
        let log = remote_log(&store, "p");
        assert_eq!(
            log,
            vec![serde_json::to_value(&r1).unwrap(), serde_json::to_value(&r2).unwrap()]
        );
    }

    #[tokio::test]
    async fn test_failed_write_is_attempted_once() {
        let store = Arc::new(MemoryStore::with_repository(REPO));
        let queue = ActivityQueue::new(store.clone(), settings());
        queue.enqueue("p", record("a.js", "p")).unwrap();

        store.fail_writes_to(&activity_log_path("p"));
        let report = queue.flush().await;
        assert_eq!(report.records_discarded, 1);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_queue_full() {
        let store = Arc::new(MemoryStore::with_repository(REPO));
        let queue = ActivityQueue::new(
            store,
            QueueSettings {
                max_queued_records: 2,
                ..settings()
            },
        );
        queue.enqueue("p", record("a.js", "p")).unwrap();
        queue.enqueue("p", record("b.js", "p")).unwrap();
        let err = queue.enqueue("p", record("c.js", "p")).unwrap_err();
        assert!(matches!(err, TrackerError::QueueFull { capacity: 2, .. }));

        // Other projects have their own bound
        queue.enqueue("q", record("a.js", "q")).unwrap();
        assert_eq!(queue.known_projects(), vec!["p".to_string(), "q".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_project_delay() {
        let store = Arc::new(MemoryStore::with_repository(REPO));
        let queue = ActivityQueue::new(store, settings());
        for project in ["a", "b", "c"] {
            queue.enqueue(project, record("f.js", project)).unwrap();
        }

        let started = Instant::now();
        let report = queue.flush().await;
        assert_eq!(report.projects_written, 3);
        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert!(started.elapsed() < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_flush_is_skipped() {
        let store = Arc::new(MemoryStore::with_repository(REPO));
        let queue = ActivityQueue::new(store, settings());
        queue.enqueue("a", record("f.js", "a")).unwrap();
        queue.enqueue("b", record("f.js", "b")).unwrap();

        let background = queue.clone();
        let first = tokio::spawn(async move { background.flush().await });
        // Let the first flush reach its inter-project pause
        sleep(Duration::from_millis(10)).await;

        let second = queue.flush().await;
        assert!(second.skipped);
        assert_eq!(second.records_written, 0);

        let first = first.await.unwrap();
        assert!(!first.skipped);
        assert_eq!(first.projects_written, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_periodically() {
        let store = Arc::new(MemoryStore::with_repository(REPO));
        let queue = ActivityQueue::new(store.clone(), settings());
        assert!(!queue.is_timer_running());

        queue.enqueue("p", record("a.js", "p")).unwrap();
        assert!(queue.is_timer_running());

        sleep(Duration::from_millis(4900)).await;
        assert_eq!(queue.pending("p"), 1);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(queue.pending("p"), 0);
        assert_eq!(remote_log(&store, "p").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_and_stops_timer() {
        let store = Arc::new(MemoryStore::with_repository(REPO));
        let queue = ActivityQueue::new(store.clone(), settings());
        queue.enqueue("p", record("a.js", "p")).unwrap();

        let report = queue.shutdown().await;
        assert_eq!(report.records_written, 1);
        assert!(!queue.is_timer_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_periodic_write() {
        let store = Arc::new(SlowStore::new(Duration::from_millis(500)));
        let queue = ActivityQueue::new(store.clone(), settings());
        queue.enqueue("p", record("a.js", "p")).unwrap();

        // The tick at 5000ms has drained the buffer and is mid-write
        sleep(Duration::from_millis(5100)).await;
        assert_eq!(queue.pending("p"), 0);

        let report = queue.shutdown().await;
        assert_eq!(report.records_written, 0);
        assert_eq!(remote_log(&store.inner, "p").len(), 1);
        assert!(!queue.is_timer_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_stays_within_capacity() {
        let store = Arc::new(SlowStore::new(Duration::from_millis(500)));
        let queue = ActivityQueue::new(
            store.clone(),
            QueueSettings {
                max_queued_records: 2,
                requeue_on_failure: true,
                ..settings()
            },
        );
        let r1 = record("a.js", "p");
        let r2 = record("b.js", "p");
        queue.enqueue("p", r1.clone()).unwrap();
        queue.enqueue("p", r2.clone()).unwrap();

        store.inner.fail_next_writes(1);
        let background = queue.clone();
        let failing = tokio::spawn(async move { background.flush().await });
        sleep(Duration::from_millis(100)).await;

        // The buffer was drained, so these fit while the write is pending
        queue.enqueue("p", record("c.js", "p")).unwrap();
        queue.enqueue("p", record("d.js", "p")).unwrap();

        let report = failing.await.unwrap();
        assert_eq!(report.records_requeued, 2);
        assert_eq!(report.records_discarded, 2);
        assert_eq!(queue.pending("p"), 2);

        queue.flush().await;
        assert_eq!(
            remote_log(&store.inner, "p"),
            vec![serde_json::to_value(&r1).unwrap(), serde_json::to_value(&r2).unwrap()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_after_creating_a_log() {
        let store = Arc::new(MemoryStore::with_repository(REPO));
        let queue = ActivityQueue::new(
            store,
            QueueSettings {
                create_settle: Duration::from_millis(500),
                ..settings()
            },
        );
        queue.enqueue("a", record("f.js", "a")).unwrap();
        queue.enqueue("b", record("f.js", "b")).unwrap();

        let started = Instant::now();
        let report = queue.flush().await;
        assert_eq!(report.projects_written, 2);
        // settle after creating "a", then the inter-project delay
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert!(started.elapsed() < Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_settle_after_an_update() {
        let store = Arc::new(MemoryStore::with_repository(REPO));
        store.put(REPO, &activity_log_path("a"), "[]");
        let queue = ActivityQueue::new(
            store,
            QueueSettings {
                create_settle: Duration::from_millis(500),
                ..settings()
            },
        );
        queue.enqueue("a", record("f.js", "a")).unwrap();
        queue.enqueue("b", record("f.js", "b")).unwrap();

        let started = Instant::now();
        queue.flush().await;
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert!(started.elapsed() < Duration::from_millis(1100));
    }
}
