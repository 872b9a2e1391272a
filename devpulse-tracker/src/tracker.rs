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

//! Tracker context: wires cache, logger, queue and supervisor together

use crate::error::{TrackerError, TrackerResult};
use crate::logger::{ActivityLogger, CaptureOutcome};
use crate::notifier::Notifier;
use crate::queue::{ActivityQueue, FlushReport, QueueSettings};
use crate::summary::SummarySync;
use crate::supervisor::{PeriodicSupervisor, SnapshotSync};
use async_trait::async_trait;
use devpulse_core::TrackerConfig;
use devpulse_storage::RemoteStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const FALLBACK_PROJECT: &str = "default";

/// A file save reported by the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveEvent {
    pub file: String,
    pub content: String,
    pub project: String,
}

impl SaveEvent {
    pub fn new(file: impl Into<String>, content: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            content: content.into(),
            project: project.into(),
        }
    }

    /// Event whose project is derived from the file's location on disk
    pub fn for_path(file: impl Into<String>, content: impl Into<String>) -> Self {
        let file = file.into();
        let project = project_name_for(Path::new(&file));
        Self::new(file, content, project)
    }
}

/// Name of the project containing `path`: the nearest ancestor directory
/// holding `.git`, else the immediate parent directory.
pub fn project_name_for(path: &Path) -> String {
    let start = if path.is_dir() { Some(path) } else { path.parent() };

    let repo_root = start
        .into_iter()
        .flat_map(Path::ancestors)
        .find(|dir| dir.join(".git").exists());

    repo_root
        .or(start)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_PROJECT.to_string())
}

/// What the host editor drives
#[async_trait]
pub trait EditorPort: Send + Sync {
    async fn on_save_event(&self, event: SaveEvent) -> CaptureOutcome;
    fn start(&self);
    fn stop(&self);
}

pub struct Tracker {
    config: TrackerConfig,
    queue: ActivityQueue,
    logger: ActivityLogger,
    summaries: Arc<SummarySync>,
    supervisor: PeriodicSupervisor,
}

impl Tracker {
    /// Validate `config`, confirm the destination repository exists and wire
    /// every component. Nothing runs until [`Tracker::start`].
    pub async fn activate(
        config: TrackerConfig,
        remote: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
    ) -> TrackerResult<Self> {
        config.validate()?;

        let repository = config.remote.repository.clone();
        let exists = remote.exists(&repository).await.map_err(|e| {
            TrackerError::Configuration(format!("Cannot reach repository {repository}: {e}"))
        })?;
        if !exists {
            let message = format!("Destination repository {repository} does not exist");
            notifier.notify_error(&message);
            return Err(TrackerError::Configuration(message));
        }

        let queue = ActivityQueue::new(remote.clone(), QueueSettings::from_config(&config));
        let logger = ActivityLogger::new(&config, Arc::new(queue.clone()), notifier.clone());
        let summaries = Arc::new(SummarySync::new(remote, repository.clone(), queue.clone()));
        let supervisor = PeriodicSupervisor::new(
            summaries.clone(),
            notifier,
            config.supervisor_interval(),
            config.max_supervisor_retries,
        );

        info!(repository = %repository, "Tracker activated");
        Ok(Self {
            config,
            queue,
            logger,
            summaries,
            supervisor,
        })
    }

    /// Enable capture and start the supervisor
    pub fn start(&self) {
        self.logger.start();
        self.supervisor.start();
    }

    /// Disable capture and stop the supervisor. Buffered records still flush.
    pub fn stop(&self) {
        self.logger.stop();
        self.supervisor.stop();
    }

    pub async fn on_save_event(&self, event: SaveEvent) -> CaptureOutcome {
        self.logger
            .capture(&event.file, &event.content, &event.project)
            .await
    }

    /// Run one summary sync immediately, outside the supervisor's schedule
    pub async fn snapshot_now(&self) -> TrackerResult<()> {
        self.summaries.sync_all().await
    }

    /// Stop everything and flush what is left
    pub async fn shutdown(&self) -> FlushReport {
        self.stop();
        self.queue.shutdown().await
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn queue(&self) -> &ActivityQueue {
        &self.queue
    }

    pub fn logger(&self) -> &ActivityLogger {
        &self.logger
    }

    pub fn supervisor(&self) -> &PeriodicSupervisor {
        &self.supervisor
    }
}

#[async_trait]
impl EditorPort for Tracker {
    async fn on_save_event(&self, event: SaveEvent) -> CaptureOutcome {
        Tracker::on_save_event(self, event).await
    }

    fn start(&self) {
        Tracker::start(self)
    }

    fn stop(&self) {
        Tracker::stop(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::RecordingNotifier;
    use crate::supervisor::SupervisorState;
    use devpulse_storage::MemoryStore;

    fn config() -> TrackerConfig {
        let mut config = TrackerConfig::default();
        config.remote.repository = "activity".to_string();
        config
    }

    #[test]
    fn test_project_name_from_git_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("webapp");
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("src/components")).unwrap();
        let file = root.join("src/components/button.js");
        std::fs::write(&file, "").unwrap();

        assert_eq!(project_name_for(&file), "webapp");
    }

    #[test]
    fn test_project_name_falls_back_to_parent() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        let file = scratch.join("notes.py");
        std::fs::write(&file, "").unwrap();

        assert_eq!(project_name_for(&file), "scratch");
        assert_eq!(project_name_for(Path::new("notes.py")), FALLBACK_PROJECT);
    }

    #[tokio::test]
    async fn test_activate_requires_repository() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let result = Tracker::activate(config(), store, notifier.clone()).await;
        assert!(matches!(result, Err(TrackerError::Configuration(_))));
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_activate_rejects_invalid_config() {
        let store = Arc::new(MemoryStore::with_repository("activity"));
        let mut bad = config();
        bad.retry_attempts = 0;

        let result = Tracker::activate(bad, store, Arc::new(RecordingNotifier::new())).await;
        assert!(matches!(result, Err(TrackerError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_start_stop() {
        let store = Arc::new(MemoryStore::with_repository("activity"));
        let tracker = Tracker::activate(config(), store, Arc::new(RecordingNotifier::new()))
            .await
            .unwrap();

        let event = SaveEvent::new("a.js", "function a(){}", "p");
        assert_eq!(tracker.on_save_event(event.clone()).await, CaptureOutcome::Disabled);

        tracker.start();
        assert_eq!(tracker.supervisor().state(), SupervisorState::Running);
        assert_eq!(
            tracker.on_save_event(event.clone()).await,
            CaptureOutcome::Submitted { attempts: 1 }
        );
        assert_eq!(tracker.queue().pending("p"), 1);

        tracker.stop();
        assert_eq!(tracker.supervisor().state(), SupervisorState::Stopped);
        assert!(tracker.logger().cache().is_empty());
        assert_eq!(tracker.on_save_event(event).await, CaptureOutcome::Disabled);
    }
}
