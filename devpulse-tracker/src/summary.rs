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

//! Per-project summary snapshots written by the supervisor

use crate::error::{TrackerError, TrackerResult};
use crate::queue::ActivityQueue;
use crate::supervisor::SnapshotSync;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devpulse_core::ActivityRecord;
use devpulse_storage::{read_log, summary_path, RemoteStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Aggregate view of a project's activity log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub project: String,
    pub total_records: usize,
    pub files_touched: usize,
    pub functions_added: usize,
    pub functions_removed: usize,
    /// Sum of the signed line-count deltas
    pub lines_added: i64,
    pub lines_modified: i64,
    pub first_activity: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
}

impl ProjectSummary {
    pub fn from_records(project: &str, records: &[ActivityRecord], generated_at: DateTime<Utc>) -> Self {
        let files: BTreeSet<&str> = records.iter().map(|r| r.file.as_str()).collect();

        Self {
            project: project.to_string(),
            total_records: records.len(),
            files_touched: files.len(),
            functions_added: records.iter().map(|r| r.changes.functions.added.len()).sum(),
            functions_removed: records.iter().map(|r| r.changes.functions.removed.len()).sum(),
            lines_added: records.iter().map(|r| r.changes.line_stats.added_lines).sum(),
            lines_modified: records.iter().map(|r| r.changes.line_stats.modified_lines).sum(),
            first_activity: records.iter().map(|r| r.timestamp).min(),
            last_activity: records.iter().map(|r| r.timestamp).max(),
            generated_at,
        }
    }
}

/// Rewrites `projects/<project>/summary.json` for every known project
pub struct SummarySync {
    store: Arc<dyn RemoteStore>,
    repository: String,
    queue: ActivityQueue,
}

impl SummarySync {
    pub fn new(store: Arc<dyn RemoteStore>, repository: impl Into<String>, queue: ActivityQueue) -> Self {
        Self {
            store,
            repository: repository.into(),
            queue,
        }
    }

    /// Build the summary of one project from its remote log
    pub async fn summarize(&self, project: &str) -> TrackerResult<ProjectSummary> {
        let log = read_log(self.store.as_ref(), &self.repository, project).await?;
        Ok(ProjectSummary::from_records(project, &log.records(), Utc::now()))
    }

    /// Summarize `project` and write the result
    pub async fn sync_project(&self, project: &str) -> TrackerResult<ProjectSummary> {
        let summary = self.summarize(project).await?;
        let path = summary_path(project);
        let content = serde_json::to_string_pretty(&summary)
            .map_err(|e| TrackerError::Remote(e.into()))?;

        let existing = self.store.read(&self.repository, &path).await?;
        self.store
            .write(
                &self.repository,
                &path,
                &content,
                &format!("Update activity summary for {project}"),
                existing.as_ref().map(|file| &file.token),
            )
            .await?;

        debug!(project, records = summary.total_records, "Summary written");
        Ok(summary)
    }
}

#[async_trait]
impl SnapshotSync for SummarySync {
    /// Every project is attempted; the first failure fails the whole sync
    async fn sync_all(&self) -> TrackerResult<()> {
        let mut first_error = None;
        for project in self.queue.known_projects() {
            if let Err(e) = self.sync_project(&project).await {
                warn!(project, error = %e, "Summary sync failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueSettings;
    use chrono::TimeZone;
    use devpulse_core::{detect_changes, TrackerConfig};
    use devpulse_storage::{activity_log_path, MemoryStore};

    fn at(secs: i64, file: &str, old: &str, new: &str) -> ActivityRecord {
        let ts = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        ActivityRecord::at(file, "p", detect_changes(old, new), ts)
    }

    #[test]
    fn test_aggregation() {
        let records = vec![
            at(10, "a.js", "", "function a(){}\nfunction b(){}"),
            at(5, "b.js", "function x(){}\n\n", "function y(){}"),
            at(20, "a.js", "function a(){}\nfunction b(){}", "function a(){}\nfunction b(){}\n// c"),
        ];
        let summary = ProjectSummary::from_records("p", &records, Utc::now());

        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.files_touched, 2);
        assert_eq!(summary.functions_added, 3);
        assert_eq!(summary.functions_removed, 1);
        assert_eq!(summary.lines_added, 2 - 1 + 1);
        assert_eq!(summary.lines_modified, 2 + 1 + 1);
        assert_eq!(summary.first_activity, Some(records[1].timestamp));
        assert_eq!(summary.last_activity, Some(records[2].timestamp));
    }

    #[test]
    fn test_empty_log() {
        let summary = ProjectSummary::from_records("p", &[], Utc::now());
        assert_eq!(summary.total_records, 0);
        assert!(summary.first_activity.is_none());
    }

    #[tokio::test]
    async fn test_sync_writes_summary_for_known_projects() {
        let store = Arc::new(MemoryStore::with_repository("repo"));
        let record = at(0, "a.js", "", "function a(){}");
        store.put(
            "repo",
            &activity_log_path("p"),
            serde_json::to_string(&vec![record]).unwrap(),
        );

        let mut config = TrackerConfig::default();
        config.remote.repository = "repo".to_string();
        let queue = ActivityQueue::new(store.clone(), QueueSettings::from_config(&config));
        queue.track_project("p");

        let sync = SummarySync::new(store.clone(), "repo", queue);
        sync.sync_all().await.unwrap();
        // Second pass updates the existing file with its token
        sync.sync_all().await.unwrap();

        let written: ProjectSummary =
            serde_json::from_str(&store.get("repo", &summary_path("p")).unwrap()).unwrap();
        assert_eq!(written.total_records, 1);
        assert_eq!(written.functions_added, 1);
        assert_eq!(store.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_fails_when_any_project_fails() {
        let store = Arc::new(MemoryStore::with_repository("repo"));
        let mut config = TrackerConfig::default();
        config.remote.repository = "repo".to_string();
        let queue = ActivityQueue::new(store.clone(), QueueSettings::from_config(&config));
        queue.track_project("a");
        queue.track_project("b");

        store.fail_writes_to(&summary_path("a"));
        let sync = SummarySync::new(store.clone(), "repo", queue);
        assert!(sync.sync_all().await.is_err());
        // "b" was still attempted
        assert!(store.get("repo", &summary_path("b")).is_some());
    }
}
