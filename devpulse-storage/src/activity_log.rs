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

//! Per-project activity log files
//!
//! A log is read in full, appended in memory and written back in full. Entries
//! already on the remote are kept as raw JSON values, so anything another
//! writer put there survives the rewrite untouched.

use crate::error::{RemoteError, RemoteResult};
use crate::remote::{ConcurrencyToken, RemoteStore};
use devpulse_core::ActivityRecord;
use serde_json::Value;

/// Remote path of a project's activity log
pub fn activity_log_path(project: &str) -> String {
    format!("projects/{}/activity-log.json", path_segment(project))
}

/// Remote path of a project's summary snapshot
pub fn summary_path(project: &str) -> String {
    format!("projects/{}/summary.json", path_segment(project))
}

/// Encode a project name as exactly one path segment.
///
/// `%`, `/`, `\` and control characters are percent-escaped, and the
/// reserved names `.` and `..` are escaped whole, so distinct project names
/// always map to distinct files. The empty name becomes a lone `%`, which no
/// escaped name can produce.
fn path_segment(project: &str) -> String {
    match project {
        "" => return "%".to_string(),
        "." => return "%2E".to_string(),
        ".." => return "%2E%2E".to_string(),
        _ => {}
    }

    let mut encoded = String::with_capacity(project.len());
    for c in project.chars() {
        match c {
            '%' | '/' | '\\' => encoded.push_str(&format!("%{:02X}", c as u32)),
            c if c.is_control() => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    encoded.push_str(&format!("%{byte:02X}"));
                }
            }
            c => encoded.push(c),
        }
    }
    encoded
}

/// An activity log as read from the remote
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    pub entries: Vec<Value>,
    /// `None` when the file does not exist yet
    pub token: Option<ConcurrencyToken>,
}

impl ActivityLog {
    /// Parse remote content; blank content counts as an empty log
    pub fn parse(content: &str, token: Option<ConcurrencyToken>) -> RemoteResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self {
                entries: Vec::new(),
                token,
            });
        }
        match serde_json::from_str::<Value>(content)? {
            Value::Array(entries) => Ok(Self { entries, token }),
            other => Err(RemoteError::Serialization(format!(
                "activity log is not a JSON array (found {})",
                json_kind(&other)
            ))),
        }
    }

    /// Whether writing this log creates the remote file
    pub fn is_new(&self) -> bool {
        self.token.is_none()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append records after the existing entries, preserving their order
    pub fn append(&mut self, records: &[ActivityRecord]) -> RemoteResult<()> {
        for record in records {
            self.entries.push(serde_json::to_value(record)?);
        }
        Ok(())
    }

    /// Entries that parse as activity records; foreign entries are skipped
    pub fn records(&self) -> Vec<ActivityRecord> {
        self.entries
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect()
    }

    pub fn to_json(&self) -> RemoteResult<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read a project's log; a missing file is an empty log
pub async fn read_log(
    store: &dyn RemoteStore,
    repository: &str,
    project: &str,
) -> RemoteResult<ActivityLog> {
    match store.read(repository, &activity_log_path(project)).await? {
        Some(file) => ActivityLog::parse(&file.content, Some(file.token)),
        None => Ok(ActivityLog::default()),
    }
}

/// Write the whole log back, conditional on the token it was read with
pub async fn write_log(
    store: &dyn RemoteStore,
    repository: &str,
    project: &str,
    log: &ActivityLog,
    message: &str,
) -> RemoteResult<()> {
    let content = log.to_json()?;
    store
        .write(
            repository,
            &activity_log_path(project),
            &content,
            message,
            log.token.as_ref(),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use devpulse_core::detect_changes;
    use serde_json::json;

    #[test]
    fn test_paths() {
        assert_eq!(activity_log_path("web"), "projects/web/activity-log.json");
        assert_eq!(summary_path("a/b"), "projects/a%2Fb/summary.json");
        assert_eq!(activity_log_path(".."), "projects/%2E%2E/activity-log.json");
    }

    #[test]
    fn test_distinct_projects_get_distinct_paths() {
        let names = ["a/b", "a-b", "a%2Fb", "a\\b", "", "%", ".", "..", "%2E", "a\tb"];
        let paths: std::collections::HashSet<String> =
            names.iter().map(|name| activity_log_path(name)).collect();
        assert_eq!(paths.len(), names.len());

        for name in names {
            let path = activity_log_path(name);
            let segment = path
                .strip_prefix("projects/")
                .and_then(|rest| rest.strip_suffix("/activity-log.json"))
                .unwrap();
            assert!(!segment.contains('/') && !segment.contains('\\'));
        }
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(ActivityLog::parse("{\"id\":1}", None).is_err());
        assert!(ActivityLog::parse("  ", None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_preserves_foreign_entries() {
        let store = MemoryStore::with_repository("repo");
        store.put("repo", &activity_log_path("p"), "[{\"id\":1}]");

        let mut log = read_log(&store, "repo", "p").await.unwrap();
        assert!(!log.is_new());

        let record = ActivityRecord::new("f.js", "p", detect_changes("", "function x(){}"));
        log.append(std::slice::from_ref(&record)).unwrap();
        write_log(&store, "repo", "p", &log, "append").await.unwrap();

        let reread = read_log(&store, "repo", "p").await.unwrap();
        assert_eq!(reread.len(), 2);
        assert_eq!(reread.entries[0], json!({"id": 1}));
        assert_eq!(reread.records(), vec![record]);
    }

    #[tokio::test]
    async fn test_missing_log_is_new_and_empty() {
        let store = MemoryStore::with_repository("repo");
        let log = read_log(&store, "repo", "fresh").await.unwrap();
        assert!(log.is_new());
        assert!(log.is_empty());
    }
}
