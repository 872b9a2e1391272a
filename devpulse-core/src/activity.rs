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

//! Activity record schema
//!
//! One [`ActivityRecord`] is produced per captured save event. Records are
//! serialized into the remote activity log with this layout:
//!
//! ```text
//! {
//!   "file": "src/main.ts",
//!   "project": "my-app",
//!   "timestamp": "2025-03-01T12:00:00Z",
//!   "changes": {
//!     "functions": { "added": [..], "modified": [], "removed": [..] },
//!     "classes":   { "added": [],   "modified": [], "removed": [] },
//!     "imports":   { "added": [],   "modified": [], "removed": [] },
//!     "lineStats": { "addedLines": 1, "modifiedLines": 1, "totalLines": 2 },
//!     "type": ["function_added", "line_modified"]
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Change Classification
// ============================================================================

/// Category tag attached to a change summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    FunctionAdded,
    FunctionModified,
    FunctionRemoved,
    LineModified,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::FunctionAdded => "function_added",
            ChangeType::FunctionModified => "function_modified",
            ChangeType::FunctionRemoved => "function_removed",
            ChangeType::LineModified => "line_modified",
        }
    }
}

// ============================================================================
// Change Summary
// ============================================================================

/// Added / modified / removed identifiers of one kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameChanges {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl NameChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Line statistics between two snapshots.
///
/// `added_lines` is the signed difference in line count; `modified_lines` is
/// its absolute value. Neither is a true diff line count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStats {
    pub added_lines: i64,
    pub modified_lines: i64,
    pub total_lines: i64,
}

/// Structured summary of one edit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub functions: NameChanges,
    /// Always empty; kept for the remote log layout
    #[serde(default)]
    pub classes: NameChanges,
    /// Always empty; kept for the remote log layout
    #[serde(default)]
    pub imports: NameChanges,
    #[serde(rename = "lineStats")]
    pub line_stats: LineStats,
    #[serde(rename = "type")]
    pub classified_types: BTreeSet<ChangeType>,
}

impl ChangeSummary {
    /// Build a summary, deriving `classified_types` from the counts
    pub fn new(functions: NameChanges, line_stats: LineStats) -> Self {
        let classified_types = classify(&functions, &line_stats);
        Self {
            functions,
            classes: NameChanges::default(),
            imports: NameChanges::default(),
            line_stats,
            classified_types,
        }
    }

    pub fn functions_added(&self) -> &[String] {
        &self.functions.added
    }

    pub fn functions_removed(&self) -> &[String] {
        &self.functions.removed
    }

    pub fn functions_modified(&self) -> &[String] {
        &self.functions.modified
    }

    /// True when nothing at all was detected
    pub fn is_unchanged(&self) -> bool {
        self.classified_types.is_empty()
    }
}

fn classify(functions: &NameChanges, lines: &LineStats) -> BTreeSet<ChangeType> {
    let mut types = BTreeSet::new();
    if !functions.added.is_empty() {
        types.insert(ChangeType::FunctionAdded);
    }
    if !functions.modified.is_empty() {
        types.insert(ChangeType::FunctionModified);
    }
    if !functions.removed.is_empty() {
        types.insert(ChangeType::FunctionRemoved);
    }
    if lines.modified_lines != 0 {
        types.insert(ChangeType::LineModified);
    }
    types
}

// ============================================================================
// Activity Record
// ============================================================================

/// A single captured edit, immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// File identity (usually a workspace-relative or absolute path)
    pub file: String,
    pub project: String,
    pub timestamp: DateTime<Utc>,
    pub changes: ChangeSummary,
}

impl ActivityRecord {
    /// Create a record stamped with the current UTC time
    pub fn new(file: impl Into<String>, project: impl Into<String>, changes: ChangeSummary) -> Self {
        Self::at(file, project, changes, Utc::now())
    }

    pub fn at(
        file: impl Into<String>,
        project: impl Into<String>,
        changes: ChangeSummary,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            file: file.into(),
            project: project.into(),
            timestamp,
            changes,
        }
    }
}
