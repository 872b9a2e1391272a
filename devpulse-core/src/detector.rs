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

//! Heuristic change detector
//!
//! Compares two snapshots of the same file and produces a [`ChangeSummary`].
//! This is deliberately not a parser: function names come from a single
//! declaration pattern, and line statistics are derived from line counts only.
//!
//! - `functions.added`: names declared only in the new snapshot
//! - `functions.removed`: names declared only in the old snapshot
//! - `functions.modified`: always empty
//! - `lineStats.addedLines`: `new_lines - old_lines` (signed)
//! - `lineStats.modifiedLines`: `|new_lines - old_lines|`
//! - `lineStats.totalLines`: `new_lines`

use crate::activity::{ChangeSummary, LineStats, NameChanges};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// `function foo`, `fn foo`, `def foo`
static FUNCTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:function|fn|def)\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap()
});

/// Declared function names in order of first appearance, without duplicates
pub fn extract_function_names(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    FUNCTION_DECL
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Number of lines in `content`; empty content has none
pub fn line_count(content: &str) -> i64 {
    content.lines().count() as i64
}

/// Diff two snapshots of one file
pub fn detect_changes(old: &str, new: &str) -> ChangeSummary {
    let old_names = extract_function_names(old);
    let new_names = extract_function_names(new);

    let old_set: HashSet<&str> = old_names.iter().map(String::as_str).collect();
    let new_set: HashSet<&str> = new_names.iter().map(String::as_str).collect();

    let functions = NameChanges {
        added: new_names
            .iter()
            .filter(|name| !old_set.contains(name.as_str()))
            .cloned()
            .collect(),
        modified: Vec::new(),
        removed: old_names
            .iter()
            .filter(|name| !new_set.contains(name.as_str()))
            .cloned()
            .collect(),
    };

    let old_lines = line_count(old);
    let new_lines = line_count(new);
    let delta = new_lines - old_lines;

    ChangeSummary::new(
        functions,
        LineStats {
            added_lines: delta,
            modified_lines: delta.abs(),
            total_lines: new_lines,
        },
    )
}
