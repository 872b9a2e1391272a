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

//! Content snapshot cache
//!
//! Holds the last-seen content of each file so the next save can be diffed
//! against it.
//!
//! ## Eviction
//!
//! Strict insertion order: when full, the entry that was *first inserted*
//! longest ago is evicted. Overwriting an existing key keeps its original
//! position, so this is FIFO rather than LRU.
//!
//! ## Thread Safety
//!
//! A single `parking_lot::Mutex` guards the map and the order queue. It is
//! never held across an await point.

use crate::activity::ChangeSummary;
use crate::detector::detect_changes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Default maximum number of cached files
pub const DEFAULT_MAX_CACHED_FILES: usize = 100;

#[derive(Debug, Default)]
struct CacheInner {
    snapshots: HashMap<String, String>,
    /// Keys in first-insertion order
    insertion_order: VecDeque<String>,
}

/// Bounded map from file identity to last-seen content
#[derive(Debug)]
pub struct ContentCache {
    max_entries: usize,
    inner: Mutex<CacheInner>,
}

impl ContentCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Diff `content` against the cached baseline for `file`, then store it
    /// as the new baseline.
    ///
    /// A missing baseline is treated as an empty file.
    pub fn capture(&self, file: &str, content: &str) -> ChangeSummary {
        let mut inner = self.inner.lock();
        let previous = inner.snapshots.get(file).map(String::as_str).unwrap_or("");
        let summary = detect_changes(previous, content);
        Self::store(&mut inner, self.max_entries, file, content.to_string());
        summary
    }

    /// Last-seen content for `file`
    pub fn get(&self, file: &str) -> Option<String> {
        self.inner.lock().snapshots.get(file).cloned()
    }

    /// Store a snapshot, returning the evicted file identity if any
    pub fn insert(&self, file: &str, content: impl Into<String>) -> Option<String> {
        let mut inner = self.inner.lock();
        Self::store(&mut inner, self.max_entries, file, content.into())
    }

    pub fn contains(&self, file: &str) -> bool {
        self.inner.lock().snapshots.contains_key(file)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Drop every baseline
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.snapshots.clear();
        inner.insertion_order.clear();
    }

    fn store(
        inner: &mut CacheInner,
        max_entries: usize,
        file: &str,
        content: String,
    ) -> Option<String> {
        if let Some(existing) = inner.snapshots.get_mut(file) {
            *existing = content;
            return None;
        }

        if max_entries == 0 {
            return None;
        }

        let mut evicted = None;
        while inner.snapshots.len() >= max_entries {
            match inner.insertion_order.pop_front() {
                Some(oldest) => {
                    inner.snapshots.remove(&oldest);
                    evicted = Some(oldest);
                }
                None => break,
            }
        }

        inner.insertion_order.push_back(file.to_string());
        inner.snapshots.insert(file.to_string(), content);
        evicted
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHED_FILES)
    }
}
