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

//! Devpulse Core
//!
//! Fundamental data structures for edit-activity tracking:
//! - **Activity records**: what changed in a file, when, in which project
//! - **Change detection**: a lightweight heuristic diff between two snapshots
//! - **Content cache**: bounded, insertion-ordered snapshot baselines
//! - **Resilience**: linear-backoff retry policy and a failure circuit breaker
//! - **Configuration**: the recognised tracker options and their defaults
//!
//! ```text
//!   save event ──► ContentCache::capture ──► detect_changes ──► ActivityRecord
//!                        │                                           │
//!                  (baseline update,                          (submitted by the
//!                   FIFO eviction)                             tracker crate)
//! ```

pub mod activity;
pub mod cache;
pub mod config;
pub mod detector;
pub mod error;
pub mod resilience;

pub use activity::{ActivityRecord, ChangeSummary, ChangeType, LineStats, NameChanges};
pub use cache::ContentCache;
pub use config::{RemoteConfig, TrackerConfig};
pub use detector::{detect_changes, extract_function_names, line_count};
pub use error::{ConfigError, ConfigResult};
pub use resilience::{CircuitBreaker, CircuitState, RetryExhausted, RetryPolicy};
