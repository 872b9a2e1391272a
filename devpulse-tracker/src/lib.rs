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

//! Devpulse Tracker
//!
//! Captures file saves as activity records and ships them to a remote store:
//!
//! - [`ActivityLogger`]: diff against the cached baseline, retry submission
//! - [`ActivityQueue`]: per-project buffers, periodic batched flushes
//! - [`PeriodicSupervisor`]: scheduled summary sync that gives up after
//!   repeated failures
//! - [`Tracker`]: the context object a host editor talks to
//!
//! ## Example
//!
//! ```rust,no_run
//! use devpulse_core::TrackerConfig;
//! use devpulse_storage::FsStore;
//! use devpulse_tracker::{LogNotifier, SaveEvent, Tracker};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FsStore::new("/tmp/devpulse"));
//! let tracker = Tracker::activate(TrackerConfig::default(), store, Arc::new(LogNotifier)).await?;
//! tracker.start();
//! tracker
//!     .on_save_event(SaveEvent::new("src/app.js", "function main() {}", "app"))
//!     .await;
//! tracker.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod logger;
pub mod notifier;
pub mod queue;
pub mod summary;
pub mod supervisor;
pub mod tracker;

pub use error::{TrackerError, TrackerResult};
pub use logger::{ActivityLogger, CaptureOutcome, Submitter};
pub use notifier::{LogNotifier, Notifier, RecordingNotifier};
pub use queue::{ActivityQueue, FlushReport, QueueSettings};
pub use summary::{ProjectSummary, SummarySync};
pub use supervisor::{PeriodicSupervisor, SnapshotSync, SupervisorState};
pub use tracker::{project_name_for, EditorPort, SaveEvent, Tracker};
