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

//! Devpulse Storage Layer
//!
//! Remote append-only activity logs behind a small capability trait,
//! [`RemoteStore`]: `exists`, `read` and a conditional `write` that carries an
//! opaque concurrency token.
//!
//! ## Backends
//!
//! - [`GitHubStore`]: GitHub REST contents API (blob `sha` as token)
//! - [`FsStore`]: a local directory, BLAKE3 content hash as token
//! - [`MemoryStore`]: in-process, with failure injection for tests
//!
//! ## Layout
//!
//! ```text
//! <repository>/
//!   projects/<project>/activity-log.json   JSON array of activity records
//!   projects/<project>/summary.json        aggregate written by the supervisor
//! ```
//!
//! A read that finds nothing is `Ok(None)`, never an error. Every other
//! failure, including a stale token, is surfaced to the caller unretried.

pub mod activity_log;
pub mod error;
pub mod fs_store;
pub mod github;
pub mod memory;
pub mod remote;

pub use activity_log::{activity_log_path, read_log, summary_path, write_log, ActivityLog};
pub use error::{RemoteError, RemoteResult};
pub use fs_store::FsStore;
pub use github::GitHubStore;
pub use memory::MemoryStore;
pub use remote::{content_token, ConcurrencyToken, RemoteFile, RemoteStore};
