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

//! Tracker error types

use devpulse_core::ConfigError;
use devpulse_storage::RemoteError;
use thiserror::Error;

pub type TrackerResult<T> = Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// Setup failed; the tracker stays inert
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The supervisor hit its consecutive-failure limit and stopped
    #[error("Supervisor stopped after {failures} consecutive failed syncs")]
    SupervisorExhausted { failures: u32 },

    /// A project buffer is at `maxQueuedRecords`
    #[error("Queue for project {project} is full ({capacity} records)")]
    QueueFull { project: String, capacity: usize },

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl From<ConfigError> for TrackerError {
    fn from(e: ConfigError) -> Self {
        TrackerError::Configuration(e.to_string())
    }
}
