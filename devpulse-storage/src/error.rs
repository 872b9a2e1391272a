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

//! Remote store error types

use std::time::Duration;
use thiserror::Error;

/// Result type for remote store operations
pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network failure, timeout or server-side error
    #[error("Transient remote error: {0}")]
    Transient(String),

    /// Rate limit hit; `retry_after` when the remote said how long to wait
    #[error("Rate limit exceeded (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Stale or missing concurrency token
    #[error("Concurrency conflict writing {path}")]
    Conflict { path: String },

    /// The credential was rejected
    #[error("Unauthorized: the remote rejected the credential")]
    Unauthorized,

    /// The destination repository does not exist
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    /// Any other non-success response
    #[error("Remote API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The configured API base URL cannot be used
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Remote content is not what we expected
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Failures worth retrying later with the same request
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_) | RemoteError::RateLimited { .. })
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Serialization(e.to_string())
        } else {
            RemoteError::Transient(e.to_string())
        }
    }
}
