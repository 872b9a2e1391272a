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

//! Remote store capability trait

use crate::error::RemoteResult;
use async_trait::async_trait;
use std::fmt;

/// Opaque optimistic-concurrency token returned by a read.
///
/// Pass it back unchanged when updating the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConcurrencyToken(String);

impl ConcurrencyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConcurrencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token for stores that version by content hash
pub fn content_token(content: &str) -> ConcurrencyToken {
    ConcurrencyToken(blake3::hash(content.as_bytes()).to_hex().to_string())
}

/// Content of a remote file plus the token needed to update it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: String,
    pub token: ConcurrencyToken,
}

/// Read/create/update of files inside a named remote repository.
///
/// Implementations never retry internally.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Whether the repository `name` exists
    async fn exists(&self, name: &str) -> RemoteResult<bool>;

    /// Read `path`; `Ok(None)` when it does not exist
    async fn read(&self, name: &str, path: &str) -> RemoteResult<Option<RemoteFile>>;

    /// Create (`token == None`) or update (`token == Some`) `path` with the
    /// full new content
    async fn write(
        &self,
        name: &str,
        path: &str,
        content: &str,
        message: &str,
        token: Option<&ConcurrencyToken>,
    ) -> RemoteResult<()>;
}
