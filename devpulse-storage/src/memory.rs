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

//! In-memory store for development/testing

use crate::error::{RemoteError, RemoteResult};
use crate::remote::{content_token, ConcurrencyToken, RemoteFile, RemoteStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// One accepted write, kept for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub name: String,
    pub path: String,
    pub message: String,
    pub created: bool,
}

#[derive(Debug, Default)]
struct MemoryInner {
    repositories: HashSet<String>,
    files: HashMap<(String, String), String>,
    writes: Vec<WriteRecord>,
    /// Number of upcoming writes to fail with a transient error
    failing_writes: usize,
    /// Paths whose writes always fail
    failing_paths: HashSet<String>,
}

/// [`RemoteStore`] held entirely in memory, with content-hash tokens
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with one repository already created
    pub fn with_repository(name: &str) -> Self {
        let store = Self::new();
        store.create_repository(name);
        store
    }

    pub fn create_repository(&self, name: &str) {
        self.inner.lock().repositories.insert(name.to_string());
    }

    /// Place a file directly, bypassing token checks
    pub fn put(&self, name: &str, path: &str, content: impl Into<String>) {
        self.inner
            .lock()
            .files
            .insert((name.to_string(), path.to_string()), content.into());
    }

    /// Current content of a file
    pub fn get(&self, name: &str, path: &str) -> Option<String> {
        self.inner
            .lock()
            .files
            .get(&(name.to_string(), path.to_string()))
            .cloned()
    }

    /// Fail the next `count` writes with a transient error
    pub fn fail_next_writes(&self, count: usize) {
        self.inner.lock().failing_writes = count;
    }

    /// Fail every write to `path` until cleared
    pub fn fail_writes_to(&self, path: &str) {
        self.inner.lock().failing_paths.insert(path.to_string());
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock();
        inner.failing_writes = 0;
        inner.failing_paths.clear();
    }

    /// Accepted writes in order
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.inner.lock().writes.clone()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn exists(&self, name: &str) -> RemoteResult<bool> {
        Ok(self.inner.lock().repositories.contains(name))
    }

    async fn read(&self, name: &str, path: &str) -> RemoteResult<Option<RemoteFile>> {
        Ok(self.get(name, path).map(|content| RemoteFile {
            token: content_token(&content),
            content,
        }))
    }

    async fn write(
        &self,
        name: &str,
        path: &str,
        content: &str,
        message: &str,
        token: Option<&ConcurrencyToken>,
    ) -> RemoteResult<()> {
        let mut inner = self.inner.lock();

        if !inner.repositories.contains(name) {
            return Err(RemoteError::RepositoryNotFound(name.to_string()));
        }
        if inner.failing_paths.contains(path) {
            return Err(RemoteError::Transient(format!("injected failure for {path}")));
        }
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(RemoteError::Transient("injected failure".to_string()));
        }

        let key = (name.to_string(), path.to_string());
        let matches = match (inner.files.get(&key), token) {
            (None, None) => true,
            (Some(existing), Some(token)) => content_token(existing) == *token,
            _ => false,
        };
        if !matches {
            return Err(RemoteError::Conflict {
                path: path.to_string(),
            });
        }

        inner.files.insert(key, content.to_string());
        inner.writes.push(WriteRecord {
            name: name.to_string(),
            path: path.to_string(),
            message: message.to_string(),
            created: token.is_none(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_round_trip() {
        let store = MemoryStore::with_repository("repo");
        store.write("repo", "f", "one", "create", None).await.unwrap();

        let file = store.read("repo", "f").await.unwrap().unwrap();
        store
            .write("repo", "f", "two", "update", Some(&file.token))
            .await
            .unwrap();

        // The first token is now stale
        let stale = store.write("repo", "f", "three", "update", Some(&file.token)).await;
        assert!(matches!(stale, Err(RemoteError::Conflict { .. })));
        assert_eq!(store.get("repo", "f").as_deref(), Some("two"));

        let writes = store.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes[0].created);
        assert!(!writes[1].created);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::with_repository("repo");
        store.fail_next_writes(1);
        assert!(store.write("repo", "f", "x", "m", None).await.unwrap_err().is_transient());
        assert!(store.write("repo", "f", "x", "m", None).await.is_ok());

        store.fail_writes_to("g");
        assert!(store.write("repo", "g", "x", "m", None).await.is_err());
        store.clear_failures();
        assert!(store.write("repo", "g", "x", "m", None).await.is_ok());
    }
}
