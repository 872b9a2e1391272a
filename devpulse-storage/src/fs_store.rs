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

//! Directory-backed remote store
//!
//! Repositories are subdirectories of `root`. Tokens are content hashes, and
//! conditional writes are checked against the file on disk, so a stale token
//! fails exactly as it would against a real remote.

use crate::error::{RemoteError, RemoteResult};
use crate::remote::{content_token, ConcurrencyToken, RemoteFile, RemoteStore};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;

pub struct FsStore {
    root: PathBuf,
    /// Serializes check-then-write within this process
    write_lock: Mutex<()>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create the repository directory `name` if it is missing
    pub async fn create_repository(&self, name: &str) -> RemoteResult<()> {
        tokio::fs::create_dir_all(self.repository_dir(name)?).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of repository `name`; the name must be one plain component
    fn repository_dir(&self, name: &str) -> RemoteResult<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(name)),
            _ => Err(RemoteError::Api {
                status: 400,
                message: format!("invalid repository name: {name}"),
            }),
        }
    }

    fn resolve(&self, name: &str, path: &str) -> RemoteResult<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || path.is_empty() {
            return Err(RemoteError::Api {
                status: 400,
                message: format!("invalid path: {path}"),
            });
        }
        Ok(self.repository_dir(name)?.join(relative))
    }

    async fn read_existing(&self, file: &Path) -> RemoteResult<Option<String>> {
        match tokio::fs::read_to_string(file).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl RemoteStore for FsStore {
    async fn exists(&self, name: &str) -> RemoteResult<bool> {
        match tokio::fs::metadata(self.repository_dir(name)?).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, name: &str, path: &str) -> RemoteResult<Option<RemoteFile>> {
        let file = self.resolve(name, path)?;
        Ok(self.read_existing(&file).await?.map(|content| RemoteFile {
            token: content_token(&content),
            content,
        }))
    }

    async fn write(
        &self,
        name: &str,
        path: &str,
        content: &str,
        _message: &str,
        token: Option<&ConcurrencyToken>,
    ) -> RemoteResult<()> {
        if !self.exists(name).await? {
            return Err(RemoteError::RepositoryNotFound(name.to_string()));
        }
        let file = self.resolve(name, path)?;

        let _guard = self.write_lock.lock().await;
        let current = self.read_existing(&file).await?;
        let matches = match (&current, token) {
            (None, None) => true,
            (Some(existing), Some(token)) => content_token(existing) == *token,
            _ => false,
        };
        if !matches {
            return Err(RemoteError::Conflict {
                path: path.to_string(),
            });
        }

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_update() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.create_repository("repo").await.unwrap();
        assert!(store.exists("repo").await.unwrap());
        assert!(!store.exists("other").await.unwrap());

        store
            .write("repo", "projects/p/log.json", "[]", "create", None)
            .await
            .unwrap();
        let file = store.read("repo", "projects/p/log.json").await.unwrap().unwrap();
        assert_eq!(file.content, "[]");

        store
            .write("repo", "projects/p/log.json", "[1]", "update", Some(&file.token))
            .await
            .unwrap();
        let updated = store.read("repo", "projects/p/log.json").await.unwrap().unwrap();
        assert_eq!(updated.content, "[1]");
        assert_ne!(updated.token, file.token);
    }

    #[tokio::test]
    async fn test_stale_token_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.create_repository("repo").await.unwrap();

        store.write("repo", "a.json", "[]", "m", None).await.unwrap();
        let stale = content_token("something else");
        let result = store.write("repo", "a.json", "[1]", "m", Some(&stale)).await;
        assert!(matches!(result, Err(RemoteError::Conflict { .. })));

        // Creating over an existing file is also a conflict
        let result = store.write("repo", "a.json", "[2]", "m", None).await;
        assert!(matches!(result, Err(RemoteError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.create_repository("repo").await.unwrap();
        assert!(store.read("repo", "../outside.json").await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_escaping_repository_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().join("root"));
        store.create_repository("repo").await.unwrap();

        for name in ["..", "../root", "a/b", "", "/etc"] {
            assert!(store.exists(name).await.is_err(), "{name}");
            assert!(store.create_repository(name).await.is_err(), "{name}");
            assert!(store.write(name, "a.json", "[]", "m", None).await.is_err(), "{name}");
        }
        assert!(!dir.path().join("a.json").exists());
    }

    #[tokio::test]
    async fn test_write_to_missing_repository() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let result = store.write("nope", "a.json", "[]", "m", None).await;
        assert!(matches!(result, Err(RemoteError::RepositoryNotFound(_))));
    }
}
