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

//! Tracker configuration
//!
//! Loaded from a TOML file (camelCase keys, every option optional) and then
//! overridden by `DEVPULSE_*` environment variables.
//!
//! ```toml
//! maxCachedFiles = 100
//! retryAttempts = 3
//! retryDelay = 1000
//! flushIntervalMs = 5000
//!
//! [remote]
//! owner = "octocat"
//! repository = "devpulse-activity"
//! ```

use crate::cache::DEFAULT_MAX_CACHED_FILES;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Options recognised by the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Maximum number of file baselines kept for diffing
    pub max_cached_files: usize,

    /// Submission attempts per captured edit
    pub retry_attempts: u32,

    /// Base retry delay in milliseconds (multiplied by the attempt number)
    pub retry_delay: u64,

    /// Queue flush period in milliseconds
    pub flush_interval_ms: u64,

    /// Supervisor snapshot period in milliseconds
    pub supervisor_interval_ms: u64,

    /// Consecutive supervisor failures before it stops itself
    pub max_supervisor_retries: u32,

    /// Pause between writes to different projects during a flush
    pub inter_project_delay_ms: u64,

    /// Pause after creating a remote file before the next write
    pub create_settle_ms: u64,

    /// Per-project buffer bound; enqueues beyond it are rejected
    pub max_queued_records: usize,

    /// Put a failed flush batch back into the buffer instead of dropping it
    pub requeue_on_failure: bool,

    pub remote: RemoteConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_cached_files: DEFAULT_MAX_CACHED_FILES,
            retry_attempts: 3,
            retry_delay: 1_000,
            flush_interval_ms: 5_000,
            supervisor_interval_ms: 1_800_000, // 30 minutes
            max_supervisor_retries: 3,
            inter_project_delay_ms: 1_000,
            create_settle_ms: 1_000,
            max_queued_records: 1_000,
            requeue_on_failure: false,
            remote: RemoteConfig::default(),
        }
    }
}

/// Where activity logs are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteConfig {
    /// REST API base URL
    pub api_url: String,

    /// Account that owns the destination repository
    pub owner: String,

    /// Destination repository name
    pub repository: String,

    /// Environment variable holding the pre-authenticated token
    pub token_env: String,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            owner: String::new(),
            repository: "devpulse-activity".to_string(),
            token_env: "DEVPULSE_TOKEN".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl RemoteConfig {
    /// Read the credential named by `token_env`
    pub fn token(&self) -> ConfigResult<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingCredential(self.token_env.clone()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl TrackerConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `DEVPULSE_*` overrides from an arbitrary lookup.
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
            value.and_then(|v| v.trim().parse().ok())
        }

        if let Some(v) = parse(lookup("DEVPULSE_MAX_CACHED_FILES")) {
            self.max_cached_files = v;
        }
        if let Some(v) = parse(lookup("DEVPULSE_RETRY_ATTEMPTS")) {
            self.retry_attempts = v;
        }
        if let Some(v) = parse(lookup("DEVPULSE_RETRY_DELAY_MS")) {
            self.retry_delay = v;
        }
        if let Some(v) = parse(lookup("DEVPULSE_FLUSH_INTERVAL_MS")) {
            self.flush_interval_ms = v;
        }
        if let Some(v) = parse(lookup("DEVPULSE_SUPERVISOR_INTERVAL_MS")) {
            self.supervisor_interval_ms = v;
        }
        if let Some(v) = parse(lookup("DEVPULSE_MAX_SUPERVISOR_RETRIES")) {
            self.max_supervisor_retries = v;
        }
        if let Some(v) = parse(lookup("DEVPULSE_INTER_PROJECT_DELAY_MS")) {
            self.inter_project_delay_ms = v;
        }
        if let Some(v) = parse(lookup("DEVPULSE_CREATE_SETTLE_MS")) {
            self.create_settle_ms = v;
        }
        if let Some(v) = parse(lookup("DEVPULSE_MAX_QUEUED_RECORDS")) {
            self.max_queued_records = v;
        }
        if let Some(v) = lookup("DEVPULSE_REQUEUE_ON_FAILURE") {
            self.requeue_on_failure = v == "true" || v == "1";
        }
        if let Some(v) = lookup("DEVPULSE_API_URL") {
            self.remote.api_url = v;
        }
        if let Some(v) = lookup("DEVPULSE_REMOTE_OWNER") {
            self.remote.owner = v;
        }
        if let Some(v) = lookup("DEVPULSE_REMOTE_REPOSITORY") {
            self.remote.repository = v;
        }
        if let Some(v) = parse(lookup("DEVPULSE_REQUEST_TIMEOUT_MS")) {
            self.remote.request_timeout_ms = v;
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.retry_attempts == 0 {
            return Err(ConfigError::invalid("retryAttempts", "must be at least 1"));
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::invalid("flushIntervalMs", "must be positive"));
        }
        if self.supervisor_interval_ms == 0 {
            return Err(ConfigError::invalid("supervisorIntervalMs", "must be positive"));
        }
        if self.max_supervisor_retries == 0 {
            return Err(ConfigError::invalid("maxSupervisorRetries", "must be at least 1"));
        }
        if self.max_queued_records == 0 {
            return Err(ConfigError::invalid("maxQueuedRecords", "must be at least 1"));
        }
        if self.remote.repository.trim().is_empty() {
            return Err(ConfigError::invalid("remote.repository", "must not be empty"));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn supervisor_interval(&self) -> Duration {
        Duration::from_millis(self.supervisor_interval_ms)
    }

    pub fn inter_project_delay(&self) -> Duration {
        Duration::from_millis(self.inter_project_delay_ms)
    }

    pub fn create_settle(&self) -> Duration {
        Duration::from_millis(self.create_settle_ms)
    }
}
