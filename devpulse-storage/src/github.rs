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

//! GitHub contents API backend
//!
//! - `GET  /repos/{owner}/{repo}` → exists
//! - `GET  /repos/{owner}/{repo}/contents/{path}` → base64 content + blob `sha`
//! - `PUT  /repos/{owner}/{repo}/contents/{path}` → create, or update with `sha`
//!
//! The blob `sha` is the concurrency token. A stale `sha` comes back as
//! 409/422 and is mapped to [`RemoteError::Conflict`].

use crate::error::{RemoteError, RemoteResult};
use crate::remote::{ConcurrencyToken, RemoteFile, RemoteStore};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use devpulse_core::RemoteConfig;
use reqwest::{Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("devpulse/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// [`RemoteStore`] over the GitHub REST API
pub struct GitHubStore {
    client: reqwest::Client,
    api_url: Url,
    owner: String,
    token: String,
}

impl GitHubStore {
    /// Build a client for `config`; `token` is the pre-authenticated credential
    pub fn new(config: &RemoteConfig, token: impl Into<String>) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()?;

        let api_url = Url::parse(&config.api_url)
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", config.api_url, e)))?;
        if api_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(config.api_url.clone()));
        }

        Ok(Self {
            client,
            api_url,
            owner: config.owner.clone(),
            token: token.into(),
        })
    }

    /// `api_url` extended by `segments`, each percent-encoded on its own
    fn url_with<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn repo_url(&self, name: &str) -> Url {
        self.url_with(["repos", self.owner.as_str(), name])
    }

    fn contents_url(&self, name: &str, path: &str) -> Url {
        let file = path.split('/').filter(|segment| !segment.is_empty());
        self.url_with(["repos", self.owner.as_str(), name, "contents"].into_iter().chain(file))
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
    }
}

#[async_trait]
impl RemoteStore for GitHubStore {
    async fn exists(&self, name: &str) -> RemoteResult<bool> {
        let response = self.get(self.repo_url(name)).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from_response(response, name).await),
        }
    }

    async fn read(&self, name: &str, path: &str) -> RemoteResult<Option<RemoteFile>> {
        let response = self.get(self.contents_url(name, path)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(path, "Remote file absent");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response, path).await);
        }

        let body: ContentsResponse = response.json().await?;
        // The API wraps base64 at 60 columns
        let packed: String = body.content.split_whitespace().collect();
        let bytes = BASE64
            .decode(packed.as_bytes())
            .map_err(|e| RemoteError::Serialization(format!("invalid base64 in {path}: {e}")))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| RemoteError::Serialization(format!("{path} is not UTF-8: {e}")))?;

        Ok(Some(RemoteFile {
            content,
            token: ConcurrencyToken::new(body.sha),
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
        let request = PutContentsRequest {
            message,
            content: BASE64.encode(content.as_bytes()),
            sha: token.map(ConcurrencyToken::as_str),
        };

        let response = self
            .client
            .put(self.contents_url(name, path))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(&request)
            .send()
            .await?;

        if response.status().is_success() {
            debug!(path, created = token.is_none(), "Remote write succeeded");
            Ok(())
        } else {
            Err(error_from_response(response, path).await)
        }
    }
}

async fn error_from_response(response: Response, path: &str) -> RemoteError {
    let status = response.status();
    let headers = response.headers().clone();
    let message = response.text().await.unwrap_or_default();

    let rate_limit_exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false);
    let retry_after = headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    match status {
        StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited { retry_after },
        StatusCode::FORBIDDEN if rate_limit_exhausted || retry_after.is_some() => {
            RemoteError::RateLimited { retry_after }
        }
        StatusCode::UNAUTHORIZED => RemoteError::Unauthorized,
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => RemoteError::Conflict {
            path: path.to_string(),
        },
        status if status.is_server_error() => {
            RemoteError::Transient(format!("HTTP {}: {}", status.as_u16(), message))
        }
        status => RemoteError::Api {
            status: status.as_u16(),
            message,
        },
    }
}
