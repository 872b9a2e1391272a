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

//! Configuration error types

use thiserror::Error;

/// Result type for configuration loading and validation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating tracker configuration.
///
/// All of these are fatal at activation time: the tracker stays inert.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for the expected schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A recognised option has a value outside its valid range
    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The remote credential was not supplied
    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
