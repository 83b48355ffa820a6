// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use url::Url;

use detsys_types::config::InvalidConfigurationError;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub http_status_code: reqwest::StatusCode,
    pub url: Url,
    pub command: &'static str,
    pub body: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "scheduler rejected '{}': {}", self.command, self.body)?;
        write!(
            f,
            "  -> Http status code {} at '{}'",
            self.http_status_code, self.url,
        )?;
        Ok(())
    }
}

impl std::error::Error for ApiError {}

#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    Api(#[from] ApiError),
    #[error("(Protocol error) {0}")]
    Serialization(#[from] serde_json::Error),
    Network(#[from] reqwest::Error),
    Config(#[from] InvalidConfigurationError),
    /// Raised by schedulers that are not reached over HTTP.
    #[error("scheduler rejected '{command}': {reason}")]
    Rejected {
        command: &'static str,
        reason: String,
    },
}
