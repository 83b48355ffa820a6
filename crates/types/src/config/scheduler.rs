// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use super::{parse_url, InvalidConfigurationError};

/// # Scheduler options
///
/// How to reach the scheduler's command endpoint.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[serde(rename_all = "kebab-case")]
#[builder(default)]
pub struct SchedulerOptions {
    /// # Address
    ///
    /// URL of the scheduler's single command endpoint.
    pub address: String,

    /// # Request timeout
    ///
    /// Timeout of a single scheduler command. `run!` blocks until the whole run completed,
    /// so this bounds the length of a run.
    ///
    /// Can be configured using the [`humantime`](https://docs.rs/humantime/latest/humantime/fn.parse_duration.html) format.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub request_timeout: humantime::Duration,
}

impl SchedulerOptions {
    pub fn url(&self) -> Result<url::Url, InvalidConfigurationError> {
        parse_url("scheduler.address", &self.address)
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            address: "http://localhost:3000".to_owned(),
            request_timeout: Duration::from_secs(30).into(),
        }
    }
}
