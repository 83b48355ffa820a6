// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod common;
mod executor;
mod scheduler;
mod search;
mod storage;

pub use common::*;
pub use executor::*;
pub use scheduler::*;
pub use search::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

/// # Detsys configuration
///
/// Configuration shared by the executor process and the fault-search driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(default)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    #[serde(flatten)]
    pub common: CommonOptions,
    pub executor: ExecutorOptions,
    pub scheduler: SchedulerOptions,
    pub storage: StorageOptions,
    pub search: SearchOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidConfigurationError {
    #[error("invalid {field} '{value}': {source}")]
    Url {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("tick-frequency must be a finite, non-negative number, got {0}")]
    TickFrequency(f64),
    #[error("executor.concurrent-requests-limit must be greater than zero")]
    ConcurrencyLimit,
}

impl Configuration {
    pub fn validate(&self) -> Result<(), InvalidConfigurationError> {
        self.executor.advertised_url()?;
        self.scheduler.url()?;
        if !self.search.tick_frequency.is_finite() || self.search.tick_frequency < 0.0 {
            return Err(InvalidConfigurationError::TickFrequency(
                self.search.tick_frequency,
            ));
        }
        if self.executor.concurrent_requests_limit == 0 {
            return Err(InvalidConfigurationError::ConcurrencyLimit);
        }
        Ok(())
    }
}

pub(crate) fn parse_url(
    field: &'static str,
    value: &str,
) -> Result<url::Url, InvalidConfigurationError> {
    url::Url::parse(value).map_err(|source| InvalidConfigurationError::Url {
        field,
        value: value.to_owned(),
        source,
    })
}
