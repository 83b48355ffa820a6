// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::net::{Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use super::{parse_url, InvalidConfigurationError};

/// # Executor options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[serde(rename_all = "kebab-case")]
#[builder(default)]
pub struct ExecutorOptions {
    /// # Bind address
    ///
    /// The address the executor's HTTP surface binds to.
    pub bind_address: SocketAddr,

    /// # Advertised address
    ///
    /// Base URL announced to the scheduler on registration. Delivery paths are resolved
    /// relative to it.
    pub advertised_address: String,

    /// # Concurrency limit
    ///
    /// Maximum number of deliveries handled at the same time.
    pub concurrent_requests_limit: usize,

    /// # Request body limit
    ///
    /// Maximum size in bytes of a delivery request body.
    pub max_request_body_bytes: usize,
}

impl ExecutorOptions {
    pub fn advertised_url(&self) -> Result<url::Url, InvalidConfigurationError> {
        parse_url("executor.advertised-address", &self.advertised_address)
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 3001)),
            advertised_address: "http://localhost:3001/api/v1/".to_owned(),
            concurrent_requests_limit: 1000,
            max_request_body_bytes: 1024 * 1024,
        }
    }
}
