// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Persisted records: the topology metadata of a test and the per-delivery execution steps.

use serde::{Deserialize, Serialize};

use crate::identifiers::{RunId, RunMeta, TestId};
use crate::time::SimulatedTime;

/// One component of a persisted topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentInfo {
    /// Component name, unique within the topology.
    pub reactor: String,
    /// Reactor type the constructor dispatches on.
    #[serde(rename = "type")]
    pub reactor_type: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl DeploymentInfo {
    pub fn new(reactor: impl Into<String>, reactor_type: impl Into<String>) -> Self {
        Self {
            reactor: reactor.into(),
            reactor_type: reactor_type.into(),
            args: serde_json::Value::Null,
        }
    }
}

/// Observational record of one event or timer delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecutionStep {
    pub test_id: TestId,
    pub run_id: RunId,
    pub component: String,
    pub simulated_time: SimulatedTime,
    pub log_lines: Vec<String>,
    /// RFC 6902 patch turning the pre-delivery snapshot into the post-delivery one.
    pub heap_diff: serde_json::Value,
}

impl ExecutionStep {
    pub fn meta(&self) -> RunMeta {
        RunMeta::new(self.test_id, self.run_id)
    }
}
