// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

use detsys_types::fault::FaultSet;
use detsys_types::{RunId, TestId};

/// A scheduler command as it goes on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "parameters", rename_all_fields = "kebab-case")]
pub enum SchedulerCommand {
    #[serde(rename = "load-test!")]
    LoadTest { test_id: TestId },
    #[serde(rename = "register-executor")]
    RegisterExecutor {
        executor_id: String,
        components: Vec<String>,
    },
    #[serde(rename = "set-seed!")]
    SetSeed { new_seed: u64 },
    #[serde(rename = "create-run!")]
    CreateRun { test_id: TestId },
    #[serde(rename = "inject-faults!")]
    InjectFaults { faults: FaultSet },
    #[serde(rename = "set-tick-frequency!")]
    SetTickFrequency { new_tick_frequency: f64 },
    #[serde(rename = "run!")]
    Run {},
    #[serde(rename = "status")]
    Status {},
    #[serde(rename = "reset")]
    Reset {},
}

impl SchedulerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerCommand::LoadTest { .. } => "load-test!",
            SchedulerCommand::RegisterExecutor { .. } => "register-executor",
            SchedulerCommand::SetSeed { .. } => "set-seed!",
            SchedulerCommand::CreateRun { .. } => "create-run!",
            SchedulerCommand::InjectFaults { .. } => "inject-faults!",
            SchedulerCommand::SetTickFrequency { .. } => "set-tick-frequency!",
            SchedulerCommand::Run {} => "run!",
            SchedulerCommand::Status {} => "status",
            SchedulerCommand::Reset {} => "reset",
        }
    }
}

/// Reply to `load-test!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueueSize {
    pub queue_size: usize,
}

/// Reply to `create-run!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CreatedRun {
    pub run_id: RunId,
}

#[cfg(test)]
mod tests {
    use super::*;

    use detsys_types::fault::Fault;
    use googletest::prelude::*;
    use serde_json::json;

    #[test]
    fn commands_wire_shape() {
        assert_that!(
            serde_json::to_value(SchedulerCommand::InjectFaults {
                faults: FaultSet::from(vec![Fault::omission("frontend", "register2", 3)]),
            })
            .unwrap(),
            eq(json!({
                "command": "inject-faults!",
                "parameters": {"faults": [
                    {"kind": "omission", "from": "frontend", "to": "register2", "at": 3}
                ]}
            }))
        );
        assert_that!(
            serde_json::to_value(SchedulerCommand::RegisterExecutor {
                executor_id: "http://localhost:3001/api/v1/".to_owned(),
                components: vec!["frontend".to_owned()],
            })
            .unwrap(),
            eq(json!({
                "command": "register-executor",
                "parameters": {
                    "executor-id": "http://localhost:3001/api/v1/",
                    "components": ["frontend"]
                }
            }))
        );
        assert_that!(
            serde_json::to_value(SchedulerCommand::Run {}).unwrap(),
            eq(json!({"command": "run!", "parameters": {}}))
        );
    }

    #[test]
    fn names_match_wire_tags() {
        let command = SchedulerCommand::SetTickFrequency {
            new_tick_frequency: 1000.0,
        };
        let wire = serde_json::to_value(&command).unwrap();
        assert_that!(wire["command"].as_str(), some(eq(command.name())));
        assert_that!(wire["parameters"]["new-tick-frequency"].as_f64(), some(eq(1000.0)));
    }
}
