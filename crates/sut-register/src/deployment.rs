// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use detsys_executor::{ComponentLogger, ReactorFactory, TopologyError};
use detsys_types::deployment::DeploymentInfo;
use detsys_types::event::{ScheduledEventEnvelope, ScheduledKind};
use detsys_types::reactor::BoxedReactor;
use detsys_types::time::simulation_epoch;
use detsys_types::ClientId;

use crate::frontend::{
    CountingFrontEnd, FrontEnd, QuorumFrontEnd, TimerQuorumFrontEnd, RETRY_INTERVAL,
};
use crate::protocol::{RegisterProtocol, READ, WRITE};
use crate::register::Register;
use crate::{FRONTEND, REGISTER1, REGISTER2};

const REGISTER_TYPE: &str = "register";

/// Which front end sits between the clients and the registers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum FrontEndKind {
    /// Replies with the first register answer.
    #[default]
    FirstReply,
    /// Resends on ticks and replies after any two register answers.
    Counting,
    /// Waits for every register, resending on ticks.
    Quorum,
    /// Waits for every register, resending on its own timer.
    TimerQuorum,
}

impl FrontEndKind {
    pub const ALL: [FrontEndKind; 4] = [
        FrontEndKind::FirstReply,
        FrontEndKind::Counting,
        FrontEndKind::Quorum,
        FrontEndKind::TimerQuorum,
    ];

    pub fn reactor_type(self) -> &'static str {
        match self {
            FrontEndKind::FirstReply => "frontend",
            FrontEndKind::Counting => "counting-frontend",
            FrontEndKind::Quorum => "quorum-frontend",
            FrontEndKind::TimerQuorum => "timer-quorum-frontend",
        }
    }

    /// Ticks per simulated second this front end needs to retry, zero if it does not use ticks.
    pub fn tick_frequency(self) -> f64 {
        match self {
            FrontEndKind::Counting | FrontEndKind::Quorum => {
                1.0 / RETRY_INTERVAL.as_secs_f64()
            }
            FrontEndKind::FirstReply | FrontEndKind::TimerQuorum => 0.0,
        }
    }
}

impl fmt::Display for FrontEndKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reactor_type())
    }
}

/// Builds the reactors of a register deployment from their persisted type.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterReactors;

impl ReactorFactory<RegisterProtocol> for RegisterReactors {
    fn build(
        &self,
        info: &DeploymentInfo,
        logger: ComponentLogger,
    ) -> Result<BoxedReactor<RegisterProtocol>, TopologyError> {
        match info.reactor_type.as_str() {
            "frontend" => Ok(Box::new(FrontEnd::new(logger))),
            "counting-frontend" => Ok(Box::new(CountingFrontEnd::new(logger))),
            "quorum-frontend" => Ok(Box::new(QuorumFrontEnd::new(logger))),
            "timer-quorum-frontend" => Ok(Box::new(TimerQuorumFrontEnd::new(logger))),
            REGISTER_TYPE => Ok(Box::new(Register::new(logger))),
            other => Err(TopologyError::UnknownReactorType {
                component: info.reactor.clone(),
                reactor_type: other.to_owned(),
            }),
        }
    }
}

/// One front end in front of two registers.
pub fn deployment(front_end: FrontEndKind) -> Vec<DeploymentInfo> {
    vec![
        DeploymentInfo::new(FRONTEND, front_end.reactor_type()),
        DeploymentInfo::new(REGISTER1, REGISTER_TYPE),
        DeploymentInfo::new(REGISTER2, REGISTER_TYPE),
    ]
}

/// A single client writes `1` and reads the register back ten seconds later.
pub fn agenda() -> Vec<ScheduledEventEnvelope> {
    let client = ClientId::new(0);
    let request = |seconds: i64, event: &str, args: serde_json::Value| ScheduledEventEnvelope {
        at: simulation_epoch() + chrono::TimeDelta::seconds(seconds),
        from: client.address(),
        to: FRONTEND.to_owned(),
        kind: ScheduledKind::Invoke,
        event: event.to_owned(),
        args,
        meta: None,
    };

    vec![
        request(0, WRITE, json!({"value": 1})),
        request(10, READ, json!({})),
    ]
}
