// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use serde::Serialize;

use detsys_executor::ComponentLogger;
use detsys_types::reactor::{InEvent, OutEvent, Reactor};
use detsys_types::SimulatedTime;

use crate::protocol::{
    Ack, Contents, InternalRequest, InternalResponse, RegisterMessage, RegisterProtocol,
    RegisterRequest, RegisterResponse, SessionId, Write,
};

/// A single replica. Appends every write and answers reads with everything it holds.
///
/// Writes are applied once per session, so a front end may resend them freely.
#[derive(Debug, Serialize)]
pub struct Register {
    value: Vec<i64>,
    applied: BTreeSet<SessionId>,
    #[serde(skip)]
    logger: ComponentLogger,
}

impl Register {
    pub fn new(logger: ComponentLogger) -> Self {
        Self {
            value: Vec::new(),
            applied: BTreeSet::new(),
            logger,
        }
    }
}

impl Reactor for Register {
    type Protocol = RegisterProtocol;

    fn receive(
        &mut self,
        _at: SimulatedTime,
        from: &str,
        event: InEvent<RegisterProtocol>,
    ) -> Vec<OutEvent<RegisterProtocol>> {
        let (id, request) = match event {
            InEvent::InternalMessage(RegisterMessage::Request(InternalRequest { id, request })) => {
                (id, request)
            }
            other => panic!("register cannot handle {other:?} from {from}"),
        };

        let response = match request {
            RegisterRequest::Write(Write { value }) => {
                if self.applied.insert(id) {
                    self.value.push(value);
                    self.logger.info(format!("session {id}: stored {value}"));
                } else {
                    self.logger
                        .debug(format!("session {id}: {value} was already stored"));
                }
                RegisterResponse::Ack(Ack {})
            }
            RegisterRequest::Read(_) => RegisterResponse::Contents(Contents {
                value: self.value.clone(),
            }),
        };

        vec![OutEvent::message(
            from,
            RegisterMessage::Response(InternalResponse { id, response }),
        )]
    }

    fn snapshot(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
