// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Front ends relay client requests to both registers and route the replies back.
//!
//! [`FrontEnd`] never retries. The other front ends resend unanswered requests, either on the
//! scheduler's ticks or on a timer of their own.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use detsys_executor::ComponentLogger;
use detsys_types::reactor::{InEvent, OutEvent, Reactor};
use detsys_types::{ClientId, SimulatedTime};

use crate::protocol::{
    Ack, Contents, InternalRequest, InternalResponse, RegisterMessage, RegisterProtocol,
    RegisterRequest, RegisterResponse, SessionId,
};
use crate::REGISTERS;

fn fan_out(id: SessionId, request: RegisterRequest) -> Vec<OutEvent<RegisterProtocol>> {
    REGISTERS
        .iter()
        .map(|register| {
            OutEvent::message(
                *register,
                RegisterMessage::Request(InternalRequest {
                    id,
                    request: request.clone(),
                }),
            )
        })
        .collect()
}

/// Answers the client with whichever register replies first.
///
/// A write is acknowledged as soon as one replica stored it, so a later read served by the
/// other replica can miss it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FrontEnd {
    next_session: SessionId,
    in_flight: BTreeMap<SessionId, ClientId>,
    #[serde(skip)]
    logger: ComponentLogger,
}

impl FrontEnd {
    pub fn new(logger: ComponentLogger) -> Self {
        Self {
            next_session: SessionId::new(0),
            in_flight: BTreeMap::new(),
            logger,
        }
    }
}

impl Reactor for FrontEnd {
    type Protocol = RegisterProtocol;

    fn receive(
        &mut self,
        _at: SimulatedTime,
        from: &str,
        event: InEvent<RegisterProtocol>,
    ) -> Vec<OutEvent<RegisterProtocol>> {
        match event {
            InEvent::ClientRequest { id: client, request } => {
                let session = self.next_session;
                self.next_session = session.next();
                self.in_flight.insert(session, client);
                self.logger
                    .info(format!("session {session}: {} from {client}", request.tag()));
                fan_out(session, request)
            }
            InEvent::InternalMessage(RegisterMessage::Response(InternalResponse {
                id,
                response,
            })) => match self.in_flight.remove(&id) {
                Some(client) => vec![OutEvent::reply(client, response)],
                None => {
                    self.logger
                        .debug(format!("session {id}: ignoring late reply from {from}"));
                    Vec::new()
                }
            },
            InEvent::InternalMessage(message @ RegisterMessage::Request(_)) => {
                panic!("front end cannot handle {message:?} from {from}")
            }
        }
    }

    fn snapshot(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Interval at which the retrying front ends resend unanswered requests.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Serialize)]
struct CountedSession {
    client: ClientId,
    request: RegisterRequest,
    replies: Vec<RegisterResponse>,
}

/// Resends unanswered requests to both registers on every tick and answers the client once it
/// counted a reply per register.
///
/// Replies are counted regardless of their sender, so a register answering both the request
/// and its resend completes a write that the other register never stored.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CountingFrontEnd {
    next_session: SessionId,
    sessions: BTreeMap<SessionId, CountedSession>,
    #[serde(skip)]
    logger: ComponentLogger,
}

impl CountingFrontEnd {
    pub fn new(logger: ComponentLogger) -> Self {
        Self {
            next_session: SessionId::new(0),
            sessions: BTreeMap::new(),
            logger,
        }
    }
}

impl Reactor for CountingFrontEnd {
    type Protocol = RegisterProtocol;

    fn receive(
        &mut self,
        _at: SimulatedTime,
        from: &str,
        event: InEvent<RegisterProtocol>,
    ) -> Vec<OutEvent<RegisterProtocol>> {
        match event {
            InEvent::ClientRequest { id: client, request } => {
                let session = self.next_session;
                self.next_session = session.next();
                self.logger
                    .info(format!("session {session}: {} from {client}", request.tag()));
                self.sessions.insert(
                    session,
                    CountedSession {
                        client,
                        request: request.clone(),
                        replies: Vec::new(),
                    },
                );
                fan_out(session, request)
            }
            InEvent::InternalMessage(RegisterMessage::Response(InternalResponse {
                id,
                response,
            })) => {
                let Entry::Occupied(mut entry) = self.sessions.entry(id) else {
                    self.logger
                        .debug(format!("session {id}: ignoring late reply from {from}"));
                    return Vec::new();
                };

                entry.get_mut().replies.push(response);
                if entry.get().replies.len() < REGISTERS.len() {
                    return Vec::new();
                }

                let session = entry.remove();
                vec![OutEvent::reply(session.client, merge(session.replies))]
            }
            InEvent::InternalMessage(message @ RegisterMessage::Request(_)) => {
                panic!("counting front end cannot handle {message:?} from {from}")
            }
        }
    }

    fn tick(&mut self, _at: SimulatedTime) -> Vec<OutEvent<RegisterProtocol>> {
        self.sessions
            .iter()
            .flat_map(|(id, session)| fan_out(*id, session.request.clone()))
            .collect()
    }

    fn snapshot(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, Serialize)]
struct Session {
    client: ClientId,
    request: RegisterRequest,
    replies: BTreeMap<String, RegisterResponse>,
}

fn merge(replies: impl IntoIterator<Item = RegisterResponse>) -> RegisterResponse {
    replies
        .into_iter()
        .fold(RegisterResponse::Ack(Ack {}), |merged, reply| match (merged, reply) {
            (RegisterResponse::Contents(a), RegisterResponse::Contents(b)) => {
                RegisterResponse::Contents(if b.value.len() > a.value.len() { b } else { a })
            }
            (contents @ RegisterResponse::Contents(Contents { .. }), _)
            | (_, contents @ RegisterResponse::Contents(Contents { .. })) => contents,
            (ack, _) => ack,
        })
}

/// Session bookkeeping shared by the quorum front ends: a session completes once every
/// register replied.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct Quorum {
    next_session: SessionId,
    sessions: BTreeMap<SessionId, Session>,
    #[serde(skip)]
    logger: ComponentLogger,
}

impl Quorum {
    fn new(logger: ComponentLogger) -> Self {
        Self {
            next_session: SessionId::new(0),
            sessions: BTreeMap::new(),
            logger,
        }
    }

    fn is_idle(&self) -> bool {
        self.sessions.is_empty()
    }

    fn receive(
        &mut self,
        from: &str,
        event: InEvent<RegisterProtocol>,
    ) -> Vec<OutEvent<RegisterProtocol>> {
        match event {
            InEvent::ClientRequest { id: client, request } => {
                let session = self.next_session;
                self.next_session = session.next();
                self.logger
                    .info(format!("session {session}: {} from {client}", request.tag()));
                self.sessions.insert(
                    session,
                    Session {
                        client,
                        request: request.clone(),
                        replies: BTreeMap::new(),
                    },
                );
                fan_out(session, request)
            }
            InEvent::InternalMessage(RegisterMessage::Response(InternalResponse {
                id,
                response,
            })) => {
                let Entry::Occupied(mut entry) = self.sessions.entry(id) else {
                    self.logger
                        .debug(format!("session {id}: ignoring late reply from {from}"));
                    return Vec::new();
                };

                entry.get_mut().replies.insert(from.to_owned(), response);
                if entry.get().replies.len() < REGISTERS.len() {
                    return Vec::new();
                }

                let session = entry.remove();
                vec![OutEvent::reply(
                    session.client,
                    merge(session.replies.into_values()),
                )]
            }
            InEvent::InternalMessage(message @ RegisterMessage::Request(_)) => {
                panic!("quorum front end cannot handle {message:?} from {from}")
            }
        }
    }

    /// Resends every pending request to the registers that did not reply to it yet.
    fn resend(&self) -> Vec<OutEvent<RegisterProtocol>> {
        let mut outs = Vec::new();
        for (id, session) in &self.sessions {
            for register in REGISTERS {
                if !session.replies.contains_key(register) {
                    self.logger
                        .debug(format!("session {id}: resending to {register}"));
                    outs.push(OutEvent::message(
                        register,
                        RegisterMessage::Request(InternalRequest {
                            id: *id,
                            request: session.request.clone(),
                        }),
                    ));
                }
            }
        }
        outs
    }
}

/// Answers the client only once every register replied, with the longest contents seen.
/// Unanswered requests are resent on every tick to the registers that are still silent.
#[derive(Debug, Serialize)]
pub struct QuorumFrontEnd {
    #[serde(flatten)]
    quorum: Quorum,
}

impl QuorumFrontEnd {
    pub fn new(logger: ComponentLogger) -> Self {
        Self {
            quorum: Quorum::new(logger),
        }
    }
}

impl Reactor for QuorumFrontEnd {
    type Protocol = RegisterProtocol;

    fn receive(
        &mut self,
        _at: SimulatedTime,
        from: &str,
        event: InEvent<RegisterProtocol>,
    ) -> Vec<OutEvent<RegisterProtocol>> {
        self.quorum.receive(from, event)
    }

    fn tick(&mut self, _at: SimulatedTime) -> Vec<OutEvent<RegisterProtocol>> {
        self.quorum.resend()
    }

    fn snapshot(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// [`QuorumFrontEnd`] that retries on its own timer instead of the scheduler's ticks.
///
/// A timer is armed when a request arrives and re-armed after every resend while requests are
/// still pending.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimerQuorumFrontEnd {
    #[serde(flatten)]
    quorum: Quorum,
    timer_armed: bool,
}

impl TimerQuorumFrontEnd {
    pub fn new(logger: ComponentLogger) -> Self {
        Self {
            quorum: Quorum::new(logger),
            timer_armed: false,
        }
    }

    fn arm(&mut self) -> OutEvent<RegisterProtocol> {
        self.timer_armed = true;
        OutEvent::timer(self.quorum.logger.component(), RETRY_INTERVAL)
    }
}

impl Reactor for TimerQuorumFrontEnd {
    type Protocol = RegisterProtocol;

    fn receive(
        &mut self,
        _at: SimulatedTime,
        from: &str,
        event: InEvent<RegisterProtocol>,
    ) -> Vec<OutEvent<RegisterProtocol>> {
        let is_request = matches!(event, InEvent::ClientRequest { .. });
        let mut outs = self.quorum.receive(from, event);
        if is_request && !self.timer_armed {
            outs.push(self.arm());
        }
        outs
    }

    fn timer(&mut self, _at: SimulatedTime) -> Vec<OutEvent<RegisterProtocol>> {
        self.timer_armed = false;
        let mut outs = self.quorum.resend();
        if !self.quorum.is_idle() {
            outs.push(self.arm());
        }
        outs
    }

    fn snapshot(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
