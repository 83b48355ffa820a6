// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Wire vocabulary of the replicated register.
//!
//! Clients write integers and read back everything written so far. The front end relays
//! both kinds of request to the registers as an [`InternalRequest`] tagged with a session
//! id, and the registers answer with an [`InternalResponse`] for the same session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use detsys_types::marshaler::{decode_payload, DecodeError, Marshaler};
use detsys_types::reactor::{Args, Protocol};

pub const WRITE: &str = "write";
pub const READ: &str = "read";
pub const ACK: &str = "ack";
pub const VALUE: &str = "value";
pub const TIMER: &str = "timer";

/// Correlates the replies of the registers with the client request that caused them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Write {
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Read {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RegisterRequest {
    Write(Write),
    Read(Read),
}

impl RegisterRequest {
    pub fn tag(&self) -> &'static str {
        match self {
            RegisterRequest::Write(_) => WRITE,
            RegisterRequest::Read(_) => READ,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {}

/// Every value a register holds, in write order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contents {
    pub value: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RegisterResponse {
    Ack(Ack),
    Contents(Contents),
}

impl RegisterResponse {
    pub fn tag(&self) -> &'static str {
        match self {
            RegisterResponse::Ack(_) => ACK,
            RegisterResponse::Contents(_) => VALUE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalRequest {
    pub id: SessionId,
    pub request: RegisterRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalResponse {
    pub id: SessionId,
    pub response: RegisterResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RegisterMessage {
    Request(InternalRequest),
    Response(InternalResponse),
}

impl RegisterMessage {
    /// Internal messages share the tag of the request or response they carry.
    pub fn tag(&self) -> &'static str {
        match self {
            RegisterMessage::Request(InternalRequest { request, .. }) => request.tag(),
            RegisterMessage::Response(InternalResponse { response, .. }) => response.tag(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterProtocol;

impl Protocol for RegisterProtocol {
    type Request = RegisterRequest;
    type Response = RegisterResponse;
    type Message = RegisterMessage;
}

#[derive(Deserialize)]
struct RequestPayload<T> {
    id: SessionId,
    request: T,
}

#[derive(Deserialize)]
struct ResponsePayload<T> {
    id: SessionId,
    response: T,
}

fn internal_request(id: SessionId, request: RegisterRequest) -> RegisterMessage {
    RegisterMessage::Request(InternalRequest { id, request })
}

fn internal_response(id: SessionId, response: RegisterResponse) -> RegisterMessage {
    RegisterMessage::Response(InternalResponse { id, response })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterMarshaler;

impl RegisterMarshaler {
    /// Decodes the arguments of a client response as recorded in a run history.
    pub fn unmarshal_response(
        &self,
        tag: &str,
        payload: &Value,
    ) -> Result<RegisterResponse, DecodeError> {
        match tag {
            ACK => decode_payload(tag, payload).map(RegisterResponse::Ack),
            VALUE => decode_payload(tag, payload).map(RegisterResponse::Contents),
            _ => Err(DecodeError::unknown_message(tag)),
        }
    }
}

impl Marshaler for RegisterMarshaler {
    type Protocol = RegisterProtocol;

    fn unmarshal_request(&self, tag: &str, payload: &Value) -> Result<RegisterRequest, DecodeError> {
        match tag {
            WRITE => decode_payload(tag, payload).map(RegisterRequest::Write),
            READ => decode_payload(tag, payload).map(RegisterRequest::Read),
            _ => Err(DecodeError::unknown_request(tag)),
        }
    }

    fn unmarshal_message(&self, tag: &str, payload: &Value) -> Result<RegisterMessage, DecodeError> {
        match tag {
            WRITE => decode_payload(tag, payload).map(|p: RequestPayload<Write>| {
                internal_request(p.id, RegisterRequest::Write(p.request))
            }),
            READ => decode_payload(tag, payload).map(|p: RequestPayload<Read>| {
                internal_request(p.id, RegisterRequest::Read(p.request))
            }),
            ACK => decode_payload(tag, payload).map(|p: ResponsePayload<Ack>| {
                internal_response(p.id, RegisterResponse::Ack(p.response))
            }),
            VALUE => decode_payload(tag, payload).map(|p: ResponsePayload<Contents>| {
                internal_response(p.id, RegisterResponse::Contents(p.response))
            }),
            _ => Err(DecodeError::unknown_message(tag)),
        }
    }

    fn marshal_event(&self, args: &Args<RegisterProtocol>) -> String {
        let tag = match args {
            Args::ClientResponse { response, .. } => response.tag(),
            Args::InternalMessage(message) => message.tag(),
            Args::Timer { .. } => TIMER,
        };
        tag.to_owned()
    }
}
