// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Wire envelopes exchanged between the scheduler and an executor.
//!
//! Payloads travel as generic tagged JSON objects; the `event` tag selects, through the
//! [`Marshaler`] bound to the topology, the typed payload a reactor sees.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identifiers::{ClientId, CorrelationId, InvalidClientAddress, RunMeta};
use crate::marshaler::{DecodeError, Marshaler};
use crate::reactor::{Args, InEvent, OutEvent, Protocol};
use crate::time::SimulatedTime;

/// Kind of an event issued by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduledKind {
    /// A client request, `from` is a client address.
    Invoke,
    /// A message between two components.
    Message,
    /// A fault. Faults are applied by the scheduler and never reach a reactor.
    Fault,
}

/// The untyped form of a [`ScheduledEvent`] as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEventEnvelope {
    pub at: SimulatedTime,
    pub from: String,
    pub to: String,
    pub kind: ScheduledKind,
    pub event: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RunMeta>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    InvalidClient(#[from] InvalidClientAddress),
    #[error("fault events are applied by the scheduler and cannot be delivered to '{to}'")]
    FaultNotDeliverable { to: String },
}

/// An event with an assigned simulated delivery time, decoded for protocol `P`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent<P: Protocol> {
    pub at: SimulatedTime,
    pub from: String,
    pub to: String,
    pub event: InEvent<P>,
}

impl ScheduledEventEnvelope {
    pub fn decode<M: Marshaler>(
        &self,
        marshaler: &M,
    ) -> Result<ScheduledEvent<M::Protocol>, EnvelopeError> {
        let event = match self.kind {
            ScheduledKind::Invoke => {
                let id: ClientId = self.from.parse()?;
                let request = marshaler.unmarshal_request(&self.event, &self.args)?;
                InEvent::ClientRequest { id, request }
            }
            ScheduledKind::Message => {
                InEvent::InternalMessage(marshaler.unmarshal_message(&self.event, &self.args)?)
            }
            ScheduledKind::Fault => {
                return Err(EnvelopeError::FaultNotDeliverable {
                    to: self.to.clone(),
                })
            }
        };

        Ok(ScheduledEvent {
            at: self.at,
            from: self.from.clone(),
            to: self.to.clone(),
            event,
        })
    }
}

/// Kind of an event handed back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutgoingKind {
    /// A successful client response.
    Ok,
    Message,
    Timer,
}

#[derive(Serialize)]
struct ClientResponseArgs<'a, R> {
    id: ClientId,
    response: &'a R,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimerArgs {
    pub duration_ns: u64,
}

impl TimerArgs {
    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.duration_ns)
    }
}

/// An out event on the wire, tagged with the component that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnscheduledEvent {
    pub from: String,
    pub to: String,
    pub kind: OutgoingKind,
    pub event: String,
    pub args: serde_json::Value,
    pub corr_id: CorrelationId,
}

impl UnscheduledEvent {
    pub fn encode<M: Marshaler>(
        marshaler: &M,
        from: &str,
        out: OutEvent<M::Protocol>,
        corr_id: CorrelationId,
    ) -> Result<Self, serde_json::Error> {
        let event = marshaler.marshal_event(&out.args);
        let (kind, args) = match &out.args {
            Args::ClientResponse { id, response } => (
                OutgoingKind::Ok,
                serde_json::to_value(ClientResponseArgs { id: *id, response })?,
            ),
            Args::InternalMessage(message) => {
                (OutgoingKind::Message, serde_json::to_value(message)?)
            }
            Args::Timer { after } => (
                OutgoingKind::Timer,
                serde_json::to_value(TimerArgs {
                    duration_ns: u64::try_from(after.as_nanos()).unwrap_or(u64::MAX),
                })?,
            ),
        };

        Ok(Self {
            from: from.to_owned(),
            to: out.to,
            kind,
            event,
            args,
            corr_id,
        })
    }

    /// Encodes everything one reactor invocation produced, preserving its order.
    pub fn encode_all<M: Marshaler>(
        marshaler: &M,
        from: &str,
        outs: Vec<OutEvent<M::Protocol>>,
        corr_id: CorrelationId,
    ) -> Result<Vec<Self>, serde_json::Error> {
        outs.into_iter()
            .map(|out| Self::encode(marshaler, from, out, corr_id))
            .collect()
    }
}

/// Reply body of every delivery endpoint. `events` is always present, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<UnscheduledEvent>,
}

impl From<Vec<UnscheduledEvent>> for EventsResponse {
    fn from(events: Vec<UnscheduledEvent>) -> Self {
        Self { events }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRequest {
    #[serde(alias = "reactor")]
    pub component: String,
    pub at: SimulatedTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerRequest {
    pub to: String,
    pub at: SimulatedTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RunMeta>,
}
