// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The contract between the executor and the state machines of the system under test.

use std::fmt::Debug;
use std::time::Duration;

use serde::Serialize;

use crate::identifiers::ClientId;
use crate::time::SimulatedTime;

/// The payload vocabulary of a system under test.
///
/// The executor and the scheduler never look inside these types, only the [`Marshaler`]
/// bound to the topology does.
///
/// [`Marshaler`]: crate::marshaler::Marshaler
pub trait Protocol: Debug + Clone + PartialEq + Send + Sync + 'static {
    /// Requests issued by clients.
    type Request: Debug + Clone + PartialEq + Send + 'static;
    /// Replies sent back to clients.
    type Response: Debug + Clone + PartialEq + Serialize + Send + 'static;
    /// Messages exchanged between components.
    type Message: Debug + Clone + PartialEq + Serialize + Send + 'static;
}

/// An event addressed to a reactor.
#[derive(Debug, Clone, PartialEq)]
pub enum InEvent<P: Protocol> {
    ClientRequest { id: ClientId, request: P::Request },
    InternalMessage(P::Message),
}

/// The payload of an [`OutEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum Args<P: Protocol> {
    ClientResponse { id: ClientId, response: P::Response },
    InternalMessage(P::Message),
    /// Asks the scheduler to fire [`Reactor::timer`] on the addressee once `after` has elapsed.
    Timer { after: Duration },
}

/// An event produced by a reactor that has not been assigned a delivery time yet.
#[derive(Debug, Clone, PartialEq)]
pub struct OutEvent<P: Protocol> {
    pub to: String,
    pub args: Args<P>,
}

impl<P: Protocol> OutEvent<P> {
    pub fn reply(id: ClientId, response: P::Response) -> Self {
        Self {
            to: id.address(),
            args: Args::ClientResponse { id, response },
        }
    }

    pub fn message(to: impl Into<String>, message: P::Message) -> Self {
        Self {
            to: to.into(),
            args: Args::InternalMessage(message),
        }
    }

    pub fn timer(to: impl Into<String>, after: Duration) -> Self {
        Self {
            to: to.into(),
            args: Args::Timer { after },
        }
    }
}

/// A deterministic state machine modelling one component of the system under test.
///
/// Implementations must be a pure function of their own state and the arguments they are
/// called with: no wall-clock reads, no randomness, no I/O. Receiving an event the reactor
/// was not built to handle is a contract violation and must panic rather than be dropped.
pub trait Reactor: Send + 'static {
    type Protocol: Protocol;

    /// Called exactly once per run, before any scheduled event is delivered.
    fn init(&mut self) -> Vec<OutEvent<Self::Protocol>> {
        Vec::new()
    }

    fn receive(
        &mut self,
        at: SimulatedTime,
        from: &str,
        event: InEvent<Self::Protocol>,
    ) -> Vec<OutEvent<Self::Protocol>>;

    /// Periodic callback driven by the scheduler's tick frequency.
    fn tick(&mut self, _at: SimulatedTime) -> Vec<OutEvent<Self::Protocol>> {
        Vec::new()
    }

    /// Fired by the scheduler for a previously requested [`Args::Timer`].
    fn timer(&mut self, _at: SimulatedTime) -> Vec<OutEvent<Self::Protocol>> {
        Vec::new()
    }

    /// Plain-data view of the reactor state, diffed around every delivery.
    fn snapshot(&self) -> Result<serde_json::Value, serde_json::Error>;
}

impl<R: Reactor + ?Sized> Reactor for Box<R> {
    type Protocol = R::Protocol;

    fn init(&mut self) -> Vec<OutEvent<Self::Protocol>> {
        (**self).init()
    }

    fn receive(
        &mut self,
        at: SimulatedTime,
        from: &str,
        event: InEvent<Self::Protocol>,
    ) -> Vec<OutEvent<Self::Protocol>> {
        (**self).receive(at, from, event)
    }

    fn tick(&mut self, at: SimulatedTime) -> Vec<OutEvent<Self::Protocol>> {
        (**self).tick(at)
    }

    fn timer(&mut self, at: SimulatedTime) -> Vec<OutEvent<Self::Protocol>> {
        (**self).timer(at)
    }

    fn snapshot(&self) -> Result<serde_json::Value, serde_json::Error> {
        (**self).snapshot()
    }
}

/// A boxed reactor speaking protocol `P`, the unit the executor's topology stores.
pub type BoxedReactor<P> = Box<dyn Reactor<Protocol = P>>;
