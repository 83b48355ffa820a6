// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Identifiers handed out by the scheduler and treated as opaque handles by the executor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies an immutable test fixture: a topology plus its initial agenda.
#[derive(
    PartialEq,
    Eq,
    Ord,
    PartialOrd,
    Clone,
    Copy,
    Hash,
    Debug,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    derive_more::FromStr,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct TestId(u64);

impl TestId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// One deterministic execution of a [`TestId`] under a given seed, fault set and tick frequency.
#[derive(
    PartialEq,
    Eq,
    Ord,
    PartialOrd,
    Clone,
    Copy,
    Hash,
    Debug,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    derive_more::FromStr,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct RunId(u64);

impl RunId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// The pair of identifiers every execution-step record is keyed by.
#[derive(PartialEq, Eq, Clone, Copy, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunMeta {
    pub test_id: TestId,
    pub run_id: RunId,
}

impl RunMeta {
    pub const fn new(test_id: TestId, run_id: RunId) -> Self {
        Self { test_id, run_id }
    }
}

impl fmt::Display for RunMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "test {} / run {}", self.test_id, self.run_id)
    }
}

const CLIENT_PREFIX: &str = "client:";

/// A client of the system under test. On the wire clients are addressed as `client:<id>`.
#[derive(
    PartialEq,
    Eq,
    Ord,
    PartialOrd,
    Clone,
    Copy,
    Hash,
    Debug,
    derive_more::From,
    derive_more::Into,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(u64);

impl ClientId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The wire address of this client, e.g. `client:0`.
    pub fn address(self) -> String {
        self.to_string()
    }

    /// Returns true if `address` names a client rather than a component.
    pub fn is_client_address(address: &str) -> bool {
        address.starts_with(CLIENT_PREFIX)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CLIENT_PREFIX}{}", self.0)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("'{0}' is not a client address, expected 'client:<id>'")]
pub struct InvalidClientAddress(pub String);

impl FromStr for ClientId {
    type Err = InvalidClientAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(CLIENT_PREFIX)
            .and_then(|id| id.parse().ok())
            .map(ClientId)
            .ok_or_else(|| InvalidClientAddress(s.to_owned()))
    }
}

/// Opaque id echoed from the `correlation-id` request header into every reply event.
#[derive(
    PartialEq, Eq, Clone, Copy, Hash, Debug, derive_more::Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CorrelationId(i64);

impl CorrelationId {
    /// Used whenever the caller did not send a parseable correlation id.
    pub const UNKNOWN: Self = Self(-1);

    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Parses a header value, falling back to [`CorrelationId::UNKNOWN`].
    pub fn parse_or_unknown(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .map(Self)
            .unwrap_or(Self::UNKNOWN)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use googletest::prelude::*;

    #[test]
    fn client_address_round_trip() {
        let client = ClientId::new(7);
        assert_that!(client.address(), eq("client:7"));
        assert_that!("client:7".parse::<ClientId>(), ok(eq(client)));
    }

    #[test]
    fn component_names_are_not_clients() {
        assert_that!(ClientId::is_client_address("frontend"), eq(false));
        assert_that!(
            "frontend".parse::<ClientId>(),
            err(eq(InvalidClientAddress("frontend".to_owned())))
        );
        assert_that!("client:abc".parse::<ClientId>().is_err(), eq(true));
    }

    #[test]
    fn correlation_id_defaults_to_unknown() {
        assert_that!(CorrelationId::parse_or_unknown(Some("7")), eq(CorrelationId::new(7)));
        assert_that!(CorrelationId::parse_or_unknown(Some("seven")), eq(CorrelationId::UNKNOWN));
        assert_that!(CorrelationId::parse_or_unknown(None), eq(CorrelationId::new(-1)));
    }

    #[test]
    fn identifiers_are_bare_integers_on_the_wire() {
        let meta = RunMeta::new(TestId::new(1), RunId::new(2));
        assert_that!(
            serde_json::to_string(&meta).unwrap(),
            eq(r#"{"test-id":1,"run-id":2}"#)
        );
    }
}
