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

/// A perturbation the scheduler applies to a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Fault {
    /// The message from `from` to `to` at logical position `at` is dropped before delivery.
    Omission { from: String, to: String, at: u64 },
}

impl Fault {
    pub fn omission(from: impl Into<String>, to: impl Into<String>, at: u64) -> Self {
        Fault::Omission {
            from: from.into(),
            to: to.into(),
            at,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Omission { from, to, at } => write!(f, "omission({from} -> {to} @ {at})"),
        }
    }
}

/// Ordered list of faults injected into one run.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::From,
    derive_more::Into,
    derive_more::IntoIterator,
)]
#[serde(transparent)]
pub struct FaultSet(#[into_iterator(owned, ref)] Vec<Fault>);

impl FaultSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fault> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Fault] {
        &self.0
    }

    /// Returns true if the message `from -> to` at logical position `at` must be dropped.
    pub fn omits(&self, from: &str, to: &str, at: u64) -> bool {
        self.0.iter().any(|fault| match fault {
            Fault::Omission {
                from: f,
                to: t,
                at: a,
            } => f == from && t == to && *a == at,
        })
    }
}

impl FromIterator<Fault> for FaultSet {
    fn from_iter<I: IntoIterator<Item = Fault>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Bounds handed opaquely to the fault-search oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_builder::Builder)]
#[serde(rename_all = "kebab-case")]
#[builder(default)]
pub struct FailSpec {
    /// End of finite failures: the logical position after which no omission may occur.
    pub eff: u32,
    /// Maximum number of crash faults.
    pub crashes: u32,
    /// End of time.
    pub eot: u32,
}

impl Default for FailSpec {
    fn default() -> Self {
        Self {
            eff: 7,
            crashes: 0,
            eot: 0,
        }
    }
}
