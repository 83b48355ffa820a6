// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! What a run looked like from the outside: the operations clients observed and the trace of
//! internal messages the scheduler delivered or dropped.

use serde::{Deserialize, Serialize};

use crate::identifiers::ClientId;
use crate::time::SimulatedTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// A client issued a request.
    Invoke,
    /// A client received a response.
    Ok,
}

/// One entry of the client-visible history of a run, in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Operation {
    pub kind: OperationKind,
    pub client: ClientId,
    pub at: SimulatedTime,
    pub event: String,
    pub args: serde_json::Value,
}

impl Operation {
    pub fn is_invoke(&self) -> bool {
        self.kind == OperationKind::Invoke
    }
}

/// An internal message the scheduler popped from its queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkTraceEntry {
    /// Logical position of the message in the run.
    pub at: u64,
    pub simulated_time: SimulatedTime,
    pub from: String,
    pub to: String,
    pub event: String,
    pub dropped: bool,
}
