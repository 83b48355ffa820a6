// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Shared vocabulary of the deterministic simulation harness: identifiers, the reactor and
//! marshaler contracts, the wire envelopes exchanged with the scheduler, faults and the
//! process configuration.

pub mod config;
pub mod config_loader;
pub mod deployment;
pub mod event;
pub mod fault;
pub mod history;
pub mod identifiers;
pub mod marshaler;
pub mod reactor;
pub mod time;

pub use identifiers::{ClientId, CorrelationId, RunId, RunMeta, TestId};
pub use time::SimulatedTime;
