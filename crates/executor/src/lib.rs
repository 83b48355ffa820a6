// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Hosts the reactors of a test and exposes them to the scheduler.

mod executor;
mod heap_diff;
pub mod log_capture;
pub mod rest_api;
mod service;
pub mod topology;

pub use executor::{DeliveryError, Executor};
pub use heap_diff::heap_diff;
pub use log_capture::{ComponentLogger, LogCapture};
pub use service::{Error, ExecutorService, StartSignal};
pub use topology::{ReactorFactory, Topology, TopologyError};
