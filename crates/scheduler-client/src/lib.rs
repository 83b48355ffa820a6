// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Typed client of the scheduler's command protocol.
//!
//! Every command is a `POST` of `{"command": <name>, "parameters": {...}}` to a single endpoint.
//! Any non-success status or undecodable reply means the harness lost synchronization with the
//! scheduler; callers are expected to give up rather than retry.

mod client;
mod command;
mod errors;

pub use client::SchedulerClient;
pub use command::{CreatedRun, QueueSize, SchedulerCommand};
pub use errors::{ApiError, Error};

use async_trait::async_trait;
use detsys_types::fault::FaultSet;
use detsys_types::{RunId, TestId};

/// The command vocabulary of the scheduler.
#[async_trait]
pub trait SchedulerApi: Send + Sync {
    /// Loads the agenda of `test_id` into the scheduler's queue.
    async fn load_test(&self, test_id: TestId) -> Result<QueueSize, Error>;

    /// Announces an executor reachable at `executor_id` hosting `components`.
    async fn register_executor(
        &self,
        executor_id: &str,
        components: Vec<String>,
    ) -> Result<(), Error>;

    async fn set_seed(&self, seed: u64) -> Result<(), Error>;

    async fn create_run(&self, test_id: TestId) -> Result<RunId, Error>;

    async fn inject_faults(&self, faults: &FaultSet) -> Result<(), Error>;

    /// Ticks per simulated second, zero disables ticks.
    async fn set_tick_frequency(&self, tick_frequency: f64) -> Result<(), Error>;

    /// Drives the current run until the scheduler's queue is exhausted.
    async fn run(&self) -> Result<(), Error>;

    async fn status(&self) -> Result<serde_json::Map<String, serde_json::Value>, Error>;

    async fn reset(&self) -> Result<(), Error>;
}
