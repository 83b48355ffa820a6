// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Key/value lookup of persisted topologies and the append-only execution-step log.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use detsys_types::deployment::{DeploymentInfo, ExecutionStep};
use detsys_types::TestId;

/// Storage error
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no deployment stored for test {0}")]
    UnknownTest(TestId),
    #[error("io error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupted record in '{path}': {source}")]
    Corrupted {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Persisted topology metadata, keyed by test.
pub trait DeploymentStore: Send + Sync {
    /// Components of the test in registration order.
    fn deployment(&self, test_id: TestId) -> Result<Vec<DeploymentInfo>>;

    fn insert_deployment(&self, test_id: TestId, deployment: Vec<DeploymentInfo>) -> Result<()>;
}

/// Append-only sink of execution steps. Records are never read back by the executor.
pub trait StepLog: Send + Sync {
    fn append(&self, step: ExecutionStep) -> Result<()>;
}

impl<T: StepLog + ?Sized> StepLog for std::sync::Arc<T> {
    fn append(&self, step: ExecutionStep) -> Result<()> {
        (**self).append(step)
    }
}

impl<T: DeploymentStore + ?Sized> DeploymentStore for std::sync::Arc<T> {
    fn deployment(&self, test_id: TestId) -> Result<Vec<DeploymentInfo>> {
        (**self).deployment(test_id)
    }

    fn insert_deployment(&self, test_id: TestId, deployment: Vec<DeploymentInfo>) -> Result<()> {
        (**self).insert_deployment(test_id, deployment)
    }
}
