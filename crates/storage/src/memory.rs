// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;

use parking_lot::Mutex;

use detsys_types::deployment::{DeploymentInfo, ExecutionStep};
use detsys_types::{RunMeta, TestId};

use crate::{DeploymentStore, Result, StepLog, StorageError};

/// In-process store, used by tests and by executors that don't need to keep their steps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    deployments: Mutex<HashMap<TestId, Vec<DeploymentInfo>>>,
    steps: Mutex<Vec<ExecutionStep>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every step appended so far, in append order.
    pub fn steps(&self) -> Vec<ExecutionStep> {
        self.steps.lock().clone()
    }

    pub fn steps_of(&self, meta: RunMeta) -> Vec<ExecutionStep> {
        self.steps
            .lock()
            .iter()
            .filter(|step| step.meta() == meta)
            .cloned()
            .collect()
    }
}

impl DeploymentStore for MemoryStore {
    fn deployment(&self, test_id: TestId) -> Result<Vec<DeploymentInfo>> {
        self.deployments
            .lock()
            .get(&test_id)
            .cloned()
            .ok_or(StorageError::UnknownTest(test_id))
    }

    fn insert_deployment(&self, test_id: TestId, deployment: Vec<DeploymentInfo>) -> Result<()> {
        self.deployments.lock().insert(test_id, deployment);
        Ok(())
    }
}

impl StepLog for MemoryStore {
    fn append(&self, step: ExecutionStep) -> Result<()> {
        self.steps.lock().push(step);
        Ok(())
    }
}
