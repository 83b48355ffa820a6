// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use detsys_types::config::StorageOptions;
use detsys_types::deployment::{DeploymentInfo, ExecutionStep};
use detsys_types::TestId;

use crate::{DeploymentStore, Result, StepLog, StorageError};

type Deployments = BTreeMap<TestId, Vec<DeploymentInfo>>;

/// Store rooted in a data directory.
///
/// Deployments live in a single JSON document, execution steps are appended one JSON object
/// per line so that a crashed run still leaves every completed step readable.
#[derive(Debug)]
pub struct FileStore {
    deployments_path: PathBuf,
    steps_path: PathBuf,
    steps: Mutex<BufWriter<File>>,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl FileStore {
    pub fn open(opts: &StorageOptions) -> Result<Self> {
        fs::create_dir_all(&opts.data_dir).map_err(io_error(&opts.data_dir))?;

        let steps_path = opts.execution_steps_path();
        let steps = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&steps_path)
            .map_err(io_error(&steps_path))?;

        debug!(data_dir = %opts.data_dir.display(), "Opened file store");
        Ok(Self {
            deployments_path: opts.deployments_path(),
            steps_path,
            steps: Mutex::new(BufWriter::new(steps)),
        })
    }

    pub fn execution_steps_path(&self) -> &Path {
        &self.steps_path
    }

    /// Reads back an execution-step log written by [`FileStore`].
    pub fn read_steps(path: &Path) -> Result<Vec<ExecutionStep>> {
        let file = File::open(path).map_err(io_error(path))?;
        let mut steps = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(io_error(path))?;
            if line.trim().is_empty() {
                continue;
            }
            steps.push(
                serde_json::from_str(&line).map_err(|source| StorageError::Corrupted {
                    path: path.display().to_string(),
                    source,
                })?,
            );
        }
        Ok(steps)
    }

    fn load_deployments(&self) -> Result<Deployments> {
        let path = &self.deployments_path;
        match fs::read(path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupted {
                    path: path.display().to_string(),
                    source,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Deployments::new()),
            Err(err) => Err(io_error(path)(err)),
        }
    }
}

impl DeploymentStore for FileStore {
    fn deployment(&self, test_id: TestId) -> Result<Vec<DeploymentInfo>> {
        self.load_deployments()?
            .remove(&test_id)
            .ok_or(StorageError::UnknownTest(test_id))
    }

    fn insert_deployment(&self, test_id: TestId, deployment: Vec<DeploymentInfo>) -> Result<()> {
        let mut deployments = self.load_deployments()?;
        deployments.insert(test_id, deployment);
        let bytes = serde_json::to_vec_pretty(&deployments).map_err(StorageError::Encode)?;
        fs::write(&self.deployments_path, bytes).map_err(io_error(&self.deployments_path))
    }
}

impl StepLog for FileStore {
    fn append(&self, step: ExecutionStep) -> Result<()> {
        let mut line = serde_json::to_vec(&step).map_err(StorageError::Encode)?;
        line.push(b'\n');

        let mut steps = self.steps.lock();
        steps
            .write_all(&line)
            .and_then(|()| steps.flush())
            .map_err(io_error(&self.steps_path))
    }
}
