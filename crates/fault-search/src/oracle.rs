// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use detsys_types::config::SearchOptions;
use detsys_types::fault::{FailSpec, FaultSet};
use detsys_types::{RunId, TestId};

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("cannot spawn fault oracle '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("fault oracle '{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("cannot decode fault oracle output: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("fault oracle has no run to learn from")]
    NoRuns,
    #[error("no network trace for run {0}")]
    MissingTrace(RunId),
}

/// Proposes the next fault set to explore.
///
/// Given the runs performed so far, an oracle either proposes a new fault set or returns an
/// empty one once the search space bounded by the [`FailSpec`] is exhausted.
#[async_trait]
pub trait FaultOracle: Send + Sync {
    async fn next_faults(
        &self,
        test_id: TestId,
        run_ids: &[RunId],
        fail_spec: &FailSpec,
    ) -> Result<FaultSet, OracleError>;
}

#[derive(Debug, Deserialize)]
struct LdfiReply {
    faults: FaultSet,
}

/// Lineage-driven fault injection through the external `detsys-ldfi` executable.
#[derive(Debug, Clone)]
pub struct LdfiOracle {
    command: String,
}

impl LdfiOracle {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_options(opts: &SearchOptions) -> Self {
        Self::new(opts.ldfi_command.clone())
    }

    fn arguments(test_id: TestId, run_ids: &[RunId], fail_spec: &FailSpec) -> Vec<String> {
        let mut args = vec![
            "--eff".to_owned(),
            fail_spec.eff.to_string(),
            "--crashes".to_owned(),
            fail_spec.crashes.to_string(),
            "--test-id".to_owned(),
            test_id.to_string(),
            "--run-ids".to_owned(),
        ];
        args.extend(run_ids.iter().map(RunId::to_string));
        args.push("--json".to_owned());
        args
    }
}

#[async_trait]
impl FaultOracle for LdfiOracle {
    async fn next_faults(
        &self,
        test_id: TestId,
        run_ids: &[RunId],
        fail_spec: &FailSpec,
    ) -> Result<FaultSet, OracleError> {
        if run_ids.is_empty() {
            return Err(OracleError::NoRuns);
        }

        let args = Self::arguments(test_id, run_ids, fail_spec);
        debug!(command = %self.command, ?args, "Querying fault oracle");

        let output = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| OracleError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OracleError::Failed {
                command: self.command.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let reply: LdfiReply = serde_json::from_slice(&output.stdout)?;
        info!(%test_id, faults = reply.faults.len(), "Fault oracle replied");
        Ok(reply.faults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use googletest::prelude::*;

    #[test]
    fn ldfi_arguments() {
        let args = LdfiOracle::arguments(
            TestId::new(3),
            &[RunId::new(0), RunId::new(1)],
            &FailSpec::default(),
        );

        assert_that!(
            args,
            elements_are![
                eq("--eff"),
                eq("7"),
                eq("--crashes"),
                eq("0"),
                eq("--test-id"),
                eq("3"),
                eq("--run-ids"),
                eq("0"),
                eq("1"),
                eq("--json")
            ]
        );
    }
}
