// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use detsys_types::config::SearchOptions;
use detsys_types::RunMeta;

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("cannot spawn checker '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no history recorded for {0}")]
    MissingHistory(RunMeta),
    #[error("checker failed: {0}")]
    Other(String),
}

/// Checks a finished run against a correctness model.
///
/// `Ok(false)` means the run violates the model. That is the expected outcome of a successful
/// search, not an error.
#[async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, model: &str, meta: RunMeta) -> Result<bool, CheckError>;
}

/// Exit status of `detsys-checker` for a run that violates the model.
const VIOLATION_EXIT_CODE: i32 = 1;

/// Runs the external `detsys-checker`.
///
/// Exit status 0 means the run passed and 1 that it violates the model. Any other status,
/// including termination by a signal, is a checker failure.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    command: String,
}

impl CommandChecker {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_options(opts: &SearchOptions) -> Self {
        Self::new(opts.checker_command.clone())
    }
}

#[async_trait]
impl Checker for CommandChecker {
    async fn check(&self, model: &str, meta: RunMeta) -> Result<bool, CheckError> {
        debug!(command = %self.command, model, %meta, "Checking run");
        let output = Command::new(&self.command)
            .arg("--model")
            .arg(model)
            .arg("--test-id")
            .arg(meta.test_id.to_string())
            .arg("--run-id")
            .arg(meta.run_id.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CheckError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        match output.status.code() {
            Some(0) => Ok(true),
            Some(VIOLATION_EXIT_CODE) => {
                info!(
                    %meta,
                    stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                    "Run does not pass analysis"
                );
                Ok(false)
            }
            _ => Err(CheckError::Other(format!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }
}
