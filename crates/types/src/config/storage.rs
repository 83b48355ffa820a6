// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const DEFAULT_DATA_DIRECTORY: &str = ".detsys";

/// # Storage options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[serde(rename_all = "kebab-case")]
#[builder(default)]
pub struct StorageOptions {
    /// # Data directory
    ///
    /// Where deployments and execution-step logs are kept. Defaults to `$HOME/.detsys` and can
    /// be overridden with the `DETSYS_DB` environment variable.
    pub data_dir: PathBuf,
}

impl StorageOptions {
    pub fn deployments_path(&self) -> PathBuf {
        self.data_dir.join("deployments.json")
    }

    pub fn execution_steps_path(&self) -> PathBuf {
        self.data_dir.join("execution-steps.jsonl")
    }
}

impl Default for StorageOptions {
    fn default() -> Self {
        let base = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default();
        Self {
            data_dir: base.join(DEFAULT_DATA_DIRECTORY),
        }
    }
}
