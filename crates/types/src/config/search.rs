// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

use crate::fault::FailSpec;

/// # Fault search options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[serde(rename_all = "kebab-case")]
#[builder(default)]
pub struct SearchOptions {
    /// # Model
    ///
    /// Name of the correctness model runs are checked against.
    pub model: String,

    /// # Tick frequency
    ///
    /// Ticks per simulated second. Zero disables ticks.
    pub tick_frequency: f64,

    /// # Seed
    ///
    /// Scheduler seed. When unset the scheduler keeps its current seed.
    #[builder(setter(strip_option))]
    pub seed: Option<u64>,

    pub fail_spec: FailSpec,

    /// # Maximum runs
    ///
    /// Upper bound on the number of runs a single search may perform.
    #[builder(setter(strip_option))]
    pub max_runs: Option<usize>,

    /// # Oracle command
    ///
    /// Executable of the fault-search oracle.
    pub ldfi_command: String,

    /// # Checker command
    ///
    /// Executable checking a finished run against `model`.
    pub checker_command: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            model: "list-append".to_owned(),
            tick_frequency: 0.0,
            seed: None,
            fail_spec: FailSpec::default(),
            max_runs: None,
            ldfi_command: "detsys-ldfi".to_owned(),
            checker_command: "detsys-checker".to_owned(),
        }
    }
}
