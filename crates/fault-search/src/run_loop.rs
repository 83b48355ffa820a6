// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::{info, instrument, warn};

use detsys_scheduler_client::SchedulerApi;
use detsys_types::config::SearchOptions;
use detsys_types::fault::FaultSet;
use detsys_types::{RunId, RunMeta, TestId};

use crate::checker::{CheckError, Checker};
use crate::lifecycle::{LifecycleError, RunLifecycle};
use crate::oracle::{FaultOracle, OracleError};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Scheduler(#[from] detsys_scheduler_client::Error),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Check(#[from] CheckError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("search of test {test_id} did not settle within {limit} runs")]
    RunLimitExceeded { test_id: TestId, limit: usize },
}

/// How a search ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The run `run_id`, performed under `faults`, violates the model.
    Counterexample {
        test_id: TestId,
        run_id: RunId,
        faults: FaultSet,
        runs: usize,
    },
    /// Every run passed and the oracle has no fault set left to propose.
    Certified {
        test_id: TestId,
        run_ids: Vec<RunId>,
        runs: usize,
    },
}

impl SearchOutcome {
    pub fn runs(&self) -> usize {
        match self {
            SearchOutcome::Counterexample { runs, .. } | SearchOutcome::Certified { runs, .. } => {
                *runs
            }
        }
    }

    pub fn is_counterexample(&self) -> bool {
        matches!(self, SearchOutcome::Counterexample { .. })
    }
}

/// Drives runs of one test until a counterexample is found or the oracle is exhausted.
///
/// Runs are strictly sequential: executors are reset destructively between runs.
pub struct RunLoop<'a> {
    scheduler: &'a dyn SchedulerApi,
    oracle: &'a dyn FaultOracle,
    checker: &'a dyn Checker,
    lifecycle: &'a dyn RunLifecycle,
    options: SearchOptions,
}

impl<'a> RunLoop<'a> {
    pub fn new(
        scheduler: &'a dyn SchedulerApi,
        oracle: &'a dyn FaultOracle,
        checker: &'a dyn Checker,
        lifecycle: &'a dyn RunLifecycle,
        options: SearchOptions,
    ) -> Self {
        Self {
            scheduler,
            oracle,
            checker,
            lifecycle,
            options,
        }
    }

    #[instrument(level = "info", skip(self), fields(model = %self.options.model))]
    pub async fn search(&self, test_id: TestId) -> Result<SearchOutcome, SearchError> {
        let mut faults = FaultSet::default();
        let mut run_ids = Vec::new();

        loop {
            if let Some(limit) = self.options.max_runs {
                if run_ids.len() >= limit {
                    warn!(limit, "Giving up the search");
                    return Err(SearchError::RunLimitExceeded { test_id, limit });
                }
            }

            let meta = self.run_once(test_id, &faults).await?;
            if !self.checker.check(&self.options.model, meta).await? {
                info!(%meta, faults = faults.len(), "Found a counterexample");
                return Ok(SearchOutcome::Counterexample {
                    test_id,
                    run_id: meta.run_id,
                    faults,
                    runs: run_ids.len() + 1,
                });
            }

            run_ids.push(meta.run_id);
            faults = self
                .oracle
                .next_faults(test_id, &run_ids, &self.options.fail_spec)
                .await?;
            if faults.is_empty() {
                info!(runs = run_ids.len(), "No further faults can be injected, test certified");
                return Ok(SearchOutcome::Certified {
                    test_id,
                    runs: run_ids.len(),
                    run_ids,
                });
            }
        }
    }

    /// Performs a single run of `test_id` under `faults`.
    pub async fn run_once(&self, test_id: TestId, faults: &FaultSet) -> Result<RunMeta, SearchError> {
        self.scheduler.reset().await?;
        info!(?faults, "Injecting faults");
        self.scheduler.inject_faults(faults).await?;
        self.scheduler
            .set_tick_frequency(self.options.tick_frequency)
            .await?;
        if let Some(seed) = self.options.seed {
            self.scheduler.set_seed(seed).await?;
        }

        let queue = self.scheduler.load_test(test_id).await?;
        info!(queue_size = queue.queue_size, "Loaded test");
        let run_id = self.scheduler.create_run(test_id).await?;
        let meta = RunMeta::new(test_id, run_id);

        self.lifecycle.prepare(self.scheduler, meta).await?;
        self.scheduler.run().await?;
        self.lifecycle.teardown(meta).await?;
        info!(%meta, "Finished run");
        Ok(meta)
    }
}
