// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::VecDeque;

use async_trait::async_trait;
use googletest::prelude::*;
use parking_lot::Mutex;
use test_log::test;

use detsys_fault_search::{
    CheckError, Checker, FaultOracle, OracleError, RunLoop, SearchError, SearchOutcome,
};
use detsys_scheduler_client::{Error, QueueSize, SchedulerApi};
use detsys_types::config::{SearchOptions, SearchOptionsBuilder};
use detsys_types::fault::{FailSpec, Fault, FaultSet};
use detsys_types::{RunId, RunMeta, TestId};

const TEST: TestId = TestId::new(1);

#[derive(Default)]
struct RecordingScheduler {
    commands: Mutex<Vec<&'static str>>,
    injected: Mutex<Vec<FaultSet>>,
    next_run: Mutex<u64>,
    fail_run: bool,
}

impl RecordingScheduler {
    fn record(&self, command: &'static str) {
        self.commands.lock().push(command);
    }

    fn commands(&self) -> Vec<&'static str> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl SchedulerApi for RecordingScheduler {
    async fn load_test(&self, _test_id: TestId) -> std::result::Result<QueueSize, Error> {
        self.record("load-test!");
        Ok(QueueSize { queue_size: 2 })
    }

    async fn register_executor(
        &self,
        _executor_id: &str,
        _components: Vec<String>,
    ) -> std::result::Result<(), Error> {
        self.record("register-executor");
        Ok(())
    }

    async fn set_seed(&self, _seed: u64) -> std::result::Result<(), Error> {
        self.record("set-seed!");
        Ok(())
    }

    async fn create_run(&self, _test_id: TestId) -> std::result::Result<RunId, Error> {
        self.record("create-run!");
        let mut next = self.next_run.lock();
        let run_id = RunId::new(*next);
        *next += 1;
        Ok(run_id)
    }

    async fn inject_faults(&self, faults: &FaultSet) -> std::result::Result<(), Error> {
        self.record("inject-faults!");
        self.injected.lock().push(faults.clone());
        Ok(())
    }

    async fn set_tick_frequency(&self, _tick_frequency: f64) -> std::result::Result<(), Error> {
        self.record("set-tick-frequency!");
        Ok(())
    }

    async fn run(&self) -> std::result::Result<(), Error> {
        self.record("run!");
        if self.fail_run {
            return Err(Error::Rejected {
                command: "run!",
                reason: "queue is empty".to_owned(),
            });
        }
        Ok(())
    }

    async fn status(
        &self,
    ) -> std::result::Result<serde_json::Map<String, serde_json::Value>, Error> {
        self.record("status");
        Ok(serde_json::Map::new())
    }

    async fn reset(&self) -> std::result::Result<(), Error> {
        self.record("reset");
        Ok(())
    }
}

/// Replays a fixed list of proposals, then reports the search space as exhausted.
#[derive(Default)]
struct ScriptedOracle {
    proposals: Mutex<VecDeque<FaultSet>>,
    calls: Mutex<Vec<Vec<RunId>>>,
    endless: bool,
}

impl ScriptedOracle {
    fn new(proposals: impl IntoIterator<Item = FaultSet>) -> Self {
        Self {
            proposals: Mutex::new(proposals.into_iter().collect()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl FaultOracle for ScriptedOracle {
    async fn next_faults(
        &self,
        _test_id: TestId,
        run_ids: &[RunId],
        fail_spec: &FailSpec,
    ) -> std::result::Result<FaultSet, OracleError> {
        assert_eq!(fail_spec.eff, 7);
        self.calls.lock().push(run_ids.to_vec());
        if self.endless {
            return Ok(vec![Fault::omission("a", "b", run_ids.len() as u64)].into());
        }
        Ok(self.proposals.lock().pop_front().unwrap_or_default())
    }
}

/// Fails the given runs and passes every other one.
struct ScriptedChecker {
    failing: Vec<RunId>,
}

#[async_trait]
impl Checker for ScriptedChecker {
    async fn check(&self, model: &str, meta: RunMeta) -> std::result::Result<bool, CheckError> {
        assert_eq!(model, "list-append");
        Ok(!self.failing.contains(&meta.run_id))
    }
}

fn omission(at: u64) -> FaultSet {
    vec![Fault::omission("frontend", "register2", at)].into()
}

const ITERATION: [&str; 6] = [
    "reset",
    "inject-faults!",
    "set-tick-frequency!",
    "load-test!",
    "create-run!",
    "run!",
];

#[test(tokio::test)]
async fn unfaulted_violation_stops_after_one_run() {
    let scheduler = RecordingScheduler::default();
    let oracle = ScriptedOracle::new([omission(3)]);
    let checker = ScriptedChecker {
        failing: vec![RunId::new(0)],
    };

    let outcome = RunLoop::new(&scheduler, &oracle, &checker, &(), SearchOptions::default())
        .search(TEST)
        .await
        .unwrap();

    assert_that!(
        outcome,
        eq(SearchOutcome::Counterexample {
            test_id: TEST,
            run_id: RunId::new(0),
            faults: FaultSet::default(),
            runs: 1,
        })
    );
    assert_that!(scheduler.commands(), eq(ITERATION.to_vec()));
    assert_that!(oracle.calls.lock().clone(), empty());
}

#[test(tokio::test)]
async fn counterexample_reports_the_faults_of_the_failing_run() {
    let scheduler = RecordingScheduler::default();
    let oracle = ScriptedOracle::new([omission(2), omission(3)]);
    let checker = ScriptedChecker {
        failing: vec![RunId::new(2)],
    };

    let outcome = RunLoop::new(&scheduler, &oracle, &checker, &(), SearchOptions::default())
        .search(TEST)
        .await
        .unwrap();

    assert_that!(
        outcome,
        eq(SearchOutcome::Counterexample {
            test_id: TEST,
            run_id: RunId::new(2),
            faults: omission(3),
            runs: 3,
        })
    );
    assert_that!(
        scheduler.injected.lock().clone(),
        elements_are![eq(FaultSet::default()), eq(omission(2)), eq(omission(3))]
    );
    assert_that!(
        oracle.calls.lock().clone(),
        elements_are![
            eq(vec![RunId::new(0)]),
            eq(vec![RunId::new(0), RunId::new(1)])
        ]
    );
}

#[test(tokio::test)]
async fn exhausted_oracle_certifies_the_test() {
    let scheduler = RecordingScheduler::default();
    let oracle = ScriptedOracle::new([omission(3)]);
    let checker = ScriptedChecker { failing: vec![] };
    let options = SearchOptionsBuilder::default().seed(4).build().unwrap();

    let outcome = RunLoop::new(&scheduler, &oracle, &checker, &(), options)
        .search(TEST)
        .await
        .unwrap();

    assert_that!(
        outcome,
        eq(SearchOutcome::Certified {
            test_id: TEST,
            run_ids: vec![RunId::new(0), RunId::new(1)],
            runs: 2,
        })
    );
    assert_that!(outcome.is_counterexample(), eq(false));
    assert_that!(
        scheduler.commands()[..7].to_vec(),
        elements_are![
            eq("reset"),
            eq("inject-faults!"),
            eq("set-tick-frequency!"),
            eq("set-seed!"),
            eq("load-test!"),
            eq("create-run!"),
            eq("run!")
        ]
    );
}

#[test(tokio::test)]
async fn run_limit_bounds_the_search() {
    let scheduler = RecordingScheduler::default();
    let oracle = ScriptedOracle {
        endless: true,
        ..Default::default()
    };
    let checker = ScriptedChecker { failing: vec![] };
    let options = SearchOptionsBuilder::default().max_runs(3).build().unwrap();

    let err = RunLoop::new(&scheduler, &oracle, &checker, &(), options)
        .search(TEST)
        .await
        .unwrap_err();

    assert_that!(err, pat!(SearchError::RunLimitExceeded { .. }));
    assert_that!(oracle.calls.lock().len(), eq(3));
}

#[test(tokio::test)]
async fn scheduler_errors_abort_the_search() {
    let scheduler = RecordingScheduler {
        fail_run: true,
        ..Default::default()
    };
    let oracle = ScriptedOracle::default();
    let checker = ScriptedChecker { failing: vec![] };

    let err = RunLoop::new(&scheduler, &oracle, &checker, &(), SearchOptions::default())
        .search(TEST)
        .await
        .unwrap_err();

    assert!(matches!(err, SearchError::Scheduler(_)));
    assert_that!(err.to_string(), contains_substring("queue is empty"));
}
