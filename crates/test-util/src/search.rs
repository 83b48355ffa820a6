// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use tracing::debug;

use detsys_fault_search::{CheckError, Checker, FaultOracle, OracleError};
use detsys_types::fault::{FailSpec, Fault, FaultSet};
use detsys_types::history::Operation;
use detsys_types::marshaler::Marshaler;
use detsys_types::{ClientId, RunId, RunMeta, TestId};

use crate::local_scheduler::LocalScheduler;

/// Checks the client history a [`LocalScheduler`] recorded for a run.
pub struct HistoryChecker<M: Marshaler, F> {
    scheduler: LocalScheduler<M>,
    model: F,
}

impl<M, F> HistoryChecker<M, F>
where
    M: Marshaler,
    F: Fn(&[Operation]) -> bool + Send + Sync,
{
    pub fn new(scheduler: LocalScheduler<M>, model: F) -> Self {
        Self { scheduler, model }
    }
}

#[async_trait]
impl<M, F> Checker for HistoryChecker<M, F>
where
    M: Marshaler,
    F: Fn(&[Operation]) -> bool + Send + Sync,
{
    async fn check(&self, _model: &str, meta: RunMeta) -> Result<bool, CheckError> {
        let history = self
            .scheduler
            .history(meta.run_id)
            .ok_or(CheckError::MissingHistory(meta))?;
        Ok((self.model)(&history.operations))
    }
}

/// Explores single omissions, earliest first, from the network traces of past runs.
///
/// Only messages between components at a logical position below `eff` are candidates. Once
/// every candidate was injected the search space is reported as exhausted.
pub struct TraceOracle<M: Marshaler> {
    scheduler: LocalScheduler<M>,
}

impl<M: Marshaler> TraceOracle<M> {
    pub fn new(scheduler: LocalScheduler<M>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl<M: Marshaler> FaultOracle for TraceOracle<M> {
    async fn next_faults(
        &self,
        _test_id: TestId,
        run_ids: &[RunId],
        fail_spec: &FailSpec,
    ) -> Result<FaultSet, OracleError> {
        if run_ids.is_empty() {
            return Err(OracleError::NoRuns);
        }

        let mut tried = HashSet::new();
        let mut candidates = BTreeSet::new();
        for run_id in run_ids {
            let history = self
                .scheduler
                .history(*run_id)
                .ok_or(OracleError::MissingTrace(*run_id))?;
            tried.insert(history.faults);
            candidates.extend(
                history
                    .network_trace
                    .into_iter()
                    .filter(|entry| entry.at < u64::from(fail_spec.eff))
                    .filter(|entry| {
                        !ClientId::is_client_address(&entry.from)
                            && !ClientId::is_client_address(&entry.to)
                    })
                    .map(|entry| (entry.at, entry.from, entry.to)),
            );
        }

        let next = candidates
            .into_iter()
            .map(|(at, from, to)| FaultSet::from(vec![Fault::omission(from, to, at)]))
            .find(|faults| !tried.contains(faults))
            .unwrap_or_default();
        debug!(?next, "Proposing faults");
        Ok(next)
    }
}
