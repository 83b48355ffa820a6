// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The fault-search run loop.
//!
//! A search repeatedly runs one test under a growing history of fault sets. Every finished run
//! is checked against a correctness model; a failing check is a counterexample and ends the
//! search, otherwise the oracle is asked for the next fault set given every run so far. The
//! search is certified once the oracle has nothing left to propose.

mod checker;
mod lifecycle;
mod oracle;
mod run_loop;

pub use checker::{CheckError, Checker, CommandChecker};
pub use lifecycle::{ExecutorLifecycle, LifecycleError, RemoteExecutor, RunLifecycle};
pub use oracle::{FaultOracle, LdfiOracle, OracleError};
pub use run_loop::{RunLoop, SearchError, SearchOutcome};
