// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use googletest::prelude::*;
use test_log::test;

use detsys_fault_search::{CheckError, Checker, CommandChecker, FaultOracle, LdfiOracle, OracleError};
use detsys_types::fault::{FailSpec, Fault, FaultSet};
use detsys_types::{RunId, RunMeta, TestId};

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test(tokio::test)]
async fn ldfi_oracle_decodes_proposed_faults() {
    let dir = tempfile::tempdir().unwrap();
    let ldfi = script(
        dir.path(),
        "ldfi",
        r#"echo '{"faults": [{"kind": "omission", "from": "frontend", "to": "register2", "at": 3}], "statistics": {}}'"#,
    );

    let faults = LdfiOracle::new(ldfi.to_string_lossy())
        .next_faults(TestId::new(1), &[RunId::new(0)], &FailSpec::default())
        .await
        .unwrap();

    assert_that!(
        faults,
        eq(FaultSet::from(vec![Fault::omission("frontend", "register2", 3)]))
    );
}

#[test(tokio::test)]
async fn ldfi_oracle_passes_the_run_history() {
    let dir = tempfile::tempdir().unwrap();
    let args_file = dir.path().join("args");
    let ldfi = script(
        dir.path(),
        "ldfi",
        &format!(
            "echo \"$@\" > {}\necho '{{\"faults\": []}}'",
            args_file.display()
        ),
    );

    let faults = LdfiOracle::new(ldfi.to_string_lossy())
        .next_faults(
            TestId::new(2),
            &[RunId::new(0), RunId::new(1)],
            &FailSpec::default(),
        )
        .await
        .unwrap();

    assert_that!(faults.is_empty(), eq(true));
    assert_that!(
        std::fs::read_to_string(&args_file).unwrap().trim(),
        eq("--eff 7 --crashes 0 --test-id 2 --run-ids 0 1 --json")
    );
}

#[test(tokio::test)]
async fn failing_ldfi_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let ldfi = script(dir.path(), "ldfi", "echo 'no network trace' >&2\nexit 1");

    let err = LdfiOracle::new(ldfi.to_string_lossy())
        .next_faults(TestId::new(1), &[RunId::new(0)], &FailSpec::default())
        .await
        .unwrap_err();

    assert_that!(err, pat!(OracleError::Failed { .. }));
    assert_that!(err.to_string(), contains_substring("no network trace"));

    let err = LdfiOracle::new(dir.path().join("missing").to_string_lossy())
        .next_faults(TestId::new(1), &[RunId::new(0)], &FailSpec::default())
        .await
        .unwrap_err();
    assert_that!(err, pat!(OracleError::Spawn { .. }));
}

#[test(tokio::test)]
async fn command_checker_maps_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let checker = script(
        dir.path(),
        "checker",
        r#"test "$2" = "list-append" && test "$6" = "0""#,
    );
    let checker = CommandChecker::new(checker.to_string_lossy());

    let passing = RunMeta::new(TestId::new(1), RunId::new(0));
    let failing = RunMeta::new(TestId::new(1), RunId::new(1));

    assert_that!(checker.check("list-append", passing).await.unwrap(), eq(true));
    assert_that!(checker.check("list-append", failing).await.unwrap(), eq(false));
}

#[test(tokio::test)]
async fn broken_checker_is_not_a_violation() {
    let dir = tempfile::tempdir().unwrap();
    let meta = RunMeta::new(TestId::new(1), RunId::new(0));

    let killed = script(dir.path(), "killed", "kill -9 $$");
    let err = CommandChecker::new(killed.to_string_lossy())
        .check("list-append", meta)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::Other(_)));

    let unknown_status = script(dir.path(), "unknown", "echo 'not found' >&2\nexit 127");
    let err = CommandChecker::new(unknown_status.to_string_lossy())
        .check("list-append", meta)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::Other(ref message) if message.contains("not found")));
}
