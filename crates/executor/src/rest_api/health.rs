// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use detsys_types::marshaler::Marshaler;
use detsys_types::{RunMeta, TestId};

use crate::executor::Executor;

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct HealthResponse {
    test_id: TestId,
    run: Option<RunMeta>,
    components: Vec<String>,
}

/// Health check endpoint, also reporting what the executor hosts.
pub async fn health<M: Marshaler>(State(executor): State<Executor<M>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        test_id: executor.test_id(),
        run: executor.bound_run(),
        components: executor.components(),
    })
}
