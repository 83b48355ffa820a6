// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The HTTP surface the scheduler delivers events through.

mod deliveries;
mod error;
mod health;

pub use deliveries::CORRELATION_ID_HEADER;
pub use error::ExecutorApiError;

use axum::routing::{get, post, put};
use axum::Router;

use detsys_types::marshaler::Marshaler;

use crate::executor::Executor;

pub fn create_router<M: Marshaler>(executor: Executor<M>) -> Router<()> {
    let not_supported = deliveries::method_not_supported;

    Router::new()
        .route(
            "/api/v1/event",
            post(deliveries::deliver_event::<M>).fallback(not_supported),
        )
        .route(
            "/api/v1/tick",
            put(deliveries::deliver_tick::<M>).fallback(not_supported),
        )
        .route(
            "/api/v1/timer",
            post(deliveries::deliver_timer::<M>).fallback(not_supported),
        )
        .route(
            "/api/v1/inits",
            get(deliveries::list_inits::<M>).fallback(not_supported),
        )
        .route(
            "/api/v1/reset",
            post(deliveries::reset::<M>).fallback(not_supported),
        )
        .route(
            "/health",
            get(health::health::<M>).fallback(not_supported),
        )
        .with_state(executor)
}
